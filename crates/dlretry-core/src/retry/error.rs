//! Attempt failure conditions and terminal run errors.

use crate::control::StopReason;
use thiserror::Error;

/// Condition raised by one download attempt.
/// Kept as a closed set so classification stays total.
#[derive(Debug, Error)]
pub enum AttemptError {
    /// Socket or file I/O failure; classified by `io::ErrorKind`.
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
    /// libcurl reported an error (timeout, connection, resolve, ...).
    #[error("curl: {0}")]
    Curl(#[from] curl::Error),
    /// Response did not follow the protocol (bad status line, redirect without Location, ...).
    #[error("protocol error: {0}")]
    Protocol(String),
    /// The transport asked for the request to be retried.
    #[error("retry requested: {0}")]
    RetryHint(String),
    /// Host name could not be resolved.
    #[error("unknown host: {0}")]
    UnknownHost(String),
    /// Resource does not exist (404, 410).
    #[error("not found: {0}")]
    NotFound(String),
    /// Redirect (301/302) to the given location. Never followed automatically.
    #[error("moved to {0}")]
    Moved(String),
    /// Proxy requires authentication (407).
    #[error("proxy authentication required")]
    ProxyAuth,
    /// Any other rejected HTTP status (403, 416, ...).
    #[error("HTTP {0}")]
    Status(u32),
    /// Flagged non-retryable by the caller's layer; propagated unchanged.
    #[error(transparent)]
    NonRetryable(anyhow::Error),
    /// The attempt observed an interruption and gave up.
    #[error("attempt interrupted")]
    Interrupted,
}

impl AttemptError {
    /// Wrap a caller error so it aborts the run without retry.
    pub fn non_retryable(err: impl Into<anyhow::Error>) -> Self {
        AttemptError::NonRetryable(err.into())
    }
}

/// Which terminal path ended a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunErrorKind {
    Fatal,
    Cancelled,
    RetryExhausted,
}

/// Terminal error of a run. Always carries the classified cause when there was one.
#[derive(Debug, Error)]
pub enum RunError {
    /// Not-found, forbidden, unsatisfiable range, a second proxy challenge,
    /// or anything the caller flagged as non-retryable.
    #[error("download failed: {0}")]
    Fatal(#[source] AttemptError),
    /// Stop flag raised or thread interrupted. `cause` is set when the
    /// cancellation was observed together with a failed attempt.
    #[error("download cancelled: {reason}")]
    Cancelled {
        reason: StopReason,
        #[source]
        cause: Option<AttemptError>,
    },
    /// The retry decision callback declined to continue after a recoverable failure.
    #[error("giving up after retries: {0}")]
    RetryExhausted(#[source] AttemptError),
}

impl RunError {
    pub fn kind(&self) -> RunErrorKind {
        match self {
            RunError::Fatal(_) => RunErrorKind::Fatal,
            RunError::Cancelled { .. } => RunErrorKind::Cancelled,
            RunError::RetryExhausted(_) => RunErrorKind::RetryExhausted,
        }
    }

    /// The attempt condition that led here, if any.
    pub fn cause(&self) -> Option<&AttemptError> {
        match self {
            RunError::Fatal(cause) | RunError::RetryExhausted(cause) => Some(cause),
            RunError::Cancelled { cause, .. } => cause.as_ref(),
        }
    }

    pub(crate) fn cancelled(reason: StopReason) -> Self {
        RunError::Cancelled {
            reason,
            cause: None,
        }
    }
}
