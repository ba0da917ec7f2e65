//! Classify attempt results and HTTP status codes into retry outcomes.

use crate::control::{self, StopReason, StopToken};
use crate::retry::error::AttemptError;
use std::io;

/// Classified result of one attempt.
#[derive(Debug)]
pub enum Outcome<T> {
    Success(T),
    /// Transient transport fault; eligible for retry after backoff.
    Recoverable(AttemptError),
    /// Redirect that needs caller confirmation.
    Moved(String),
    ProxyAuthRequired(AttemptError),
    Fatal(AttemptError),
    Cancelled {
        reason: StopReason,
        cause: Option<AttemptError>,
    },
}

/// Map an attempt result to exactly one outcome.
///
/// Both stop signals are sampled once; when either is set the outcome is
/// `Cancelled` whatever the attempt produced.
pub fn classify<T>(result: Result<T, AttemptError>, stop: &StopToken) -> Outcome<T> {
    if let Some(reason) = control::should_stop(stop) {
        return Outcome::Cancelled {
            reason,
            cause: result.err(),
        };
    }
    match result {
        Ok(value) => Outcome::Success(value),
        Err(e) => classify_error(e),
    }
}

fn classify_error<T>(e: AttemptError) -> Outcome<T> {
    match e {
        AttemptError::Moved(location) => Outcome::Moved(location),
        AttemptError::ProxyAuth => Outcome::ProxyAuthRequired(e),
        AttemptError::Interrupted => Outcome::Cancelled {
            reason: StopReason::Interrupted,
            cause: Some(e),
        },
        e if e.is_recoverable() => Outcome::Recoverable(e),
        e => Outcome::Fatal(e),
    }
}

impl AttemptError {
    /// True for transient transport faults worth retrying.
    pub fn is_recoverable(&self) -> bool {
        match self {
            AttemptError::Protocol(_) | AttemptError::RetryHint(_) | AttemptError::UnknownHost(_) => {
                true
            }
            AttemptError::Io(e) => is_recoverable_io(e.kind()),
            AttemptError::Curl(e) => is_recoverable_curl(e),
            AttemptError::NotFound(_)
            | AttemptError::Moved(_)
            | AttemptError::ProxyAuth
            | AttemptError::Status(_)
            | AttemptError::NonRetryable(_)
            | AttemptError::Interrupted => false,
        }
    }
}

fn is_recoverable_io(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::AddrNotAvailable
            | io::ErrorKind::TimedOut
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::Interrupted
    )
}

/// CURLE_WEIRD_SERVER_REPLY; the curl crate has no predicate for it.
const CURLE_WEIRD_SERVER_REPLY: u32 = 8;

fn is_recoverable_curl(e: &curl::Error) -> bool {
    e.code() == CURLE_WEIRD_SERVER_REPLY
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_couldnt_connect()
        || e.is_operation_timedout()
        || e.is_send_error()
        || e.is_recv_error()
        || e.is_got_nothing()
        || e.is_partial_file()
        || e.is_read_error()
        || e.is_http2_error()
        || e.is_http2_stream_error()
}

/// Translate a response status into the attempt contract.
///
/// 2xx passes; 301/302 become `Moved` (a redirect without a location is a
/// protocol error); 407 asks for proxy credentials; 404/410 are not-found;
/// anything else, 403 and 416 included, is rejected with its code.
pub fn check_status(code: u32, location: Option<&str>) -> Result<(), AttemptError> {
    match code {
        200..=299 => Ok(()),
        301 | 302 => match location {
            Some(loc) if !loc.trim().is_empty() => Err(AttemptError::Moved(loc.trim().to_string())),
            _ => Err(AttemptError::Protocol(format!(
                "HTTP {} without Location header",
                code
            ))),
        },
        407 => Err(AttemptError::ProxyAuth),
        404 | 410 => Err(AttemptError::NotFound(format!("HTTP {}", code))),
        _ => Err(AttemptError::Status(code)),
    }
}
