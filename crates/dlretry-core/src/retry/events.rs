//! Caller-side hooks invoked by the retry loop.

use super::error::AttemptError;

/// Callbacks a run reports to. All run synchronously on the run's own thread.
pub trait RetryEvents {
    /// A proxy challenge was received. Install credentials before returning;
    /// the attempt is repeated once.
    fn on_proxy_needed(&mut self) {}

    /// A backoff completed and the next attempt continues the same transfer.
    fn on_resume(&mut self) {}

    /// A recoverable failure occurred; called once before the countdown.
    fn on_error(&mut self, _cause: &AttemptError) {}

    /// Called at every countdown step, `remaining_secs` running down to 0.
    /// Return false to give up.
    fn on_retry(&mut self, remaining_secs: u32, cause: &AttemptError) -> bool;

    /// The server redirected to `location`. The run never follows it by
    /// itself; update the target here (or raise the stop flag to decline).
    fn on_moved(&mut self, _location: &str) {}
}

/// A download that carries its own attempt operation and hooks, so the hooks
/// can change what the next attempt fetches.
pub trait Job: RetryEvents {
    type Output;

    /// Perform one full download (or resume) attempt.
    fn attempt(&mut self) -> Result<Self::Output, AttemptError>;
}

/// Pairs a closure with a separate hook implementation.
pub(crate) struct FnJob<'a, F, E> {
    pub(crate) attempt: F,
    pub(crate) events: &'a mut E,
}

impl<F, E: RetryEvents> RetryEvents for FnJob<'_, F, E> {
    fn on_proxy_needed(&mut self) {
        self.events.on_proxy_needed()
    }

    fn on_resume(&mut self) {
        self.events.on_resume()
    }

    fn on_error(&mut self, cause: &AttemptError) {
        self.events.on_error(cause)
    }

    fn on_retry(&mut self, remaining_secs: u32, cause: &AttemptError) -> bool {
        self.events.on_retry(remaining_secs, cause)
    }

    fn on_moved(&mut self, location: &str) {
        self.events.on_moved(location)
    }
}

impl<T, F, E> Job for FnJob<'_, F, E>
where
    F: FnMut() -> Result<T, AttemptError>,
    E: RetryEvents,
{
    type Output = T;

    fn attempt(&mut self) -> Result<T, AttemptError> {
        (self.attempt)()
    }
}
