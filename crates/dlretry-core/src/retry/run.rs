//! Retry loop: attempt, classify, then succeed, retry after a countdown,
//! hand a redirect or proxy challenge to the caller, or abort.

use super::classify::{classify, Outcome};
use super::error::{AttemptError, RunError};
use super::events::{FnJob, Job, RetryEvents};
use super::policy::RetryPolicy;
use crate::control::{self, StopReason, StopToken};
use std::time::Duration;

/// Length of one countdown step.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

enum State<T> {
    Checking,
    Attempting,
    HandlingProxy,
    HandlingMoved(String),
    HandlingRetry(AttemptError),
    Done(T),
    Aborted(RunError),
}

/// Drives one download to success or a terminal error.
///
/// Attempt counting is left to the caller's [`RetryEvents::on_retry`]; the
/// retrier only applies the policy's delay.
#[derive(Debug, Clone)]
pub struct Retrier<'a> {
    policy: RetryPolicy,
    stop: &'a StopToken,
    tick: Duration,
}

impl<'a> Retrier<'a> {
    pub fn new(policy: RetryPolicy, stop: &'a StopToken) -> Self {
        Self {
            policy,
            stop,
            tick: DEFAULT_TICK,
        }
    }

    /// Override the countdown step length (tests, sub-second backoff).
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run a job whose hooks may update what the next attempt fetches.
    pub fn run<J: Job>(&self, job: &mut J) -> Result<J::Output, RunError> {
        let mut state = State::Checking;
        let mut resuming = false;
        loop {
            state = match state {
                State::Checking => {
                    if let Some(reason) = control::should_stop(self.stop) {
                        State::Aborted(RunError::cancelled(reason))
                    } else {
                        if resuming {
                            job.on_resume();
                            resuming = false;
                        }
                        State::Attempting
                    }
                }
                State::Attempting => {
                    let outcome = classify(job.attempt(), self.stop);
                    route(outcome, true)
                }
                State::HandlingProxy => {
                    job.on_proxy_needed();
                    let outcome = classify(job.attempt(), self.stop);
                    route(outcome, false)
                }
                State::HandlingMoved(location) => match control::should_stop(self.stop) {
                    Some(reason) => State::Aborted(RunError::cancelled(reason)),
                    None => {
                        tracing::debug!(%location, "redirect reported to caller");
                        job.on_moved(&location);
                        State::Checking
                    }
                },
                State::HandlingRetry(cause) => match self.back_off(job, cause) {
                    Ok(()) => {
                        resuming = true;
                        State::Checking
                    }
                    Err(e) => State::Aborted(e),
                },
                State::Done(value) => return Ok(value),
                State::Aborted(err) => {
                    tracing::debug!(kind = ?err.kind(), "run aborted: {}", err);
                    return Err(err);
                }
            };
        }
    }

    /// Run a plain closure with a separate set of hooks.
    pub fn run_with<T, F, E>(&self, attempt: F, events: &mut E) -> Result<T, RunError>
    where
        F: FnMut() -> Result<T, AttemptError>,
        E: RetryEvents,
    {
        self.run(&mut FnJob { attempt, events })
    }

    /// Report the failure, then count down `delay_secs..=0`, asking the caller
    /// at each step. Cancellation is checked before and after every tick.
    fn back_off<J: Job>(&self, job: &mut J, cause: AttemptError) -> Result<(), RunError> {
        tracing::debug!(delay_secs = self.policy.delay_secs, "recoverable failure: {}", cause);
        job.on_error(&cause);
        for remaining in (0..=self.policy.delay_secs).rev() {
            if !job.on_retry(remaining, &cause) {
                return Err(RunError::RetryExhausted(cause));
            }
            self.check_stop()?;
            if remaining > 0 {
                tracing::trace!(remaining, "backoff tick");
                if !control::sleep(self.tick) {
                    let reason = control::should_stop(self.stop).unwrap_or(StopReason::Interrupted);
                    return Err(RunError::cancelled(reason));
                }
                self.check_stop()?;
            }
        }
        Ok(())
    }

    fn check_stop(&self) -> Result<(), RunError> {
        match control::should_stop(self.stop) {
            Some(reason) => Err(RunError::cancelled(reason)),
            None => Ok(()),
        }
    }
}

/// Next state for a classified outcome. `proxy_allowed` is false on the one
/// extra attempt after a proxy challenge, where another challenge is fatal.
fn route<T>(outcome: Outcome<T>, proxy_allowed: bool) -> State<T> {
    match outcome {
        Outcome::Success(value) => State::Done(value),
        Outcome::ProxyAuthRequired(_) if proxy_allowed => State::HandlingProxy,
        Outcome::ProxyAuthRequired(cause) => {
            tracing::debug!("second proxy challenge");
            State::Aborted(RunError::Fatal(cause))
        }
        Outcome::Moved(location) => State::HandlingMoved(location),
        Outcome::Recoverable(cause) => State::HandlingRetry(cause),
        Outcome::Fatal(cause) => State::Aborted(RunError::Fatal(cause)),
        Outcome::Cancelled { reason, cause } => State::Aborted(RunError::Cancelled { reason, cause }),
    }
}

/// Run `attempt` under `policy` with the default one-second tick.
pub fn run<T, F, E>(
    policy: RetryPolicy,
    stop: &StopToken,
    attempt: F,
    events: &mut E,
) -> Result<T, RunError>
where
    F: FnMut() -> Result<T, AttemptError>,
    E: RetryEvents,
{
    Retrier::new(policy, stop).run_with(attempt, events)
}
