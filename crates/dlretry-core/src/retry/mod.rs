//! Retry, redirect and proxy-challenge arbitration.
//!
//! An attempt result is classified into an [`Outcome`] (success, recoverable,
//! moved, proxy challenge, fatal, cancelled). The [`Retrier`] loops over
//! attempts, counting down between recoverable failures and handing redirects
//! and proxy challenges to the caller's [`RetryEvents`] before trying again.

mod classify;
mod error;
mod events;
mod policy;
mod run;

pub use classify::{check_status, classify, Outcome};
pub use error::{AttemptError, RunError, RunErrorKind};
pub use events::{Job, RetryEvents};
pub use policy::{MaxAttempts, RetryPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY_SECS};
pub use run::{run, Retrier, DEFAULT_TICK};
