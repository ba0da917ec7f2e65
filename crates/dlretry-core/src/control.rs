//! Cooperative cancellation: the caller-owned stop flag and the per-thread
//! interrupt signal.
//!
//! A download run is stopped in two ways. The caller holds a [`StopToken`]
//! and raises it on an external stop request (e.g. `dlretry stop` via the
//! control socket). Independently, any thread can [`Interrupter::interrupt`]
//! the thread running the download, which also wakes it from a backoff
//! [`sleep`]. The core only ever reads either signal.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::Thread;
use std::time::{Duration, Instant};

/// Caller-owned cancellation flag shared with a running download.
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    flag: Arc<AtomicBool>,
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop. The download notices at its next check point.
    pub fn stop(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Why a run was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The caller's [`StopToken`] was raised.
    Stopped,
    /// The running thread was interrupted.
    Interrupted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Stopped => write!(f, "stop requested"),
            StopReason::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// Handle to one thread's interrupt flag. Obtain it on the thread that will
/// run the download with [`interrupter`], then hand clones to whoever may
/// need to interrupt it.
#[derive(Debug, Clone)]
pub struct Interrupter {
    flag: Arc<AtomicBool>,
    thread: Thread,
}

impl Interrupter {
    fn for_current_thread() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            thread: std::thread::current(),
        }
    }

    /// Sets the flag and wakes the thread if it is parked in [`sleep`].
    pub fn interrupt(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.thread.unpark();
    }

    pub fn is_interrupted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clears the flag. Only the owner of the thread should do this, between runs.
    pub fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

thread_local! {
    static CURRENT: Interrupter = Interrupter::for_current_thread();
}

/// Interrupt handle for the calling thread.
pub fn interrupter() -> Interrupter {
    CURRENT.with(Interrupter::clone)
}

/// True if the calling thread has been interrupted.
pub fn is_interrupted() -> bool {
    CURRENT.with(Interrupter::is_interrupted)
}

/// Samples both stop signals. The caller's flag is reported first when both are set.
pub fn should_stop(stop: &StopToken) -> Option<StopReason> {
    if stop.is_stopped() {
        Some(StopReason::Stopped)
    } else if is_interrupted() {
        Some(StopReason::Interrupted)
    } else {
        None
    }
}

/// Sleeps up to `duration`, returning early when the calling thread is interrupted.
/// Returns false if the sleep was cut short.
pub fn sleep(duration: Duration) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if is_interrupted() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        // park_timeout may wake spuriously; the loop re-checks both conditions.
        std::thread::park_timeout(deadline - now);
    }
}

/// Default path for the control socket used by `dlretry stop`.
pub fn default_control_socket_path() -> std::io::Result<PathBuf> {
    let dir = xdg::BaseDirectories::with_prefix("dlretry")?.get_state_home();
    Ok(dir.join("control.sock"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn stop_token_clones_share_flag() {
        let token = StopToken::new();
        let other = token.clone();
        assert!(!other.is_stopped());
        token.stop();
        assert!(other.is_stopped());
        assert_eq!(should_stop(&other), Some(StopReason::Stopped));
    }

    #[test]
    fn fresh_thread_is_not_interrupted() {
        let handle = std::thread::spawn(|| (is_interrupted(), should_stop(&StopToken::new())));
        let (interrupted, reason) = handle.join().unwrap();
        assert!(!interrupted);
        assert_eq!(reason, None);
    }

    #[test]
    fn interrupt_is_per_thread() {
        let handle = std::thread::spawn(|| {
            interrupter().interrupt();
            should_stop(&StopToken::new())
        });
        assert_eq!(handle.join().unwrap(), Some(StopReason::Interrupted));
        assert!(!is_interrupted());
    }

    #[test]
    fn interrupt_wakes_sleep_early() {
        let (tx, rx) = mpsc::channel();
        let sleeper = std::thread::spawn(move || {
            tx.send(interrupter()).unwrap();
            let started = Instant::now();
            let completed = sleep(Duration::from_secs(30));
            (completed, started.elapsed())
        });
        let handle = rx.recv().unwrap();
        std::thread::sleep(Duration::from_millis(50));
        handle.interrupt();
        let (completed, elapsed) = sleeper.join().unwrap();
        assert!(!completed);
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn sleep_runs_to_deadline_when_not_interrupted() {
        let started = Instant::now();
        assert!(sleep(Duration::from_millis(20)));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn clear_resets_interrupt() {
        let handle = std::thread::spawn(|| {
            let me = interrupter();
            me.interrupt();
            me.clear();
            is_interrupted()
        });
        assert!(!handle.join().unwrap());
    }
}
