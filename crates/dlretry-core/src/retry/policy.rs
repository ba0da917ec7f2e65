/// Default seconds to count down between a recoverable failure and the next attempt.
pub const DEFAULT_RETRY_DELAY_SECS: u32 = 3;

/// Default bound on retries.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Upper bound on retries after recoverable failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxAttempts {
    Limited(u32),
    Unbounded,
}

/// Retry configuration for one run.
///
/// The orchestrator only reads `delay_secs`. The attempt bound is enforced by
/// the caller's retry decision callback, usually through [`RetryPolicy::allows`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: MaxAttempts,
    /// Countdown length between attempts; 0 means no delay.
    pub delay_secs: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MaxAttempts::Limited(DEFAULT_MAX_ATTEMPTS),
            delay_secs: DEFAULT_RETRY_DELAY_SECS,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: MaxAttempts, delay_secs: u32) -> Self {
        Self {
            max_attempts,
            delay_secs,
        }
    }

    /// Whether retry number `retry` (1-based) is still within the bound.
    pub fn allows(&self, retry: u32) -> bool {
        match self.max_attempts {
            MaxAttempts::Limited(max) => retry <= max,
            MaxAttempts::Unbounded => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_attempts, MaxAttempts::Limited(5));
        assert_eq!(p.delay_secs, 3);
    }

    #[test]
    fn limited_allows_up_to_max() {
        let p = RetryPolicy::new(MaxAttempts::Limited(2), 0);
        assert!(p.allows(1));
        assert!(p.allows(2));
        assert!(!p.allows(3));
    }

    #[test]
    fn zero_limit_allows_nothing() {
        let p = RetryPolicy::new(MaxAttempts::Limited(0), 0);
        assert!(!p.allows(1));
    }

    #[test]
    fn unbounded_always_allows() {
        let p = RetryPolicy::new(MaxAttempts::Unbounded, 1);
        assert!(p.allows(1));
        assert!(p.allows(u32::MAX));
    }
}
