//! # Delay policy: attempt number → wait before the next round.
//!
//! The polling loop recomputes its wait from the attempt number every round, so the whole
//! backoff strategy lives here and the loop keeps no timing state of its own.
//!
//! - [`DelayPolicy::Constant`] fixed wait (default: 1s)
//! - [`DelayPolicy::Backoff`] exponential growth over empty rounds, see [`BackoffPolicy`]
//! - [`DelayPolicy::Custom`] any caller closure
//!
//! A zero wait means "poll again right away"; the loop still yields to the runtime between rounds.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::policies::backoff::BackoffPolicy;

/// Caller-supplied delay function.
pub type DelayFn = Arc<dyn Fn(u32) -> Duration + Send + Sync + 'static>;

/// How long a task waits before each round.
#[derive(Clone)]
pub enum DelayPolicy {
    /// Same wait regardless of the attempt number.
    Constant(Duration),
    /// Wait grows with consecutive empty rounds.
    Backoff(BackoffPolicy),
    /// Delegates to a caller closure.
    Custom(DelayFn),
}

impl DelayPolicy {
    /// Wraps a closure as a delay policy.
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use taskpoller::DelayPolicy;
    ///
    /// let linear = DelayPolicy::custom(|attempt| Duration::from_millis(100 * u64::from(attempt)));
    /// assert_eq!(linear.delay(3), Duration::from_millis(300));
    /// ```
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        DelayPolicy::Custom(Arc::new(f))
    }

    /// Returns the wait before the round following `attempt` consecutive empty rounds.
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            DelayPolicy::Constant(d) => *d,
            DelayPolicy::Backoff(b) => b.delay(attempt),
            DelayPolicy::Custom(f) => f(attempt),
        }
    }
}

impl Default for DelayPolicy {
    fn default() -> Self {
        DelayPolicy::Constant(Duration::from_secs(1))
    }
}

impl From<Duration> for DelayPolicy {
    fn from(d: Duration) -> Self {
        DelayPolicy::Constant(d)
    }
}

impl From<BackoffPolicy> for DelayPolicy {
    fn from(b: BackoffPolicy) -> Self {
        DelayPolicy::Backoff(b)
    }
}

impl fmt::Debug for DelayPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DelayPolicy::Constant(d) => f.debug_tuple("Constant").field(d).finish(),
            DelayPolicy::Backoff(b) => f.debug_tuple("Backoff").field(b).finish(),
            DelayPolicy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_one_second() {
        let policy = DelayPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_secs(1));
        assert_eq!(policy.delay(17), Duration::from_secs(1));
    }

    #[test]
    fn test_backoff_variant_delegates() {
        let policy: DelayPolicy = BackoffPolicy {
            first: Duration::from_millis(10),
            max: Duration::from_millis(35),
            ..BackoffPolicy::default()
        }
        .into();
        assert_eq!(policy.delay(0), Duration::from_millis(10));
        assert_eq!(policy.delay(2), Duration::from_millis(35));
    }

    #[test]
    fn test_debug_hides_closure() {
        let policy = DelayPolicy::custom(|_| Duration::ZERO);
        assert_eq!(format!("{policy:?}"), "Custom(..)");
    }
}
