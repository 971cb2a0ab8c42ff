//! # Exponential backoff between empty rounds.
//!
//! [`BackoffPolicy`] maps the attempt number (consecutive empty rounds) to a wait:
//! `first × factor^attempt`, capped at `max`, then jittered.
//!
//! The base is derived from the attempt number alone, so jitter never feeds back into later
//! waits and the engine stays stateless about delays.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use taskpoller::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(250),
//!     max: Duration::from_secs(8),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! // Work was just found: poll again quickly.
//! assert_eq!(backoff.delay(0), Duration::from_millis(250));
//! // Three empty rounds in a row.
//! assert_eq!(backoff.delay(3), Duration::from_secs(2));
//! // Long idle stretch: capped.
//! assert_eq!(backoff.delay(40), Duration::from_secs(8));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Idle backoff policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Wait after a productive round (attempt 0).
    pub first: Duration,
    /// Upper bound for any wait.
    pub max: Duration,
    /// Growth per empty round (`>= 1.0` recommended).
    pub factor: f64,
    /// Randomization applied to the capped base.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// `first = 1s`, doubling up to `max = 60s`, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_secs(1),
            max: Duration::from_secs(60),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Computes the wait before the round following `attempt` consecutive empty rounds.
    ///
    /// Non-finite or negative intermediate values (huge exponents, odd factors) clamp to `max`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };

        match self.jitter {
            JitterPolicy::Decorrelated => {
                self.jitter
                    .apply_decorrelated(self.first.min(self.max), base, self.max)
            }
            _ => self.jitter.apply(base),
        }
    }
}
