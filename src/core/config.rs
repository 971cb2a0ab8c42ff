//! # Engine configuration.
//!
//! Provides [`Config`], centralized settings for a [`Poller`](crate::Poller).
//!
//! Config is used in two ways:
//! 1. **Engine creation**: `Poller::builder(source).with_config(cfg)`
//! 2. **TaskSpec defaults**: `TaskSpec::with_defaults(name, schedule, &cfg)`
//!
//! ## Sentinel values
//! - `bus_capacity = 0` → clamped to 1

use std::time::Duration;

use crate::policies::{DelayPolicy, SaturationPolicy};

/// Configuration for the polling engine.
///
/// ## Field semantics
/// - `grace`: how long [`Poller::run_until_signal`](crate::Poller::run_until_signal) waits for loops to drain
/// - `bus_capacity`: ring size of the broadcast stream behind [`Bus::receiver`](crate::Bus::receiver)
/// - `saturation`: attempt bookkeeping for rounds skipped at the concurrency ceiling
/// - `concurrency`, `delay`: task defaults for [`TaskSpec::with_defaults`](crate::TaskSpec::with_defaults)
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum wait for in-flight rounds after a shutdown signal.
    pub grace: Duration,

    /// Capacity of the broadcast event stream. Handlers are unaffected.
    pub bus_capacity: usize,

    /// What a saturated round does to the attempt number.
    pub saturation: SaturationPolicy,

    /// Default concurrency ceiling for tasks.
    pub concurrency: usize,

    /// Default delay policy for tasks.
    pub delay: DelayPolicy,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `grace = 60s`
    /// - `bus_capacity = 1024`
    /// - `saturation = SaturationPolicy::Hold`
    /// - `concurrency = 1`
    /// - `delay = DelayPolicy::Constant(1s)`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(60),
            bus_capacity: 1024,
            saturation: SaturationPolicy::default(),
            concurrency: 1,
            delay: DelayPolicy::default(),
        }
    }
}
