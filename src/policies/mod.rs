//! Polling policies.
//!
//! This module groups the knobs that control **how long** a task waits between rounds and
//! **what a skipped round counts as**.
//!
//! ## Contents
//! - [`DelayPolicy`] attempt number → wait (constant / backoff / custom)
//! - [`BackoffPolicy`] exponential idle backoff (first / factor / max + jitter)
//! - [`JitterPolicy`] randomization to keep tasks from polling in lockstep
//! - [`SaturationPolicy`] attempt bookkeeping when the concurrency ceiling is reached
//!
//! ## Quick wiring
//! ```text
//! TaskSpec { delay: DelayPolicy, .. }     Config { saturation: SaturationPolicy, .. }
//!      └─► core::actor::PollActor uses:
//!           - delay.delay(attempt) before every round
//!           - saturation.next_attempt(attempt) when a round is skipped as saturated
//! ```
//!
//! ## Defaults
//! - `DelayPolicy::Constant(1s)`.
//! - `BackoffPolicy::default()` → first=1s, factor=2.0, max=60s, jitter=None.
//! - `SaturationPolicy::Hold`.

mod backoff;
mod delay;
mod jitter;
mod saturation;

pub use backoff::BackoffPolicy;
pub use delay::{DelayFn, DelayPolicy};
pub use jitter::JitterPolicy;
pub use saturation::SaturationPolicy;
