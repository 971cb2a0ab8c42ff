//! # Saturation policy: bookkeeping for rounds skipped at the concurrency ceiling.
//!
//! When a task already has `concurrency` active instructions, the round is skipped before
//! `schedule` runs. [`SaturationPolicy`] decides what that skip does to the attempt number:
//!
//! ```text
//! SaturationPolicy::Hold     → attempt unchanged, next wait = same delay (default)
//! SaturationPolicy::Advance  → attempt += 1, as if the round had come back empty
//! ```
//!
//! `Advance` makes a saturated task back off like an idle one; `Hold` keeps polling at the pace
//! it had when the ceiling was reached.

/// What a saturated round does to the attempt number.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SaturationPolicy {
    /// Leave the attempt number unchanged (default).
    #[default]
    Hold,
    /// Count the skipped round as an empty one.
    Advance,
}

impl SaturationPolicy {
    /// Attempt number after a saturated round.
    #[inline]
    pub fn next_attempt(self, attempt: u32) -> u32 {
        match self {
            SaturationPolicy::Hold => attempt,
            SaturationPolicy::Advance => attempt.saturating_add(1),
        }
    }
}
