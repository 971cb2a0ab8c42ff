//! Error types used by the taskpoller engine.
//!
//! This module defines three error enums:
//!
//! - [`BuildError`]: configuration errors, raised synchronously while constructing a
//!   [`Poller`](crate::Poller). Nothing is spawned when one of these is returned.
//! - [`PollError`]: anomalies detected inside a polling round. These are never returned
//!   to a caller; they travel on the bus inside an [`ErrorEvent`](crate::ErrorEvent).
//! - [`RuntimeError`]: failures of the termination sequence itself.
//!
//! All of them provide `as_label` for logs/metrics.

use std::time::Duration;
use thiserror::Error;

/// Boxed error returned by caller-supplied collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// # Errors produced while constructing the engine.
///
/// Registration is all-or-nothing: if any task descriptor is rejected, no polling loop is started.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// Two task descriptors share the same name.
    #[error("duplicate task name: {name:?}")]
    DuplicateTaskName {
        /// The offending name.
        name: String,
    },

    /// A task descriptor carries an unusable setting (zero concurrency, empty name).
    #[error("invalid configuration for task {name:?}: {reason}")]
    InvalidTaskConfiguration {
        /// Name of the rejected task.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The engine was constructed outside of a tokio runtime.
    #[error("no tokio runtime available to spawn polling loops")]
    NoRuntime,
}

impl BuildError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskpoller::BuildError;
    ///
    /// let err = BuildError::DuplicateTaskName { name: "mail".into() };
    /// assert_eq!(err.as_label(), "build_duplicate_task_name");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BuildError::DuplicateTaskName { .. } => "build_duplicate_task_name",
            BuildError::InvalidTaskConfiguration { .. } => "build_invalid_task_configuration",
            BuildError::NoRuntime => "build_no_runtime",
        }
    }
}

/// # Anomalies detected during a polling round.
///
/// Every variant is recovered by the loop that detected it: the round degrades to
/// "no instructions" and polling continues.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum PollError {
    /// The caller's schedule function returned an error.
    #[error("schedule failed: {0}")]
    ScheduleFailed(#[source] BoxError),

    /// The active-instruction lookup returned an error; the round was skipped.
    #[error("active instruction lookup failed: {0}")]
    ActiveLookupFailed(#[source] BoxError),

    /// The limit function produced a negative limit; schedule was not invoked.
    #[error("limit function returned {limit}, expected a non-negative integer")]
    InvalidLimit {
        /// The rejected value.
        limit: i64,
    },

    /// The limit function panicked; schedule was not invoked.
    #[error("limit function panicked: {message}")]
    LimitPanicked {
        /// Panic payload, if it was a string.
        message: String,
    },

    /// The schedule result was not a sequence.
    #[error("schedule returned {found}, expected an array of instructions")]
    NotASequence {
        /// JSON type name of what was returned.
        found: &'static str,
    },

    /// A member of the schedule result was not a string.
    #[error("schedule returned a non-string instruction at index {index}")]
    NonStringInstruction {
        /// Position of the first offending member.
        index: usize,
    },

    /// The schedule result held more instructions than the round's limit allowed.
    #[error("schedule returned {returned} instructions, limit was {limit}")]
    TooManyInstructions {
        /// Number of instructions returned.
        returned: usize,
        /// Limit passed to schedule.
        limit: usize,
    },
}

impl PollError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            PollError::ScheduleFailed(_) => "poll_schedule_failed",
            PollError::ActiveLookupFailed(_) => "poll_active_lookup_failed",
            PollError::InvalidLimit { .. } => "poll_invalid_limit",
            PollError::LimitPanicked { .. } => "poll_limit_panicked",
            PollError::NotASequence { .. } => "poll_not_a_sequence",
            PollError::NonStringInstruction { .. } => "poll_non_string_instruction",
            PollError::TooManyInstructions { .. } => "poll_too_many_instructions",
        }
    }

    /// Indicates whether the schedule function broke its result contract.
    ///
    /// # Example
    /// ```
    /// use taskpoller::PollError;
    ///
    /// let err = PollError::TooManyInstructions { returned: 3, limit: 1 };
    /// assert!(err.is_contract_violation());
    ///
    /// let err = PollError::InvalidLimit { limit: -1 };
    /// assert!(!err.is_contract_violation());
    /// ```
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            PollError::NotASequence { .. }
                | PollError::NonStringInstruction { .. }
                | PollError::TooManyInstructions { .. }
        )
    }
}

/// # Errors produced by the termination sequence.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Grace period was exceeded; some loops were still inside a round.
    #[error("termination grace {grace:?} exceeded; still running: {stuck:?}")]
    GraceExceeded {
        /// The grace duration that elapsed.
        grace: Duration,
        /// Names of tasks whose loops had not exited yet.
        stuck: Vec<String>,
    },

    /// The shutdown signal listener could not be installed.
    #[error("failed to listen for shutdown signal: {0}")]
    Signal(#[from] std::io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskpoller::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::Signal(_) => "runtime_signal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_violation_grouping() {
        assert!(PollError::NotASequence { found: "object" }.is_contract_violation());
        assert!(PollError::NonStringInstruction { index: 0 }.is_contract_violation());
        assert!(!PollError::ScheduleFailed("boom".into()).is_contract_violation());
        assert!(!PollError::ActiveLookupFailed("db down".into()).is_contract_violation());
    }

    #[test]
    fn test_schedule_failure_keeps_source() {
        let err = PollError::ScheduleFailed("boom".into());
        assert_eq!(err.to_string(), "schedule failed: boom");
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("boom"));
    }

    #[test]
    fn test_build_error_messages() {
        let err = BuildError::InvalidTaskConfiguration {
            name: "mail".into(),
            reason: "concurrency must be at least 1".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid configuration for task \"mail\": concurrency must be at least 1"
        );
    }
}
