//! # Events emitted by polling loops.
//!
//! The [`EventKind`] enum classifies the two event streams:
//! - **Task events**: one per instruction produced in a round, in the order `schedule` returned them.
//! - **Error events**: one per anomaly detected in a round.
//!
//! The [`Event`] enum wraps the payloads [`TaskEvent`] and [`ErrorEvent`].
//!
//! ## Ordering guarantees
//! Within one round, task events follow the order of the batch. Across tasks nothing is
//! ordered; rounds of different tasks interleave freely.
//!
//! ## Example
//! ```rust
//! use taskpoller::{Event, EventKind};
//!
//! let ev = Event::task("mailer", "send-42");
//! assert_eq!(ev.kind(), EventKind::Task);
//! assert_eq!(ev.task_name(), "mailer");
//! assert_eq!(ev.instruction(), Some("send-42"));
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use crate::error::PollError;
use crate::tasks::Instruction;

/// Classification of events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A new instruction was produced for downstream dispatch.
    Task,
    /// A round hit an anomaly (failed schedule, invalid limit, broken result contract, ...).
    Error,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Task => f.write_str("task"),
            EventKind::Error => f.write_str("error"),
        }
    }
}

/// One instruction produced by a task's schedule function.
#[derive(Debug, Clone)]
pub struct TaskEvent {
    /// Name of the producing task.
    pub task: Arc<str>,
    /// The opaque instruction.
    pub instruction: Instruction,
    /// Wall-clock timestamp.
    pub at: SystemTime,
}

/// One anomaly detected during a task's round.
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    /// Name of the task whose round failed.
    pub task: Arc<str>,
    /// What went wrong. Shared so the event stays cheap to clone.
    pub error: Arc<PollError>,
    /// Wall-clock timestamp.
    pub at: SystemTime,
}

/// Event published on the [`Bus`](crate::Bus).
#[derive(Debug, Clone)]
pub enum Event {
    /// See [`TaskEvent`].
    Task(TaskEvent),
    /// See [`ErrorEvent`].
    Error(ErrorEvent),
}

impl Event {
    /// Creates a task event stamped with the current time.
    pub fn task(task: impl Into<Arc<str>>, instruction: impl Into<Instruction>) -> Self {
        Event::Task(TaskEvent {
            task: task.into(),
            instruction: instruction.into(),
            at: SystemTime::now(),
        })
    }

    /// Creates an error event stamped with the current time.
    pub fn error(task: impl Into<Arc<str>>, error: PollError) -> Self {
        Event::Error(ErrorEvent {
            task: task.into(),
            error: Arc::new(error),
            at: SystemTime::now(),
        })
    }

    /// Returns the event classification.
    #[inline]
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Task(_) => EventKind::Task,
            Event::Error(_) => EventKind::Error,
        }
    }

    /// Returns the name of the task the event belongs to.
    #[inline]
    pub fn task_name(&self) -> &str {
        match self {
            Event::Task(ev) => &ev.task,
            Event::Error(ev) => &ev.task,
        }
    }

    /// Returns the instruction for task events.
    #[inline]
    pub fn instruction(&self) -> Option<&str> {
        match self {
            Event::Task(ev) => Some(&ev.instruction),
            Event::Error(_) => None,
        }
    }

    /// Returns the error for error events.
    #[inline]
    pub fn poll_error(&self) -> Option<&PollError> {
        match self {
            Event::Task(_) => None,
            Event::Error(ev) => Some(&ev.error),
        }
    }

    /// Returns the wall-clock timestamp.
    #[inline]
    pub fn at(&self) -> SystemTime {
        match self {
            Event::Task(ev) => ev.at,
            Event::Error(ev) => ev.at,
        }
    }
}
