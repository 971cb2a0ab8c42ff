//! # Task descriptors and caller-supplied collaborators.
//!
//! This module provides the task-related types:
//! - [`TaskSpec`] / [`TaskSpecBuilder`] - immutable description of one polled task
//! - [`Schedule`] / [`ScheduleFn`] / [`ScheduleRef`] - produces new instructions each round
//! - [`ActiveInstructions`] / [`ActiveFn`] - reports which instructions are still active
//! - [`ScheduleConfiguration`], [`Batch`], [`Instruction`] - round input and output

mod schedule;
mod source;
mod spec;

pub use schedule::{Batch, Instruction, Schedule, ScheduleConfiguration, ScheduleFn, ScheduleRef};
pub use source::{ActiveFn, ActiveInstructions};
pub use spec::{LimitFn, TaskSpec, TaskSpecBuilder, free_slots};
