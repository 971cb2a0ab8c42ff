//! # Schedule functions and what they return.
//!
//! A task's [`Schedule`] is asked, once per round, for at most `limit` new instructions.
//! [`ScheduleFn`] wraps a closure `F: Fn(ScheduleConfiguration) -> Fut`, producing a fresh
//! future per round.
//!
//! The result is a [`Batch`]: either typed instructions, or a raw JSON value for schedule
//! functions that relay query results verbatim. Raw batches are shape-checked by the loop
//! before anything is emitted.
//!
//! ## Example
//! ```rust
//! use taskpoller::{Batch, BoxError, ScheduleConfiguration, ScheduleFn, ScheduleRef};
//!
//! let next_jobs: ScheduleRef = ScheduleFn::arc(|cfg: ScheduleConfiguration| async move {
//!     let jobs: Vec<String> = (0..cfg.limit).map(|n| format!("{}-{n}", cfg.task_name)).collect();
//!     Ok::<_, BoxError>(Batch::from(jobs))
//! });
//! # let _ = next_jobs;
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::BoxError;

/// Opaque identifier of one unit of externally dispatched work.
pub type Instruction = String;

/// Read-only input handed to [`Schedule::schedule`] each round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfiguration {
    /// Instructions the store currently reports as active for this task.
    pub active_task_instructions: Vec<Instruction>,
    /// The task's concurrency ceiling.
    pub concurrency: usize,
    /// Maximum number of instructions this round may return.
    pub limit: usize,
    /// Name of the task being polled.
    pub task_name: Arc<str>,
}

/// Result of one schedule call.
#[derive(Debug, Clone, PartialEq)]
pub enum Batch {
    /// Typed instructions.
    Instructions(Vec<Instruction>),
    /// Untyped result; must be a JSON array of strings to be accepted.
    Raw(serde_json::Value),
}

impl Batch {
    /// A batch with no instructions.
    pub fn empty() -> Self {
        Batch::Instructions(Vec::new())
    }
}

impl Default for Batch {
    fn default() -> Self {
        Batch::empty()
    }
}

impl From<Vec<Instruction>> for Batch {
    fn from(v: Vec<Instruction>) -> Self {
        Batch::Instructions(v)
    }
}

impl From<Vec<&str>> for Batch {
    fn from(v: Vec<&str>) -> Self {
        Batch::Instructions(v.into_iter().map(str::to_owned).collect())
    }
}

impl From<serde_json::Value> for Batch {
    fn from(v: serde_json::Value) -> Self {
        Batch::Raw(v)
    }
}

/// Produces new instructions for a task.
///
/// Implementations may do I/O (claim rows, reserve jobs). The loop never cancels an
/// in-flight call; termination waits for it to finish.
#[async_trait]
pub trait Schedule: Send + Sync + 'static {
    /// Returns up to `cfg.limit` new instructions.
    async fn schedule(&self, cfg: ScheduleConfiguration) -> Result<Batch, BoxError>;
}

/// Shared handle to a schedule implementation.
pub type ScheduleRef = Arc<dyn Schedule>;

/// Function-backed schedule.
#[derive(Debug)]
pub struct ScheduleFn<F> {
    f: F,
}

impl<F> ScheduleFn<F> {
    /// Wraps a closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Wraps a closure and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> Schedule for ScheduleFn<F>
where
    F: Fn(ScheduleConfiguration) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Batch, BoxError>> + Send + 'static,
{
    async fn schedule(&self, cfg: ScheduleConfiguration) -> Result<Batch, BoxError> {
        (self.f)(cfg).await
    }
}
