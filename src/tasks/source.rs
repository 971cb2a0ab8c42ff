//! # Active-instruction source.
//!
//! The engine never stores instructions. Before each round it asks an [`ActiveInstructions`]
//! implementation (typically a database query) which instructions of the task are still in
//! flight, and compares the answer against the task's concurrency ceiling.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use taskpoller::{ActiveFn, ActiveInstructions, BoxError};
//!
//! let source: Arc<dyn ActiveInstructions> = ActiveFn::arc(|task: String| async move {
//!     // SELECT id FROM jobs WHERE task = $1 AND state = 'running'
//!     let _ = task;
//!     Ok::<_, BoxError>(Vec::new())
//! });
//! # let _ = source;
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::BoxError;
use crate::tasks::schedule::Instruction;

/// Source of truth for the instructions currently active per task.
#[async_trait]
pub trait ActiveInstructions: Send + Sync + 'static {
    /// Returns the instructions of `task_name` that are currently active.
    async fn active_instructions(&self, task_name: &str) -> Result<Vec<Instruction>, BoxError>;
}

/// Function-backed active-instruction source.
///
/// The closure receives an owned task name so it can build a `'static` future.
#[derive(Debug)]
pub struct ActiveFn<F> {
    f: F,
}

impl<F> ActiveFn<F> {
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
impl<F, Fut> ActiveInstructions for ActiveFn<F>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<Instruction>, BoxError>> + Send + 'static,
{
    async fn active_instructions(&self, task_name: &str) -> Result<Vec<Instruction>, BoxError> {
        (self.f)(task_name.to_owned()).await
    }
}
