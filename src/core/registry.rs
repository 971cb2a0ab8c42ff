//! # Task registry: validation and per-task runtime records.
//!
//! The registry is built once, from the full list of [`TaskSpec`]s, and never changes
//! afterwards.
//!
//! ## Architecture
//! ```text
//! Vec<TaskSpec> ──► Registry::validate()       (all-or-nothing, nothing spawned on error)
//!                         │
//!                         ▼
//!               Registry::spawn(specs, ..)
//!                         ├─► token = CancellationToken::new()
//!                         ├─► tokio::spawn(PollActor::run(child).instrument(span))
//!                         └─► TaskRecord { name, concurrency, token, done: Shared<..>, handle }
//! ```
//!
//! ## Rules
//! - Names are unique and non-empty; concurrency is at least 1.
//! - Each record's `done` future resolves once that task's loop has fully exited; it can be
//!   awaited any number of times.

use std::collections::HashSet;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, JoinAll, Shared, join_all};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info_span};

use crate::core::actor::{ActorExit, PollActor};
use crate::error::BuildError;
use crate::events::Bus;
use crate::policies::SaturationPolicy;
use crate::tasks::{ActiveInstructions, TaskSpec};

/// Completion handle of one polling loop.
pub(crate) type Done = Shared<BoxFuture<'static, ActorExit>>;

/// Immutable runtime record of one task.
pub(crate) struct TaskRecord {
    pub(crate) name: Arc<str>,
    pub(crate) concurrency: usize,
    pub(crate) token: CancellationToken,
    pub(crate) done: Done,
    handle: AbortHandle,
}

impl TaskRecord {
    /// True once the loop's tokio task has exited.
    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Fixed set of running tasks.
pub(crate) struct Registry {
    records: Vec<TaskRecord>,
}

impl Registry {
    /// Checks every spec before anything is spawned.
    pub(crate) fn validate(specs: &[TaskSpec]) -> Result<(), BuildError> {
        let mut seen: HashSet<&str> = HashSet::with_capacity(specs.len());

        for spec in specs {
            let name = spec.name();
            if name.is_empty() {
                return Err(BuildError::InvalidTaskConfiguration {
                    name: String::new(),
                    reason: "task name must not be empty".to_string(),
                });
            }
            if spec.concurrency() < 1 {
                return Err(BuildError::InvalidTaskConfiguration {
                    name: name.to_string(),
                    reason: "concurrency must be at least 1".to_string(),
                });
            }
            if !seen.insert(name) {
                return Err(BuildError::DuplicateTaskName {
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Spawns one polling loop per (already validated) spec on `rt`.
    pub(crate) fn spawn(
        rt: &Handle,
        specs: Vec<TaskSpec>,
        source: &Arc<dyn ActiveInstructions>,
        bus: &Bus,
        saturation: SaturationPolicy,
    ) -> Self {
        let records = specs
            .into_iter()
            .map(|spec| {
                let name = spec.name_arc();
                let concurrency = spec.concurrency();
                let token = CancellationToken::new();

                let actor = PollActor::new(spec, Arc::clone(source), bus.clone(), saturation);
                let span = info_span!("poll", task = %name);
                let join = rt.spawn(actor.run(token.clone()).instrument(span));
                let handle = join.abort_handle();

                let task = Arc::clone(&name);
                let done = async move {
                    match join.await {
                        Ok(exit) => exit,
                        Err(e) => {
                            error!(task = %task, error = %e, "polling loop died");
                            ActorExit::Panicked
                        }
                    }
                }
                .boxed()
                .shared();

                TaskRecord {
                    name,
                    concurrency,
                    token,
                    done,
                    handle,
                }
            })
            .collect();

        Self { records }
    }

    /// Cancels every loop: pending waits end immediately, in-flight rounds run on.
    pub(crate) fn cancel_all(&self) {
        for record in &self.records {
            record.token.cancel();
        }
    }

    /// Future resolving once every loop has exited. Owns its handles, so it may outlive `self`.
    pub(crate) fn completion(&self) -> JoinAll<Done> {
        join_all(self.records.iter().map(|r| r.done.clone()))
    }

    /// Names of tasks whose loops have not exited yet, sorted.
    pub(crate) fn running(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .records
            .iter()
            .filter(|r| !r.is_finished())
            .map(|r| r.name.to_string())
            .collect();
        names.sort_unstable();
        names
    }

    pub(crate) fn records(&self) -> &[TaskRecord] {
        &self.records
    }

    pub(crate) fn get(&self, name: &str) -> Option<&TaskRecord> {
        self.records.iter().find(|r| r.name.as_ref() == name)
    }
}
