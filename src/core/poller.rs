//! # Poller: engine handle and termination coordinator.
//!
//! The [`Poller`] owns the event bus, the registry of running loops, and the optional
//! [`SubscriberSet`]. Loops start as soon as it is built; it never gains or loses tasks.
//!
//! ## High-level architecture
//! ```text
//! PollerBuilder::build():
//!   Registry::validate(specs)            ─► Err(BuildError) before anything spawns
//!   Bus::new(cfg.bus_capacity)           ─► handlers from .on(..), SubscriberSet bridge
//!   Registry::spawn(specs, source, bus)  ─► one PollActor per spec
//!
//! Event flow:
//!   PollActor ── publish(Event) ──► Bus ──► handlers (inline)
//!                                       └─► SubscriberSet::emit ──► [queue S1..SN] ──► on_event()
//!
//! Termination path:
//!   terminate()
//!     └─► cancel every task token   → pending waits end immediately
//!     └─► await every loop's `done` → in-flight lookups/schedules finish naturally
//!     └─► SubscriberSet::shutdown() → queued events delivered
//! ```
//!
//! ## Example
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use std::time::Duration;
//! use taskpoller::{
//!     ActiveFn, Batch, BoxError, Event, EventKind, Poller, ScheduleConfiguration, TaskSpec,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let produced = Arc::new(Mutex::new(Vec::new()));
//!     let sink = Arc::clone(&produced);
//!
//!     let spec = TaskSpec::builder("mailer")
//!         .concurrency(2)
//!         .every_ms(10)
//!         .build(|cfg: ScheduleConfiguration| async move {
//!             let batch: Vec<String> = (0..cfg.limit).map(|n| format!("mail-{n}")).collect();
//!             Ok::<_, BoxError>(Batch::from(batch))
//!         });
//!
//!     let poller = Poller::builder(ActiveFn::arc(|_task: String| async {
//!         Ok::<_, BoxError>(Vec::new())
//!     }))
//!     .task(spec)
//!     .on(EventKind::Task, move |ev: &Event| {
//!         sink.lock().unwrap().push(ev.instruction().unwrap_or_default().to_string());
//!     })
//!     .build()?;
//!
//!     tokio::time::sleep(Duration::from_millis(50)).await;
//!     poller.terminate().await;
//!
//!     assert!(!produced.lock().unwrap().is_empty());
//!     Ok(())
//! }
//! ```

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::time;
use tracing::info;

use crate::core::builder::PollerBuilder;
use crate::core::config::Config;
use crate::core::registry::Registry;
use crate::core::shutdown::ShutdownSignals;
use crate::error::{BuildError, RuntimeError};
use crate::events::{Bus, Event, EventKind, SubscriptionId};
use crate::subscribers::SubscriberSet;
use crate::tasks::{ActiveInstructions, TaskSpec};

/// Running polling engine.
///
/// Dropping a `Poller` without calling [`terminate`](Poller::terminate) cancels its loops;
/// they finish their current round in the background.
pub struct Poller {
    cfg: Config,
    bus: Bus,
    registry: Registry,
    subs: Option<Arc<SubscriberSet>>,
    termination: OnceLock<Shared<BoxFuture<'static, ()>>>,
}

impl Poller {
    /// Builds an engine for `tasks` with default configuration and starts polling.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        tasks: Vec<TaskSpec>,
        source: Arc<dyn ActiveInstructions>,
    ) -> Result<Self, BuildError> {
        Self::builder(source).tasks(tasks).build()
    }

    /// Creates a builder around the active-instruction source.
    pub fn builder(source: Arc<dyn ActiveInstructions>) -> PollerBuilder {
        PollerBuilder::new(source)
    }

    pub(crate) fn from_parts(
        cfg: Config,
        bus: Bus,
        registry: Registry,
        subs: Option<Arc<SubscriberSet>>,
    ) -> Self {
        Self {
            cfg,
            bus,
            registry,
            subs,
            termination: OnceLock::new(),
        }
    }

    /// The engine's own event bus.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Registers a handler on the engine's bus. Events already published are not replayed.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.bus.subscribe(kind, handler)
    }

    /// Removes a handler registered with [`subscribe`](Poller::subscribe).
    pub fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(kind, id)
    }

    /// The configuration the engine was built with.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Names of all tasks, in registration order.
    pub fn task_names(&self) -> Vec<String> {
        self.registry
            .records()
            .iter()
            .map(|r| r.name.to_string())
            .collect()
    }

    /// Concurrency ceiling of a task.
    pub fn concurrency(&self, task: &str) -> Option<usize> {
        self.registry.get(task).map(|r| r.concurrency)
    }

    /// Names of tasks whose loops have not exited yet, sorted.
    pub fn running_tasks(&self) -> Vec<String> {
        self.registry.running()
    }

    /// True once termination has been requested.
    pub fn is_terminating(&self) -> bool {
        self.termination.get().is_some()
    }

    /// Stops every loop and waits until all of them have exited.
    ///
    /// Pending waits are cut short; rounds already inside the active-instruction lookup or
    /// `schedule` run to completion and still publish their events. Safe to call any number
    /// of times, concurrently or not; every call resolves once the engine has drained.
    pub async fn terminate(&self) {
        self.termination().await;
    }

    /// Like [`terminate`](Poller::terminate) but gives up waiting after `grace`.
    ///
    /// Loops that have not exited keep draining in the background; awaiting `terminate`
    /// afterwards still waits for them.
    pub async fn terminate_within(&self, grace: Duration) -> Result<(), RuntimeError> {
        match time::timeout(grace, self.termination()).await {
            Ok(()) => Ok(()),
            Err(_elapsed) => Err(RuntimeError::GraceExceeded {
                grace,
                stuck: self.registry.running(),
            }),
        }
    }

    /// Waits for SIGINT/SIGTERM/SIGQUIT (Ctrl-C elsewhere), then terminates within
    /// [`Config::grace`].
    pub async fn run_until_signal(&self) -> Result<(), RuntimeError> {
        let mut signals = ShutdownSignals::listen()?;
        let signal = signals.recv().await?;
        info!(signal, "shutdown signal received");
        self.terminate_within(self.cfg.grace).await
    }

    /// Cancels all loops (once) and returns the shared completion future.
    fn termination(&self) -> Shared<BoxFuture<'static, ()>> {
        self.termination
            .get_or_init(|| {
                info!(tasks = self.registry.records().len(), "terminating");
                self.registry.cancel_all();

                let loops = self.registry.completion();
                let subs = self.subs.clone();
                async move {
                    loops.await;
                    if let Some(subs) = subs {
                        subs.shutdown().await;
                    }
                    info!("all polling loops stopped");
                }
                .boxed()
                .shared()
            })
            .clone()
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.registry.cancel_all();
    }
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("tasks", &self.task_names())
            .field("terminating", &self.is_terminating())
            .finish_non_exhaustive()
    }
}
