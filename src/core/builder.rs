use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::info;

use crate::{
    core::Config,
    error::BuildError,
    events::{Bus, Event, EventKind, Handler},
    subscribers::{Subscribe, SubscriberSet},
    tasks::{ActiveInstructions, TaskSpec},
};

use super::{poller::Poller, registry::Registry};

/// Builder for constructing a [`Poller`].
pub struct PollerBuilder {
    cfg: Config,
    source: Arc<dyn ActiveInstructions>,
    tasks: Vec<TaskSpec>,
    handlers: Vec<(EventKind, Handler)>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl PollerBuilder {
    /// Creates a builder with default configuration and no tasks.
    pub fn new(source: Arc<dyn ActiveInstructions>) -> Self {
        Self {
            cfg: Config::default(),
            source,
            tasks: Vec::new(),
            handlers: Vec::new(),
            subscribers: Vec::new(),
        }
    }

    /// Replaces the engine configuration.
    pub fn with_config(mut self, cfg: Config) -> Self {
        self.cfg = cfg;
        self
    }

    /// Adds one task.
    pub fn task(mut self, spec: TaskSpec) -> Self {
        self.tasks.push(spec);
        self
    }

    /// Adds several tasks, keeping their order.
    pub fn tasks(mut self, specs: impl IntoIterator<Item = TaskSpec>) -> Self {
        self.tasks.extend(specs);
        self
    }

    /// Registers a bus handler before any loop starts, so no event can be missed.
    pub fn on<F>(mut self, kind: EventKind, handler: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.handlers.push((kind, Arc::new(handler)));
        self
    }

    /// Sets queued async subscribers.
    ///
    /// Each subscriber gets a dedicated worker with a bounded queue; a slow one never stalls
    /// a polling loop. Queues are drained when the poller terminates.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Validates the task list and starts one polling loop per task.
    ///
    /// Nothing is spawned when validation fails. Must be called from within a tokio runtime.
    pub fn build(self) -> Result<Poller, BuildError> {
        Registry::validate(&self.tasks)?;
        let rt = Handle::try_current().map_err(|_| BuildError::NoRuntime)?;

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        for (kind, handler) in self.handlers {
            bus.subscribe_arc(kind, handler);
        }

        let subs = if self.subscribers.is_empty() {
            None
        } else {
            let set = Arc::new(SubscriberSet::with_handle(&rt, self.subscribers));
            for kind in [EventKind::Task, EventKind::Error] {
                let set = Arc::clone(&set);
                bus.subscribe(kind, move |ev: &Event| set.emit(ev));
            }
            Some(set)
        };

        let names: Vec<String> = self.tasks.iter().map(|t| t.name().to_string()).collect();
        let registry = Registry::spawn(&rt, self.tasks, &self.source, &bus, self.cfg.saturation);
        info!(tasks = ?names, "polling started");

        Ok(Poller::from_parts(self.cfg, bus, registry, subs))
    }
}
