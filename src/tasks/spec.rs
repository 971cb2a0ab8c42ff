//! # Task descriptor.
//!
//! Defines [`TaskSpec`], the immutable description of one polled task: its name, concurrency
//! ceiling, delay policy, limit function, and schedule.
//!
//! A spec can be created:
//! - **Explicitly** with [`TaskSpec::new`] plus `with_*` setters
//! - **From config** with [`TaskSpec::with_defaults`] (inherit concurrency and delay)
//! - **Fluently** with [`TaskSpec::builder`] from a closure
//!
//! Specs are validated by the registry when the [`Poller`](crate::Poller) is built, not here.

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::core::Config;
use crate::error::BoxError;
use crate::policies::DelayPolicy;
use crate::tasks::schedule::{Batch, Instruction, ScheduleConfiguration, ScheduleFn, ScheduleRef};

/// Computes a round's limit from the concurrency ceiling and the active instructions.
///
/// A negative result is reported as an invalid limit and the round skips `schedule`.
pub type LimitFn = Arc<dyn Fn(usize, &[Instruction]) -> i64 + Send + Sync + 'static>;

/// Default limit: free slots left under the ceiling.
pub fn free_slots(concurrency: usize, active: &[Instruction]) -> i64 {
    let concurrency = i64::try_from(concurrency).unwrap_or(i64::MAX);
    let active = i64::try_from(active.len()).unwrap_or(i64::MAX);
    concurrency.saturating_sub(active)
}

/// Description of one polled task.
///
/// ## Example
/// ```rust
/// use std::time::Duration;
/// use taskpoller::{Batch, BoxError, ScheduleConfiguration, ScheduleFn, TaskSpec};
///
/// let spec = TaskSpec::new(
///     "thumbnails",
///     ScheduleFn::arc(|_cfg: ScheduleConfiguration| async { Ok::<_, BoxError>(Batch::empty()) }),
/// )
/// .with_concurrency(4)
/// .with_delay(Duration::from_millis(250));
///
/// assert_eq!(spec.name(), "thumbnails");
/// assert_eq!(spec.concurrency(), 4);
/// assert_eq!(spec.delay().delay(0), Duration::from_millis(250));
/// ```
#[derive(Clone)]
pub struct TaskSpec {
    name: Arc<str>,
    concurrency: usize,
    delay: DelayPolicy,
    limit: Option<LimitFn>,
    schedule: ScheduleRef,
}

impl TaskSpec {
    /// Creates a spec with concurrency 1, a constant 1s delay, and the default limit.
    pub fn new(name: impl Into<Arc<str>>, schedule: ScheduleRef) -> Self {
        Self {
            name: name.into(),
            concurrency: 1,
            delay: DelayPolicy::default(),
            limit: None,
            schedule,
        }
    }

    /// Creates a spec inheriting concurrency and delay from `cfg`.
    pub fn with_defaults(name: impl Into<Arc<str>>, schedule: ScheduleRef, cfg: &Config) -> Self {
        Self {
            concurrency: cfg.concurrency,
            delay: cfg.delay.clone(),
            ..Self::new(name, schedule)
        }
    }

    /// Creates a builder for constructing a spec from a closure.
    pub fn builder(name: impl Into<Cow<'static, str>>) -> TaskSpecBuilder {
        TaskSpecBuilder::new(name)
    }

    /// Returns the task name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the task name as a shared string.
    pub fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    /// Returns the concurrency ceiling.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Returns the delay policy.
    pub fn delay(&self) -> &DelayPolicy {
        &self.delay
    }

    /// Returns the schedule.
    pub fn schedule(&self) -> &ScheduleRef {
        &self.schedule
    }

    /// Computes the limit for a round.
    pub fn limit(&self, active: &[Instruction]) -> i64 {
        match &self.limit {
            Some(f) => f(self.concurrency, active),
            None => free_slots(self.concurrency, active),
        }
    }

    /// Returns a new spec with updated concurrency.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Returns a new spec with updated delay policy.
    pub fn with_delay(mut self, delay: impl Into<DelayPolicy>) -> Self {
        self.delay = delay.into();
        self
    }

    /// Returns a new spec with a custom limit function.
    pub fn with_limit<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, &[Instruction]) -> i64 + Send + Sync + 'static,
    {
        self.limit = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for TaskSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSpec")
            .field("name", &self.name)
            .field("concurrency", &self.concurrency)
            .field("delay", &self.delay)
            .field("custom_limit", &self.limit.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`TaskSpec`] with fluent API.
#[derive(Clone)]
pub struct TaskSpecBuilder {
    name: Cow<'static, str>,
    concurrency: usize,
    delay: DelayPolicy,
    limit: Option<LimitFn>,
}

impl TaskSpecBuilder {
    /// Creates a new builder with the given task name.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            concurrency: 1,
            delay: DelayPolicy::default(),
            limit: None,
        }
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn delay(mut self, delay: impl Into<DelayPolicy>) -> Self {
        self.delay = delay.into();
        self
    }

    /// Shorthand for a constant delay in milliseconds.
    pub fn every_ms(self, ms: u64) -> Self {
        self.delay(Duration::from_millis(ms))
    }

    pub fn limit<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, &[Instruction]) -> i64 + Send + Sync + 'static,
    {
        self.limit = Some(Arc::new(f));
        self
    }

    /// Builds the spec from a schedule closure.
    pub fn build<F, Fut>(self, f: F) -> TaskSpec
    where
        F: Fn(ScheduleConfiguration) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Batch, BoxError>> + Send + 'static,
    {
        self.build_from_schedule(ScheduleFn::arc(f))
    }

    /// Builds the spec from an existing schedule handle.
    pub fn build_from_schedule(self, schedule: ScheduleRef) -> TaskSpec {
        TaskSpec {
            name: Arc::from(self.name.as_ref()),
            concurrency: self.concurrency,
            delay: self.delay,
            limit: self.limit,
            schedule,
        }
    }
}
