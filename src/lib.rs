//! # taskpoller
//!
//! **Taskpoller** is an in-process polling engine for Rust.
//!
//! For every registered task it runs an independent loop that periodically asks a
//! caller-supplied [`Schedule`] for new instructions, bounded by how many of that task's
//! instructions are still active, and publishes each accepted instruction as an [`Event`].
//! The wait between rounds adapts: it depends on how many consecutive rounds produced
//! nothing.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │   TaskSpec   │   │   TaskSpec   │   │   TaskSpec   │
//!     │  "mailer"    │   │  "reports"   │   │  "cleanup"   │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Poller (engine handle)                                           │
//! │  - Registry (fixed task set, validated up front)                  │
//! │  - Bus (per-engine handlers + broadcast stream)                   │
//! │  - SubscriberSet (optional queued subscribers)                    │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  PollActor   │   │  PollActor   │   │  PollActor   │
//!     │ (round loop) │   │ (round loop) │   │ (round loop) │
//!     └┬─────────────┘   └┬─────────────┘   └┬─────────────┘
//!      │ Publishes:       │                  │
//!      │ - Event::Task    │                  │
//!      │ - Event::Error   │                  │
//!      ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                    Bus (handlers by EventKind)                    │
//! └──────────┬──────────────────────┬──────────────────────┬──────────┘
//!            ▼                      ▼                      ▼
//!      handler (inline)      SubscriberSet::emit     Bus::receiver()
//!                             (per-sub queues)
//! ```
//!
//! ### One round
//! ```text
//! loop {
//!   ├─► wait delay.delay(attempt)             (cut short by terminate)
//!   ├─► stop if terminating
//!   ├─► active = source.active_instructions(task)
//!   │       └─ Err ─► Event::Error(ActiveLookupFailed), attempt unchanged
//!   ├─► active.len() >= concurrency ─► Saturated: SaturationPolicy decides attempt
//!   ├─► limit = spec.limit(active)
//!   │       └─ negative or panic ─► Event::Error(InvalidLimit | LimitPanicked), attempt unchanged
//!   ├─► batch = schedule.schedule(ScheduleConfiguration { .. })
//!   │       └─ Err ─► Event::Error(ScheduleFailed), treated as empty
//!   ├─► validate batch: sequence of strings, len <= limit
//!   │       └─ violation ─► Event::Error(..), whole batch discarded
//!   ├─► publish Event::Task per instruction, in order
//!   └─► attempt = 0 if anything was produced, else attempt + 1
//! }
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                         |
//! |-------------------|--------------------------------------------------------------|--------------------------------------------|
//! | **Engine**        | Start loops, subscribe, terminate gracefully.                | [`Poller`], [`PollerBuilder`]              |
//! | **Tasks**         | Describe what to poll and how many may be in flight.        | [`TaskSpec`], [`Schedule`], [`ActiveInstructions`] |
//! | **Policies**      | Control the wait between rounds.                             | [`DelayPolicy`], [`BackoffPolicy`], [`JitterPolicy`], [`SaturationPolicy`] |
//! | **Events**        | Observe produced instructions and round failures.            | [`Event`], [`Bus`], [`Subscribe`]          |
//! | **Errors**        | Typed errors for construction, rounds and shutdown.          | [`BuildError`], [`PollError`], [`RuntimeError`] |
//! | **Configuration** | Centralize engine settings and task defaults.                | [`Config`]                                 |
//!
//! ## Optional features
//! - `logging`: exports [`LogWriter`], a subscriber that forwards events to `tracing`.
//!
//! ## Example
//! ```rust,no_run
//! use std::time::Duration;
//! use taskpoller::{
//!     ActiveFn, BackoffPolicy, Batch, BoxError, EventKind, Poller, ScheduleConfiguration,
//!     TaskSpec,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let reports = TaskSpec::builder("reports")
//!         .concurrency(4)
//!         .delay(BackoffPolicy {
//!             first: Duration::from_millis(200),
//!             max: Duration::from_secs(10),
//!             ..BackoffPolicy::default()
//!         })
//!         .build(|cfg: ScheduleConfiguration| async move {
//!             // fetch up to `cfg.limit` pending report ids ...
//!             let _ = cfg;
//!             Ok::<_, BoxError>(Batch::empty())
//!         });
//!
//!     let poller = Poller::builder(ActiveFn::arc(|_task: String| async {
//!         // look up report jobs still running ...
//!         Ok::<_, BoxError>(Vec::new())
//!     }))
//!     .task(reports)
//!     .on(EventKind::Task, |ev| println!("start {:?}", ev.instruction()))
//!     .build()?;
//!
//!     poller.run_until_signal().await?;
//!     Ok(())
//! }
//! ```

mod core;
mod error;
mod events;
mod policies;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use core::{Config, Poller, PollerBuilder};
pub use error::{BoxError, BuildError, PollError, RuntimeError};
pub use events::{Bus, ErrorEvent, Event, EventKind, Handler, SubscriptionId, TaskEvent};
pub use policies::{BackoffPolicy, DelayFn, DelayPolicy, JitterPolicy, SaturationPolicy};
pub use subscribers::{Subscribe, SubscriberSet};
pub use tasks::{
    ActiveFn, ActiveInstructions, Batch, Instruction, LimitFn, Schedule, ScheduleConfiguration,
    ScheduleFn, ScheduleRef, TaskSpec, TaskSpecBuilder, free_slots,
};

// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
