//! # Async subscriber trait
//!
//! `Subscribe` is the extension point for consumers that do real work per event (enqueue a
//! job, write an audit row). Each subscriber is driven by its own worker fed by a bounded
//! queue owned by the [`SubscriberSet`](crate::SubscriberSet), so a slow subscriber never
//! stalls a polling loop.
//!
//! ## Contract
//! - Events arrive in publish order per subscriber.
//! - If the queue overflows, events for that subscriber are **dropped** (warn).
//! - [`Subscribe::kinds`] filters which event kinds are queued at all.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use taskpoller::{Event, EventKind, Subscribe};
//!
//! struct Dispatcher;
//!
//! #[async_trait]
//! impl Subscribe for Dispatcher {
//!     async fn on_event(&self, ev: &Event) {
//!         if let Some(instruction) = ev.instruction() {
//!             // push `instruction` to the worker queue ...
//!             let _ = instruction;
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "dispatcher" }
//!     fn kinds(&self) -> &'static [EventKind] { &[EventKind::Task] }
//! }
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};

/// Contract for queued event subscribers.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handle a single event.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Event kinds this subscriber wants. Defaults to all.
    fn kinds(&self) -> &'static [EventKind] {
        &[EventKind::Task, EventKind::Error]
    }

    /// Preferred capacity of this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
