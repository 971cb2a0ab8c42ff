//! Events: types and the per-engine bus.
//!
//! This module groups the event **data model** and the **bus** the polling loops publish to.
//!
//! ## Contents
//! - [`EventKind`], [`Event`], [`TaskEvent`], [`ErrorEvent`] event classification and payloads
//! - [`Bus`] synchronous handler dispatch plus a broadcast stream
//!
//! ## Quick reference
//! - **Publishers**: `core::actor::PollActor` (one per task).
//! - **Consumers**: handlers registered through [`Bus::subscribe`] or
//!   [`PollerBuilder::on`](crate::PollerBuilder::on), the [`SubscriberSet`](crate::SubscriberSet)
//!   bridge, and anyone holding a [`Bus::receiver`].

mod bus;
mod event;

pub use bus::{Bus, Handler, SubscriptionId};
pub use event::{ErrorEvent, Event, EventKind, TaskEvent};
