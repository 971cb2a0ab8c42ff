//! # Queued event subscribers.
//!
//! Handlers registered directly on the [`Bus`](crate::Bus) run inline on the publishing loop.
//! Anything slower belongs here: a [`Subscribe`] implementation gets its own worker and
//! bounded queue inside a [`SubscriberSet`], which the [`Poller`](crate::Poller) attaches to
//! its bus.
//!
//! ## Architecture
//! ```text
//! PollActor ── publish(Event) ──► Bus ──► handler: SubscriberSet::emit(&Event)
//!                                                   │
//!                                        ┌──────────┼──────────┐
//!                                        ▼          ▼          ▼
//!                                    LogWriter  Dispatcher   Custom ...
//! ```

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
