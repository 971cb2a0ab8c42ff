//! # SubscriberSet: non-blocking fan-out over queued subscribers
//!
//! [`SubscriberSet`] hands each [`Event`] to every interested subscriber **without awaiting**
//! its processing. It is attached to the [`Bus`](crate::Bus) as an ordinary handler, so the
//! publishing loop only pays for a `try_send` per subscriber.
//!
//! ## What it guarantees
//! - `emit(&Event)` returns immediately.
//! - Per-subscriber FIFO (queue order).
//! - Panics inside subscribers are caught and logged (isolation).
//! - `shutdown()` closes the queues and waits until every queued event has been handled.
//!
//! ## What it does **not** guarantee
//! - No global ordering across different subscribers.
//! - No retries on queue overflow (events are dropped for that subscriber).
//!
//! ## Diagram
//! ```text
//!    emit(&Event)
//!        │                        (Arc-clone per subscriber)
//!        ├────────────────► [queue S1] ─► worker S1 ─► on_event()
//!        ├────────────────► [queue S2] ─► worker S2 ─► on_event()
//!        └────────────────► [queue SN] ─► worker SN ─► on_event()
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::events::{Event, EventKind};

use super::Subscribe;

struct Channel {
    name: &'static str,
    kinds: &'static [EventKind],
    sender: mpsc::Sender<Arc<Event>>,
}

/// Fan-out with per-subscriber bounded queues and worker tasks.
pub struct SubscriberSet {
    channels: Mutex<Vec<Channel>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl SubscriberSet {
    /// Creates a new set and spawns one worker per subscriber on the current runtime.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime; see [`SubscriberSet::with_handle`].
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>) -> Self {
        Self::with_handle(&Handle::current(), subs)
    }

    /// Creates a new set and spawns one worker per subscriber on `rt`.
    #[must_use]
    pub fn with_handle(rt: &Handle, subs: Vec<Arc<dyn Subscribe>>) -> Self {
        let mut channels = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let name = sub.name();
            let kinds = sub.kinds();
            let (tx, mut rx) = mpsc::channel::<Arc<Event>>(sub.queue_capacity().max(1));

            workers.push(rt.spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let fut = sub.on_event(ev.as_ref());
                    if std::panic::AssertUnwindSafe(fut).catch_unwind().await.is_err() {
                        tracing::error!(subscriber = sub.name(), "subscriber panicked");
                    }
                }
            }));
            channels.push(Channel {
                name,
                kinds,
                sender: tx,
            });
        }

        Self {
            channels: Mutex::new(channels),
            workers: Mutex::new(workers),
        }
    }

    /// Queues one event for every subscriber interested in its kind (non-blocking).
    pub fn emit(&self, event: &Event) {
        let kind = event.kind();
        let ev = Arc::new(event.clone());
        let channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);

        for channel in channels.iter().filter(|c| c.kinds.contains(&kind)) {
            match channel.sender.try_send(Arc::clone(&ev)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(subscriber = channel.name, "event dropped: queue full");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::warn!(subscriber = channel.name, "event dropped: worker closed");
                }
            }
        }
    }

    /// Closes all queues and waits for the workers to drain them. Idempotent.
    pub async fn shutdown(&self) {
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        let workers: Vec<JoinHandle<()>> = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for h in workers {
            let _ = h.await;
        }
    }

    /// True if there are no (open) subscribers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of open subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
