//! # Event bus owned by one engine instance.
//!
//! [`Bus`] delivers [`Event`]s published by the polling loops to handlers registered per
//! [`EventKind`]. Every [`Poller`](crate::Poller) owns its own bus, so two engines in one
//! process never observe each other's events.
//!
//! ## Architecture
//! ```text
//! Publishers (one per task):          Consumers:
//!   Loop 1 ──┐                    ┌──► handlers[Task]   (called inline, in publish order)
//!   Loop 2 ──┼──► Bus::publish ───┼──► handlers[Error]
//!   Loop N ──┘                    └──► broadcast ring ──► Bus::receiver() streams
//! ```
//!
//! ## Rules
//! - **Synchronous delivery**: handlers run inside `publish()`, on the publishing loop.
//! - **At-most-once**: each handler subscribed at publish time sees the event exactly once;
//!   handlers subscribing later get no replay.
//! - **Concurrent publish**: handler lists are snapshotted under a read lock, so loops never
//!   serialize behind each other; handlers must be `Send + Sync`.
//! - **Isolation**: a panicking handler is caught and logged; the publishing loop keeps going.
//! - Handlers should be cheap. Slow consumers belong behind a
//!   [`SubscriberSet`](crate::SubscriberSet), which queues instead of blocking.
//!
//! ## Example
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use taskpoller::{Bus, Event, EventKind};
//!
//! let bus = Bus::new(16);
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&seen);
//! let id = bus.subscribe(EventKind::Task, move |ev: &Event| {
//!     sink.lock().unwrap().push(ev.instruction().unwrap_or_default().to_string());
//! });
//!
//! bus.publish(Event::task("mailer", "send-1"));
//! assert!(bus.unsubscribe(EventKind::Task, id));
//! bus.publish(Event::task("mailer", "send-2"));
//!
//! assert_eq!(*seen.lock().unwrap(), vec!["send-1".to_string()]);
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast;

use super::event::{Event, EventKind};

/// Shared event handler.
pub type Handler = Arc<dyn Fn(&Event) + Send + Sync + 'static>;

/// Token identifying one subscription; pass it back to [`Bus::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    handler: Handler,
}

#[derive(Default)]
struct Handlers {
    task: Vec<Subscription>,
    error: Vec<Subscription>,
}

impl Handlers {
    fn of(&self, kind: EventKind) -> &Vec<Subscription> {
        match kind {
            EventKind::Task => &self.task,
            EventKind::Error => &self.error,
        }
    }

    fn of_mut(&mut self, kind: EventKind) -> &mut Vec<Subscription> {
        match kind {
            EventKind::Task => &mut self.task,
            EventKind::Error => &mut self.error,
        }
    }
}

struct Inner {
    handlers: RwLock<Handlers>,
    next_id: AtomicU64,
    tx: broadcast::Sender<Event>,
}

/// Per-engine publish/subscribe channel for [`Event`]s.
///
/// ### Properties
/// - **Cloneable**: cheap to clone (internally holds an `Arc`); clones share subscriptions.
/// - **No persistence**: events published with no subscribers are dropped.
#[derive(Clone)]
pub struct Bus {
    inner: Arc<Inner>,
}

impl Bus {
    /// Creates a new bus.
    ///
    /// `capacity` sizes the ring buffer behind [`Bus::receiver`] (clamped to at least 1);
    /// handlers registered with [`Bus::subscribe`] are not affected by it.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                handlers: RwLock::new(Handlers::default()),
                next_id: AtomicU64::new(0),
                tx,
            }),
        }
    }

    /// Registers `handler` for events of `kind`.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.subscribe_arc(kind, Arc::new(handler))
    }

    /// Registers an already shared handler for events of `kind`.
    pub fn subscribe_arc(&self, kind: EventKind, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, AtomicOrdering::Relaxed));
        let mut handlers = self
            .inner
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        handlers.of_mut(kind).push(Subscription { id, handler });
        id
    }

    /// Removes a subscription. Returns `false` if it was not registered for `kind`.
    ///
    /// Publishes already in flight may still deliver to the removed handler.
    pub fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) -> bool {
        let mut handlers = self
            .inner
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let list = handlers.of_mut(kind);
        let before = list.len();
        list.retain(|s| s.id != id);
        list.len() != before
    }

    /// Number of handlers currently registered for `kind`.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.inner
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .of(kind)
            .len()
    }

    /// Publishes an event to every handler subscribed to its kind, then to the broadcast stream.
    pub fn publish(&self, ev: Event) {
        let kind = ev.kind();
        let snapshot: Vec<Handler> = self
            .inner
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .of(kind)
            .iter()
            .map(|s| Arc::clone(&s.handler))
            .collect();

        for handler in snapshot {
            if panic::catch_unwind(AssertUnwindSafe(|| handler(&ev))).is_err() {
                tracing::error!(
                    kind = %kind,
                    task = ev.task_name(),
                    "event handler panicked"
                );
            }
        }

        let _ = self.inner.tx.send(ev);
    }

    /// Creates a receiver observing every event published after this call.
    ///
    /// Slow receivers get `RecvError::Lagged(n)` and skip the `n` oldest events.
    pub fn receiver(&self) -> broadcast::Receiver<Event> {
        self.inner.tx.subscribe()
    }
}

impl std::fmt::Debug for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bus")
            .field("task_handlers", &self.subscriber_count(EventKind::Task))
            .field("error_handlers", &self.subscriber_count(EventKind::Error))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PollError;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_delivers_only_matching_kind() {
        let bus = Bus::new(8);
        let tasks = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));

        let t = Arc::clone(&tasks);
        bus.subscribe(EventKind::Task, move |_| {
            t.fetch_add(1, AtomicOrdering::SeqCst);
        });
        let e = Arc::clone(&errors);
        bus.subscribe(EventKind::Error, move |_| {
            e.fetch_add(1, AtomicOrdering::SeqCst);
        });

        bus.publish(Event::task("a", "1"));
        bus.publish(Event::task("a", "2"));
        bus.publish(Event::error("a", PollError::InvalidLimit { limit: -1 }));

        assert_eq!(tasks.load(AtomicOrdering::SeqCst), 2);
        assert_eq!(errors.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn test_no_replay_for_late_subscribers() {
        let bus = Bus::new(8);
        bus.publish(Event::task("a", "early"));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.subscribe(EventKind::Task, move |ev| {
            sink.lock().unwrap().push(ev.instruction().unwrap().to_string());
        });
        bus.publish(Event::task("a", "late"));

        assert_eq!(*seen.lock().unwrap(), vec!["late".to_string()]);
    }

    #[test]
    fn test_unsubscribe_wrong_kind_is_noop() {
        let bus = Bus::new(8);
        let id = bus.subscribe(EventKind::Task, |_| {});
        assert!(!bus.unsubscribe(EventKind::Error, id));
        assert_eq!(bus.subscriber_count(EventKind::Task), 1);
        assert!(bus.unsubscribe(EventKind::Task, id));
        assert!(!bus.unsubscribe(EventKind::Task, id));
        assert_eq!(bus.subscriber_count(EventKind::Task), 0);
    }

    #[test]
    fn test_panicking_handler_is_isolated() {
        let bus = Bus::new(8);
        let hits = Arc::new(AtomicUsize::new(0));
        bus.subscribe(EventKind::Task, |_| panic!("handler bug"));
        let h = Arc::clone(&hits);
        bus.subscribe(EventKind::Task, move |_| {
            h.fetch_add(1, AtomicOrdering::SeqCst);
        });

        bus.publish(Event::task("a", "1"));
        assert_eq!(hits.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_publish_delivers_each_event_once() {
        let bus = Bus::new(8);
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        bus.subscribe(EventKind::Task, move |_| {
            h.fetch_add(1, AtomicOrdering::SeqCst);
        });

        let threads: Vec<_> = (0..8)
            .map(|n| {
                let bus = bus.clone();
                std::thread::spawn(move || {
                    for i in 0..250 {
                        bus.publish(Event::task(format!("t{n}"), i.to_string()));
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(hits.load(AtomicOrdering::SeqCst), 2000);
    }

    #[tokio::test]
    async fn test_receiver_sees_published_events() {
        let bus = Bus::new(4);
        let mut rx = bus.receiver();
        bus.publish(Event::task("a", "1"));
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.instruction(), Some("1"));
    }

    #[test]
    fn test_buses_are_isolated() {
        let first = Bus::new(4);
        let second = Bus::new(4);
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        first.subscribe(EventKind::Task, move |_| {
            h.fetch_add(1, AtomicOrdering::SeqCst);
        });

        second.publish(Event::task("a", "1"));
        assert_eq!(hits.load(AtomicOrdering::SeqCst), 0);
    }
}
