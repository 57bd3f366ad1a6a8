//! Topic-based subscription channels.
//!
//! [`SubscriptionHub`] is the fan-out point between the event transport and
//! the rest of the engine. Publish is synchronous: every handler registered
//! for the event's topic runs on the calling thread, in registration order,
//! before `publish` returns. There is no cross-turn queuing.
//!
//! Two disciplines keep this safe:
//!
//! 1. The handler list is snapshotted before iteration, so a handler may
//!    unsubscribe (itself or others) mid-publish without invalidating the
//!    iteration.
//! 2. A panicking handler is contained and logged; delivery continues to the
//!    remaining handlers. A live dashboard must never lose a whole topic to
//!    one bad subscriber.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::warn;

use crate::event::SyncEvent;

/// Handler invoked for every event published on a subscribed topic.
pub type Handler = Arc<dyn Fn(&SyncEvent) + Send + Sync + 'static>;

struct Listener {
    id: u64,
    handler: Handler,
}

#[derive(Default)]
struct HubInner {
    /// Registration order within each topic is delivery order.
    topics: HashMap<String, Vec<Listener>>,
    next_id: u64,
}

impl HubInner {
    fn remove(&mut self, topic: &str, id: u64) {
        if let Some(listeners) = self.topics.get_mut(topic) {
            listeners.retain(|l| l.id != id);
            if listeners.is_empty() {
                self.topics.remove(topic);
            }
        }
    }
}

/// Counts for one publish call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublishOutcome {
    /// Handlers that ran to completion.
    pub delivered: usize,
    /// Handlers that panicked and were contained.
    pub failed: usize,
}

/// Topic-based publish/subscribe hub.
///
/// Cloning is cheap; clones share the same listener registry.
#[derive(Clone, Default)]
pub struct SubscriptionHub {
    inner: Arc<Mutex<HubInner>>,
}

impl SubscriptionHub {
    /// Creates an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `topic`.
    ///
    /// The topic is created lazily on first subscribe. The returned
    /// [`Subscription`] is the sole removal mechanism.
    pub fn subscribe(&self, topic: impl Into<String>, handler: Handler) -> Subscription {
        let topic = topic.into();
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner
            .topics
            .entry(topic.clone())
            .or_default()
            .push(Listener { id, handler });
        Subscription {
            hub: Arc::downgrade(&self.inner),
            topic,
            id,
            active: AtomicBool::new(true),
        }
    }

    /// Delivers `event` to every handler currently registered for its topic.
    ///
    /// Handlers run in registration order on the calling thread. The
    /// listener list is snapshotted before iteration, so unsubscribing
    /// during delivery takes effect no later than the next publish.
    pub fn publish(&self, event: &SyncEvent) -> PublishOutcome {
        let snapshot: Vec<Handler> = {
            let inner = self.inner.lock();
            match inner.topics.get(&event.topic) {
                Some(listeners) => listeners.iter().map(|l| Arc::clone(&l.handler)).collect(),
                None => Vec::new(),
            }
        };

        let mut outcome = PublishOutcome::default();
        for handler in snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(()) => outcome.delivered += 1,
                Err(_) => {
                    outcome.failed += 1;
                    warn!(topic = %event.topic, "subscriber panicked during delivery; continuing");
                }
            }
        }
        outcome
    }

    /// Number of handlers registered for `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner
            .lock()
            .topics
            .get(topic)
            .map_or(0, |listeners| listeners.len())
    }

    /// Removes every handler for `topic`. Called when the owning surface
    /// unmounts.
    pub fn clear_topic(&self, topic: &str) {
        self.inner.lock().topics.remove(topic);
    }
}

impl std::fmt::Debug for SubscriptionHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("SubscriptionHub")
            .field("topics", &inner.topics.len())
            .finish()
    }
}

/// Handle for removing a registered handler.
///
/// `unsubscribe` is idempotent and safe to call from inside an in-progress
/// publish; the current delivery pass (already snapshotted) completes, and
/// the handler is gone from the next one.
pub struct Subscription {
    hub: Weak<Mutex<HubInner>>,
    topic: String,
    id: u64,
    active: AtomicBool,
}

impl Subscription {
    /// Removes the handler from its topic.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(hub) = self.hub.upgrade() {
            hub.lock().remove(&self.topic, self.id);
        }
    }

    /// Returns true until `unsubscribe` is called.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// The topic this subscription listens on.
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
