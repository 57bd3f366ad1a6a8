//! Engine wiring: channels → stores → surface → overlay.
//!
//! [`LiveMapEngine`] binds one store per configured topic to the
//! subscription hub, mirrors store deltas onto the map surface, and
//! releases overlay emitters for notable live records (a new wallet
//! connection, a visitor arrival). It is the composition root; each
//! component keeps working on its own.

mod config;

pub use config::{EngineConfig, TopicConfig};

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info};

use crate::batch::{BatchInserter, BatchReport, SurfaceHandle};
use crate::channel::{Subscription, SubscriptionHub};
use crate::event::{RecordInput, SyncEvent, SyncMode};
use crate::geo::GeoPoint;
use crate::overlay::{OverlayScheduler, ParticleOverlay};
use crate::store::{MarkerStore, StoreDelta};
use crate::viewport::{MapSurface, ViewportBridge};

/// Engine-level failures.
///
/// Deliberately small: malformed input is repaired, listener failures are
/// contained, and a not-ready surface is a sentinel, none of which surface
/// here.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An operation referenced a topic the engine was not configured with.
    #[error("topic '{0}' is not bound to this engine")]
    UnknownTopic(String),
}

type PendingDeltas = Arc<Mutex<VecDeque<(String, StoreDelta)>>>;

/// The assembled live-map engine for one map surface.
pub struct LiveMapEngine {
    hub: SubscriptionHub,
    bridge: Arc<ViewportBridge>,
    surface: Arc<dyn MapSurface>,
    surface_handle: SurfaceHandle,
    stores: HashMap<String, Arc<Mutex<MarkerStore>>>,
    notable_topics: HashMap<String, bool>,
    overlay: Arc<Mutex<ParticleOverlay>>,
    scheduler: Mutex<OverlayScheduler>,
    inserter: BatchInserter,
    /// Deltas queued by store observers during reconcile, applied to the
    /// surface once the store lock is released.
    pending: PendingDeltas,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl LiveMapEngine {
    /// Builds the engine and binds every configured topic.
    ///
    /// The returned engine is ready: publishing on the hub flows through
    /// reconciliation onto the surface immediately.
    pub fn new(
        config: EngineConfig,
        surface: Arc<dyn MapSurface>,
        bridge: Arc<ViewportBridge>,
    ) -> Arc<Self> {
        let overlay = Arc::new(Mutex::new(ParticleOverlay::new(config.overlay)));
        let pending: PendingDeltas = Arc::new(Mutex::new(VecDeque::new()));

        let mut stores = HashMap::new();
        let mut notable_topics = HashMap::new();
        for topic_config in &config.topics {
            let mut store = MarkerStore::new(
                topic_config.topic.clone(),
                topic_config.region.clone(),
                topic_config.capacity,
            );
            let queue = Arc::clone(&pending);
            let topic = topic_config.topic.clone();
            store.on_change(Box::new(move |delta| {
                queue.lock().push_back((topic.clone(), delta.clone()));
            }));
            stores.insert(topic_config.topic.clone(), Arc::new(Mutex::new(store)));
            notable_topics.insert(topic_config.topic.clone(), topic_config.release_on_notable);
        }

        let engine = Arc::new(Self {
            hub: SubscriptionHub::new(),
            bridge,
            surface,
            surface_handle: SurfaceHandle::new(),
            stores,
            notable_topics,
            overlay,
            scheduler: Mutex::new(OverlayScheduler::default()),
            inserter: BatchInserter::new(config.chunk_size),
            pending,
            subscriptions: Mutex::new(Vec::new()),
        });

        engine.wire_viewport();
        for topic_config in &config.topics {
            engine.bind_topic(&topic_config.topic);
        }
        info!(topics = config.topics.len(), "engine assembled");
        engine
    }

    /// Anchored emitters must track pans and zooms: every viewport change
    /// re-derives their screen positions from the new projection.
    fn wire_viewport(self: &Arc<Self>) {
        let overlay = Arc::clone(&self.overlay);
        let bridge = Arc::downgrade(&self.bridge);
        self.bridge.on_viewport_changed(Arc::new(move |_| {
            if let Some(bridge) = bridge.upgrade() {
                overlay.lock().reproject(&bridge);
            }
        }));
    }

    fn bind_topic(self: &Arc<Self>, topic: &str) {
        let engine = Arc::downgrade(self);
        let subscription = self.hub.subscribe(
            topic,
            Arc::new(move |event| {
                if let Some(engine) = engine.upgrade() {
                    engine.handle_event(event);
                }
            }),
        );
        self.subscriptions.lock().push(subscription);
    }

    /// One live event: reconcile, mirror the delta, maybe release emitters.
    fn handle_event(&self, event: &SyncEvent) {
        let Some(store) = self.stores.get(&event.topic) else {
            return;
        };
        store.lock().reconcile(event);
        let deltas = self.flush_pending();

        // Emitters are a live-update effect only; FULL replacements and
        // bulk history loads do not set off fireworks.
        if event.mode == SyncMode::Incremental && self.notable_topics[&event.topic] {
            self.release_for_notable(&event.topic, &deltas);
        }
    }

    /// Applies queued store deltas to the map surface.
    ///
    /// Runs outside any store lock: observers only queue, so reconcile
    /// never re-enters the surface or the store.
    fn flush_pending(&self) -> Vec<(String, StoreDelta)> {
        let drained: Vec<_> = self.pending.lock().drain(..).collect();
        for (topic, delta) in &drained {
            let Some(store) = self.stores.get(topic) else {
                continue;
            };
            let store = store.lock();
            for id in &delta.removed {
                self.surface.remove_marker(id);
            }
            for id in delta.added.iter().chain(delta.updated.iter()) {
                if let Some(record) = store.get(id) {
                    self.surface.add_marker(record);
                }
            }
        }
        drained
    }

    fn release_for_notable(&self, topic: &str, deltas: &[(String, StoreDelta)]) {
        let Some(store) = self.stores.get(topic) else {
            return;
        };
        let mut releases: Vec<(GeoPoint, Option<String>)> = Vec::new();
        {
            let store = store.lock();
            for (delta_topic, delta) in deltas {
                if delta_topic != topic {
                    continue;
                }
                for id in &delta.added {
                    if let Some(record) = store.get(id) {
                        if record.kind.is_notable() {
                            let label = record
                                .payload
                                .get("wish")
                                .and_then(|v| v.as_str())
                                .map(str::to_string);
                            releases.push((record.position, label));
                        }
                    }
                }
            }
        }
        for (position, label) in releases {
            self.release_at(Some(position), label.as_deref());
        }
    }

    /// Releases one overlay emitter, user- or event-triggered.
    ///
    /// Returns false if an anchored release was dropped because the surface
    /// is not yet renderable.
    pub fn release_at(&self, anchor: Option<GeoPoint>, label: Option<&str>) -> bool {
        let released = self.overlay.lock().release_at(&self.bridge, anchor, label);
        if released {
            // The tick loop needs a runtime to run on; without one the host
            // drives `overlay().lock().tick()` itself.
            if tokio::runtime::Handle::try_current().is_ok() {
                self.scheduler.lock().ensure_running(Arc::clone(&self.overlay));
            }
        }
        released
    }

    /// Publishes an event into the engine's hub.
    pub fn publish(&self, event: &SyncEvent) {
        self.hub.publish(event);
    }

    /// Loads a large historical set into `topic` without starving the
    /// render loop.
    ///
    /// Surface mirroring is part of each chunk's work: deltas are flushed
    /// at every chunk boundary, so the marker calls are as time-sliced as
    /// the reconciles themselves.
    pub async fn insert_history(
        &self,
        topic: &str,
        records: Vec<RecordInput>,
    ) -> Result<BatchReport, EngineError> {
        let store = self
            .stores
            .get(topic)
            .ok_or_else(|| EngineError::UnknownTopic(topic.to_string()))?;
        let report = self
            .inserter
            .insert_many(
                records,
                Arc::clone(store),
                self.surface_handle.clone(),
                || {
                    self.flush_pending();
                },
            )
            .await;
        Ok(report)
    }

    /// Tears the engine down when the owning surface unmounts: listeners
    /// cleared, in-flight batches cancelled, the tick loop stopped.
    pub fn unmount(&self) {
        for subscription in self.subscriptions.lock().drain(..) {
            subscription.unsubscribe();
        }
        for topic in self.stores.keys() {
            self.hub.clear_topic(topic);
        }
        self.surface_handle.tear_down();
        self.scheduler.lock().stop();
        debug!("engine unmounted");
    }

    /// The hub events are published on.
    pub fn hub(&self) -> &SubscriptionHub {
        &self.hub
    }

    /// The viewport bridge for this surface.
    pub fn bridge(&self) -> &Arc<ViewportBridge> {
        &self.bridge
    }

    /// The overlay, for hosts that render or drive it directly.
    pub fn overlay(&self) -> &Arc<Mutex<ParticleOverlay>> {
        &self.overlay
    }

    /// The store bound to `topic`, if any.
    pub fn store(&self, topic: &str) -> Option<&Arc<Mutex<MarkerStore>>> {
        self.stores.get(topic)
    }

    /// Liveness handle for the surface this engine writes to.
    pub fn surface_handle(&self) -> &SurfaceHandle {
        &self.surface_handle
    }
}

impl std::fmt::Debug for LiveMapEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveMapEngine")
            .field("topics", &self.stores.len())
            .field("overlay", &self.overlay.lock().active_count())
            .finish()
    }
}
