//! Bounded, deduplicated marker storage per topic.
//!
//! A [`MarkerStore`] owns every [`MarkerRecord`] for one topic. Reconciling
//! a FULL event replaces the set wholesale; reconciling an INCREMENTAL event
//! merges by id, keeping existing records at their insertion position so the
//! render layer never sees markers shuffle. Capacity overflow is not an
//! error: it is the designed trigger for oldest-first eviction, and the
//! invariant `len() <= capacity` holds after every reconcile call.
//!
//! Observers registered with [`MarkerStore::on_change`] receive the delta of
//! each reconcile (added / updated / removed ids) so renderers touch only
//! changed visuals instead of redrawing the topic.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, trace};

use crate::event::{MarkerId, MarkerRecord, SyncEvent, SyncMode};
use crate::geo::Region;

/// Ids touched by one reconcile call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoreDelta {
    /// Records seen for the first time, in insertion order.
    pub added: Vec<MarkerId>,
    /// Existing records whose content changed. Duplicate deliveries with
    /// identical content do not appear here.
    pub updated: Vec<MarkerId>,
    /// Records evicted (or replaced away by a FULL event).
    pub removed: Vec<MarkerId>,
}

impl StoreDelta {
    /// True if nothing changed.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// Observer invoked after every reconcile with the resulting delta.
pub type ChangeObserver = Box<dyn Fn(&StoreDelta) + Send + Sync + 'static>;

/// Insertion-ordered, id-deduplicated, capacity-bounded record set.
pub struct MarkerStore {
    topic: String,
    region: Region,
    capacity: usize,
    /// Insertion order; parallel to `records`. Eviction pops from the front.
    order: Vec<MarkerId>,
    records: HashMap<MarkerId, MarkerRecord>,
    observers: Vec<ChangeObserver>,
    rng: StdRng,
}

impl MarkerStore {
    /// Creates a store for `topic` with the given region and capacity.
    ///
    /// `capacity` is an explicit per-topic setting; live-log style topics
    /// run small (5–20), bulk history topics run into the low thousands.
    pub fn new(topic: impl Into<String>, region: Region, capacity: usize) -> Self {
        Self {
            topic: topic.into(),
            region,
            capacity: capacity.max(1),
            order: Vec::new(),
            records: HashMap::new(),
            observers: Vec::new(),
            rng: StdRng::from_os_rng(),
        }
    }

    /// Replaces the fallback-placement RNG with a seeded one, for
    /// deterministic tests.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Registers a render-layer observer.
    pub fn on_change(&mut self, observer: ChangeObserver) {
        self.observers.push(observer);
    }

    /// Merges an event into the store and notifies observers with the delta.
    ///
    /// Events for other topics are ignored (and return an empty delta); the
    /// engine wires one store per topic, but the transport occasionally
    /// misroutes during reconnects.
    pub fn reconcile(&mut self, event: &SyncEvent) -> StoreDelta {
        if event.topic != self.topic {
            trace!(
                store = %self.topic,
                event_topic = %event.topic,
                "ignoring event for foreign topic"
            );
            return StoreDelta::default();
        }

        let delta = match event.mode {
            SyncMode::Full => self.apply_full(event),
            SyncMode::Incremental => self.apply_incremental(event),
        };

        debug_assert!(self.order.len() <= self.capacity);
        debug_assert_eq!(self.order.len(), self.records.len());

        if !delta.is_empty() {
            debug!(
                topic = %self.topic,
                added = delta.added.len(),
                updated = delta.updated.len(),
                removed = delta.removed.len(),
                size = self.order.len(),
                "reconciled"
            );
            for observer in &self.observers {
                observer(&delta);
            }
        }
        delta
    }

    /// FULL: the event's record set becomes the store contents, in event
    /// order, still subject to the capacity cap.
    fn apply_full(&mut self, event: &SyncEvent) -> StoreDelta {
        let mut delta = StoreDelta::default();
        let old_order = std::mem::take(&mut self.order);
        let mut old_records = std::mem::take(&mut self.records);

        for input in &event.records {
            if self.records.contains_key(&input.id) {
                // Duplicate id inside one FULL event: last write wins,
                // position in the order is kept from the first occurrence.
                let record = input.clone().sanitize(&self.region, &mut self.rng);
                self.records.insert(input.id.clone(), record);
                continue;
            }
            let record = input.clone().sanitize(&self.region, &mut self.rng);
            self.order.push(input.id.clone());
            self.records.insert(input.id.clone(), record);
        }
        for id in self.evict_overflow() {
            // A new id evicted within the same event was never visible to
            // the render layer; only previously held ids are reported.
            if old_records.contains_key(&id) {
                delta.removed.push(id);
            }
        }

        for id in &self.order {
            match old_records.remove(id) {
                None => delta.added.push(id.clone()),
                Some(old) => {
                    if !old.same_content(&self.records[id]) {
                        delta.updated.push(id.clone());
                    }
                }
            }
        }
        // Anything left from the previous generation is gone. Ids already
        // reported by the capacity eviction above are not repeated.
        for id in old_order {
            if old_records.contains_key(&id) && !delta.removed.contains(&id) {
                delta.removed.push(id);
            }
        }
        delta
    }

    /// INCREMENTAL: merge by id, append new ids, evict oldest beyond
    /// capacity. Updating an existing id keeps its position.
    fn apply_incremental(&mut self, event: &SyncEvent) -> StoreDelta {
        let mut delta = StoreDelta::default();
        for input in &event.records {
            let incoming = input.clone().sanitize(&self.region, &mut self.rng);
            match self.records.get_mut(&incoming.id) {
                Some(existing) => {
                    if existing.same_content(&incoming) {
                        // Duplicate delivery: no order change, no delta entry.
                        continue;
                    }
                    let created_at = existing.created_at;
                    *existing = incoming;
                    existing.created_at = created_at;
                    delta.updated.push(input.id.clone());
                }
                None => {
                    self.order.push(incoming.id.clone());
                    self.records.insert(incoming.id.clone(), incoming);
                    delta.added.push(input.id.clone());
                }
            }
        }
        delta.removed.extend(self.evict_overflow());
        delta
    }

    /// Evicts oldest-first until the cap is respected. Insertion order, not
    /// arrival timestamp, decides eviction priority.
    fn evict_overflow(&mut self) -> Vec<MarkerId> {
        let mut removed = Vec::new();
        while self.order.len() > self.capacity {
            let id = self.order.remove(0);
            self.records.remove(&id);
            removed.push(id);
        }
        if !removed.is_empty() {
            debug!(topic = %self.topic, evicted = removed.len(), "capacity eviction");
        }
        removed
    }

    /// Current record count.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The topic this store owns.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Looks up a record by id.
    pub fn get(&self, id: &str) -> Option<&MarkerRecord> {
        self.records.get(id)
    }

    /// Ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = &MarkerId> {
        self.order.iter()
    }

    /// Records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &MarkerRecord> {
        self.order.iter().map(move |id| &self.records[id])
    }
}

impl std::fmt::Debug for MarkerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkerStore")
            .field("topic", &self.topic)
            .field("len", &self.order.len())
            .field("capacity", &self.capacity)
            .field("observers", &self.observers.len())
            .finish()
    }
}
