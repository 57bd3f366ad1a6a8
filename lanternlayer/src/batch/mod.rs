//! Time-sliced bulk insertion.
//!
//! One-shot historical loads can run to tens of thousands of records; naive
//! synchronous insertion would freeze the interface for the whole load.
//! [`BatchInserter`] partitions the input into fixed-size chunks, reconciles
//! one chunk synchronously, then yields to the cooperative scheduler before
//! the next. The time spent inside any single chunk is bounded by the chunk
//! size and independent of total input size; completion time grows linearly.
//!
//! A batch in flight is cancelled by tearing down its [`SurfaceHandle`]:
//! liveness is re-checked at the top of every resumed chunk, so a scheduled
//! continuation never writes to a destroyed surface.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::event::{RecordInput, SyncEvent};
use crate::store::MarkerStore;

/// Default records per synchronous chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 256;

/// Liveness token for the surface a batch writes to.
///
/// Clones share the flag; tearing down any clone cancels every batch
/// holding one.
#[derive(Clone, Debug, Default)]
pub struct SurfaceHandle {
    torn_down: Arc<AtomicBool>,
}

impl SurfaceHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// True until the owning surface is destroyed.
    pub fn is_alive(&self) -> bool {
        !self.torn_down.load(Ordering::SeqCst)
    }

    /// Marks the surface destroyed. In-flight batches abort at their next
    /// chunk boundary.
    pub fn tear_down(&self) {
        self.torn_down.store(true, Ordering::SeqCst);
    }
}

/// Outcome of one [`BatchInserter::insert_many`] call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchReport {
    /// Records handed to the store.
    pub inserted: usize,
    /// Chunks processed.
    pub chunks: usize,
    /// Longest single synchronous chunk. This is the quantity the chunking
    /// exists to bound.
    pub max_chunk: Duration,
    /// True if the surface was torn down before the batch finished.
    pub aborted: bool,
}

/// Chunked, yielding bulk inserter.
#[derive(Debug, Clone, Copy)]
pub struct BatchInserter {
    chunk_size: usize,
}

impl Default for BatchInserter {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl BatchInserter {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Reconciles `records` into `store` as INCREMENTAL chunks, yielding
    /// between chunks.
    ///
    /// The store's own merge and eviction rules apply unchanged; a batch is
    /// just many small reconciles. `on_chunk` runs after every chunk's
    /// reconcile, so downstream work tied to the load (mirroring markers
    /// onto a surface) is sliced along with it instead of piling up into
    /// one synchronous pass at the end. Chunk wall times are recorded in
    /// the returned [`BatchReport`].
    pub async fn insert_many<F>(
        &self,
        records: Vec<RecordInput>,
        store: Arc<Mutex<MarkerStore>>,
        surface: SurfaceHandle,
        mut on_chunk: F,
    ) -> BatchReport
    where
        F: FnMut(),
    {
        let topic = store.lock().topic().to_string();
        let total = records.len();
        let mut report = BatchReport::default();

        for chunk in records.chunks(self.chunk_size) {
            // The surface may have been destroyed while we were suspended.
            if !surface.is_alive() {
                report.aborted = true;
                info!(
                    topic = %topic,
                    inserted = report.inserted,
                    total,
                    "batch aborted: surface torn down"
                );
                break;
            }

            let started = Instant::now();
            store
                .lock()
                .reconcile(&SyncEvent::incremental(&topic, chunk.to_vec()));
            let elapsed = started.elapsed();

            report.inserted += chunk.len();
            report.chunks += 1;
            report.max_chunk = report.max_chunk.max(elapsed);

            on_chunk();
            tokio::task::yield_now().await;
        }

        if !report.aborted {
            debug!(
                topic = %topic,
                inserted = report.inserted,
                chunks = report.chunks,
                max_chunk_us = report.max_chunk.as_micros() as u64,
                "batch complete"
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GLOBAL;

    fn bulk_records(n: usize) -> Vec<RecordInput> {
        (0..n)
            .map(|i| {
                RecordInput::new(format!("r-{i}")).at(
                    (i % 170) as f64 - 85.0,
                    (i % 360) as f64 - 180.0,
                )
            })
            .collect()
    }

    fn bulk_store(capacity: usize) -> Arc<Mutex<MarkerStore>> {
        Arc::new(Mutex::new(
            MarkerStore::new("history", GLOBAL, capacity).with_rng_seed(3),
        ))
    }

    #[tokio::test]
    async fn test_insert_many_ten_thousand_records() {
        let store = bulk_store(20_000);
        let report = BatchInserter::default()
            .insert_many(
                bulk_records(10_000),
                Arc::clone(&store),
                SurfaceHandle::new(),
                || {},
            )
            .await;

        assert!(!report.aborted);
        assert_eq!(report.inserted, 10_000);
        assert_eq!(report.chunks, 10_000_usize.div_ceil(DEFAULT_CHUNK_SIZE));
        assert_eq!(store.lock().len(), 10_000);
        // Each chunk is a fixed amount of work regardless of total size.
        assert!(
            report.max_chunk < Duration::from_millis(50),
            "chunk took {:?}",
            report.max_chunk
        );
    }

    #[tokio::test]
    async fn test_insert_many_respects_store_capacity() {
        let store = bulk_store(100);
        let report = BatchInserter::new(32)
            .insert_many(
                bulk_records(1_000),
                Arc::clone(&store),
                SurfaceHandle::new(),
                || {},
            )
            .await;

        assert_eq!(report.inserted, 1_000);
        assert_eq!(store.lock().len(), 100);
    }

    #[tokio::test]
    async fn test_torn_down_surface_aborts_before_first_chunk() {
        let store = bulk_store(1_000);
        let surface = SurfaceHandle::new();
        surface.tear_down();

        let report = BatchInserter::new(10)
            .insert_many(bulk_records(100), Arc::clone(&store), surface, || {})
            .await;

        assert!(report.aborted);
        assert_eq!(report.inserted, 0);
        assert!(store.lock().is_empty());
    }

    #[tokio::test]
    async fn test_teardown_mid_batch_stops_remaining_chunks() {
        let store = bulk_store(10_000);
        let surface = SurfaceHandle::new();

        // Tear the surface down from inside the second chunk's delta
        // notification; the third chunk must never run.
        let trigger = surface.clone();
        let chunks_seen = Arc::new(AtomicBool::new(false));
        let first_done = Arc::clone(&chunks_seen);
        store.lock().on_change(Box::new(move |_| {
            if first_done.swap(true, Ordering::SeqCst) {
                trigger.tear_down();
            }
        }));

        let report = BatchInserter::new(10)
            .insert_many(bulk_records(100), Arc::clone(&store), surface, || {})
            .await;

        assert!(report.aborted);
        assert_eq!(report.chunks, 2);
        assert_eq!(store.lock().len(), 20);
    }

    #[tokio::test]
    async fn test_empty_batch_is_clean_noop() {
        let store = bulk_store(10);
        let report = BatchInserter::default()
            .insert_many(Vec::new(), Arc::clone(&store), SurfaceHandle::new(), || {})
            .await;
        assert_eq!(report, BatchReport::default());
    }

    #[tokio::test]
    async fn test_on_chunk_fires_once_per_chunk() {
        use std::sync::atomic::AtomicUsize;

        let store = bulk_store(1_000);
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);

        let report = BatchInserter::new(25)
            .insert_many(
                bulk_records(100),
                Arc::clone(&store),
                SurfaceHandle::new(),
                move || {
                    seen.fetch_add(1, Ordering::SeqCst);
                },
            )
            .await;

        assert_eq!(report.chunks, 4);
        assert_eq!(calls.load(Ordering::SeqCst), report.chunks);
    }

    #[test]
    fn test_surface_handle_clones_share_flag() {
        let a = SurfaceHandle::new();
        let b = a.clone();
        assert!(b.is_alive());
        a.tear_down();
        assert!(!b.is_alive());
    }
}
