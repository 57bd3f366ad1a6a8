//! A map surface that renders nothing.
//!
//! Stands in for a real mapping widget in tests and the CLI feed simulator:
//! it records marker calls so behavior can be asserted without a display.

use std::collections::HashSet;

use parking_lot::Mutex;

use crate::event::MarkerRecord;

use super::MapSurface;

/// Marker operations observed by a [`HeadlessSurface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceOp {
    Added(String),
    Removed(String),
}

/// In-memory [`MapSurface`] implementation.
#[derive(Default)]
pub struct HeadlessSurface {
    ops: Mutex<Vec<SurfaceOp>>,
    live: Mutex<HashSet<String>>,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of markers currently on the surface.
    pub fn marker_count(&self) -> usize {
        self.live.lock().len()
    }

    /// True if a marker with `id` is currently placed.
    pub fn has_marker(&self, id: &str) -> bool {
        self.live.lock().contains(id)
    }

    /// The full operation log, in call order.
    pub fn ops(&self) -> Vec<SurfaceOp> {
        self.ops.lock().clone()
    }
}

impl MapSurface for HeadlessSurface {
    fn add_marker(&self, record: &MarkerRecord) {
        self.live.lock().insert(record.id.clone());
        self.ops.lock().push(SurfaceOp::Added(record.id.clone()));
    }

    fn remove_marker(&self, id: &str) {
        self.live.lock().remove(id);
        self.ops.lock().push(SurfaceOp::Removed(id.to_string()));
    }
}
