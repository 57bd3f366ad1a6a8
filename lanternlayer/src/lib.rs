//! LanternLayer - Live geospatial visualization engine
//!
//! This library keeps a map surface synchronized with live event feeds:
//! events arrive on topics, are validated and merged into bounded marker
//! stores, mirrored onto the surface, and celebrated with a geo-anchored
//! particle overlay. Bulk history loads are time-sliced so the render loop
//! never starves.

pub mod batch;
pub mod channel;
pub mod engine;
pub mod event;
pub mod geo;
pub mod overlay;
pub mod store;
pub mod viewport;

pub use batch::{BatchInserter, BatchReport, SurfaceHandle};
pub use channel::{PublishOutcome, Subscription, SubscriptionHub};
pub use engine::{EngineConfig, EngineError, LiveMapEngine, TopicConfig};
pub use event::{MarkerKind, MarkerRecord, RecordInput, SyncEvent, SyncMode};
pub use geo::{GeoPoint, Region, GLOBAL, ISLAND, MAINLAND};
pub use overlay::{OverlayConfig, OverlayScheduler, ParticleOverlay};
pub use store::{MarkerStore, StoreDelta};
pub use viewport::{
    HeadlessSurface, MapSurface, PixelSize, ScreenPoint, ViewportBridge, ViewportState,
};
