//! Viewport state and geographic-to-screen projection.
//!
//! The engine treats the concrete map widget as an opaque provider with
//! three capabilities: add/remove a marker ([`MapSurface`]), report its
//! current viewport (fed into [`ViewportBridge::apply_viewport`]), and that
//! is all. The bridge owns the resulting [`ViewportState`] and converts
//! geographic coordinates to surface-space pixels with a Web Mercator
//! projection.
//!
//! `project` returns `None` until the provider reports a first viewport —
//! callers treat that as "not yet renderable", never as an error. Anyone
//! caching a projected position must re-derive it on every viewport-changed
//! notification; stale screen positions are the bug class this module
//! exists to prevent.

mod headless;

pub use headless::{HeadlessSurface, SurfaceOp};

use std::f64::consts::PI;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::trace;

use crate::event::MarkerRecord;
use crate::geo::GeoPoint;

/// Web Mercator diverges at the poles; latitudes are folded into this range
/// before projection.
const MERCATOR_MAX_LAT: f64 = 85.051_128_78;

/// Base tile size in pixels at zoom 0.
const WORLD_TILE_PX: f64 = 256.0;

/// A position in surface pixels, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

/// Surface dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelSize {
    pub width: f64,
    pub height: f64,
}

/// The map's current camera, owned by the bridge.
///
/// One instance per map surface; mutated only through
/// [`ViewportBridge::apply_viewport`] in response to provider pan/zoom
/// notifications.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    pub center: GeoPoint,
    pub zoom: f64,
    pub pixel_size: PixelSize,
}

/// Marker capabilities required from any concrete mapping widget.
pub trait MapSurface: Send + Sync {
    /// Places (or refreshes) a marker visual for `record`.
    fn add_marker(&self, record: &MarkerRecord);

    /// Removes the marker visual with the given id.
    fn remove_marker(&self, id: &str);
}

/// Listener invoked after every viewport change.
pub type ViewportListener = Arc<dyn Fn(&ViewportState) + Send + Sync + 'static>;

/// Converts geographic coordinates to surface pixels and broadcasts
/// viewport changes.
#[derive(Default)]
pub struct ViewportBridge {
    state: RwLock<Option<ViewportState>>,
    listeners: Mutex<Vec<ViewportListener>>,
}

impl ViewportBridge {
    /// Creates a bridge with no viewport yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bridge pre-attached to a viewport, shared behind an `Arc`.
    pub fn with_viewport(state: ViewportState) -> Arc<Self> {
        let bridge = Arc::new(Self::new());
        bridge.apply_viewport(state);
        bridge
    }

    /// Records a provider pan/zoom/resize notification and notifies every
    /// registered listener.
    ///
    /// The listener list is snapshotted before iteration, so a listener may
    /// register further listeners (or re-apply the viewport) without
    /// deadlocking on the registry lock.
    pub fn apply_viewport(&self, state: ViewportState) {
        *self.state.write() = Some(state);
        trace!(
            lat = state.center.lat,
            lng = state.center.lng,
            zoom = state.zoom,
            "viewport changed"
        );
        let snapshot: Vec<ViewportListener> =
            self.listeners.lock().iter().map(Arc::clone).collect();
        for listener in snapshot {
            listener(&state);
        }
    }

    /// Registers a listener for viewport changes.
    pub fn on_viewport_changed(&self, listener: ViewportListener) {
        self.listeners.lock().push(listener);
    }

    /// The current viewport, if the provider has reported one.
    pub fn state(&self) -> Option<ViewportState> {
        *self.state.read()
    }

    /// True once a viewport has been reported.
    pub fn is_ready(&self) -> bool {
        self.state.read().is_some()
    }

    /// Projects a geographic point to surface pixels.
    ///
    /// Returns `None` while the surface is not yet initialized. The result
    /// may lie outside the pixel bounds; off-screen is a valid position for
    /// an ascending overlay object.
    pub fn project(&self, point: GeoPoint) -> Option<ScreenPoint> {
        let state = (*self.state.read())?;
        let (wx, wy) = world_pixel(point, state.zoom);
        let (cx, cy) = world_pixel(state.center, state.zoom);
        Some(ScreenPoint {
            x: wx - cx + state.pixel_size.width / 2.0,
            y: wy - cy + state.pixel_size.height / 2.0,
        })
    }
}

impl std::fmt::Debug for ViewportBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewportBridge")
            .field("state", &self.state.read())
            .field("listeners", &self.listeners.lock().len())
            .finish()
    }
}

/// Absolute Web Mercator pixel coordinates of a point at the given zoom.
fn world_pixel(point: GeoPoint, zoom: f64) -> (f64, f64) {
    let n = WORLD_TILE_PX * 2.0_f64.powf(zoom);
    let lat = point.lat.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT);
    let x = (point.lng + 180.0) / 360.0 * n;
    let lat_rad = lat * PI / 180.0;
    let y = (1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n;
    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport(center: GeoPoint, zoom: f64) -> ViewportState {
        ViewportState {
            center,
            zoom,
            pixel_size: PixelSize {
                width: 800.0,
                height: 600.0,
            },
        }
    }

    #[test]
    fn test_project_before_attach_is_none() {
        let bridge = ViewportBridge::new();
        assert!(bridge.project(GeoPoint::new(25.0, 121.5)).is_none());
        assert!(!bridge.is_ready());
    }

    #[test]
    fn test_center_projects_to_screen_center() {
        let center = GeoPoint::new(23.7, 120.96);
        let bridge = ViewportBridge::new();
        bridge.apply_viewport(viewport(center, 8.0));

        let p = bridge.project(center).unwrap();
        assert!((p.x - 400.0).abs() < 1e-9);
        assert!((p.y - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_east_is_right_north_is_up() {
        let center = GeoPoint::new(23.7, 120.96);
        let bridge = ViewportBridge::new();
        bridge.apply_viewport(viewport(center, 8.0));

        let east = bridge.project(GeoPoint::new(23.7, 121.5)).unwrap();
        let north = bridge.project(GeoPoint::new(24.5, 120.96)).unwrap();
        assert!(east.x > 400.0);
        assert!(north.y < 300.0);
    }

    #[test]
    fn test_pan_shifts_projection() {
        let bridge = ViewportBridge::new();
        bridge.apply_viewport(viewport(GeoPoint::new(23.7, 120.96), 8.0));
        let target = GeoPoint::new(25.033, 121.5654);
        let before = bridge.project(target).unwrap();

        // Pan the camera onto the target: it now sits at screen center.
        bridge.apply_viewport(viewport(target, 8.0));
        let after = bridge.project(target).unwrap();
        assert!((after.x - 400.0).abs() < 1e-9);
        assert!((after.y - 300.0).abs() < 1e-9);
        assert_ne!(before, after);
    }

    #[test]
    fn test_zoom_doubles_pixel_distance() {
        let center = GeoPoint::new(23.7, 120.96);
        let target = GeoPoint::new(23.7, 121.2);
        let bridge = ViewportBridge::new();

        bridge.apply_viewport(viewport(center, 8.0));
        let d8 = bridge.project(target).unwrap().x - 400.0;

        bridge.apply_viewport(viewport(center, 9.0));
        let d9 = bridge.project(target).unwrap().x - 400.0;
        assert!((d9 - 2.0 * d8).abs() < 1e-6);
    }

    #[test]
    fn test_listeners_notified_on_every_change() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let bridge = ViewportBridge::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_ref = Arc::clone(&calls);
        bridge.on_viewport_changed(Arc::new(move |_| {
            calls_ref.fetch_add(1, Ordering::SeqCst);
        }));

        bridge.apply_viewport(viewport(GeoPoint::new(0.0, 0.0), 3.0));
        bridge.apply_viewport(viewport(GeoPoint::new(1.0, 1.0), 3.0));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_listener_may_register_listener_during_notification() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let bridge = Arc::new(ViewportBridge::new());
        let inner_calls = Arc::new(AtomicUsize::new(0));

        // The outer listener registers a fresh listener on every change;
        // notification iterates a snapshot, so this must not deadlock on
        // the registry lock.
        let weak = Arc::downgrade(&bridge);
        let calls = Arc::clone(&inner_calls);
        bridge.on_viewport_changed(Arc::new(move |_| {
            if let Some(bridge) = weak.upgrade() {
                let calls = Arc::clone(&calls);
                bridge.on_viewport_changed(Arc::new(move |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                }));
            }
        }));

        bridge.apply_viewport(viewport(GeoPoint::new(0.0, 0.0), 3.0));
        bridge.apply_viewport(viewport(GeoPoint::new(1.0, 1.0), 3.0));
        // The listener registered during the first change fires on the
        // second; the one registered during the second has not fired yet.
        assert_eq!(inner_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_polar_latitude_stays_finite() {
        let bridge = ViewportBridge::new();
        bridge.apply_viewport(viewport(GeoPoint::new(0.0, 0.0), 4.0));
        let p = bridge.project(GeoPoint::new(90.0, 0.0)).unwrap();
        assert!(p.y.is_finite());
    }
}
