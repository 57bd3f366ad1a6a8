//! Geographic validation and repair.
//!
//! Every coordinate entering the engine passes through a [`Region`] first:
//! downstream components (stores, the viewport bridge, the overlay) never see
//! an out-of-range point. Out-of-box input is clamped to the nearest edge
//! rather than rejected — a degraded-but-visible marker beats a dropped one
//! on a live dashboard.

mod region;

pub use region::{Hotspot, Region, GLOBAL, ISLAND, MAINLAND};

use rand::Rng;
use serde::{Deserialize, Serialize};

/// A validated geographic coordinate in degrees.
///
/// Construction goes through [`Region::clamp`] (or a hotspot fallback), so a
/// `GeoPoint` held by any engine component is always inside the region box it
/// was validated against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

impl GeoPoint {
    /// Creates a point without validation.
    ///
    /// Callers outside tests should prefer [`Region::clamp`].
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Picks a randomized fallback position near one of the region's hotspots.
///
/// Used when an incoming record carries no usable coordinates. The jitter
/// (±0.02° on each axis) matches the spread the live feed produces for
/// clustered city markers, and the result is re-clamped so the invariant
/// holds even for a hotspot at the region edge.
pub fn hotspot_fallback<R: Rng + ?Sized>(region: &Region, rng: &mut R) -> GeoPoint {
    let hotspots = region.hotspots();
    if hotspots.is_empty() {
        return region.center();
    }
    let spot = &hotspots[rng.random_range(0..hotspots.len())];
    let lat = spot.lat + (rng.random::<f64>() - 0.5) * 0.04;
    let lng = spot.lng + (rng.random::<f64>() - 0.5) * 0.04;
    region.clamp(lat, lng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_clamp_inside_box_is_identity() {
        let p = GLOBAL.clamp(40.7128, -74.0060);
        assert_eq!(p, GeoPoint::new(40.7128, -74.0060));
    }

    #[test]
    fn test_clamp_out_of_range_snaps_to_edge() {
        let p = GLOBAL.clamp(91.0, 200.0);
        assert_eq!(p, GeoPoint::new(90.0, 180.0));

        let p = GLOBAL.clamp(-123.0, -999.0);
        assert_eq!(p, GeoPoint::new(-90.0, -180.0));
    }

    #[test]
    fn test_clamp_is_idempotent() {
        let once = GLOBAL.clamp(91.0, 200.0);
        let twice = GLOBAL.clamp(once.lat, once.lng);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_clamp_nan_falls_back_to_center() {
        let p = ISLAND.clamp(f64::NAN, f64::NAN);
        assert_eq!(p, ISLAND.center());
    }

    #[test]
    fn test_regional_clamp_respects_regional_box() {
        // A mainland coordinate pushed through the island box lands on the
        // island box edge, not the global one.
        let p = ISLAND.clamp(34.34, 108.94);
        assert!(ISLAND.contains(&p));
        assert!(p.lng >= ISLAND.min_lng);
    }

    #[test]
    fn test_hotspot_fallback_inside_region() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let p = hotspot_fallback(&ISLAND, &mut rng);
            assert!(ISLAND.contains(&p), "fallback {:?} left the region", p);
        }
    }

    #[test]
    fn test_hotspot_fallback_without_hotspots_uses_center() {
        let region = Region::new("empty", -1.0, 1.0, -1.0, 1.0);
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(hotspot_fallback(&region, &mut rng), region.center());
    }

    #[test]
    fn test_hotspot_fallback_varies() {
        let mut rng = StdRng::seed_from_u64(7);
        let a = hotspot_fallback(&ISLAND, &mut rng);
        let b = hotspot_fallback(&ISLAND, &mut rng);
        assert_ne!(a, b);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_clamp_always_in_box(
                lat in -1000.0..1000.0_f64,
                lng in -1000.0..1000.0_f64
            ) {
                let p = GLOBAL.clamp(lat, lng);
                prop_assert!(GLOBAL.contains(&p));
            }

            #[test]
            fn test_clamp_idempotent_property(
                lat in -1000.0..1000.0_f64,
                lng in -1000.0..1000.0_f64
            ) {
                let once = GLOBAL.clamp(lat, lng);
                let twice = GLOBAL.clamp(once.lat, once.lng);
                prop_assert_eq!(once, twice);
            }

            #[test]
            fn test_clamp_in_box_unchanged(
                lat in -89.9..89.9_f64,
                lng in -179.9..179.9_f64
            ) {
                let p = GLOBAL.clamp(lat, lng);
                prop_assert_eq!(p, GeoPoint::new(lat, lng));
            }

            #[test]
            fn test_island_clamp_in_island_box(
                lat in -1000.0..1000.0_f64,
                lng in -1000.0..1000.0_f64
            ) {
                let p = ISLAND.clamp(lat, lng);
                prop_assert!(ISLAND.contains(&p));
            }
        }
    }
}
