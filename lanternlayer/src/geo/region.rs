//! Regional bounding boxes and hotspot tables.

use super::GeoPoint;

/// A named city anchor used for fallback placement of records that arrive
/// without coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hotspot {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

/// A named geographic bounding box.
///
/// Regions are the unit of validation: a topic is configured with a region,
/// and every coordinate reconciled into that topic is clamped into the
/// region's box first.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub name: &'static str,
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
    hotspots: &'static [Hotspot],
}

/// The whole-world box. Used for topics with no regional affinity.
pub const GLOBAL: Region = Region {
    name: "global",
    min_lat: -90.0,
    max_lat: 90.0,
    min_lng: -180.0,
    max_lng: 180.0,
    hotspots: &[],
};

/// Island operational area, with the live feed's city hotspots.
pub const ISLAND: Region = Region {
    name: "island",
    min_lat: 21.8,
    max_lat: 25.4,
    min_lng: 119.9,
    max_lng: 122.1,
    hotspots: &[
        Hotspot { name: "Taipei", lat: 25.033, lng: 121.5654 },
        Hotspot { name: "New Taipei", lat: 25.012, lng: 121.4654 },
        Hotspot { name: "Taichung", lat: 24.1477, lng: 120.6736 },
        Hotspot { name: "Kaohsiung", lat: 22.6273, lng: 120.3014 },
        Hotspot { name: "Tainan", lat: 22.9997, lng: 120.227 },
        Hotspot { name: "Hsinchu", lat: 24.8138, lng: 120.9675 },
        Hotspot { name: "Taoyuan", lat: 25.0724, lng: 121.2272 },
    ],
};

/// Mainland operational area.
pub const MAINLAND: Region = Region {
    name: "mainland",
    min_lat: 18.0,
    max_lat: 46.0,
    min_lng: 78.0,
    max_lng: 125.0,
    hotspots: &[
        Hotspot { name: "Qinling", lat: 33.87, lng: 110.15 },
        Hotspot { name: "Xi'an", lat: 34.3416, lng: 108.9398 },
        Hotspot { name: "Fuzhou", lat: 26.0745, lng: 119.2965 },
        Hotspot { name: "Horgos", lat: 44.2144, lng: 80.4085 },
        Hotspot { name: "Guangzhou", lat: 23.1291, lng: 113.2644 },
        Hotspot { name: "Chengdu", lat: 30.5728, lng: 104.0668 },
    ],
};

impl Region {
    /// Creates a region without hotspots. Mostly useful in tests; the
    /// built-in regions cover the live topics.
    pub fn new(
        name: &'static str,
        min_lat: f64,
        max_lat: f64,
        min_lng: f64,
        max_lng: f64,
    ) -> Self {
        Self {
            name,
            min_lat,
            max_lat,
            min_lng,
            max_lng,
            hotspots: &[],
        }
    }

    /// Looks up a built-in region by name. Unknown names get the global box.
    pub fn named(name: &str) -> Region {
        match name {
            "island" => ISLAND,
            "mainland" => MAINLAND,
            _ => GLOBAL,
        }
    }

    /// Clamps a raw coordinate pair into this region's box.
    ///
    /// Pure and idempotent: `clamp(clamp(p)) == clamp(p)`. NaN input cannot
    /// be meaningfully clamped and falls back to the region center.
    pub fn clamp(&self, lat: f64, lng: f64) -> GeoPoint {
        if lat.is_nan() || lng.is_nan() {
            return self.center();
        }
        GeoPoint {
            lat: lat.clamp(self.min_lat, self.max_lat),
            lng: lng.clamp(self.min_lng, self.max_lng),
        }
    }

    /// Returns true if the point lies inside (or on the edge of) the box.
    pub fn contains(&self, p: &GeoPoint) -> bool {
        (self.min_lat..=self.max_lat).contains(&p.lat)
            && (self.min_lng..=self.max_lng).contains(&p.lng)
    }

    /// The box center.
    pub fn center(&self) -> GeoPoint {
        GeoPoint {
            lat: (self.min_lat + self.max_lat) / 2.0,
            lng: (self.min_lng + self.max_lng) / 2.0,
        }
    }

    /// Hotspots available for fallback placement.
    pub fn hotspots(&self) -> &'static [Hotspot] {
        self.hotspots
    }
}
