//! Event and marker data model.
//!
//! The wire shape ([`RecordInput`]) is deliberately loose: live feeds carry
//! records with missing coordinates, unknown kind tags and arbitrary extra
//! fields. Sanitization happens exactly once, at the store boundary, where a
//! `RecordInput` becomes a [`MarkerRecord`] with a validated position and a
//! tagged [`MarkerKind`]. Downstream renderers pattern-match the kind
//! exhaustively instead of probing fields defensively.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::geo::{hotspot_fallback, GeoPoint, Region};

/// Identifier of a marker, unique within its topic.
pub type MarkerId = String;

/// How an event's records relate to the topic's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SyncMode {
    /// Replaces the topic's entire visible set. Sent after reconnect or
    /// initial load.
    Full,
    /// Merges one record (or a small batch) into existing state.
    Incremental,
}

/// Visual treatment tag for a marker.
///
/// Unknown tags are preserved verbatim in the `Opaque` variant so a renderer
/// can still route them to a default treatment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    /// A network node beacon.
    Node,
    /// A confirmed asset point.
    Asset,
    /// A newly connected wallet.
    Wallet,
    /// A visitor arrival.
    Visit,
    /// Anything else; the original tag is kept for display.
    Opaque(String),
}

impl MarkerKind {
    /// Parses a wire tag. Missing tags default to `Node`.
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            None => MarkerKind::Node,
            Some("node") => MarkerKind::Node,
            Some("asset") => MarkerKind::Asset,
            Some("wallet") => MarkerKind::Wallet,
            Some("visit") => MarkerKind::Visit,
            Some(other) => MarkerKind::Opaque(other.to_string()),
        }
    }

    /// Kinds that represent a notable occurrence worth an overlay emitter.
    pub fn is_notable(&self) -> bool {
        matches!(self, MarkerKind::Wallet | MarkerKind::Visit)
    }
}

/// A record as it arrives from the event source.
///
/// Only `id` is required; everything else is repaired or defaulted during
/// sanitization. Unrecognized fields are captured in `extra` and carried
/// through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordInput {
    pub id: MarkerId,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RecordInput {
    /// Creates a minimal input with just an id.
    pub fn new(id: impl Into<MarkerId>) -> Self {
        Self {
            id: id.into(),
            lat: None,
            lng: None,
            kind: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Sets the coordinate pair.
    pub fn at(mut self, lat: f64, lng: f64) -> Self {
        self.lat = Some(lat);
        self.lng = Some(lng);
        self
    }

    /// Sets the kind tag.
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Attaches one opaque payload field.
    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Sanitizes this input into a store-ready record.
    ///
    /// A present coordinate pair is clamped into `region`; a missing or
    /// half-missing pair gets a randomized hotspot fallback. This is the
    /// only place a position enters the system, so everything downstream
    /// can assume in-box coordinates.
    pub fn sanitize<R: Rng + ?Sized>(self, region: &Region, rng: &mut R) -> MarkerRecord {
        let position = match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => region.clamp(lat, lng),
            _ => hotspot_fallback(region, rng),
        };
        MarkerRecord {
            id: self.id,
            position,
            kind: MarkerKind::from_tag(self.kind.as_deref()),
            created_at: Utc::now(),
            payload: serde_json::Value::Object(self.extra),
        }
    }
}

/// A sanitized marker owned by the store for its topic.
///
/// Renderers receive references and never mutate records; updates happen in
/// place during reconcile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerRecord {
    pub id: MarkerId,
    pub position: GeoPoint,
    pub kind: MarkerKind,
    pub created_at: DateTime<Utc>,
    /// Opaque passthrough data for detail views.
    pub payload: serde_json::Value,
}

impl MarkerRecord {
    /// Returns true if `other` carries the same content, ignoring the
    /// arrival timestamp. Used for duplicate-delivery detection.
    pub fn same_content(&self, other: &MarkerRecord) -> bool {
        self.id == other.id
            && self.position == other.position
            && self.kind == other.kind
            && self.payload == other.payload
    }
}

/// A message on a named topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEvent {
    pub topic: String,
    pub mode: SyncMode,
    pub records: Vec<RecordInput>,
}

impl SyncEvent {
    /// A FULL event replacing the topic's state.
    pub fn full(topic: impl Into<String>, records: Vec<RecordInput>) -> Self {
        Self {
            topic: topic.into(),
            mode: SyncMode::Full,
            records,
        }
    }

    /// An INCREMENTAL event merging into the topic's state.
    pub fn incremental(topic: impl Into<String>, records: Vec<RecordInput>) -> Self {
        Self {
            topic: topic.into(),
            mode: SyncMode::Incremental,
            records,
        }
    }
}
