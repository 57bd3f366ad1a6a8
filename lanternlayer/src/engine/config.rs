//! Engine configuration.
//!
//! Capacity is an explicit per-topic setting rather than a literal buried
//! at each call site: live-log topics run small so the newest handful stays
//! readable, bulk history topics run into the thousands.

use crate::batch::DEFAULT_CHUNK_SIZE;
use crate::geo::{Region, GLOBAL, ISLAND, MAINLAND};
use crate::overlay::OverlayConfig;

/// Configuration for one bound topic.
#[derive(Debug, Clone)]
pub struct TopicConfig {
    /// Topic name on the wire.
    pub topic: String,

    /// Region every coordinate on this topic is validated against.
    pub region: Region,

    /// Maximum live records; oldest-first eviction beyond this.
    pub capacity: usize,

    /// Release an overlay emitter for notable records arriving live on
    /// this topic.
    pub release_on_notable: bool,
}

impl TopicConfig {
    pub fn new(topic: impl Into<String>, region: Region, capacity: usize) -> Self {
        Self {
            topic: topic.into(),
            region,
            capacity,
            release_on_notable: false,
        }
    }

    /// Enables emitter release for notable records.
    pub fn with_notable_release(mut self) -> Self {
        self.release_on_notable = true;
        self
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Topics bound at startup.
    pub topics: Vec<TopicConfig>,

    /// Records per synchronous chunk during bulk loads.
    pub chunk_size: usize,

    /// Overlay tuning.
    pub overlay: OverlayConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            topics: vec![
                TopicConfig::new("visits", ISLAND, 20).with_notable_release(),
                TopicConfig::new("wallets", ISLAND, 5).with_notable_release(),
                TopicConfig::new("assets", MAINLAND, 6),
                TopicConfig::new("history", GLOBAL, 10_000),
            ],
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlay: OverlayConfig::default(),
        }
    }
}

impl EngineConfig {
    /// A config with no topics; bind them with [`EngineConfig::with_topic`].
    pub fn empty() -> Self {
        Self {
            topics: Vec::new(),
            ..Self::default()
        }
    }

    /// Adds a topic.
    pub fn with_topic(mut self, topic: TopicConfig) -> Self {
        self.topics.push(topic);
        self
    }

    /// Sets the bulk-load chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Sets the overlay tuning.
    pub fn with_overlay(mut self, overlay: OverlayConfig) -> Self {
        self.overlay = overlay;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_topics_have_explicit_capacities() {
        let config = EngineConfig::default();
        assert!(!config.topics.is_empty());
        for topic in &config.topics {
            assert!(topic.capacity >= 1);
        }
    }

    #[test]
    fn test_builder_accumulates_topics() {
        let config = EngineConfig::empty()
            .with_topic(TopicConfig::new("alpha", GLOBAL, 3))
            .with_chunk_size(64);
        assert_eq!(config.topics.len(), 1);
        assert_eq!(config.chunk_size, 64);
        assert_eq!(config.topics[0].topic, "alpha");
    }

    #[test]
    fn test_notable_release_flag() {
        let topic = TopicConfig::new("wallets", ISLAND, 5).with_notable_release();
        assert!(topic.release_on_notable);
        assert!(!TopicConfig::new("assets", MAINLAND, 6).release_on_notable);
    }
}
