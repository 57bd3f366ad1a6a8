//! Geo-anchored particle overlay.
//!
//! The overlay animates ephemeral emitters above the map, independent of the
//! map's own render loop. It owns its active set, a seedable RNG for visual
//! variety, and reads the [`ViewportBridge`] so geo-anchored emitters track
//! pans and zooms. Its tick loop is driven by an [`OverlayScheduler`] that
//! runs only while the active set is non-empty.

mod emitter;
mod scheduler;

pub use emitter::{Emitter, EmitterState, Spark};
pub use scheduler::OverlayScheduler;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::geo::GeoPoint;
use crate::viewport::{PixelSize, ScreenPoint, ViewportBridge};

/// Labels drawn on emitters released without an explicit phrase.
pub const PHRASES: [&str; 10] = [
    "peace",
    "joy",
    "fortune",
    "health",
    "splendor",
    "as wished",
    "reunion",
    "blessing",
    "golden hour",
    "fair skies",
];

/// Overlay tuning.
#[derive(Debug, Clone, Copy)]
pub struct OverlayConfig {
    /// Visible frame the emitters animate across.
    pub frame: PixelSize,
    /// Per-tick probability that a rising emitter sheds a spark.
    pub spark_probability: f64,
    /// RNG seed; `None` seeds from the OS for production variety.
    pub seed: Option<u64>,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            frame: PixelSize {
                width: 800.0,
                height: 600.0,
            },
            spark_probability: 0.25,
            seed: None,
        }
    }
}

/// The active emitter set and its physics loop.
pub struct ParticleOverlay {
    config: OverlayConfig,
    emitters: Vec<Emitter>,
    rng: StdRng,
}

impl ParticleOverlay {
    pub fn new(config: OverlayConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            config,
            emitters: Vec::new(),
            rng,
        }
    }

    /// Releases one emitter.
    ///
    /// With an anchor, the release point is the anchor's current projection;
    /// if the surface is not yet renderable the release is dropped (the
    /// fail-soft contract of [`ViewportBridge::project`]). Without an
    /// anchor, the emitter starts from a random position along the frame
    /// bottom. A missing label draws a random phrase.
    pub fn release_at(
        &mut self,
        bridge: &ViewportBridge,
        anchor: Option<GeoPoint>,
        label: Option<&str>,
    ) -> bool {
        let pos = match anchor {
            Some(point) => match bridge.project(point) {
                Some(screen) => screen,
                None => {
                    debug!("release dropped: surface not yet renderable");
                    return false;
                }
            },
            None => ScreenPoint {
                x: self.rng.random::<f64>() * self.config.frame.width,
                y: self.config.frame.height,
            },
        };
        let label = match label {
            Some(text) => text.to_string(),
            None => PHRASES[self.rng.random_range(0..PHRASES.len())].to_string(),
        };

        debug!(x = pos.x, y = pos.y, anchored = anchor.is_some(), %label, "emitter released");
        self.emitters
            .push(Emitter::release(pos, anchor, label, &mut self.rng));
        true
    }

    /// Advances every emitter one tick and sweeps out expired ones.
    ///
    /// Returns the number of emitters still active, which the scheduler
    /// uses to decide when to park the loop.
    pub fn tick(&mut self) -> usize {
        let frame = self.config.frame;
        let spark_probability = self.config.spark_probability;
        for emitter in &mut self.emitters {
            emitter.step(&mut self.rng, frame, spark_probability);
        }
        self.emitters.retain(|emitter| emitter.alive());
        self.emitters.len()
    }

    /// Re-derives every anchored emitter's screen position from the current
    /// projection, preserving animation progress.
    ///
    /// Called on every viewport-changed notification. Free-floating
    /// emitters (no anchor) stay where they are.
    pub fn reproject(&mut self, bridge: &ViewportBridge) {
        for emitter in &mut self.emitters {
            if let Some(anchor) = emitter.anchor {
                if let Some(origin) = bridge.project(anchor) {
                    emitter.reproject(origin);
                }
            }
        }
    }

    /// Updates the frame after a surface resize.
    pub fn set_frame(&mut self, frame: PixelSize) {
        self.config.frame = frame;
    }

    /// Number of active emitters.
    pub fn active_count(&self) -> usize {
        self.emitters.len()
    }

    /// True when there is nothing left to animate.
    pub fn is_empty(&self) -> bool {
        self.emitters.is_empty()
    }

    /// The active emitters, oldest first.
    pub fn emitters(&self) -> &[Emitter] {
        &self.emitters
    }
}

impl std::fmt::Debug for ParticleOverlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParticleOverlay")
            .field("active", &self.emitters.len())
            .field("frame", &self.config.frame)
            .finish()
    }
}
