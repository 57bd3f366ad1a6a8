//! Emitter and spark physics.
//!
//! An [`Emitter`] is one ephemeral ascending visual: it rises along a
//! meandering path, wobbles, sheds [`Spark`] particles, and expires once it
//! climbs past the visible frame. All constants below are tuned for a
//! 60 fps tick and are expressed per tick, not per second.

use rand::Rng;

use crate::geo::GeoPoint;
use crate::viewport::{PixelSize, ScreenPoint};

/// Vertical position (pixels above the frame top) past which an emitter
/// expires.
const EXPIRY_MARGIN: f64 = 150.0;

/// Emitters that drift this far below the frame bottom are culled too; a
/// zoom-out can push an anchored emitter off the bottom edge.
const CULL_BELOW_MARGIN: f64 = 100.0;

/// Per-tick gravity applied to spark velocity.
const SPARK_GRAVITY: f64 = 0.015;

/// Lifecycle of one emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitterState {
    /// Ascending and spawning sparks.
    Rising,
    /// Finished; removed from the active set on the next sweep.
    Expired,
}

/// A short-lived glow particle shed by a rising emitter.
#[derive(Debug, Clone)]
pub struct Spark {
    pub x: f64,
    pub y: f64,
    vx: f64,
    vy: f64,
    /// Remaining life in [0, 1]; rendered as alpha.
    pub life: f64,
    decay: f64,
    /// Render radius, already scaled by the parent's depth.
    pub size: f64,
}

impl Spark {
    fn spawn<R: Rng + ?Sized>(x: f64, y: f64, scale: f64, rng: &mut R) -> Self {
        Self {
            x,
            y,
            vx: (rng.random::<f64>() - 0.5) * 0.8,
            vy: (rng.random::<f64>() * -0.8 - 0.4) * scale,
            life: 1.0,
            decay: rng.random::<f64>() * 0.01 + 0.015,
            size: (rng.random::<f64>() * 1.5 + 1.0) * scale,
        }
    }

    /// Advances one tick. Returns false once the spark has burned out.
    fn step(&mut self) -> bool {
        self.x += self.vx;
        self.y += self.vy;
        self.vy += SPARK_GRAVITY;
        self.life -= self.decay;
        self.life > 0.0
    }
}

/// One ascending, geo-anchored (or free-floating) visual object.
#[derive(Debug, Clone)]
pub struct Emitter {
    /// Authoritative geographic position, if anchored. `None` means the
    /// emitter lives purely in screen space.
    pub anchor: Option<GeoPoint>,
    /// Projection of the anchor (or the release point) in the current
    /// viewport. Re-projection moves this; animation progress does not.
    origin: ScreenPoint,
    /// Current screen position.
    pub pos: ScreenPoint,
    /// Depth scalar in [1.2, 4.5]; larger means farther away, so smaller
    /// and slower.
    pub depth: f64,
    /// Ascent speed in pixels per tick, already divided by depth.
    speed_y: f64,
    /// Phase driving drift and wobble; pre-seeded randomly so emitters
    /// released together do not sway in lockstep.
    phase: f64,
    /// Current wobble angle in degrees.
    pub tilt: f64,
    /// Display label, drawn on the emitter body.
    pub label: String,
    pub state: EmitterState,
    /// Ticks since release.
    pub age: u64,
    sparks: Vec<Spark>,
}

impl Emitter {
    /// Releases a new emitter at a screen position.
    pub fn release<R: Rng + ?Sized>(
        pos: ScreenPoint,
        anchor: Option<GeoPoint>,
        label: String,
        rng: &mut R,
    ) -> Self {
        let depth = rng.random::<f64>() * 3.3 + 1.2;
        Self {
            anchor,
            origin: pos,
            pos,
            depth,
            speed_y: (rng.random::<f64>() * 0.6 + 0.6) / depth,
            phase: rng.random::<f64>() * 100.0,
            tilt: 0.0,
            label,
            state: EmitterState::Rising,
            age: 0,
            sparks: Vec::new(),
        }
    }

    /// Apparent size factor derived from depth.
    pub fn scale(&self) -> f64 {
        1.0 / self.depth
    }

    /// Live sparks owned by this emitter.
    pub fn sparks(&self) -> &[Spark] {
        &self.sparks
    }

    /// True while the emitter should stay in the active set.
    pub fn alive(&self) -> bool {
        self.state == EmitterState::Rising
    }

    /// Advances one animation tick: ascent, drift, wobble, spark spawning
    /// and aging, then the expiry check.
    pub fn step<R: Rng + ?Sized>(&mut self, rng: &mut R, frame: PixelSize, spark_probability: f64) {
        if self.state == EmitterState::Expired {
            return;
        }
        self.age += 1;
        self.phase += 0.02;
        self.pos.y -= self.speed_y;
        self.pos.x += (self.phase * 0.5).cos() * (0.3 / self.depth);
        self.tilt = self.phase.sin() * 4.0;

        if rng.random::<f64>() < spark_probability {
            let scale = self.scale();
            self.sparks
                .push(Spark::spawn(self.pos.x, self.pos.y + 50.0 * scale, scale, rng));
        }
        self.sparks.retain_mut(|spark| spark.step());

        if self.pos.y < -EXPIRY_MARGIN || self.pos.y > frame.height + CULL_BELOW_MARGIN {
            self.state = EmitterState::Expired;
        }
    }

    /// Moves the emitter to a new projection of its anchor, preserving the
    /// accumulated animation offset.
    ///
    /// The pixel frame jumps discontinuously on pan/zoom; the emitter must
    /// not. Keeping `pos - origin` constant across the move carries the
    /// ascent and drift progress over to the new frame.
    pub fn reproject(&mut self, new_origin: ScreenPoint) {
        let dx = self.pos.x - self.origin.x;
        let dy = self.pos.y - self.origin.y;
        self.origin = new_origin;
        self.pos = ScreenPoint {
            x: new_origin.x + dx,
            y: new_origin.y + dy,
        };
    }

    /// Offset accumulated since release (drift + ascent), in pixels.
    pub fn animation_offset(&self) -> (f64, f64) {
        (self.pos.x - self.origin.x, self.pos.y - self.origin.y)
    }
}
