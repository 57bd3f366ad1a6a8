//! Tick loop ownership for the overlay.
//!
//! The animation loop is an explicit object rather than a callback that
//! reschedules itself: one `running` flag, one pending task handle. That
//! makes start and stop idempotent and the loop's lifecycle testable
//! without closures capturing mutable outer state.
//!
//! The loop runs only while there is something to animate: it starts on
//! first emitter release and parks itself once the active set drains.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use super::ParticleOverlay;

/// Default frame pacing (roughly 60 fps).
pub const DEFAULT_TICK: Duration = Duration::from_millis(16);

/// Owns the overlay's animation-frame subscription.
pub struct OverlayScheduler {
    tick: Duration,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Default for OverlayScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_TICK)
    }
}

impl OverlayScheduler {
    pub fn new(tick: Duration) -> Self {
        Self {
            tick,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Starts the tick loop if it is not already running.
    ///
    /// Safe to call after every release; a running loop is left alone. The
    /// spawned task ticks the overlay at the configured pace and parks
    /// itself (clearing the running flag) when the active set is empty.
    pub fn ensure_running(&mut self, overlay: Arc<Mutex<ParticleOverlay>>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("overlay tick loop starting");

        let running = Arc::clone(&self.running);
        let tick = self.tick;
        self.handle = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            loop {
                interval.tick().await;
                if overlay.lock().tick() > 0 {
                    continue;
                }
                // Park by clearing the flag first, then re-check: a release
                // that landed between the draining tick and the clear would
                // otherwise see the flag still set, skip spawning, and be
                // stranded. If one slipped in, reclaim the flag and keep
                // ticking; if a concurrent ensure_running already took it,
                // that loop owns the emitter instead.
                running.store(false, Ordering::SeqCst);
                if overlay.lock().active_count() > 0
                    && !running.swap(true, Ordering::SeqCst)
                {
                    continue;
                }
                break;
            }
            debug!("overlay tick loop parked: no active emitters");
        }));
    }

    /// Stops the loop immediately. Idempotent.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.running.store(false, Ordering::SeqCst);
    }

    /// True while the tick loop is live.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for OverlayScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for OverlayScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayScheduler")
            .field("tick", &self.tick)
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::OverlayConfig;
    use crate::viewport::{PixelSize, ViewportBridge};

    fn small_frame_overlay() -> Arc<Mutex<ParticleOverlay>> {
        // A short frame keeps expiry within a few hundred ticks.
        Arc::new(Mutex::new(ParticleOverlay::new(OverlayConfig {
            frame: PixelSize {
                width: 100.0,
                height: 20.0,
            },
            spark_probability: 0.25,
            seed: Some(5),
        })))
    }

    async fn wait_until_parked(scheduler: &OverlayScheduler) {
        while scheduler.is_running() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_runs_until_drained_then_parks() {
        let overlay = small_frame_overlay();
        overlay
            .lock()
            .release_at(&ViewportBridge::new(), None, Some("wish"));

        let mut scheduler = OverlayScheduler::new(Duration::from_millis(1));
        scheduler.ensure_running(Arc::clone(&overlay));
        assert!(scheduler.is_running());

        wait_until_parked(&scheduler).await;
        assert!(overlay.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ensure_running_is_idempotent() {
        let overlay = small_frame_overlay();
        overlay
            .lock()
            .release_at(&ViewportBridge::new(), None, Some("wish"));

        let mut scheduler = OverlayScheduler::new(Duration::from_millis(1));
        scheduler.ensure_running(Arc::clone(&overlay));
        let first = scheduler.is_running();
        // Second call must not spawn a second loop (which would double-tick
        // the physics).
        scheduler.ensure_running(Arc::clone(&overlay));
        assert!(first && scheduler.is_running());

        wait_until_parked(&scheduler).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let overlay = small_frame_overlay();
        overlay
            .lock()
            .release_at(&ViewportBridge::new(), None, Some("wish"));

        let mut scheduler = OverlayScheduler::new(Duration::from_millis(1));
        scheduler.ensure_running(Arc::clone(&overlay));
        scheduler.stop();
        scheduler.stop();
        assert!(!scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_racing_the_park_is_not_stranded() {
        // Interleave releases with draining loops; every emitter must burn
        // out even when a release lands right as the loop is parking.
        let overlay = small_frame_overlay();
        let mut scheduler = OverlayScheduler::new(Duration::from_millis(1));

        for _ in 0..50 {
            overlay
                .lock()
                .release_at(&ViewportBridge::new(), None, Some("wish"));
            scheduler.ensure_running(Arc::clone(&overlay));
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        for _ in 0..200_000 {
            if overlay.lock().is_empty() && !scheduler.is_running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(overlay.lock().is_empty());
        assert!(!scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_drain() {
        let overlay = small_frame_overlay();
        overlay
            .lock()
            .release_at(&ViewportBridge::new(), None, Some("first"));

        let mut scheduler = OverlayScheduler::new(Duration::from_millis(1));
        scheduler.ensure_running(Arc::clone(&overlay));
        wait_until_parked(&scheduler).await;

        // A later release restarts the loop.
        overlay
            .lock()
            .release_at(&ViewportBridge::new(), None, Some("second"));
        scheduler.ensure_running(Arc::clone(&overlay));
        assert!(scheduler.is_running());
        wait_until_parked(&scheduler).await;
        assert!(overlay.lock().is_empty());
    }
}
