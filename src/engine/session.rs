// Playback session: one engine handle bound to one surface for one video.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::binding::SurfaceClaim;
use super::stats::PlaybackStats;
use super::traits::{DisplaySurface, EnginePlayer, SurfaceId};

struct EngineHandle {
    player: Box<dyn EnginePlayer>,
    // Released when the handle drops.
    _claim: SurfaceClaim,
}

pub struct PlaybackSession {
    video_id: String,
    surface: Weak<dyn DisplaySurface>,
    surface_id: SurfaceId,
    handle: Mutex<Option<EngineHandle>>,
    stats: Arc<PlaybackStats>,
}

impl PlaybackSession {
    pub(crate) fn new(
        video_id: String,
        surface: &Arc<dyn DisplaySurface>,
        player: Box<dyn EnginePlayer>,
        claim: SurfaceClaim,
        stats: Arc<PlaybackStats>,
    ) -> Self {
        Self {
            video_id,
            surface: Arc::downgrade(surface),
            surface_id: surface.id(),
            handle: Mutex::new(Some(EngineHandle {
                player,
                _claim: claim,
            })),
            stats,
        }
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn surface_id(&self) -> SurfaceId {
        self.surface_id
    }

    pub fn is_live(&self) -> bool {
        self.handle.lock().is_some()
    }

    /// Put the cursor at zero. The engine's own start position is not trusted.
    pub fn rewind_to_start(&self) -> bool {
        if !self.is_live() {
            return false;
        }
        match self.surface.upgrade() {
            Some(surface) => {
                surface.seek_to(0.0);
                true
            }
            None => false,
        }
    }

    /// Destroy the engine handle. Runs once; later calls are no-ops.
    pub fn destroy(&self) {
        let handle = self.handle.lock().take();
        let Some(mut handle) = handle else {
            debug!("session {} already destroyed", self.video_id);
            return;
        };
        if let Err(e) = handle.player.destroy() {
            warn!("engine destroy failed for {}: {:#}", self.video_id, e);
        }
        self.stats.record_session_destroyed();
        debug!(
            "session {} destroyed, surface {:?} free",
            self.video_id, self.surface_id
        );
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.destroy();
    }
}
