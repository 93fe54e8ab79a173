// Engine binding: the process-wide module registry and per-controller session creation.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::session::PlaybackSession;
use super::stats::PlaybackStats;
use super::traits::{DisplaySurface, EngineEvent, EngineLoader, EngineModule, SurfaceId};
use crate::error::EngineLoadError;

pub type ModuleResult = Result<Arc<dyn EngineModule>, EngineLoadError>;

type SharedLoad = Shared<BoxFuture<'static, ModuleResult>>;

struct PendingLoad {
    id: u64,
    future: SharedLoad,
}

#[derive(Default)]
struct RegistryState {
    consumers: usize,
    /// In-flight or completed load. Cleared on failure and on unload.
    load: Option<PendingLoad>,
    next_load_id: u64,
    /// A load resolved successfully and has not been unloaded since.
    loaded: bool,
    claimed: HashSet<SurfaceId>,
}

/// Owns the engine module for the whole process.
///
/// The first consumer's `load()` starts the loader; concurrent and later
/// callers attach to the same shared future. When the last lease is released
/// the loader is told to unload exactly once. A release that lands while a
/// load is still running keeps the pending future, so a remount attaches to
/// it, and the unload waits until that load has resolved.
pub struct EngineRegistry {
    loader: Arc<dyn EngineLoader>,
    state: Mutex<RegistryState>,
    stats: Arc<PlaybackStats>,
}

impl EngineRegistry {
    pub fn new(loader: Arc<dyn EngineLoader>) -> Arc<Self> {
        Arc::new(Self {
            loader,
            state: Mutex::new(RegistryState::default()),
            stats: Arc::new(PlaybackStats::new()),
        })
    }

    pub fn stats(&self) -> &Arc<PlaybackStats> {
        &self.stats
    }

    pub fn consumers(&self) -> usize {
        self.state.lock().consumers
    }

    /// Whether a load succeeded and has not been unloaded since.
    pub fn is_loaded(&self) -> bool {
        self.state.lock().loaded
    }

    /// Live engine handles on `surface` (0 or 1).
    pub fn live_handles(&self, surface: SurfaceId) -> usize {
        usize::from(self.state.lock().claimed.contains(&surface))
    }

    pub fn acquire(self: &Arc<Self>) -> EngineLease {
        let mut state = self.state.lock();
        state.consumers += 1;
        debug!("engine lease acquired consumers={}", state.consumers);
        EngineLease {
            registry: Arc::clone(self),
        }
    }

    fn release(&self) {
        let mut state = self.state.lock();
        state.consumers = state.consumers.saturating_sub(1);
        debug!("engine lease released consumers={}", state.consumers);
        if state.consumers > 0 {
            return;
        }
        if state.loaded {
            self.unload_locked(&mut state);
        } else if let Some(pending) = &state.load {
            debug!("engine load {} still running, unload deferred", pending.id);
        }
    }

    fn unload_locked(&self, state: &mut RegistryState) {
        state.load = None;
        state.loaded = false;
        self.loader.unload();
        self.stats.record_unload();
        info!("engine module unloaded, no consumers left");
    }

    /// Record how load `id` ended. Runs on the load task before any waiter sees the result.
    fn settle(&self, id: u64, succeeded: bool) {
        let mut state = self.state.lock();
        if state.load.as_ref().map(|p| p.id) != Some(id) {
            return;
        }
        if !succeeded {
            state.load = None;
            debug!("engine load {} forgotten after failure", id);
            return;
        }
        state.loaded = true;
        info!("engine load {} resolved", id);
        if state.consumers == 0 {
            self.unload_locked(&mut state);
        }
    }

    /// The shared load future, started on first use.
    fn module(self: &Arc<Self>) -> (u64, SharedLoad) {
        let mut state = self.state.lock();
        if let Some(pending) = &state.load {
            debug!("engine load {} already started, attaching", pending.id);
            return (pending.id, pending.future.clone());
        }

        state.next_load_id += 1;
        let id = state.next_load_id;
        self.stats.record_load_started();
        info!("engine load {} started", id);

        // The load runs on its own task so abandoned waiters never abort it.
        let loader = Arc::clone(&self.loader);
        let registry = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            let result = loader
                .load()
                .await
                .map_err(|e| EngineLoadError::Load(format!("{:#}", e)));
            if let Some(registry) = registry.upgrade() {
                registry.settle(id, result.is_ok());
            }
            result
        });
        let future = async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(EngineLoadError::Load(format!("engine load task failed: {}", e))),
            }
        }
        .boxed()
        .shared();

        state.load = Some(PendingLoad {
            id,
            future: future.clone(),
        });
        (id, future)
    }

    /// Drop a failed load so the next `load()` retries. Covers a load task that died
    /// before it could settle.
    fn forget_failed(&self, id: u64) {
        let mut state = self.state.lock();
        if state.load.as_ref().map(|p| p.id) == Some(id) {
            state.load = None;
            debug!("engine load {} forgotten after failure", id);
        }
    }

    fn claim_surface(self: &Arc<Self>, surface: SurfaceId) -> Result<SurfaceClaim, EngineLoadError> {
        let mut state = self.state.lock();
        if !state.claimed.insert(surface) {
            return Err(EngineLoadError::SurfaceBusy(surface));
        }
        Ok(SurfaceClaim {
            registry: Arc::clone(self),
            surface,
        })
    }
}

/// A registered consumer of the engine module. Dropping it releases the registration.
pub struct EngineLease {
    registry: Arc<EngineRegistry>,
}

impl Drop for EngineLease {
    fn drop(&mut self) {
        self.registry.release();
    }
}

/// Exclusive right to hold an engine handle on one surface.
pub(crate) struct SurfaceClaim {
    registry: Arc<EngineRegistry>,
    surface: SurfaceId,
}

impl Drop for SurfaceClaim {
    fn drop(&mut self) {
        self.registry.state.lock().claimed.remove(&self.surface);
    }
}

enum LeaseState {
    Unacquired,
    Held(EngineLease),
    Released,
}

/// One controller's view of the engine: a lease on the module plus session creation.
pub struct EngineBinding {
    registry: Arc<EngineRegistry>,
    lease: Mutex<LeaseState>,
}

impl EngineBinding {
    pub fn new(registry: Arc<EngineRegistry>) -> Self {
        Self {
            registry,
            lease: Mutex::new(LeaseState::Unacquired),
        }
    }

    pub fn registry(&self) -> &Arc<EngineRegistry> {
        &self.registry
    }

    /// Obtain the engine module. Idempotent; joins a pending load instead of starting another.
    pub async fn load(&self) -> Result<Arc<dyn EngineModule>, EngineLoadError> {
        {
            let mut lease = self.lease.lock();
            match &*lease {
                LeaseState::Released => return Err(EngineLoadError::Released),
                LeaseState::Held(_) => {}
                LeaseState::Unacquired => *lease = LeaseState::Held(self.registry.acquire()),
            }
        }

        let (id, future) = self.registry.module();
        let result = future.await;
        if let Err(e) = &result {
            warn!("engine load {} failed: {}", id, e);
            self.registry.forget_failed(id);
        }
        result
    }

    /// Bind a new player to `surface` and `manifest_url`. Autoplay is always off.
    pub fn create_session(
        &self,
        module: &Arc<dyn EngineModule>,
        surface: &Arc<dyn DisplaySurface>,
        video_id: &str,
        manifest_url: &str,
    ) -> Result<(PlaybackSession, mpsc::UnboundedReceiver<EngineEvent>), EngineLoadError> {
        let claim = self.registry.claim_surface(surface.id())?;

        let mut player = module
            .create_player()
            .map_err(|e| EngineLoadError::CreateSession(format!("{:#}", e)))?;

        let (tx, rx) = mpsc::unbounded_channel();
        if let Err(e) = player.initialize(Arc::clone(surface), manifest_url, false, tx) {
            if let Err(destroy_err) = player.destroy() {
                debug!("destroying half-built player failed: {:#}", destroy_err);
            }
            return Err(EngineLoadError::CreateSession(format!("{:#}", e)));
        }

        self.registry.stats().record_session_created();
        info!(
            "playback session created video={} surface={:?} manifest={}",
            video_id,
            surface.id(),
            manifest_url
        );
        let session = PlaybackSession::new(
            video_id.to_string(),
            surface,
            player,
            claim,
            Arc::clone(self.registry.stats()),
        );
        Ok((session, rx))
    }

    /// Safe on sessions that are already destroyed.
    pub fn destroy_session(&self, session: &PlaybackSession) {
        session.destroy();
    }

    /// Give up this binding's lease. Later `load()` calls fail with `Released`.
    pub fn release(&self) {
        let previous = std::mem::replace(&mut *self.lease.lock(), LeaseState::Released);
        drop(previous);
    }
}
