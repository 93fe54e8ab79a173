// Playback controller: sequences load -> bind -> first frame -> teardown for one surface.

use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::binding::EngineBinding;
use super::session::PlaybackSession;
use super::stats::PlaybackStatsSnapshot;
use super::traits::{DisplaySurface, EngineEvent, EngineModule};
use crate::catalog::model::ContentUrls;
use crate::error::EngineLoadError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackState {
    /// Nothing has been opened yet.
    Idle,
    Loading {
        video_id: String,
    },
    Bound {
        video_id: String,
        /// The engine reported its first frame and the cursor was reset.
        first_frame: bool,
    },
    /// Degraded: the surface shows a fallback. The rest of the page is unaffected.
    Error {
        video_id: String,
        reason: String,
    },
    TornDown {
        video_id: String,
    },
}

impl PlaybackState {
    pub fn video_id(&self) -> Option<&str> {
        match self {
            PlaybackState::Idle => None,
            PlaybackState::Loading { video_id }
            | PlaybackState::Bound { video_id, .. }
            | PlaybackState::Error { video_id, .. }
            | PlaybackState::TornDown { video_id } => Some(video_id),
        }
    }
}

#[derive(Default)]
struct Slot {
    /// Bumped on every open and teardown. Results carrying an older value are stale.
    generation: u64,
    video_id: Option<String>,
    session: Option<PlaybackSession>,
    cancel: Option<CancellationToken>,
}

struct ControllerInner {
    binding: EngineBinding,
    surface: Weak<dyn DisplaySurface>,
    urls: ContentUrls,
    load_timeout: Option<Duration>,
    slot: Mutex<Slot>,
    state: watch::Sender<PlaybackState>,
}

/// Owns the playback of one display surface.
///
/// Every transition happens under the slot lock, so a late result can compare
/// its generation and install itself atomically, or be discarded.
pub struct PlaybackController {
    inner: Arc<ControllerInner>,
}

impl PlaybackController {
    pub fn new(
        binding: EngineBinding,
        surface: &Arc<dyn DisplaySurface>,
        urls: ContentUrls,
        load_timeout: Option<Duration>,
    ) -> Self {
        let (state, _) = watch::channel(PlaybackState::Idle);
        Self {
            inner: Arc::new(ControllerInner {
                binding,
                surface: Arc::downgrade(surface),
                urls,
                load_timeout,
                slot: Mutex::new(Slot::default()),
                state,
            }),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.inner.state.subscribe()
    }

    pub fn stats(&self) -> PlaybackStatsSnapshot {
        self.inner.binding.registry().stats().snapshot()
    }

    /// Id of the video whose session currently holds the surface.
    pub fn bound_video(&self) -> Option<String> {
        let slot = self.inner.slot.lock();
        slot.session
            .as_ref()
            .filter(|s| s.is_live())
            .map(|s| s.video_id().to_string())
    }

    /// Tear down whatever is playing and start attaching `video_id`.
    pub fn open(&self, video_id: &str) {
        let (generation, token) = {
            let mut slot = self.inner.slot.lock();
            self.inner.teardown_locked(&mut slot);
            let token = CancellationToken::new();
            slot.cancel = Some(token.clone());
            slot.video_id = Some(video_id.to_string());
            self.inner.state.send_replace(PlaybackState::Loading {
                video_id: video_id.to_string(),
            });
            (slot.generation, token)
        };
        if let Some(surface) = self.inner.surface.upgrade() {
            surface.clear_fallback();
        }
        debug!("open video={} generation={}", video_id, generation);

        let inner = Arc::clone(&self.inner);
        let video_id = video_id.to_string();
        tokio::spawn(async move {
            inner.run(generation, video_id, token).await;
        });
    }

    /// Tear down the current video, if any.
    pub fn close(&self) {
        let mut slot = self.inner.slot.lock();
        self.inner.teardown_locked(&mut slot);
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.close();
        self.inner.binding.release();
    }
}

impl ControllerInner {
    /// The single cleanup path, whatever state the slot is in.
    fn teardown_locked(&self, slot: &mut Slot) {
        slot.generation += 1;
        if let Some(token) = slot.cancel.take() {
            token.cancel();
        }
        if let Some(session) = slot.session.take() {
            self.binding.destroy_session(&session);
        }
        if let Some(video_id) = slot.video_id.take() {
            info!("playback torn down video={}", video_id);
            self.state.send_replace(PlaybackState::TornDown { video_id });
        }
    }

    async fn run(self: Arc<Self>, generation: u64, video_id: String, token: CancellationToken) {
        let attach = bounded(self.load_timeout, self.attach(generation, &video_id));
        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("attach of {} released, generation {} superseded", video_id, generation);
                return;
            }
            outcome = attach => outcome,
        };

        match outcome {
            Ok(Some(events)) => self.pump(generation, &video_id, events, token).await,
            Ok(None) => {}
            Err(e) => self.fail(generation, &video_id, e),
        }
    }

    /// Load the module, then install a session if this generation is still current.
    async fn attach(
        &self,
        generation: u64,
        video_id: &str,
    ) -> Result<Option<mpsc::UnboundedReceiver<EngineEvent>>, EngineLoadError> {
        let module = self.binding.load().await?;
        self.install(generation, video_id, &module)
    }

    fn install(
        &self,
        generation: u64,
        video_id: &str,
        module: &Arc<dyn EngineModule>,
    ) -> Result<Option<mpsc::UnboundedReceiver<EngineEvent>>, EngineLoadError> {
        let mut slot = self.slot.lock();
        if slot.generation != generation {
            debug!("discarding stale load for {} (generation {})", video_id, generation);
            self.binding.registry().stats().record_stale();
            return Ok(None);
        }
        let surface = self.surface.upgrade().ok_or(EngineLoadError::SurfaceGone)?;

        // Exclusive surface: nothing may still be bound when a new session is made.
        if let Some(previous) = slot.session.take() {
            self.binding.destroy_session(&previous);
        }

        let manifest = self.urls.manifest(video_id);
        let (session, events) =
            self.binding
                .create_session(module, &surface, video_id, manifest.as_str())?;
        slot.session = Some(session);
        self.state.send_replace(PlaybackState::Bound {
            video_id: video_id.to_string(),
            first_frame: false,
        });
        Ok(Some(events))
    }

    async fn pump(
        &self,
        generation: u64,
        video_id: &str,
        mut events: mpsc::UnboundedReceiver<EngineEvent>,
        token: CancellationToken,
    ) {
        loop {
            let event = tokio::select! {
                biased;
                _ = token.cancelled() => return,
                event = events.recv() => event,
            };
            match event {
                Some(EngineEvent::StreamInitialized) => self.first_frame(generation, video_id),
                Some(EngineEvent::Error(reason)) => {
                    self.fail(generation, video_id, EngineLoadError::Playback(reason));
                    return;
                }
                None => return,
            }
        }
    }

    fn first_frame(&self, generation: u64, video_id: &str) {
        let slot = self.slot.lock();
        if slot.generation != generation {
            self.binding.registry().stats().record_stale();
            return;
        }
        if let Some(session) = &slot.session {
            session.rewind_to_start();
            self.state.send_replace(PlaybackState::Bound {
                video_id: video_id.to_string(),
                first_frame: true,
            });
            debug!("first frame ready video={}, cursor reset", video_id);
        }
    }

    fn fail(&self, generation: u64, video_id: &str, error: EngineLoadError) {
        let mut slot = self.slot.lock();
        if slot.generation != generation {
            debug!("ignoring stale failure for {}: {}", video_id, error);
            self.binding.registry().stats().record_stale();
            return;
        }
        if let Some(session) = slot.session.take() {
            self.binding.destroy_session(&session);
        }
        self.binding.registry().stats().record_failure();

        let reason = error.to_string();
        warn!("playback of {} failed: {}", video_id, reason);
        if let Some(surface) = self.surface.upgrade() {
            surface.show_fallback(&reason);
        }
        self.state.send_replace(PlaybackState::Error {
            video_id: video_id.to_string(),
            reason,
        });
    }
}

async fn bounded<T>(
    limit: Option<Duration>,
    fut: impl Future<Output = Result<T, EngineLoadError>>,
) -> Result<T, EngineLoadError> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| EngineLoadError::TimedOut(limit))?,
        None => fut.await,
    }
}
