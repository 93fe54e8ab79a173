// Shared fixtures: an in-memory catalog server, a scripted streaming engine and a display surface.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch, Semaphore};

use ma_video_client::catalog::model::{Envelope, UploadData, VideoRecord};
use ma_video_client::engine::traits::{
    DisplaySurface, EngineEvent, EngineLoader, EngineModule, EnginePlayer, SurfaceId,
};

pub const MB: usize = 1024 * 1024;

/// Bytes that sniff as an MP4 file.
pub fn mp4_payload(len: usize) -> bytes::Bytes {
    let mut data = vec![0u8; len.max(16)];
    data[0..4].copy_from_slice(&24u32.to_be_bytes());
    data[4..8].copy_from_slice(b"ftyp");
    data[8..12].copy_from_slice(b"isom");
    bytes::Bytes::from(data)
}

pub fn record(id: &str) -> VideoRecord {
    VideoRecord {
        id: id.to_string(),
        uploaded_at: "2024-05-01 10:00:00".to_string(),
    }
}

/// Wait for a watch value matching `pred`, failing the test after two seconds.
pub async fn wait_for<T: Clone>(rx: &mut watch::Receiver<T>, pred: impl FnMut(&T) -> bool) -> T {
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(pred))
        .await
        .expect("timed out waiting for state")
        .expect("state channel closed")
        .clone()
}

/// Poll `cond` until it holds, failing the test after two seconds.
pub async fn eventually(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition never held");
}

// ---------------------------------------------------------------------------
// Catalog server
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct Store {
    pub videos: Arc<Mutex<Vec<VideoRecord>>>,
    pub thumbnails: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    pub uploads: Arc<AtomicUsize>,
    pub upload_sizes: Arc<Mutex<Vec<usize>>>,
}

impl Store {
    pub fn with_videos(ids: &[&str]) -> Self {
        let store = Store::default();
        store.videos.lock().extend(ids.iter().map(|id| record(id)));
        store
    }

    pub fn ids(&self) -> Vec<String> {
        self.videos.lock().iter().map(|v| v.id.clone()).collect()
    }
}

fn envelope_error(status: StatusCode, message: &str) -> Response {
    (status, Json(Envelope::<()>::err(message))).into_response()
}

async fn list_videos(State(store): State<Store>) -> Response {
    let videos = store.videos.lock().clone();
    Json(Envelope::ok(videos)).into_response()
}

async fn get_video(State(store): State<Store>, Path(id): Path<String>) -> Response {
    let found = store.videos.lock().iter().find(|v| v.id == id).cloned();
    match found {
        Some(video) => Json(Envelope::ok(video)).into_response(),
        None => envelope_error(StatusCode::NOT_FOUND, "Video not found"),
    }
}

async fn upload_video(State(store): State<Store>, mut multipart: Multipart) -> Response {
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let Ok(data) = field.bytes().await else {
            return envelope_error(StatusCode::BAD_REQUEST, "Error retrieving file");
        };
        if content_type != "video/mp4" {
            return envelope_error(StatusCode::BAD_REQUEST, "Only video/mp4 is accepted");
        }

        let id = file_name
            .rsplit_once('.')
            .map(|(stem, _)| stem.to_string())
            .unwrap_or(file_name);
        let mut videos = store.videos.lock();
        if videos.iter().any(|v| v.id == id) {
            return envelope_error(StatusCode::CONFLICT, "Video ID already exists");
        }
        videos.push(record(&id));
        store.uploads.fetch_add(1, Ordering::SeqCst);
        store.upload_sizes.lock().push(data.len());
        return (
            StatusCode::CREATED,
            Json(Envelope::ok(UploadData { video_id: id })),
        )
            .into_response();
    }
    envelope_error(StatusCode::BAD_REQUEST, "Error retrieving file")
}

async fn delete_video(State(store): State<Store>, Path(id): Path<String>) -> Response {
    let mut videos = store.videos.lock();
    let before = videos.len();
    videos.retain(|v| v.id != id);
    if videos.len() == before {
        return envelope_error(StatusCode::NOT_FOUND, "Video not found");
    }
    Json(Envelope::ok(serde_json::json!({ "message": "Video deleted successfully" })))
        .into_response()
}

async fn content(State(store): State<Store>, Path((id, file)): Path<(String, String)>) -> Response {
    if file == "thumbnail.jpg" {
        if let Some(bytes) = store.thumbnails.lock().get(&id).cloned() {
            return ([("content-type", "image/jpeg")], bytes).into_response();
        }
    }
    envelope_error(StatusCode::INTERNAL_SERVER_ERROR, "Error reading video content")
}

pub async fn start_catalog_server(store: Store) -> SocketAddr {
    let app = Router::new()
        .route("/api/videos", get(list_videos))
        .route("/api/videos/{id}", get(get_video))
        .route("/api/upload", post(upload_video))
        .route("/api/delete/{id}", delete(delete_video))
        .route("/api/content/{id}/{file}", get(content))
        .layer(DefaultBodyLimit::max(64 * MB))
        .with_state(store);
    serve(app).await
}

pub async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    addr
}

// ---------------------------------------------------------------------------
// Streaming engine
// ---------------------------------------------------------------------------

/// Everything the fake engine observed, shared by the module and its players.
#[derive(Default)]
pub struct EngineLog {
    pub missing_manifests: Mutex<HashSet<String>>,
    pub live: Mutex<HashMap<u64, String>>,
    pub initialized: Mutex<Vec<String>>,
    pub autoplay_flags: Mutex<Vec<bool>>,
    pub destroys: AtomicUsize,
    pub fail_initialize: AtomicBool,
    pub fail_destroy: AtomicBool,
    next_player: AtomicU64,
}

impl EngineLog {
    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }

    pub fn live_manifests(&self) -> Vec<String> {
        self.live.lock().values().cloned().collect()
    }

    pub fn miss_manifest(&self, video_id: &str) {
        self.missing_manifests.lock().insert(video_id.to_string());
    }
}

pub struct FakeModule {
    log: Arc<EngineLog>,
}

impl EngineModule for FakeModule {
    fn create_player(&self) -> Result<Box<dyn EnginePlayer>> {
        let id = self.log.next_player.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakePlayer {
            id,
            log: Arc::clone(&self.log),
        }))
    }
}

pub struct FakePlayer {
    id: u64,
    log: Arc<EngineLog>,
}

impl EnginePlayer for FakePlayer {
    fn initialize(
        &mut self,
        surface: Arc<dyn DisplaySurface>,
        manifest_url: &str,
        autoplay: bool,
        events: mpsc::UnboundedSender<EngineEvent>,
    ) -> Result<()> {
        self.log.autoplay_flags.lock().push(autoplay);
        if self.log.fail_initialize.load(Ordering::SeqCst) {
            bail!("media element rejected the source");
        }
        self.log.initialized.lock().push(manifest_url.to_string());
        self.log.live.lock().insert(self.id, manifest_url.to_string());

        // The engine picks its own start position; callers must not rely on it.
        surface.seek_to(12.5);

        let missing = self
            .log
            .missing_manifests
            .lock()
            .iter()
            .any(|id| manifest_url.ends_with(&format!("/{}/manifest.mpd", id)));
        let event = if missing {
            EngineEvent::Error("manifest.mpd: HTTP 404".to_string())
        } else {
            EngineEvent::StreamInitialized
        };
        let _ = events.send(event);
        Ok(())
    }

    fn destroy(&mut self) -> Result<()> {
        if self.log.live.lock().remove(&self.id).is_some() {
            self.log.destroys.fetch_add(1, Ordering::SeqCst);
        }
        if self.log.fail_destroy.load(Ordering::SeqCst) {
            bail!("player already disposed");
        }
        Ok(())
    }
}

pub struct FakeLoader {
    pub loads: AtomicUsize,
    pub unloads: AtomicUsize,
    failures_left: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
    log: Arc<EngineLog>,
}

impl FakeLoader {
    fn build(gated: bool, failures: usize) -> Arc<Self> {
        Arc::new(Self {
            loads: AtomicUsize::new(0),
            unloads: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(failures),
            gate: gated.then(|| Arc::new(Semaphore::new(0))),
            log: Arc::new(EngineLog::default()),
        })
    }

    /// Loads resolve immediately.
    pub fn ready() -> Arc<Self> {
        Self::build(false, 0)
    }

    /// Loads wait until `open_gate` is called.
    pub fn gated() -> Arc<Self> {
        Self::build(true, 0)
    }

    /// The first `n` loads fail.
    pub fn failing(n: usize) -> Arc<Self> {
        Self::build(false, n)
    }

    pub fn open_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1024);
        }
    }

    pub fn log(&self) -> &Arc<EngineLog> {
        &self.log
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn unload_count(&self) -> usize {
        self.unloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EngineLoader for FakeLoader {
    async fn load(&self) -> Result<Arc<dyn EngineModule>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await?;
        }
        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            bail!("dash.all.min.js failed to load");
        }
        Ok(Arc::new(FakeModule {
            log: Arc::clone(&self.log),
        }))
    }

    fn unload(&self) {
        self.unloads.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Display surface
// ---------------------------------------------------------------------------

pub struct FakeSurface {
    id: SurfaceId,
    pub position: Mutex<f64>,
    pub fallback: Mutex<Option<String>>,
}

impl FakeSurface {
    pub fn new(id: u64) -> Arc<Self> {
        Arc::new(Self {
            id: SurfaceId(id),
            position: Mutex::new(0.0),
            fallback: Mutex::new(None),
        })
    }

    pub fn position(&self) -> f64 {
        *self.position.lock()
    }

    pub fn fallback(&self) -> Option<String> {
        self.fallback.lock().clone()
    }
}

impl DisplaySurface for FakeSurface {
    fn id(&self) -> SurfaceId {
        self.id
    }

    fn seek_to(&self, seconds: f64) {
        *self.position.lock() = seconds;
    }

    fn show_fallback(&self, reason: &str) {
        *self.fallback.lock() = Some(reason.to_string());
    }

    fn clear_fallback(&self) {
        *self.fallback.lock() = None;
    }
}

pub fn as_surface(surface: &Arc<FakeSurface>) -> Arc<dyn DisplaySurface> {
    surface.clone()
}
