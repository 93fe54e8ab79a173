// Seam to the externally loaded adaptive-streaming engine and the surface it renders to.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Identity of a display surface. Two surfaces never share an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

/// The element frames are rendered into. Owned by the host UI, never by a session.
pub trait DisplaySurface: Send + Sync {
    fn id(&self) -> SurfaceId;
    /// Move the play cursor, in seconds.
    fn seek_to(&self, seconds: f64);
    /// Replace the player area with a fallback message.
    fn show_fallback(&self, reason: &str);
    fn clear_fallback(&self);
}

/// Notifications a player emits after `initialize`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Manifest parsed and the first frame is ready.
    StreamInitialized,
    Error(String),
}

/// Acquires the engine module. `load` is the expensive, globally visible step.
#[async_trait]
pub trait EngineLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn EngineModule>>;
    /// Drop whatever `load` registered process-wide.
    fn unload(&self) {}
}

pub trait EngineModule: Send + Sync {
    fn create_player(&self) -> Result<Box<dyn EnginePlayer>>;
}

/// One engine handle: a binding between the engine and one surface.
pub trait EnginePlayer: Send {
    fn initialize(
        &mut self,
        surface: Arc<dyn DisplaySurface>,
        manifest_url: &str,
        autoplay: bool,
        events: mpsc::UnboundedSender<EngineEvent>,
    ) -> Result<()>;

    fn destroy(&mut self) -> Result<()>;
}
