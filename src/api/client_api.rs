use std::sync::Arc;

use tracing::info;

use crate::catalog::http_catalog::HttpCatalog;
use crate::catalog::model::ContentUrls;
use crate::catalog::traits::CatalogApi;
use crate::config::ClientConfig;
use crate::engine::binding::{EngineBinding, EngineRegistry};
use crate::engine::controller::PlaybackController;
use crate::engine::traits::{DisplaySurface, EngineLoader};
use crate::error::ClientError;
use crate::upload::UploadSession;
use crate::view::CatalogViewModel;

/// Entry point: one HTTP catalog and one engine registry per process.
pub struct VideoClient {
    config: ClientConfig,
    urls: ContentUrls,
    catalog: Arc<HttpCatalog>,
    engine: Arc<EngineRegistry>,
}

impl VideoClient {
    pub fn new(config: ClientConfig, loader: Arc<dyn EngineLoader>) -> Result<Self, ClientError> {
        let urls = ContentUrls::new(config.base_url()?);
        let catalog = Arc::new(HttpCatalog::new(urls.clone()));
        info!("video client targeting {}", urls.base());
        Ok(Self {
            config,
            urls,
            catalog,
            engine: EngineRegistry::new(loader),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn urls(&self) -> &ContentUrls {
        &self.urls
    }

    pub fn catalog(&self) -> Arc<dyn CatalogApi> {
        self.catalog.clone()
    }

    pub fn engine(&self) -> &Arc<EngineRegistry> {
        &self.engine
    }

    pub fn upload_session(&self) -> UploadSession {
        UploadSession::new(self.catalog(), self.config.upload_policy())
    }

    /// A controller for `surface`, holding its own binding to the shared engine.
    pub fn player(&self, surface: &Arc<dyn DisplaySurface>) -> PlaybackController {
        PlaybackController::new(
            EngineBinding::new(Arc::clone(&self.engine)),
            surface,
            self.urls.clone(),
            self.config.engine_load_timeout(),
        )
    }

    /// View model for the catalog pages; with a surface it also drives playback.
    pub fn view_model(&self, surface: Option<&Arc<dyn DisplaySurface>>) -> CatalogViewModel {
        let view = CatalogViewModel::new(
            self.catalog(),
            self.config.upload_policy(),
            self.urls.clone(),
        );
        match surface {
            Some(surface) => view.with_player(self.player(surface)),
            None => view,
        }
    }
}
