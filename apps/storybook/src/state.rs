use std::sync::Arc;

use tracing::{debug, info};

use crate::config::Config;
use crate::errors::BookError;
use crate::imaging::VisualApiClient;
use crate::layout::{FontLibrary, OverlayRenderer};
use crate::llm_client::LlmClient;
use crate::pipeline::{BookStore, StoryPipeline};
use crate::render::PdfBookRenderer;
use crate::signing::RequestSigner;
use crate::story::LlmStoryGenerator;

/// Shared services built once from `Config`.
///
/// Network clients are only built by `build_pipeline`, so `list` and `delete`
/// work without credentials.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Config,
    pub store: BookStore,
    /// Overlay and PDF fonts: the configured font first, then system CJK fonts.
    pub fonts: FontLibrary,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let store = BookStore::new(config.books_dir.clone());
        let fonts = FontLibrary::system(config.font_path.clone());
        let installed = fonts.candidates().iter().filter(|p| p.is_file()).count();
        debug!("{installed} of {} font candidates installed", fonts.candidates().len());
        Self {
            config,
            store,
            fonts,
        }
    }

    /// Wires signer, clients, overlay and optional PDF renderer into a pipeline.
    /// Missing credentials surface here as `BookError::Configuration`.
    pub fn build_pipeline(
        &self,
        concurrency: Option<usize>,
        with_pdf: bool,
    ) -> Result<StoryPipeline, BookError> {
        let config = &self.config;

        let host = VisualApiClient::host_of(&config.volc_endpoint)?;
        let signer = RequestSigner::new(
            config.volc_access_key.as_str(),
            config.volc_secret_key.as_str(),
            config.volc_region.as_str(),
            config.volc_service.as_str(),
            host,
        )?;
        let images = VisualApiClient::new(&config.volc_endpoint, signer)?;
        info!("Visual API client initialized ({})", config.volc_endpoint);

        let llm = LlmClient::new(
            config.ark_api_key.as_str(),
            config.ark_base_url.as_str(),
            config.ark_model.as_str(),
        )?;
        info!("LLM client initialized (model: {})", llm.model());

        let overlay = OverlayRenderer::new(self.fonts.clone(), config.overlay_font_size);
        let mut pipeline = StoryPipeline::new(
            Arc::new(LlmStoryGenerator::new(llm)),
            Arc::new(images),
            self.store.clone(),
        )
        .with_concurrency(concurrency.unwrap_or(config.page_concurrency))
        .with_overlay(Arc::new(overlay));

        if with_pdf {
            pipeline = pipeline.with_renderer(Arc::new(PdfBookRenderer::new(
                self.fonts.clone(),
                config.overlay_font_size * 0.8,
            )));
        }
        Ok(pipeline)
    }
}
