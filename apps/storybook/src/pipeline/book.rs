//! Story Pipeline — end-to-end book generation.
//!
//! Flow: validate → story (fatal on failure) → pad/truncate pages →
//!       metadata.json → pages (bounded concurrency, failures skipped) →
//!       optional PDF (failure logged, not fatal).
//!
//! The book directory is keyed by theme. Resubmitting a theme replaces the
//! metadata and clears the old pages and PDF first. Each run gets a fresh `book_id`.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::BookError;
use crate::imaging::client::ImageClient;
use crate::imaging::page::{PageGenerator, PageImageRequest, StyleParams};
use crate::layout::overlay::OverlayRenderer;
use crate::models::book::{BookManifest, BookMetadata, PageArtifact, PageOutcome, PageStatus};
use crate::models::story::StoryRequest;
use crate::pipeline::page_plan::{build_image_prompt, overlay_for};
use crate::pipeline::storage::{BookStore, PDF_FILE};
use crate::render::{BookRenderer, RenderPage};
use crate::retry::RetryPolicy;
use crate::story::StoryGenerator;

pub struct StoryPipeline {
    story: Arc<dyn StoryGenerator>,
    images: Arc<dyn ImageClient>,
    store: BookStore,
    retry: RetryPolicy,
    concurrency: usize,
    overlay: Option<Arc<OverlayRenderer>>,
    renderer: Option<Arc<dyn BookRenderer>>,
}

impl StoryPipeline {
    /// Sequential pages, image retry policy, no overlay, no PDF.
    pub fn new(
        story: Arc<dyn StoryGenerator>,
        images: Arc<dyn ImageClient>,
        store: BookStore,
    ) -> Self {
        Self {
            story,
            images,
            store,
            retry: RetryPolicy::image(),
            concurrency: 1,
            overlay: None,
            renderer: None,
        }
    }

    /// Maximum pages in flight. Zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_overlay(mut self, overlay: Arc<OverlayRenderer>) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn BookRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub async fn generate_book(
        &self,
        request: &StoryRequest,
        cancel: &CancellationToken,
    ) -> Result<BookManifest, BookError> {
        request.validate()?;
        let theme = request.theme.trim().to_string();
        let directory = self.store.book_dir(&theme)?;

        let story = self
            .story
            .generate_story(request)
            .await
            .map_err(|e| BookError::StoryGenerationFailed(Box::new(e)))?
            .normalize_page_count(request.page_count);

        let book_id = Uuid::new_v4();
        let metadata = BookMetadata {
            book_id,
            created_at: Utc::now(),
            params: request.clone(),
            visual_tags: story.visual_tags.clone(),
            pages: story.pages.clone(),
            raw_data: story.raw_response.clone(),
        };
        self.store.write_metadata(&theme, &metadata).await?;
        // Files left by an earlier run of this theme would read as saved pages.
        self.store.clear_artifacts(&theme).await?;
        info!(
            "Book {book_id} started: theme {theme:?}, {} pages, concurrency {}",
            story.pages.len(),
            self.concurrency
        );

        let mut generator =
            PageGenerator::new(Arc::clone(&self.images), &directory).with_retry(self.retry);
        if let Some(overlay) = &self.overlay {
            generator = generator.with_overlay(Arc::clone(overlay));
        }
        let style = request.effective_style();
        let mut style_params = StyleParams::new();
        style_params.insert("style".to_string(), json!(style));

        let generator = &generator;
        let style_params = &style_params;
        let tags = &story.visual_tags;

        // None: not started because the job was cancelled.
        let results: BTreeMap<u32, Option<Result<PageArtifact, BookError>>> =
            stream::iter(story.pages.iter().enumerate())
                .map(|(index, text)| async move {
                    let page_number = index as u32 + 1;
                    if cancel.is_cancelled() {
                        return (page_number, None);
                    }
                    info!("Generating page {page_number}");
                    let request = PageImageRequest {
                        prompt: build_image_prompt(text, style, tags),
                        page_number,
                        text_overlay: overlay_for(text),
                    };
                    let result = generator.generate_page(&request, style_params).await;
                    (page_number, Some(result))
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        let mut saved_pages = 0;
        let mut not_started = 0;
        let mut pages = Vec::with_capacity(results.len());
        for (page_number, result) in results {
            let text = story.pages[(page_number - 1) as usize].clone();
            let status = match result {
                Some(Ok(artifact)) => {
                    saved_pages += 1;
                    PageStatus::Done { artifact }
                }
                Some(Err(e)) => {
                    warn!("Page {page_number} skipped: {e}");
                    PageStatus::Skipped {
                        reason: e.to_string(),
                    }
                }
                None => {
                    not_started += 1;
                    PageStatus::Skipped {
                        reason: "cancelled".to_string(),
                    }
                }
            };
            pages.push(PageOutcome {
                page_number,
                text,
                status,
            });
        }

        if not_started > 0 {
            warn!("Book {book_id} cancelled: {saved_pages} saved, {not_started} not started");
            return Err(BookError::Cancelled { saved_pages });
        }

        let mut manifest = BookManifest {
            book_id,
            theme,
            directory,
            pages,
            pdf_path: None,
        };
        if saved_pages > 0 {
            manifest.pdf_path = self.render_pdf(&manifest).await;
        }

        let skipped = manifest.skipped_pages();
        if skipped.is_empty() {
            info!("Book {book_id} complete: {saved_pages} pages");
        } else {
            warn!("Book {book_id} complete with skipped pages {skipped:?}");
        }
        Ok(manifest)
    }

    /// Renders `book.pdf` from the saved pages. Failures are logged and yield `None`.
    async fn render_pdf(&self, manifest: &BookManifest) -> Option<std::path::PathBuf> {
        let renderer = Arc::clone(self.renderer.as_ref()?);
        let output = manifest.directory.join(PDF_FILE);
        let pages: Vec<RenderPage> = manifest
            .pages
            .iter()
            .filter_map(|outcome| {
                outcome.artifact().map(|artifact| RenderPage {
                    page_number: outcome.page_number,
                    text: outcome.text.clone(),
                    image_path: artifact.file_path.clone(),
                })
            })
            .collect();

        let path = output.clone();
        match tokio::task::spawn_blocking(move || renderer.render(&path, &pages)).await {
            Ok(Ok(())) => Some(output),
            Ok(Err(e)) => {
                warn!("PDF rendering failed for book {}: {e}", manifest.book_id);
                None
            }
            Err(e) => {
                warn!("PDF rendering task failed for book {}: {e}", manifest.book_id);
                None
            }
        }
    }
}
