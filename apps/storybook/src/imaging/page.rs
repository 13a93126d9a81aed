//! Page Generation — one page's illustration from prompt to file on disk.
//!
//! Flow: build body → submit (retried) → check envelope code →
//!       inline base64 or download (retried) → write page_NNN.png →
//!       optional dialogue overlay (in place, once).
//!
//! Every failure leaves this module as `BookError::PageGenerationFailed` so the
//! pipeline can record the page as skipped and carry on.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::errors::BookError;
use crate::imaging::client::ImageClient;
use crate::layout::overlay::{OverlayRenderer, TextOverlay};
use crate::models::book::PageArtifact;
use crate::retry::RetryPolicy;

/// Identifies the visual model on the generation endpoint.
pub const REQ_KEY: &str = "high_aes_general_v21_L";
pub const IMAGE_WIDTH: u32 = 1024;
pub const IMAGE_HEIGHT: u32 = 768;

/// Extra request fields merged over the base body (e.g. `style`).
pub type StyleParams = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct PageImageRequest {
    pub prompt: String,
    /// 1-based.
    pub page_number: u32,
    pub text_overlay: Option<TextOverlay>,
}

/// `page_001.png`, `page_002.png`, … — fixed width so regeneration overwrites.
pub fn page_file_name(page_number: u32) -> String {
    format!("page_{page_number:03}.png")
}

pub fn build_request_body(prompt: &str, style_params: &StyleParams) -> Value {
    let mut body = json!({
        "req_key": REQ_KEY,
        "prompt": prompt,
        "width": IMAGE_WIDTH,
        "height": IMAGE_HEIGHT,
    });
    if let Value::Object(fields) = &mut body {
        for (key, value) in style_params {
            fields.insert(key.clone(), value.clone());
        }
    }
    body
}

pub struct PageGenerator {
    client: Arc<dyn ImageClient>,
    retry: RetryPolicy,
    output_dir: PathBuf,
    overlay: Option<Arc<OverlayRenderer>>,
}

impl PageGenerator {
    pub fn new(client: Arc<dyn ImageClient>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            retry: RetryPolicy::image(),
            output_dir: output_dir.into(),
            overlay: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_overlay(mut self, overlay: Arc<OverlayRenderer>) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub async fn generate_page(
        &self,
        request: &PageImageRequest,
        style_params: &StyleParams,
    ) -> Result<PageArtifact, BookError> {
        self.try_generate(request, style_params)
            .await
            .map_err(|source| BookError::PageGenerationFailed {
                page: request.page_number,
                source: Box::new(source),
            })
    }

    async fn try_generate(
        &self,
        request: &PageImageRequest,
        style_params: &StyleParams,
    ) -> Result<PageArtifact, BookError> {
        if request.page_number == 0 {
            return Err(BookError::Validation("page numbers start at 1".to_string()));
        }
        let body = build_request_body(&request.prompt, style_params);
        debug!("Page {} prompt: {}", request.page_number, request.prompt);

        let envelope = self
            .retry
            .run("image generation", |_| self.client.submit(&body))
            .await?;

        if !envelope.is_success() {
            return Err(BookError::Upstream {
                code: Some(envelope.code),
                message: if envelope.message.is_empty() {
                    "unknown error".to_string()
                } else {
                    envelope.message.clone()
                },
            });
        }

        let image_bytes: Vec<u8> = if let Some(encoded) = envelope.first_inline_image() {
            STANDARD
                .decode(encoded.trim())
                .map_err(|e| BookError::upstream(format!("inline image is not valid base64: {e}")))?
        } else if let Some(url) = envelope.first_image_url() {
            self.retry
                .run("image download", |_| self.client.download(url))
                .await?
                .to_vec()
        } else {
            return Err(BookError::upstream("response contained no image data"));
        };

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let file_path = self.output_dir.join(page_file_name(request.page_number));
        tokio::fs::write(&file_path, &image_bytes).await?;
        info!("Page {} saved: {}", request.page_number, file_path.display());

        let overlay_applied = match (&self.overlay, &request.text_overlay) {
            (Some(renderer), Some(overlay)) if !overlay.is_empty() => {
                self.apply_overlay(renderer, &file_path, overlay).await
            }
            _ => false,
        };

        Ok(PageArtifact {
            page_number: request.page_number,
            file_path,
            overlay_applied,
        })
    }

    /// The image is already saved; an overlay failure only costs the text.
    async fn apply_overlay(
        &self,
        renderer: &Arc<OverlayRenderer>,
        file_path: &Path,
        overlay: &TextOverlay,
    ) -> bool {
        let renderer = Arc::clone(renderer);
        let path = file_path.to_path_buf();
        let overlay = overlay.clone();

        match tokio::task::spawn_blocking(move || renderer.apply(&path, &overlay)).await {
            Ok(Ok(applied)) => applied,
            Ok(Err(e)) => {
                warn!("Overlay failed for {}: {e}", file_path.display());
                false
            }
            Err(e) => {
                warn!("Overlay task failed for {}: {e}", file_path.display());
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::client::{ImageData, ImageEnvelope};
    use crate::layout::font_metrics::FontLibrary;
    use async_trait::async_trait;
    use base64::Engine as _;
    use bytes::Bytes;
    use std::io::Cursor;
    use std::sync::Mutex;

    fn png_bytes() -> Vec<u8> {
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(image::RgbaImage::new(4, 4))
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn success(inline: Option<String>, url: Option<&str>) -> ImageEnvelope {
        ImageEnvelope {
            code: 10000,
            message: "Success".to_string(),
            data: Some(ImageData {
                binary_data_base64: inline.map(|s| vec![s]),
                image_urls: url.map(|u| vec![u.to_string()]),
            }),
        }
    }

    /// Replays scripted submit results in order; downloads always return PNG bytes.
    struct ScriptedClient {
        submits: Mutex<Vec<Result<ImageEnvelope, BookError>>>,
        bodies: Mutex<Vec<Value>>,
        downloads: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn new(mut script: Vec<Result<ImageEnvelope, BookError>>) -> Arc<Self> {
            script.reverse();
            Arc::new(Self {
                submits: Mutex::new(script),
                bodies: Mutex::new(vec![]),
                downloads: Mutex::new(vec![]),
            })
        }

        fn submit_count(&self) -> usize {
            self.bodies.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ImageClient for ScriptedClient {
        async fn submit(&self, body: &Value) -> Result<ImageEnvelope, BookError> {
            self.bodies.lock().unwrap().push(body.clone());
            self.submits
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(BookError::TransientNetwork("script exhausted".into())))
        }

        async fn download(&self, url: &str) -> Result<Bytes, BookError> {
            self.downloads.lock().unwrap().push(url.to_string());
            Ok(Bytes::from(png_bytes()))
        }
    }

    fn request(page_number: u32) -> PageImageRequest {
        PageImageRequest {
            prompt: "水彩风格，小熊，蜂蜜".to_string(),
            page_number,
            text_overlay: None,
        }
    }

    #[test]
    fn test_page_file_names_are_zero_padded() {
        assert_eq!(page_file_name(1), "page_001.png");
        assert_eq!(page_file_name(2), "page_002.png");
        assert_eq!(page_file_name(10), "page_010.png");
        assert_eq!(page_file_name(123), "page_123.png");
    }

    #[test]
    fn test_request_body_merges_style_params() {
        let mut params = StyleParams::new();
        params.insert("style".into(), json!("水彩"));
        params.insert("seed".into(), json!(42));
        let body = build_request_body("小熊", &params);
        assert_eq!(body["req_key"], REQ_KEY);
        assert_eq!(body["prompt"], "小熊");
        assert_eq!(body["width"], 1024);
        assert_eq!(body["height"], 768);
        assert_eq!(body["style"], "水彩");
        assert_eq!(body["seed"], 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inline_image_is_saved_under_page_name() {
        let dir = tempfile::tempdir().unwrap();
        let client = ScriptedClient::new(vec![Ok(success(Some(STANDARD.encode(png_bytes())), None))]);
        let generator = PageGenerator::new(client.clone(), dir.path());

        let artifact = generator.generate_page(&request(2), &StyleParams::new()).await.unwrap();

        assert_eq!(artifact.file_path, dir.path().join("page_002.png"));
        assert_eq!(std::fs::read(&artifact.file_path).unwrap(), png_bytes());
        assert!(!artifact.overlay_applied);
        assert!(client.downloads.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_url_is_downloaded_when_no_inline_data() {
        let dir = tempfile::tempdir().unwrap();
        let client = ScriptedClient::new(vec![Ok(success(None, Some("https://cdn.example/p.png")))]);
        let generator = PageGenerator::new(client.clone(), dir.path());

        let artifact = generator.generate_page(&request(1), &StyleParams::new()).await.unwrap();

        assert!(artifact.file_path.exists());
        assert_eq!(
            *client.downloads.lock().unwrap(),
            vec!["https://cdn.example/p.png".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried_then_saved() {
        let dir = tempfile::tempdir().unwrap();
        let client = ScriptedClient::new(vec![
            Err(BookError::TransientNetwork("timeout".into())),
            Err(BookError::MalformedResponse("truncated".into())),
            Ok(success(Some(STANDARD.encode(png_bytes())), None)),
        ]);
        let generator = PageGenerator::new(client.clone(), dir.path());

        let artifact = generator.generate_page(&request(3), &StyleParams::new()).await;

        assert!(artifact.is_ok());
        assert_eq!(client.submit_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_success_code_fails_without_retry() {
        let dir = tempfile::tempdir().unwrap();
        let client = ScriptedClient::new(vec![Ok(ImageEnvelope {
            code: 50411,
            message: "Pre Img Risk Not Pass".to_string(),
            data: None,
        })]);
        let generator = PageGenerator::new(client.clone(), dir.path());

        let err = generator
            .generate_page(&request(1), &StyleParams::new())
            .await
            .unwrap_err();

        assert_eq!(client.submit_count(), 1);
        match err {
            BookError::PageGenerationFailed { page, source } => {
                assert_eq!(page, 1);
                assert!(matches!(*source, BookError::Upstream { code: Some(50411), .. }));
            }
            other => panic!("expected PageGenerationFailed, got {other:?}"),
        }
        assert!(!dir.path().join("page_001.png").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_image_data_is_upstream_error() {
        let dir = tempfile::tempdir().unwrap();
        let client = ScriptedClient::new(vec![Ok(success(None, None))]);
        let generator = PageGenerator::new(client, dir.path());

        let err = generator
            .generate_page(&request(1), &StyleParams::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no image data"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_base64_is_upstream_error() {
        let dir = tempfile::tempdir().unwrap();
        let client = ScriptedClient::new(vec![Ok(success(Some("***".to_string()), None))]);
        let generator = PageGenerator::new(client, dir.path());

        let err = generator
            .generate_page(&request(1), &StyleParams::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("base64"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_fail_the_page() {
        let dir = tempfile::tempdir().unwrap();
        let client = ScriptedClient::new(vec![]);
        let generator = PageGenerator::new(client.clone(), dir.path());

        let err = generator
            .generate_page(&request(4), &StyleParams::new())
            .await
            .unwrap_err();

        assert_eq!(client.submit_count(), 3);
        match err {
            BookError::PageGenerationFailed { page, source } => {
                assert_eq!(page, 4);
                assert!(matches!(*source, BookError::GenerationFailed { attempts: 3, .. }));
            }
            other => panic!("expected PageGenerationFailed, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_regenerating_a_page_overwrites_the_same_file() {
        let dir = tempfile::tempdir().unwrap();
        let inline = STANDARD.encode(png_bytes());
        let client = ScriptedClient::new(vec![
            Ok(success(Some(inline.clone()), None)),
            Ok(success(Some(inline), None)),
        ]);
        let generator = PageGenerator::new(client, dir.path());

        generator.generate_page(&request(5), &StyleParams::new()).await.unwrap();
        generator.generate_page(&request(5), &StyleParams::new()).await.unwrap();

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlay_without_fonts_keeps_page() {
        let dir = tempfile::tempdir().unwrap();
        let client = ScriptedClient::new(vec![Ok(success(Some(STANDARD.encode(png_bytes())), None))]);
        let generator = PageGenerator::new(client, dir.path())
            .with_overlay(Arc::new(OverlayRenderer::new(FontLibrary::empty(), 40.0)));

        let mut req = request(1);
        req.text_overlay = Some(TextOverlay::bottom("你好"));
        let artifact = generator.generate_page(&req, &StyleParams::new()).await.unwrap();

        assert!(artifact.file_path.exists());
        assert!(!artifact.overlay_applied);
    }
}
