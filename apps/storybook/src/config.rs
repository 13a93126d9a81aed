use std::path::PathBuf;

use anyhow::{Context, Result};

const DEFAULT_VOLC_ENDPOINT: &str = "https://visual.volcengineapi.com";
const DEFAULT_ARK_BASE_URL: &str = "https://ark.cn-beijing.volces.com/api/v3";

/// Application configuration loaded from environment variables.
///
/// Credentials are read here but not checked: empty keys surface as
/// `BookError::Configuration` when the signing and chat clients are built,
/// so commands that never touch the network still run without them.
#[derive(Debug, Clone)]
pub struct Config {
    pub volc_access_key: String,
    pub volc_secret_key: String,
    pub volc_endpoint: String,
    pub volc_region: String,
    pub volc_service: String,
    pub ark_api_key: String,
    pub ark_base_url: String,
    pub ark_model: String,
    pub books_dir: PathBuf,
    pub page_concurrency: usize,
    /// Preferred overlay font; system CJK fonts are tried after it.
    pub font_path: Option<PathBuf>,
    pub overlay_font_size: f32,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            volc_access_key: optional_env("VOLC_ACCESS_KEY").unwrap_or_default(),
            volc_secret_key: optional_env("VOLC_SECRET_KEY").unwrap_or_default(),
            volc_endpoint: optional_env("VOLC_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_VOLC_ENDPOINT.to_string()),
            volc_region: optional_env("VOLC_REGION").unwrap_or_else(|| "cn-north-1".to_string()),
            volc_service: optional_env("VOLC_SERVICE").unwrap_or_else(|| "cv".to_string()),
            ark_api_key: optional_env("ARK_API_KEY").unwrap_or_default(),
            ark_base_url: optional_env("ARK_BASE_URL")
                .unwrap_or_else(|| DEFAULT_ARK_BASE_URL.to_string()),
            ark_model: optional_env("ARK_MODEL").unwrap_or_default(),
            books_dir: optional_env("BOOKS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("books")),
            page_concurrency: optional_env("PAGE_CONCURRENCY")
                .unwrap_or_else(|| "1".to_string())
                .parse::<usize>()
                .context("PAGE_CONCURRENCY must be a positive integer")?
                .max(1),
            font_path: optional_env("STORYBOOK_FONT").map(PathBuf::from),
            overlay_font_size: optional_env("OVERLAY_FONT_SIZE")
                .unwrap_or_else(|| "40".to_string())
                .parse::<f32>()
                .context("OVERLAY_FONT_SIZE must be a number")?,
            rust_log: optional_env("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

/// Reads a variable, treating unset and blank the same.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
