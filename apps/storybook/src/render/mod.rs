// Book assembly from saved page images. Rendering is CPU-bound; the pipeline
// calls it through tokio::task::spawn_blocking.

pub mod pdf;

use std::path::{Path, PathBuf};

use crate::errors::BookError;

pub use pdf::PdfBookRenderer;

/// A saved page as handed to a renderer, in page order.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPage {
    pub page_number: u32,
    pub text: String,
    pub image_path: PathBuf,
}

pub trait BookRenderer: Send + Sync {
    fn render(&self, output: &Path, pages: &[RenderPage]) -> Result<(), BookError>;
}
