// Text layout for page overlays and PDF text panels: font discovery and
// measurement, per-character wrapping, and drawing onto images.
// Drawing is CPU-bound and must run inside tokio::task::spawn_blocking.

pub mod font_metrics;
pub mod overlay;
pub mod wrap;

pub use font_metrics::FontLibrary;
pub use overlay::OverlayRenderer;
