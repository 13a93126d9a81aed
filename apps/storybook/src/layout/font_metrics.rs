//! Font discovery and text measurement.
//!
//! Dialogue is usually CJK, so a font is only usable if it has a glyph for
//! every non-whitespace character of the text being drawn. `FontLibrary`
//! walks an ordered candidate list (configured font first, then well-known
//! system fonts) and returns the first one that covers the text.

use std::path::{Path, PathBuf};

use ab_glyph::{Font, FontVec, PxScale};
use tracing::debug;

/// Well-known font files that cover CJK (and Latin) across Linux, macOS and Windows.
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/noto-cjk/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/google-noto-cjk/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/truetype/wqy/wqy-microhei.ttc",
    "/usr/share/fonts/truetype/wqy/wqy-zenhei.ttc",
    "/System/Library/Fonts/PingFang.ttc",
    "/System/Library/Fonts/STHeiti Medium.ttc",
    "/Library/Fonts/Arial Unicode.ttf",
    "C:\\Windows\\Fonts\\msyh.ttc",
    "C:\\Windows\\Fonts\\simhei.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
];

/// Measures rendered text. Implemented over real fonts and over fixed-width fakes in tests.
pub trait TextMeasurer {
    /// `(width, height)` in pixels of `text` drawn on a single line.
    fn line_size(&self, text: &str) -> (u32, u32);
}

/// Measures with a loaded font at a fixed pixel scale.
pub struct FontMeasurer<'a, F: Font> {
    font: &'a F,
    scale: PxScale,
}

impl<'a, F: Font> FontMeasurer<'a, F> {
    pub fn new(font: &'a F, px: f32) -> Self {
        Self {
            font,
            scale: PxScale::from(px),
        }
    }
}

impl<F: Font> TextMeasurer for FontMeasurer<'_, F> {
    fn line_size(&self, text: &str) -> (u32, u32) {
        imageproc::drawing::text_size(self.scale, self.font, text)
    }
}

/// Ordered list of font files to try.
#[derive(Debug, Clone, Default)]
pub struct FontLibrary {
    candidates: Vec<PathBuf>,
}

impl FontLibrary {
    /// The configured font (if any) followed by the system candidates.
    pub fn system(preferred: Option<PathBuf>) -> Self {
        let mut candidates: Vec<PathBuf> = preferred.into_iter().collect();
        candidates.extend(SYSTEM_FONT_CANDIDATES.iter().map(PathBuf::from));
        Self { candidates }
    }

    #[cfg(test)]
    pub fn with_candidates(candidates: Vec<PathBuf>) -> Self {
        Self { candidates }
    }

    /// No fonts at all; overlays are skipped and PDF text panels stay blank.
    #[cfg(test)]
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// First candidate that loads and has a glyph for every character of `text`.
    pub fn select_for(&self, text: &str) -> Option<FontVec> {
        self.candidates
            .iter()
            .filter(|path| path.is_file())
            .filter_map(|path| load_font(path))
            .find(|font| covers(font, text))
    }
}

fn load_font(path: &Path) -> Option<FontVec> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            debug!("Skipping font {}: {e}", path.display());
            return None;
        }
    };
    // .ttc collections: the first face is the regular weight for every candidate above
    match FontVec::try_from_vec_and_index(data, 0) {
        Ok(font) => Some(font),
        Err(e) => {
            debug!("Skipping font {}: {e}", path.display());
            None
        }
    }
}

/// True if `font` has a real glyph (not .notdef) for every non-whitespace char.
pub fn covers<F: Font>(font: &F, text: &str) -> bool {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .all(|c| font.glyph_id(c).0 != 0)
}
