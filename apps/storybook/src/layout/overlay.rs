//! Dialogue overlay — draws wrapped text onto a saved page image in place.

use std::path::Path;

use ab_glyph::Font;
use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_text_mut;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

use crate::errors::BookError;
use crate::layout::font_metrics::{FontLibrary, FontMeasurer};
use crate::layout::wrap::{layout_block, BlockStyle, OverlayPosition, TextBlock};

pub const DEFAULT_MARGIN: u32 = 50;
pub const DEFAULT_LINE_SPACING: u32 = 10;
const SHADOW_OFFSET: i32 = 2;
const SHADOW_COLOR: Rgba<u8> = Rgba([32, 32, 32, 255]);

/// Text drawn over a page illustration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextOverlay {
    pub text: String,
    #[serde(default)]
    pub position: OverlayPosition,
    /// `"#RRGGBB"` or `[r, g, b]`.
    #[serde(default = "default_color", deserialize_with = "deserialize_color")]
    pub color: [u8; 3],
}

fn default_color() -> [u8; 3] {
    [255, 255, 255]
}

impl TextOverlay {
    /// White text anchored at the bottom of the page.
    pub fn bottom(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            position: OverlayPosition::Bottom,
            color: default_color(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Parses `#RRGGBB` (the leading `#` is optional).
pub fn parse_hex_color(value: &str) -> Option<[u8; 3]> {
    let hex = value.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

fn deserialize_color<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 3], D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Color {
        Hex(String),
        Rgb([u8; 3]),
    }

    match Color::deserialize(deserializer)? {
        Color::Hex(hex) => parse_hex_color(&hex).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid color {hex:?}, expected #RRGGBB"))
        }),
        Color::Rgb(rgb) => Ok(rgb),
    }
}

/// Applies overlays using fonts from a `FontLibrary`.
#[derive(Debug, Clone)]
pub struct OverlayRenderer {
    fonts: FontLibrary,
    font_size: f32,
    margin: u32,
    line_spacing: u32,
}

impl OverlayRenderer {
    pub fn new(fonts: FontLibrary, font_size: f32) -> Self {
        Self {
            fonts,
            font_size,
            margin: DEFAULT_MARGIN,
            line_spacing: DEFAULT_LINE_SPACING,
        }
    }

    /// Re-opens `path`, draws the overlay, and saves over it.
    ///
    /// Returns `Ok(false)` without touching the file when the text is blank or
    /// no candidate font can render it. CPU-bound; call from `spawn_blocking`.
    pub fn apply(&self, path: &Path, overlay: &TextOverlay) -> Result<bool, BookError> {
        let text = overlay.text.trim();
        if text.is_empty() {
            return Ok(false);
        }
        let Some(font) = self.fonts.select_for(text) else {
            warn!(
                "No installed font can render overlay text for {}; leaving image as generated",
                path.display()
            );
            return Ok(false);
        };

        let mut canvas = image::open(path)?.to_rgba8();
        let (width, height) = canvas.dimensions();
        let measurer = FontMeasurer::new(&font, self.font_size);
        let block = layout_block(
            text,
            &measurer,
            width,
            height,
            BlockStyle {
                margin: self.margin,
                line_spacing: self.line_spacing,
                position: overlay.position,
            },
        );

        let [r, g, b] = overlay.color;
        draw_block(&mut canvas, &block, &font, self.font_size, Rgba([r, g, b, 255]), true);
        canvas.save(path)?;

        debug!("Overlay of {} lines applied to {}", block.lines.len(), path.display());
        Ok(true)
    }
}

/// Draws every placed line, optionally with a drop shadow underneath.
pub fn draw_block<F: Font>(
    canvas: &mut RgbaImage,
    block: &TextBlock,
    font: &F,
    font_size: f32,
    color: Rgba<u8>,
    shadow: bool,
) {
    for line in &block.lines {
        if shadow {
            draw_text_mut(
                canvas,
                SHADOW_COLOR,
                line.x + SHADOW_OFFSET,
                line.y + SHADOW_OFFSET,
                font_size,
                font,
                &line.text,
            );
        }
        draw_text_mut(canvas, color, line.x, line.y, font_size, font, &line.text);
    }
}
