//! Character-level line wrapping and block placement.
//!
//! Dialogue may be logographic, with no spaces to break on, so wrapping works
//! per character. Greedy: a character that would push the measured line past
//! `max_width` starts a new line instead.

use serde::{Deserialize, Serialize};

use crate::layout::font_metrics::TextMeasurer;

/// Vertical anchor for a text block within its area.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayPosition {
    Top,
    Center,
    #[default]
    Bottom,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedLine {
    pub text: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlock {
    pub lines: Vec<PlacedLine>,
    pub block_height: u32,
}

/// Spacing and margins for a text block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockStyle {
    pub margin: u32,
    pub line_spacing: u32,
    pub position: OverlayPosition,
}

/// Greedy per-character wrap. `\n` always breaks. A single character wider than
/// `max_width` still gets its own line rather than being dropped.
pub fn wrap_chars<M: TextMeasurer + ?Sized>(text: &str, measurer: &M, max_width: u32) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut current = String::new();
        for ch in paragraph.chars() {
            let mut candidate = current.clone();
            candidate.push(ch);
            if !current.is_empty() && measurer.line_size(&candidate).0 > max_width {
                push_line(&mut lines, &current);
                current.clear();
                current.push(ch);
            } else {
                current = candidate;
            }
        }
        push_line(&mut lines, &current);
    }

    lines
}

fn push_line(lines: &mut Vec<String>, line: &str) {
    let trimmed = line.trim();
    if !trimmed.is_empty() {
        lines.push(trimmed.to_string());
    }
}

/// Wraps `text` to `area_width − 2×margin` and positions each line inside a
/// `area_width × area_height` area. Lines are centered horizontally one by one.
pub fn layout_block<M: TextMeasurer + ?Sized>(
    text: &str,
    measurer: &M,
    area_width: u32,
    area_height: u32,
    style: BlockStyle,
) -> TextBlock {
    let max_width = area_width.saturating_sub(2 * style.margin).max(1);
    let sized: Vec<(String, u32, u32)> = wrap_chars(text, measurer, max_width)
        .into_iter()
        .map(|line| {
            let (w, h) = measurer.line_size(&line);
            (line, w, h)
        })
        .collect();

    let gaps = sized.len().saturating_sub(1) as u32;
    let block_height: u32 =
        sized.iter().map(|(_, _, h)| *h).sum::<u32>() + gaps * style.line_spacing;

    let top = match style.position {
        OverlayPosition::Top => style.margin as i32,
        OverlayPosition::Center => (area_height as i32 - block_height as i32) / 2,
        OverlayPosition::Bottom => area_height as i32 - style.margin as i32 - block_height as i32,
    }
    .max(0);

    let mut y = top;
    let lines = sized
        .into_iter()
        .map(|(text, width, height)| {
            let line = PlacedLine {
                x: (area_width as i32 - width as i32) / 2,
                y,
                text,
                width,
                height,
            };
            y += (height + style.line_spacing) as i32;
            line
        })
        .collect();

    TextBlock {
        lines,
        block_height,
    }
}
