//! PDF assembly with lopdf.
//!
//! Each book page becomes one A4 page holding a single raster: the illustration
//! on top and a white panel below with the page text wrapped into it. Text is
//! rasterised with the same font discovery and wrapper as the overlays, so any
//! script the installed fonts cover renders without PDF font embedding.

use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, info, warn};

use crate::errors::BookError;
use crate::layout::font_metrics::{FontLibrary, FontMeasurer};
use crate::layout::overlay::draw_block;
use crate::layout::wrap::{layout_block, BlockStyle, OverlayPosition};
use crate::render::{BookRenderer, RenderPage};

/// A4 in points.
pub const A4_WIDTH: i64 = 595;
pub const A4_HEIGHT: i64 = 842;
pub const PAGE_MARGIN: i64 = 50;

const RASTER_WIDTH: u32 = 1000;
const PANEL_MIN_HEIGHT: u32 = 200;
const PANEL_MARGIN: u32 = 40;
const PANEL_LINE_SPACING: u32 = 12;
const TEXT_COLOR: Rgba<u8> = Rgba([40, 40, 40, 255]);
const JPEG_QUALITY: u8 = 88;

pub struct PdfBookRenderer {
    fonts: FontLibrary,
    font_size: f32,
}

impl PdfBookRenderer {
    pub fn new(fonts: FontLibrary, font_size: f32) -> Self {
        Self { fonts, font_size }
    }

    /// Illustration scaled to `RASTER_WIDTH`, text panel appended below.
    fn compose(&self, page: &RenderPage) -> Result<RgbaImage, BookError> {
        let illustration = image::open(&page.image_path)?.to_rgba8();
        let (w, h) = illustration.dimensions();
        let scaled_height = ((h as f32) * (RASTER_WIDTH as f32) / (w.max(1) as f32)).round() as u32;
        let illustration = imageops::resize(
            &illustration,
            RASTER_WIDTH,
            scaled_height.max(1),
            FilterType::Triangle,
        );

        let text = page.text.trim();
        let font = if text.is_empty() {
            None
        } else {
            self.fonts.select_for(text)
        };
        if font.is_none() && !text.is_empty() {
            warn!("No font covers the text of page {}; text panel left blank", page.page_number);
        }

        let style = BlockStyle {
            margin: PANEL_MARGIN,
            line_spacing: PANEL_LINE_SPACING,
            position: OverlayPosition::Top,
        };
        let block = font.as_ref().map(|font| {
            let measurer = FontMeasurer::new(font, self.font_size);
            layout_block(text, &measurer, RASTER_WIDTH, u32::MAX / 2, style)
        });
        let panel_height = block
            .as_ref()
            .map(|b| b.block_height + 2 * PANEL_MARGIN)
            .unwrap_or(0)
            .max(PANEL_MIN_HEIGHT);

        let illustration_height = illustration.height();
        let mut canvas = RgbaImage::from_pixel(
            RASTER_WIDTH,
            illustration_height + panel_height,
            Rgba([255, 255, 255, 255]),
        );
        imageops::replace(&mut canvas, &illustration, 0, 0);

        if let (Some(font), Some(mut block)) = (font, block) {
            for line in &mut block.lines {
                line.y += illustration_height as i32;
            }
            draw_block(&mut canvas, &block, &font, self.font_size, TEXT_COLOR, false);
        }
        Ok(canvas)
    }

    fn add_page(
        &self,
        doc: &mut Document,
        pages_id: ObjectId,
        page: &RenderPage,
    ) -> Result<ObjectId, BookError> {
        let raster = DynamicImage::ImageRgba8(self.compose(page)?).to_rgb8();
        let (width, height) = raster.dimensions();

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
            .encode_image(&raster)?;

        let image_id = doc.add_object(
            Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width as i64,
                    "Height" => height as i64,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8_i64,
                    "Filter" => "DCTDecode",
                },
                jpeg,
            )
            .with_compression(false),
        );

        // Fit inside the margins, keep aspect, anchor to the top.
        let (avail_w, avail_h) = (A4_WIDTH - 2 * PAGE_MARGIN, A4_HEIGHT - 2 * PAGE_MARGIN);
        let scale = f64::min(
            avail_w as f64 / width as f64,
            avail_h as f64 / height as f64,
        );
        let draw_w = ((width as f64) * scale).round() as i64;
        let draw_h = ((height as f64) * scale).round() as i64;
        let x = PAGE_MARGIN + (avail_w - draw_w) / 2;
        let y = A4_HEIGHT - PAGE_MARGIN - draw_h;

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        draw_w.into(),
                        0.into(),
                        0.into(),
                        draw_h.into(),
                        x.into(),
                        y.into(),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let encoded = content
            .encode()
            .map_err(|e| BookError::Pdf(format!("content stream: {e}")))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

        Ok(doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), A4_WIDTH.into(), A4_HEIGHT.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
        }))
    }
}

impl BookRenderer for PdfBookRenderer {
    fn render(&self, output: &Path, pages: &[RenderPage]) -> Result<(), BookError> {
        if pages.is_empty() {
            return Err(BookError::Pdf("a book needs at least one page".to_string()));
        }

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
        for page in pages {
            let page_id = self.add_page(&mut doc, pages_id, page)?;
            debug!("PDF page added for book page {}", page.page_number);
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        doc.save(output)
            .map_err(|e| BookError::Pdf(format!("{}: {e}", output.display())))?;
        info!("PDF written: {} ({count} pages)", output.display());
        Ok(())
    }
}
