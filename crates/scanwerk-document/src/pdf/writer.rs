// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Searchable PDF writer: page image in an "Image" layer, recognised text in a
// "Text" layer on top, using `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: each page is a `PdfPage` holding a
// `Vec<Op>`, and the document is serialised once via `PdfDocument::save()`.

use std::path::Path;

use ::image::DynamicImage;
use printpdf::{
    BuiltinFont, Cmyk, Color, Layer, LayerInternalId, Mm, Op, PdfDocument, PdfPage,
    PdfSaveOptions, PdfWarnMsg, Point, Pt, RawImage, RawImageData, RawImageFormat, Rgb,
    TextItem, TextRenderingMode, XObjectTransform,
};
use scanwerk_core::config::{LayerConfig, RunConfig, TextLayerConfig};
use scanwerk_core::error::Result;
use scanwerk_core::types::{POINTS_PER_INCH, PlacementInstruction, TextColor};
use tracing::{debug, info, instrument};

use crate::compose::PageLayout;

const MM_PER_INCH: f32 = 25.4;

/// Builds a multi-page searchable PDF one page at a time.
pub struct SearchablePdfWriter {
    doc: PdfDocument,
    pages: Vec<PdfPage>,
    text: TextLayerConfig,
    font: BuiltinFont,
    /// Present only for enabled layers.
    image_layer: Option<LayerInternalId>,
    text_layer: Option<LayerInternalId>,
}

impl SearchablePdfWriter {
    pub fn new(title: &str, layers: LayerConfig, text: TextLayerConfig) -> Self {
        let mut doc = PdfDocument::new(title);
        let image_layer = layers.image.then(|| doc.add_layer(&Layer::new("Image")));
        let text_layer = layers.text.then(|| doc.add_layer(&Layer::new("Text")));
        Self {
            doc,
            pages: Vec::new(),
            text,
            font: BuiltinFont::Helvetica,
            image_layer,
            text_layer,
        }
    }

    pub fn from_config(title: &str, config: &RunConfig) -> Self {
        Self::new(title, config.layers, config.text.clone())
    }

    /// Font used for the text layer; must match the metrics used for fitting.
    pub fn with_font(mut self, font: BuiltinFont) -> Self {
        self.font = font;
        self
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Append one page: `background` drawn over the whole image area, then
    /// each placement as text. Returns the number of text runs drawn.
    #[instrument(
        skip_all,
        fields(
            page = self.pages.len() + 1,
            width = layout.page_width,
            height = layout.page_height
        )
    )]
    pub fn add_page(
        &mut self,
        layout: &PageLayout,
        background: &DynamicImage,
        placements: impl IntoIterator<Item = PlacementInstruction>,
    ) -> usize {
        let mut ops: Vec<Op> = Vec::new();

        if let Some(layer_id) = self.image_layer.clone() {
            let rgb = background.to_rgb8();
            let (width, height) = rgb.dimensions();
            let raw = RawImage {
                pixels: RawImageData::U8(rgb.into_raw()),
                width: width as usize,
                height: height as usize,
                data_format: RawImageFormat::RGB8,
                tag: Vec::new(),
            };
            let xobject_id = self.doc.add_image(&raw);

            ops.push(Op::BeginLayer {
                layer_id: layer_id.clone(),
            });
            ops.push(Op::UseXobject {
                id: xobject_id,
                transform: XObjectTransform {
                    translate_x: Some(Pt(layout.offset_x)),
                    translate_y: Some(Pt(layout.offset_y)),
                    scale_x: Some(layout.scale),
                    scale_y: Some(layout.scale),
                    dpi: Some(POINTS_PER_INCH / layout.points_per_pixel),
                    rotate: None,
                },
            });
            ops.push(Op::EndLayer { layer_id });
        }

        let mut drawn = 0;
        if let Some(layer_id) = self.text_layer.clone() {
            ops.push(Op::BeginLayer {
                layer_id: layer_id.clone(),
            });
            let mode = if self.text.invisible {
                TextRenderingMode::Invisible
            } else {
                TextRenderingMode::Fill
            };
            for placement in placements {
                self.push_text(&mut ops, placement, mode);
                drawn += 1;
            }
            ops.push(Op::EndLayer { layer_id });
        }

        self.pages.push(PdfPage::new(
            pt_to_mm(layout.page_width),
            pt_to_mm(layout.page_height),
            ops,
        ));
        debug!(drawn, "Page composed");
        drawn
    }

    fn push_text(
        &self,
        ops: &mut Vec<Op>,
        placement: PlacementInstruction,
        mode: TextRenderingMode,
    ) {
        ops.push(Op::StartTextSection);
        ops.push(Op::SetTextRenderingMode { mode });
        ops.push(Op::SetFillColor {
            col: pdf_color(placement.color),
        });
        ops.push(Op::SetFontSizeBuiltinFont {
            size: Pt(placement.font_size),
            font: self.font,
        });
        ops.push(Op::SetTextCursor {
            pos: Point {
                x: Pt(placement.x),
                y: Pt(placement.y),
            },
        });
        ops.push(Op::WriteTextBuiltinFont {
            items: vec![TextItem::Text(placement.text)],
            font: self.font,
        });
        ops.push(Op::EndTextSection);
    }

    /// Serialise the document.
    pub fn to_bytes(mut self) -> Vec<u8> {
        let page_count = self.pages.len();
        self.doc.with_pages(self.pages);

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = self.doc.save(&PdfSaveOptions::default(), &mut warnings);
        debug!(
            pages = page_count,
            warnings = warnings.len(),
            bytes = output.len(),
            "PDF serialised"
        );
        output
    }

    /// Serialise and write to `path`.
    pub fn write_to_file(self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.to_bytes();
        std::fs::write(path.as_ref(), &bytes)?;
        info!("Wrote searchable PDF to {}", path.as_ref().display());
        Ok(())
    }
}

fn pt_to_mm(pt: f32) -> Mm {
    Mm(pt * MM_PER_INCH / POINTS_PER_INCH)
}

fn pdf_color(color: TextColor) -> Color {
    match color {
        TextColor::Rgb { r, g, b } => Color::Rgb(Rgb {
            r,
            g,
            b,
            icc_profile: None,
        }),
        TextColor::Cmyk { c, m, y, k } => Color::Cmyk(Cmyk {
            c,
            m,
            y,
            k,
            icc_profile: None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::{GeometryCompositor, PageScaleConfig};
    use ::image::{GrayImage, Luma};
    use scanwerk_core::types::{BoundingBox, TextFragment};

    fn page_image() -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(200, 100, Luma([255u8])))
    }

    fn placements(layout: &PageLayout) -> Vec<PlacementInstruction> {
        let compositor = GeometryCompositor::helvetica(TextColor::default());
        let fragments = vec![TextFragment::new(
            "619121",
            BoundingBox::new(10, 10, 100, 40).expect("box"),
            Some(90.0),
        )];
        compositor.composite_page(&fragments, layout).collect()
    }

    fn operators(bytes: &[u8], page: u32) -> Vec<String> {
        let doc = lopdf::Document::load_mem(bytes).expect("reload");
        let page_id = *doc.get_pages().get(&page).expect("page id");
        doc.get_and_decode_page_content(page_id)
            .expect("content")
            .operations
            .into_iter()
            .map(|op| op.operator)
            .collect()
    }

    #[test]
    fn pages_reload_with_invisible_text() {
        let layout = PageLayout::compute(200, 100, Some(300.0), &PageScaleConfig::default());
        let mut writer =
            SearchablePdfWriter::new("test", LayerConfig::default(), TextLayerConfig::default());
        assert_eq!(writer.add_page(&layout, &page_image(), placements(&layout)), 1);
        writer.add_page(&layout, &page_image(), Vec::new());
        assert_eq!(writer.page_count(), 2);

        let bytes = writer.to_bytes();
        let doc = lopdf::Document::load_mem(&bytes).expect("reload");
        assert_eq!(doc.get_pages().len(), 2);

        let ops = operators(&bytes, 1);
        assert!(ops.iter().any(|op| op == "Do"), "background image drawn");
        assert!(ops.iter().any(|op| op == "Tr"), "rendering mode set");
        assert!(ops.iter().any(|op| op == "Tj" || op == "TJ"), "text shown");
    }

    #[test]
    fn text_only_document_has_no_image() {
        let layout = PageLayout::compute(200, 100, None, &PageScaleConfig::default());
        let mut writer = SearchablePdfWriter::new(
            "text only",
            LayerConfig {
                image: false,
                text: true,
            },
            TextLayerConfig::default(),
        );
        writer.add_page(&layout, &page_image(), placements(&layout));
        let ops = operators(&writer.to_bytes(), 1);
        assert!(!ops.iter().any(|op| op == "Do"));
    }

    #[test]
    fn written_file_is_a_pdf() {
        let dir = tempfile::tempdir().expect("dir");
        let path = dir.path().join("out.pdf");
        let layout = PageLayout::compute(200, 100, None, &PageScaleConfig::default());
        let mut writer =
            SearchablePdfWriter::new("file", LayerConfig::default(), TextLayerConfig::default());
        writer.add_page(&layout, &page_image(), placements(&layout));
        writer.write_to_file(&path).expect("write");

        let bytes = std::fs::read(&path).expect("read back");
        assert!(bytes.starts_with(b"%PDF"));
    }
}
