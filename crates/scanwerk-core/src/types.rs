// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Scanwerk OCR pipeline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Points per inch in page space.
pub const POINTS_PER_INCH: f32 = 72.0;

/// Points-per-pixel ratio used when an image carries no usable DPI (96 DPI).
pub const FALLBACK_POINTS_PER_PIXEL: f32 = 0.75;

/// Accepted input image kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageKind {
    Jpeg,
    Png,
    Tiff,
    Bmp,
    Gif,
}

impl ImageKind {
    /// Infer the image kind from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "jpe" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "tif" | "tiff" => Some(Self::Tiff),
            "bmp" => Some(Self::Bmp),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }

    /// Whether this container can hold more than one page frame.
    pub fn supports_multiple_frames(&self) -> bool {
        matches!(self, Self::Tiff)
    }
}

/// What the engine is asked to produce for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputMode {
    /// Page/line/word markup with bounding boxes (hOCR).
    Structured,
    /// Plain recognised text, no geometry.
    PlainText,
}

impl OutputMode {
    /// File extension of the artifact produced in this mode.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Structured => "hocr",
            Self::PlainText => "txt",
        }
    }

    /// Name of the engine output configuration that selects this mode.
    pub fn engine_config_name(&self) -> &'static str {
        match self {
            Self::Structured => "hocr",
            Self::PlainText => "txt",
        }
    }
}

/// Level at which recognised text is turned into fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Granularity {
    /// One fragment per text line (captions, headers and floats included).
    #[default]
    ByLine,
    /// One fragment per word.
    ByWord,
}

impl Granularity {
    const LINE_CLASSES: &'static [&'static str] =
        &["ocr_line", "ocr_caption", "ocr_header", "ocr_textfloat"];
    const WORD_CLASSES: &'static [&'static str] = &["ocrx_word"];

    /// Whether an element with this (space separated) class list is a fragment.
    pub fn matches_class(&self, class_attr: &str) -> bool {
        let wanted = match self {
            Self::ByLine => Self::LINE_CLASSES,
            Self::ByWord => Self::WORD_CLASSES,
        };
        class_attr.split_whitespace().any(|c| wanted.contains(&c))
    }

    /// Split auxiliary plain text into one entry per expected fragment.
    pub fn split_auxiliary(&self, text: &str) -> Vec<String> {
        match self {
            Self::ByLine => text
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
                .collect(),
            Self::ByWord => text.split_whitespace().map(str::to_string).collect(),
        }
    }
}

/// Whether frames are preprocessed (flattened) before invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Preprocessing {
    Enabled,
    Disabled,
}

impl From<bool> for Preprocessing {
    fn from(enabled: bool) -> Self {
        if enabled { Self::Enabled } else { Self::Disabled }
    }
}

/// Page sizing policy for output pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScaleMode {
    /// Page size equals the image size in points.
    #[default]
    Original,
    /// Fixed page; image scaled to the page width.
    FitWidth,
    /// Fixed page; image scaled to the page height.
    FitHeight,
    /// Fixed page; image scaled uniformly to fit and centred.
    FitToBox,
}

/// Standard paper sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaperSize {
    A4,
    A3,
    A5,
    Letter,
    Legal,
    Tabloid,
    Custom { width_mm: u32, height_mm: u32 },
}

impl PaperSize {
    /// Dimensions in millimetres (width, height).
    pub fn dimensions_mm(&self) -> (u32, u32) {
        match self {
            Self::A4 => (210, 297),
            Self::A3 => (297, 420),
            Self::A5 => (148, 210),
            Self::Letter => (216, 279),
            Self::Legal => (216, 356),
            Self::Tabloid => (279, 432),
            Self::Custom {
                width_mm,
                height_mm,
            } => (*width_mm, *height_mm),
        }
    }

    /// Dimensions in points (width, height).
    pub fn dimensions_pt(&self) -> (f32, f32) {
        let (w, h) = self.dimensions_mm();
        (mm_to_pt(w as f32), mm_to_pt(h as f32))
    }
}

fn mm_to_pt(mm: f32) -> f32 {
    mm * POINTS_PER_INCH / 25.4
}

/// Axis-aligned box in source-image pixel space, top-left origin.
///
/// Always satisfies `left < right` and `top < bottom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    left: u32,
    top: u32,
    right: u32,
    bottom: u32,
}

impl BoundingBox {
    /// Build a box, rejecting empty or inverted rectangles.
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Option<Self> {
        (left < right && top < bottom).then_some(Self {
            left,
            top,
            right,
            bottom,
        })
    }

    pub fn left(&self) -> u32 {
        self.left
    }

    pub fn top(&self) -> u32 {
        self.top
    }

    pub fn right(&self) -> u32 {
        self.right
    }

    pub fn bottom(&self) -> u32 {
        self.bottom
    }

    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }
}

/// One recognised text unit with its pixel-space box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
    pub bbox: BoundingBox,
    /// Recognition confidence in `[0, 100]`, when the engine reports one.
    pub confidence: Option<f32>,
}

impl TextFragment {
    pub fn new(text: impl Into<String>, bbox: BoundingBox, confidence: Option<f32>) -> Self {
        Self {
            text: text.into(),
            bbox,
            confidence,
        }
    }
}

/// Fragments of one logical page, tagged with the frame they came from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PageFragments {
    /// Zero-based frame index in the source image.
    pub frame_index: u32,
    pub fragments: Vec<TextFragment>,
}

/// Ordered page-number keyed map with the collision insertion policy.
///
/// Page numbers are 1-based. Inserting at an occupied number places the value
/// at `max(existing) + 1` instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageMap<T> {
    pages: BTreeMap<u32, T>,
}

impl<T> Default for PageMap<T> {
    fn default() -> Self {
        Self {
            pages: BTreeMap::new(),
        }
    }
}

impl<T> PageMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `value` at `page`, or after the last page if `page` is taken.
    /// Returns the page number actually used.
    pub fn insert_page(&mut self, page: u32, value: T) -> u32 {
        let slot = if self.pages.contains_key(&page) {
            self.next_page()
        } else {
            page
        };
        self.pages.insert(slot, value);
        slot
    }

    /// Append after the highest page number.
    pub fn push_page(&mut self, value: T) -> u32 {
        let slot = self.next_page();
        self.pages.insert(slot, value);
        slot
    }

    /// One past the highest page number (1 when empty).
    pub fn next_page(&self) -> u32 {
        self.pages.keys().next_back().map_or(1, |last| last + 1)
    }

    pub fn get(&self, page: u32) -> Option<&T> {
        self.pages.get(&page)
    }

    pub fn page_numbers(&self) -> Vec<u32> {
        self.pages.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.pages.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

impl<T> IntoIterator for PageMap<T> {
    type Item = (u32, T);
    type IntoIter = std::collections::btree_map::IntoIter<u32, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.pages.into_iter()
    }
}

/// Parser output: page number to fragments for one invocation.
pub type ParsedPages = PageMap<Vec<TextFragment>>;

/// Assembled per-file map handed to the compositor.
pub type DocumentFragmentMap = PageMap<PageFragments>;

/// Fill/stroke colour for the text layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "space", rename_all = "lowercase")]
pub enum TextColor {
    Rgb { r: f32, g: f32, b: f32 },
    Cmyk { c: f32, m: f32, y: f32, k: f32 },
}

impl Default for TextColor {
    fn default() -> Self {
        Self::Rgb {
            r: 0.0,
            g: 0.0,
            b: 0.0,
        }
    }
}

impl TextColor {
    /// Whether every channel lies in `[0, 1]`.
    pub fn is_valid(&self) -> bool {
        let in_unit = |v: f32| (0.0..=1.0).contains(&v);
        match *self {
            Self::Rgb { r, g, b } => [r, g, b].into_iter().all(in_unit),
            Self::Cmyk { c, m, y, k } => [c, m, y, k].into_iter().all(in_unit),
        }
    }
}

/// Where and how to draw one fragment, in page-space points (bottom-left origin).
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementInstruction {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
    pub page_width: f32,
    pub page_height: f32,
    pub color: TextColor,
}
