// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pixel-space to page-space geometry.
//
// Image boxes are top-left-origin pixels; pages are bottom-left-origin points.
// A page layout fixes the conversion ratio, the image scale and the image's
// offset on the page; every fragment on that page goes through the same layout.

use scanwerk_core::config::RunConfig;
use scanwerk_core::types::{
    BoundingBox, FALLBACK_POINTS_PER_PIXEL, POINTS_PER_INCH, PaperSize, ScaleMode,
};
use serde::{Deserialize, Serialize};

/// Page sizing settings shared by every page of a document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageScaleConfig {
    pub mode: ScaleMode,
    /// Page size for the fixed-size modes.
    pub paper: PaperSize,
    /// Resolution assumed when the image has none.
    pub fallback_dpi: f32,
}

impl Default for PageScaleConfig {
    fn default() -> Self {
        Self {
            mode: ScaleMode::Original,
            paper: PaperSize::A4,
            fallback_dpi: POINTS_PER_INCH / FALLBACK_POINTS_PER_PIXEL,
        }
    }
}

impl From<&RunConfig> for PageScaleConfig {
    fn from(config: &RunConfig) -> Self {
        Self {
            mode: config.scale,
            paper: config.paper,
            fallback_dpi: config.fallback_dpi,
        }
    }
}

/// Points per pixel for an image of the given resolution.
///
/// Uses `72 / dpi` when `dpi` is positive, else `72 / fallback_dpi`, and the
/// fixed 0.75 ratio when neither is usable.
pub fn points_per_pixel(dpi: Option<f32>, fallback_dpi: f32) -> f32 {
    match dpi {
        Some(dpi) if dpi.is_finite() && dpi > 0.0 => POINTS_PER_INCH / dpi,
        _ if fallback_dpi.is_finite() && fallback_dpi > 0.0 => POINTS_PER_INCH / fallback_dpi,
        _ => FALLBACK_POINTS_PER_PIXEL,
    }
}

/// Where one image sits on its output page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    pub page_width: f32,
    pub page_height: f32,
    /// Points per source pixel before scaling.
    pub points_per_pixel: f32,
    /// Unscaled image size in points.
    pub image_width_pt: f32,
    pub image_height_pt: f32,
    /// Uniform scale applied to the image and every box.
    pub scale: f32,
    /// Lower-left corner of the scaled image on the page.
    pub offset_x: f32,
    pub offset_y: f32,
}

impl PageLayout {
    /// Lay out an image of `width` x `height` pixels.
    ///
    /// - `Original`: page equals the image in points, no scaling.
    /// - `FitWidth`: fixed page, image scaled to the page width, top aligned.
    /// - `FitHeight`: fixed page, image scaled to the page height, left aligned.
    /// - `FitToBox`: fixed page, `min` of both ratios, centred.
    pub fn compute(width: u32, height: u32, dpi: Option<f32>, config: &PageScaleConfig) -> Self {
        let ppp = points_per_pixel(dpi, config.fallback_dpi);
        let image_w = width as f32 * ppp;
        let image_h = height as f32 * ppp;

        if config.mode == ScaleMode::Original || image_w <= 0.0 || image_h <= 0.0 {
            return Self {
                page_width: image_w,
                page_height: image_h,
                points_per_pixel: ppp,
                image_width_pt: image_w,
                image_height_pt: image_h,
                scale: 1.0,
                offset_x: 0.0,
                offset_y: 0.0,
            };
        }

        let (page_w, page_h) = config.paper.dimensions_pt();
        let width_ratio = page_w / image_w;
        let height_ratio = page_h / image_h;

        let (scale, offset_x, offset_y) = match config.mode {
            ScaleMode::FitWidth => (width_ratio, 0.0, page_h - image_h * width_ratio),
            ScaleMode::FitHeight => (height_ratio, 0.0, 0.0),
            ScaleMode::FitToBox => {
                let scale = width_ratio.min(height_ratio);
                (
                    scale,
                    (page_w - image_w * scale) / 2.0,
                    (page_h - image_h * scale) / 2.0,
                )
            }
            ScaleMode::Original => (1.0, 0.0, 0.0),
        };

        Self {
            page_width: page_w,
            page_height: page_h,
            points_per_pixel: ppp,
            image_width_pt: image_w,
            image_height_pt: image_h,
            scale,
            offset_x,
            offset_y,
        }
    }

    /// Box converted to page space.
    pub fn place(&self, bbox: &BoundingBox) -> PageRect {
        let k = self.points_per_pixel * self.scale;
        let bottom_pt = bbox.bottom() as f32 * self.points_per_pixel;
        PageRect {
            x: self.offset_x + bbox.left() as f32 * k,
            y: self.offset_y + (self.image_height_pt - bottom_pt) * self.scale,
            width: bbox.width() as f32 * k,
            height: bbox.height() as f32 * k,
        }
    }
}

/// A box in page space: lower-left corner plus size, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}
