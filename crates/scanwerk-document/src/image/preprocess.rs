// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page preprocessing ahead of recognition: grayscale, despeckle, contrast
// stretch and Otsu binarisation, written out as a single-frame PNG.

use ::image::{DynamicImage, GrayImage, ImageFormat};
use imageproc::contrast::{ThresholdType, otsu_level, threshold_mut};
use imageproc::filter::median_filter;
use imageproc::stats::cumulative_histogram;
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_engine::{TempArtifact, TempScope};
use tracing::{debug, info, instrument};

/// Fraction of pixels clipped at each end of the histogram when stretching.
const STRETCH_CLIP: f64 = 0.02;

/// Cleans one page frame for the OCR engine.
///
/// Each step consumes and returns the preprocessor so steps chain:
///
/// ```ignore
/// let cleaned = FramePreprocessor::from_dynamic(&frame)
///     .despeckle()
///     .stretch_contrast()
///     .binarize_otsu();
/// ```
pub struct FramePreprocessor {
    image: GrayImage,
}

impl FramePreprocessor {
    /// Start from any decoded frame; colour is dropped immediately.
    pub fn from_dynamic(image: &DynamicImage) -> Self {
        Self {
            image: image.to_luma8(),
        }
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.image
    }

    /// 3x3 median filter to remove isolated scanner noise.
    pub fn despeckle(self) -> Self {
        Self {
            image: median_filter(&self.image, 1, 1),
        }
    }

    /// Linearly stretch the 2nd..98th percentile range to the full 0..255 range.
    pub fn stretch_contrast(self) -> Self {
        let (low, high) = percentile_bounds(&self.image, STRETCH_CLIP);
        if high <= low {
            debug!(low, high, "Flat histogram; contrast stretch skipped");
            return self;
        }
        let span = f32::from(high - low);
        let mut image = self.image;
        for pixel in image.pixels_mut() {
            let v = f32::from(pixel.0[0].clamp(low, high) - low);
            pixel.0[0] = (v * 255.0 / span).round() as u8;
        }
        Self { image }
    }

    /// Global binarisation: levels up to the Otsu level go black.
    pub fn binarize_otsu(self) -> Self {
        let level = otsu_level(&self.image);
        debug!(level, "Otsu level computed");
        let mut image = self.image;
        threshold_mut(&mut image, level, ThresholdType::Binary);
        Self { image }
    }

    /// Run every step in order.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn clean(image: &DynamicImage) -> Self {
        info!("Preprocessing frame");
        Self::from_dynamic(image)
            .despeckle()
            .stretch_contrast()
            .binarize_otsu()
    }

    /// Write the current image as PNG into `scope`.
    pub fn write_png(&self, scope: &TempScope) -> Result<TempArtifact> {
        let artifact = scope.allocate("png");
        self.image
            .save_with_format(artifact.path(), ImageFormat::Png)
            .map_err(|err| {
                ScanwerkError::ImageError(format!("failed to write preprocessed frame: {err}"))
            })?;
        Ok(artifact)
    }
}

/// Gray levels below which `clip` and above which `clip` of pixels fall.
fn percentile_bounds(gray: &GrayImage, clip: f64) -> (u8, u8) {
    let cumulative = &cumulative_histogram(gray).channels[0];
    let total = u64::from(cumulative[255]);
    if total == 0 {
        return (0, 255);
    }
    let cutoff = (total as f64 * clip) as u64;
    let below = |level: usize| match level {
        0 => 0,
        _ => u64::from(cumulative[level - 1]),
    };

    let low = (0..256)
        .find(|&level| u64::from(cumulative[level]) > cutoff)
        .unwrap_or(0);
    let high = (0..256)
        .rev()
        .find(|&level| total - below(level) > cutoff)
        .unwrap_or(255);
    (low as u8, high as u8)
}
