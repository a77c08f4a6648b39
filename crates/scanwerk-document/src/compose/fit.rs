// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Font-size search: find the size at which a fragment's text spans its box.

use tracing::{debug, warn};

use super::metrics::FontMetrics;

/// Accepted difference between rendered and target width, in points.
pub const FIT_TOLERANCE_PT: f32 = 1.0;

/// First step of the outward search, in points; it doubles after every try.
pub const FIT_STEP_PT: f32 = 0.5;

/// Hard stop on width evaluations.
const MAX_ITERATIONS: u32 = 200;

/// Result of a font-size search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontFit {
    pub size: f32,
    /// Rendered width at `size`.
    pub width: f32,
    pub iterations: u32,
}

impl FontFit {
    fn accept(size: f32, width: f32, iterations: u32, target_width: f32) -> Self {
        debug!(size, width, target_width, iterations, "Font size fitted");
        Self {
            size,
            width,
            iterations,
        }
    }
}

/// Search for the font size at which `text` renders `target_width` wide.
///
/// Starts at `box_height` and steps outward with a doubling step until the
/// target width is bracketed, then bisects the bracket until the rendered
/// width is within [`FIT_TOLERANCE_PT`]. Rendered width must grow with size.
/// Returns `None` for blank text or a non-positive box.
pub fn fit_font_size(
    metrics: &dyn FontMetrics,
    text: &str,
    target_width: f32,
    box_height: f32,
) -> Option<FontFit> {
    if text.trim().is_empty() || !(target_width > 0.0) || !(box_height > 0.0) {
        return None;
    }
    let within = |width: f32| (width - target_width).abs() < FIT_TOLERANCE_PT;

    let start_width = metrics.text_width(text, box_height);
    if within(start_width) {
        return Some(FontFit::accept(box_height, start_width, 0, target_width));
    }

    let growing = start_width < target_width;
    let mut iterations = 0;
    let (mut near, mut near_width) = (box_height, start_width);
    let mut step = FIT_STEP_PT;

    let (mut low, mut high) = loop {
        if iterations == MAX_ITERATIONS {
            warn!(text, target_width, size = near, "Font fit never bracketed the target");
            return Some(FontFit::accept(near, near_width, iterations, target_width));
        }
        iterations += 1;

        // Shrinking halves instead of stepping to a non-positive size.
        let candidate = match growing {
            true => near + step,
            false if near - step > 0.0 => near - step,
            false => near / 2.0,
        };
        let width = metrics.text_width(text, candidate);
        if within(width) {
            return Some(FontFit::accept(candidate, width, iterations, target_width));
        }
        if growing != (width < target_width) {
            break if growing { (near, candidate) } else { (candidate, near) };
        }
        (near, near_width) = (candidate, width);
        step *= 2.0;
    };

    loop {
        let mid = (low + high) / 2.0;
        let width = metrics.text_width(text, mid);
        if iterations == MAX_ITERATIONS || mid <= low || mid >= high {
            warn!(text, target_width, size = mid, width, "Font fit ran out of precision");
            return Some(FontFit::accept(mid, width, iterations, target_width));
        }
        iterations += 1;
        if within(width) {
            return Some(FontFit::accept(mid, width, iterations, target_width));
        }
        if width < target_width {
            low = mid;
        } else {
            high = mid;
        }
    }
}
