// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Geometry compositor: recognised fragments to page-space placement
// instructions.

pub mod fit;
pub mod geometry;
pub mod metrics;

pub use fit::{FontFit, fit_font_size};
pub use geometry::{PageLayout, PageRect, PageScaleConfig, points_per_pixel};
pub use metrics::{FontMetrics, Helvetica};

use scanwerk_core::types::{PlacementInstruction, TextColor, TextFragment};
use tracing::trace;

/// Turns fragments into placement instructions for one font and colour.
pub struct GeometryCompositor<M: FontMetrics = Helvetica> {
    metrics: M,
    color: TextColor,
}

impl GeometryCompositor<Helvetica> {
    pub fn helvetica(color: TextColor) -> Self {
        Self::new(Helvetica, color)
    }
}

impl<M: FontMetrics> GeometryCompositor<M> {
    pub fn new(metrics: M, color: TextColor) -> Self {
        Self { metrics, color }
    }

    pub fn metrics(&self) -> &M {
        &self.metrics
    }

    /// Placement for one fragment, or `None` when it is degenerate (blank
    /// text or a box with no extent in page space).
    pub fn composite(
        &self,
        fragment: &TextFragment,
        layout: &PageLayout,
    ) -> Option<PlacementInstruction> {
        let rect = layout.place(&fragment.bbox);
        let Some(fit) = fit_font_size(&self.metrics, &fragment.text, rect.width, rect.height) else {
            trace!(text = %fragment.text, "Degenerate fragment skipped");
            return None;
        };
        Some(PlacementInstruction {
            text: fragment.text.clone(),
            x: rect.x,
            y: rect.y,
            font_size: fit.size,
            page_width: layout.page_width,
            page_height: layout.page_height,
            color: self.color,
        })
    }

    /// Placements for a page, in fragment order, produced lazily.
    pub fn composite_page<'a>(
        &'a self,
        fragments: &'a [TextFragment],
        layout: &'a PageLayout,
    ) -> impl Iterator<Item = PlacementInstruction> + 'a {
        fragments
            .iter()
            .filter_map(move |fragment| self.composite(fragment, layout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanwerk_core::types::BoundingBox;

    fn fragment(text: &str, l: u32, t: u32, r: u32, b: u32) -> TextFragment {
        TextFragment::new(text, BoundingBox::new(l, t, r, b).expect("box"), None)
    }

    #[test]
    fn single_fragment_at_300_dpi() {
        // 1000 x 500 px single-frame JPEG at 300 DPI, original scale.
        let layout = PageLayout::compute(1000, 500, Some(300.0), &PageScaleConfig::default());
        let compositor = GeometryCompositor::helvetica(TextColor::default());

        let placement = compositor
            .composite(&fragment("619121", 10, 10, 100, 40), &layout)
            .expect("placement");

        let image_height_pts = 500.0 * 72.0 / 300.0;
        assert!((placement.y - (image_height_pts - 40.0 * 72.0 / 300.0)).abs() < 1e-3);
        assert!((placement.x - 10.0 * 72.0 / 300.0).abs() < 1e-3);
        assert!((placement.page_height - image_height_pts).abs() < 1e-3);

        let rendered = Helvetica.text_width("619121", placement.font_size);
        assert!((rendered - 90.0 * 72.0 / 300.0).abs() < 1.0);
    }

    #[test]
    fn order_preserved_and_degenerates_skipped() {
        let layout = PageLayout::compute(400, 300, None, &PageScaleConfig::default());
        let compositor = GeometryCompositor::helvetica(TextColor::Cmyk {
            c: 0.0,
            m: 0.0,
            y: 0.0,
            k: 1.0,
        });
        let fragments = vec![
            fragment("first", 0, 0, 100, 20),
            fragment("", 0, 30, 100, 50),
            fragment("  ", 0, 60, 100, 80),
            fragment("second", 0, 90, 100, 110),
        ];

        let placed: Vec<_> = compositor.composite_page(&fragments, &layout).collect();
        let texts: Vec<&str> = placed.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
        assert!(placed.iter().all(|p| matches!(p.color, TextColor::Cmyk { .. })));
        assert!(placed[0].y > placed[1].y);
    }
}
