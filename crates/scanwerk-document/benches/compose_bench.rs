// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the geometry compositor: the font-size search on
// its own and a full page of line fragments.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use scanwerk_core::{BoundingBox, TextColor, TextFragment};
use scanwerk_document::compose::PageScaleConfig;
use scanwerk_document::{GeometryCompositor, Helvetica, PageLayout, fit_font_size};

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Fit a short numeric token and a long line, the two common extremes.
fn bench_font_fit(c: &mut Criterion) {
    c.bench_function("fit_font_size (token)", |b| {
        b.iter(|| fit_font_size(&Helvetica, black_box("619121"), black_box(21.6), black_box(7.2)));
    });

    let line = "The quick brown fox jumps over the lazy dog, twice over.";
    c.bench_function("fit_font_size (line)", |b| {
        b.iter(|| fit_font_size(&Helvetica, black_box(line), black_box(480.0), black_box(36.0)));
    });
}

/// Composite 60 lines on an A4 scan at 300 DPI.
fn bench_composite_page(c: &mut Criterion) {
    let layout = PageLayout::compute(2480, 3508, Some(300.0), &PageScaleConfig::default());
    let fragments: Vec<TextFragment> = (0..60u32)
        .filter_map(|row| {
            let top = 150 + row * 52;
            BoundingBox::new(200, top, 2280, top + 40).map(|bbox| {
                TextFragment::new(format!("Line {row} of the benchmark page"), bbox, Some(91.0))
            })
        })
        .collect();
    let compositor = GeometryCompositor::helvetica(TextColor::default());

    c.bench_function("composite_page (60 lines)", |b| {
        b.iter(|| {
            let placed = compositor.composite_page(black_box(&fragments), &layout).count();
            black_box(placed);
        });
    });
}

criterion_group!(benches, bench_font_fit, bench_composite_page);
criterion_main!(benches);
