// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanwerk-document: turns page images into searchable PDFs.
//
// Provides source-image handling (format detection, frame extraction,
// preprocessing), pagination, hOCR parsing, page assembly, the geometry
// compositor with its font-fit search, and the PDF writer, tied together by
// the per-file `OcrPipeline`.

pub mod assemble;
pub mod compose;
pub mod hocr;
pub mod image;
pub mod pagination;
pub mod pdf;
pub mod pipeline;

#[cfg(test)]
mod testing;

// Re-export the primary structs so callers can use `scanwerk_document::OcrPipeline` etc.
pub use assemble::{AssemblyMode, InvocationResult, PageAssembler, assemble};
pub use compose::{FontMetrics, GeometryCompositor, Helvetica, PageLayout, fit_font_size};
pub use hocr::MarkupParser;
pub use image::{FramePreprocessor, SourceImage};
pub use pagination::{PaginationController, PaginationPlan};
pub use pdf::SearchablePdfWriter;
pub use pipeline::{BatchEntry, FileReport, OcrPipeline, RecognizedDocument};
