// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-file OCR pipeline: pagination, invocation, parsing, assembly, then
// compositing into a searchable PDF.
//
// Each page is processed to completion before the next begins. A pipeline
// owns its engine pool and temp scope, so callers running files in parallel
// give every worker its own pipeline.

use std::path::{Path, PathBuf};

use scanwerk_core::config::RunConfig;
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::{DocumentFragmentMap, OutputMode};
use scanwerk_engine::{EnginePool, InvocationRequest, TempScope};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::assemble::{InvocationResult, PageAssembler};
use crate::compose::{FontMetrics, GeometryCompositor, PageLayout, PageScaleConfig};
use crate::hocr::MarkupParser;
use crate::image::SourceImage;
use crate::pagination::PaginationController;
use crate::pdf::SearchablePdfWriter;

/// Recognition result for one input file, before rendering.
#[derive(Debug, Clone)]
pub struct RecognizedDocument {
    pub source: SourceImage,
    pub pages: DocumentFragmentMap,
}

impl RecognizedDocument {
    pub fn fragment_count(&self) -> usize {
        self.pages.iter().map(|(_, page)| page.fragments.len()).sum()
    }
}

/// Outcome of one successfully processed file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub pages: usize,
    pub fragments: usize,
    /// Text runs drawn; fragments with degenerate geometry are not drawn.
    pub placements: usize,
}

/// One file of a batch and what became of it.
#[derive(Debug)]
pub struct BatchEntry {
    pub input: PathBuf,
    pub output: PathBuf,
    pub result: Result<FileReport>,
}

impl BatchEntry {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct OcrPipeline {
    config: RunConfig,
    pool: EnginePool,
    scope: TempScope,
    parser: MarkupParser,
    pagination: PaginationController,
    compositor: GeometryCompositor,
}

impl OcrPipeline {
    /// Build a pipeline with the engine backend named in `config`.
    pub fn new(config: RunConfig) -> Result<Self> {
        config.validate()?;
        let pool = EnginePool::from_config(&config.engine)?;
        Self::with_pool(config, pool)
    }

    /// Build a pipeline around an existing engine pool.
    pub fn with_pool(config: RunConfig, pool: EnginePool) -> Result<Self> {
        config.validate()?;
        let scope = TempScope::new()?;
        Ok(Self {
            parser: MarkupParser::from_config(&config),
            pagination: PaginationController::new(config.preprocessing()),
            compositor: GeometryCompositor::helvetica(config.text.color),
            config,
            pool,
            scope,
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Directory holding this pipeline's transient artifacts.
    pub fn temp_dir(&self) -> &Path {
        self.scope.path()
    }

    /// Run OCR over every planned frame of `input` and assemble the pages.
    ///
    /// Frames that do not exist are skipped with a warning. Any fatal error,
    /// including an engine failure on a single frame, aborts the file.
    #[instrument(skip(self), fields(input = %input.display()))]
    pub fn recognize(&self, input: &Path) -> Result<RecognizedDocument> {
        let source = SourceImage::open(input)?;
        let plan = self
            .pagination
            .plan(&source, self.config.frames.as_deref());

        self.pool.acquire()?.check_resources()?;

        let dpi = source.dpi().map(|dpi| dpi.round() as u32);
        let mut assembler = PageAssembler::new(plan.assembly);

        for frame_index in plan.frames {
            let prepared = match self.pagination.prepare(&source, frame_index, &self.scope) {
                Ok(prepared) => prepared,
                Err(err) if !err.is_fatal() => {
                    warn!(frame = frame_index, error = %err, "Frame skipped");
                    continue;
                }
                Err(err) => return Err(err),
            };

            let mut request =
                InvocationRequest::new(prepared.image_path(), frame_index, OutputMode::Structured)
                    .with_dpi(dpi);
            if self.config.auxiliary_text {
                request = request.with_auxiliary_text();
            }

            // One handle per call; the guard returns it to the pool afterwards.
            let artifacts = {
                let mut engine = self.pool.acquire()?;
                engine.invoke(&request, &self.scope)?
            };
            let pages = self.parser.parse_artifacts(&artifacts)?;
            let page = assembler.push(InvocationResult::new(frame_index, pages));
            info!(frame = frame_index, page, "Frame recognised");
        }

        Ok(RecognizedDocument {
            source,
            pages: assembler.finish(),
        })
    }

    /// Composite a recognised document into a PDF at `output`.
    ///
    /// Nothing is written unless every page renders.
    #[instrument(
        skip(self, document),
        fields(output = %output.display(), pages = document.pages.len())
    )]
    pub fn render(&self, document: &RecognizedDocument, output: &Path) -> Result<usize> {
        if document.pages.is_empty() {
            return Err(ScanwerkError::PdfError(format!(
                "no pages recognised in {}",
                document.source.path().display()
            )));
        }

        let title = document
            .source
            .path()
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Scanwerk".to_string());
        let mut writer = SearchablePdfWriter::from_config(&title, &self.config)
            .with_font(self.compositor.metrics().builtin_font());
        let scale = PageScaleConfig::from(&self.config);

        let mut placements = 0;
        for (_, page) in document.pages.iter() {
            let background = document.source.load_frame(page.frame_index)?;
            let layout = PageLayout::compute(
                background.width(),
                background.height(),
                document.source.dpi(),
                &scale,
            );
            placements += writer.add_page(
                &layout,
                &background,
                self.compositor.composite_page(&page.fragments, &layout),
            );
        }

        writer.write_to_file(output)?;
        Ok(placements)
    }

    /// Recognise `input` and write its searchable PDF to `output`.
    #[instrument(skip(self), fields(input = %input.display(), output = %output.display()))]
    pub fn process_file(&self, input: &Path, output: &Path) -> Result<FileReport> {
        let document = self.recognize(input)?;
        let placements = self.render(&document, output)?;

        let report = FileReport {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            pages: document.pages.len(),
            fragments: document.fragment_count(),
            placements,
        };
        info!(pages = report.pages, fragments = report.fragments, "File processed");
        Ok(report)
    }

    /// Process each `(input, output)` pair independently, in order.
    pub fn process_batch(&self, jobs: &[(PathBuf, PathBuf)]) -> Vec<BatchEntry> {
        jobs.iter()
            .map(|(input, output)| {
                let result = self.process_file(input, output);
                if let Err(err) = &result {
                    error!(input = %input.display(), error = %err, "File failed");
                }
                BatchEntry {
                    input: input.clone(),
                    output: output.clone(),
                    result,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use crate::testing::{scripted_pool, single_use_pool, write_multipage_tiff, write_png};

    fn temp_is_empty(pipeline: &OcrPipeline) -> bool {
        std::fs::read_dir(pipeline.temp_dir())
            .expect("temp dir")
            .next()
            .is_none()
    }

    #[test]
    fn multi_frame_tiff_yields_contiguous_pages() {
        let dir = tempfile::tempdir().expect("dir");
        let input = dir.path().join("three.tiff");
        write_multipage_tiff(&input, 3);

        let (pool, seen) = scripted_pool(&[]);
        let pipeline = OcrPipeline::with_pool(RunConfig::default(), pool).expect("pipeline");
        let document = pipeline.recognize(&input).expect("recognize");

        assert_eq!(document.pages.page_numbers(), vec![1, 2, 3]);
        for (page, fragments) in document.pages.iter() {
            assert_eq!(fragments.frame_index, page - 1);
            assert_eq!(fragments.fragments[0].text, format!("frame{}", page - 1));
        }

        let frames: Vec<u32> = seen.lock().expect("seen").iter().map(|(f, _)| *f).collect();
        assert_eq!(frames, vec![0, 1, 2]);
        assert!(temp_is_empty(&pipeline));
    }

    #[test]
    fn stale_handle_replaced_between_frames() {
        let dir = tempfile::tempdir().expect("dir");
        let input = dir.path().join("three.tiff");
        write_multipage_tiff(&input, 3);

        let (pool, built) = single_use_pool();
        let pipeline = OcrPipeline::with_pool(RunConfig::default(), pool).expect("pipeline");
        let document = pipeline.recognize(&input).expect("recognize");

        assert_eq!(document.pages.page_numbers(), vec![1, 2, 3]);
        assert_eq!(built.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn engine_failure_aborts_file_without_output() {
        let dir = tempfile::tempdir().expect("dir");
        let input = dir.path().join("three.tiff");
        let output = dir.path().join("three.pdf");
        write_multipage_tiff(&input, 3);

        let (pool, _) = scripted_pool(&[1]);
        let pipeline = OcrPipeline::with_pool(RunConfig::default(), pool).expect("pipeline");
        let err = pipeline.process_file(&input, &output).expect_err("frame 1 fails");

        assert!(matches!(err, ScanwerkError::EngineInvocationFailed { .. }));
        assert!(!output.exists());
        assert!(temp_is_empty(&pipeline));
    }

    #[test]
    fn processed_file_has_one_pdf_page_per_frame() {
        let dir = tempfile::tempdir().expect("dir");
        let input = dir.path().join("three.tiff");
        let output = dir.path().join("three.pdf");
        write_multipage_tiff(&input, 3);

        let (pool, _) = scripted_pool(&[]);
        let pipeline = OcrPipeline::with_pool(RunConfig::default(), pool).expect("pipeline");
        let report = pipeline.process_file(&input, &output).expect("process");

        assert_eq!(report.pages, 3);
        assert_eq!(report.fragments, 3);
        assert_eq!(report.placements, 3);
        let bytes = std::fs::read(&output).expect("pdf");
        let pdf = lopdf::Document::load_mem(&bytes).expect("reload");
        assert_eq!(pdf.get_pages().len(), 3);
    }

    #[test]
    fn single_frame_image_is_read_in_place() {
        let dir = tempfile::tempdir().expect("dir");
        let input = dir.path().join("page.png");
        write_png(&input, 64, 32);

        let (pool, seen) = scripted_pool(&[]);
        let pipeline = OcrPipeline::with_pool(RunConfig::default(), pool).expect("pipeline");
        let document = pipeline.recognize(&input).expect("recognize");

        assert_eq!(document.pages.page_numbers(), vec![1]);
        assert_eq!(seen.lock().expect("seen")[0].1, input);
    }

    #[test]
    fn preprocessing_feeds_cleaned_copies() {
        let dir = tempfile::tempdir().expect("dir");
        let input = dir.path().join("three.tiff");
        write_multipage_tiff(&input, 3);

        let config = RunConfig {
            preprocess: true,
            ..RunConfig::default()
        };
        let (pool, seen) = scripted_pool(&[]);
        let pipeline = OcrPipeline::with_pool(config, pool).expect("pipeline");
        let document = pipeline.recognize(&input).expect("recognize");

        assert_eq!(document.pages.len(), 3);
        let seen = seen.lock().expect("seen");
        assert!(seen.iter().all(|(_, image)| image != &input));
        assert!(seen.iter().all(|(_, image)| image.starts_with(pipeline.temp_dir())));
        assert!(temp_is_empty(&pipeline));
    }

    #[test]
    fn out_of_range_frames_are_skipped() {
        let dir = tempfile::tempdir().expect("dir");
        let input = dir.path().join("three.tiff");
        write_multipage_tiff(&input, 3);

        let config = RunConfig {
            frames: Some(vec![7, 2]),
            ..RunConfig::default()
        };
        let (pool, seen) = scripted_pool(&[]);
        let pipeline = OcrPipeline::with_pool(config, pool).expect("pipeline");
        let document = pipeline.recognize(&input).expect("recognize");

        assert_eq!(document.pages.page_numbers(), vec![1]);
        assert_eq!(document.pages.get(1).map(|p| p.frame_index), Some(2));
        assert_eq!(seen.lock().expect("seen").len(), 1);
    }

    #[test]
    fn batch_continues_past_a_bad_file() {
        let dir = tempfile::tempdir().expect("dir");
        let bad = dir.path().join("notes.txt");
        std::fs::write(&bad, "not an image").expect("write");
        let good = dir.path().join("page.png");
        write_png(&good, 64, 32);

        let jobs = vec![
            (bad.clone(), dir.path().join("notes.pdf")),
            (good.clone(), dir.path().join("page.pdf")),
        ];
        let (pool, _) = scripted_pool(&[]);
        let pipeline = OcrPipeline::with_pool(RunConfig::default(), pool).expect("pipeline");
        let entries = pipeline.process_batch(&jobs);

        assert!(matches!(
            entries[0].result,
            Err(ScanwerkError::UnsupportedInputFormat(_))
        ));
        assert!(entries[1].is_ok());
        assert!(dir.path().join("page.pdf").exists());
        assert!(!dir.path().join("notes.pdf").exists());
    }

    #[test]
    fn invalid_configuration_rejected_up_front() {
        let config = RunConfig {
            auxiliary_text: true,
            min_confidence: 50.0,
            ..RunConfig::default()
        };
        let (pool, _) = scripted_pool(&[]);
        assert!(matches!(
            OcrPipeline::with_pool(config, pool),
            Err(ScanwerkError::InvalidConfiguration(_))
        ));
    }
}
