// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pagination: how many invocations a source image needs and which frame
// each one reads.

use std::path::{Path, PathBuf};

use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::Preprocessing;
use scanwerk_engine::{TempArtifact, TempScope};
use tracing::{debug, instrument};

use crate::assemble::AssemblyMode;
use crate::image::{FramePreprocessor, SourceImage};

/// Frames to invoke, in ascending order, and how their results combine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationPlan {
    pub frames: Vec<u32>,
    pub assembly: AssemblyMode,
}

impl PaginationPlan {
    pub fn invocation_count(&self) -> usize {
        self.frames.len()
    }
}

/// The single-frame image an invocation reads.
///
/// Holds the temp guard when the frame had to be written out, so the file
/// lives exactly as long as the invocation needs it.
#[derive(Debug)]
pub struct PreparedFrame {
    pub frame_index: u32,
    image: PathBuf,
    artifact: Option<TempArtifact>,
}

impl PreparedFrame {
    pub fn image_path(&self) -> &Path {
        &self.image
    }

    /// Whether the engine reads a temporary copy rather than the input file.
    pub fn is_extracted(&self) -> bool {
        self.artifact.is_some()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PaginationController {
    preprocessing: Preprocessing,
}

impl PaginationController {
    pub fn new(preprocessing: Preprocessing) -> Self {
        Self { preprocessing }
    }

    /// Plan the invocations for `source`.
    ///
    /// Without preprocessing each frame of a multi-frame image is invoked
    /// separately. With preprocessing every frame is still visited, but each
    /// invocation sees one flattened frame. A `selection` restricts the
    /// frames; indices past the end are kept so preparation reports them.
    pub fn plan(&self, source: &SourceImage, selection: Option<&[u32]>) -> PaginationPlan {
        let assembly = match self.preprocessing {
            Preprocessing::Enabled => AssemblyMode::Flattened,
            Preprocessing::Disabled => AssemblyMode::PerFrame,
        };

        let mut frames: Vec<u32> = match selection {
            Some(selected) => selected.to_vec(),
            None if source.kind().supports_multiple_frames() => (0..source.frame_count()).collect(),
            None => vec![0],
        };
        frames.sort_unstable();
        frames.dedup();

        debug!(?frames, ?assembly, "Pagination planned");
        PaginationPlan { frames, assembly }
    }

    /// Produce the image the engine reads for `frame_index`.
    ///
    /// Fails with `PageIndexOutOfRange` when the frame does not exist.
    #[instrument(skip(self, source, scope), fields(path = %source.path().display()))]
    pub fn prepare(
        &self,
        source: &SourceImage,
        frame_index: u32,
        scope: &TempScope,
    ) -> Result<PreparedFrame> {
        match self.preprocessing {
            Preprocessing::Enabled => {
                let frame = source.load_frame(frame_index)?;
                let artifact = FramePreprocessor::clean(&frame).write_png(scope)?;
                Ok(PreparedFrame {
                    frame_index,
                    image: artifact.path().to_path_buf(),
                    artifact: Some(artifact),
                })
            }
            Preprocessing::Disabled if source.is_multi_frame() => {
                let artifact = source.extract_frame(frame_index, scope)?;
                Ok(PreparedFrame {
                    frame_index,
                    image: artifact.path().to_path_buf(),
                    artifact: Some(artifact),
                })
            }
            Preprocessing::Disabled => {
                // Single frame: the engine reads the input file directly.
                if frame_index >= source.frame_count() {
                    return Err(ScanwerkError::PageIndexOutOfRange {
                        index: frame_index,
                        frame_count: source.frame_count(),
                    });
                }
                Ok(PreparedFrame {
                    frame_index,
                    image: source.path().to_path_buf(),
                    artifact: None,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{write_multipage_tiff, write_png};

    #[test]
    fn multi_frame_without_preprocessing_plans_each_frame() {
        let dir = tempfile::tempdir().expect("dir");
        let path = dir.path().join("three.tiff");
        write_multipage_tiff(&path, 3);
        let source = SourceImage::open(&path).expect("open");

        let plan = PaginationController::new(Preprocessing::Disabled).plan(&source, None);
        assert_eq!(plan.frames, vec![0, 1, 2]);
        assert_eq!(plan.assembly, AssemblyMode::PerFrame);
    }

    #[test]
    fn preprocessing_visits_every_frame_flattened() {
        let dir = tempfile::tempdir().expect("dir");
        let path = dir.path().join("three.tiff");
        write_multipage_tiff(&path, 3);
        let source = SourceImage::open(&path).expect("open");
        let controller = PaginationController::new(Preprocessing::Enabled);

        let plan = controller.plan(&source, None);
        assert_eq!(plan.invocation_count(), 3);
        assert_eq!(plan.assembly, AssemblyMode::Flattened);

        let scope = TempScope::new().expect("scope");
        let prepared = controller.prepare(&source, 1, &scope).expect("prepare");
        assert!(prepared.is_extracted());
        let flattened = SourceImage::open(prepared.image_path()).expect("reopen");
        assert_eq!(flattened.frame_count(), 1);
    }

    #[test]
    fn single_frame_is_one_invocation_on_the_original() {
        let dir = tempfile::tempdir().expect("dir");
        let path = dir.path().join("page.png");
        write_png(&path, 30, 20);
        let source = SourceImage::open(&path).expect("open");
        let controller = PaginationController::new(Preprocessing::Disabled);

        assert_eq!(controller.plan(&source, None).frames, vec![0]);
        let scope = TempScope::new().expect("scope");
        let prepared = controller.prepare(&source, 0, &scope).expect("prepare");
        assert_eq!(prepared.image_path(), path.as_path());
        assert!(!prepared.is_extracted());
    }

    #[test]
    fn selection_is_sorted_and_out_of_range_reported() {
        let dir = tempfile::tempdir().expect("dir");
        let path = dir.path().join("two.tiff");
        write_multipage_tiff(&path, 2);
        let source = SourceImage::open(&path).expect("open");
        let controller = PaginationController::new(Preprocessing::Disabled);

        let plan = controller.plan(&source, Some(&[4, 0, 0]));
        assert_eq!(plan.frames, vec![0, 4]);

        let scope = TempScope::new().expect("scope");
        assert!(matches!(
            controller.prepare(&source, 4, &scope),
            Err(ScanwerkError::PageIndexOutOfRange { index: 4, frame_count: 2 })
        ));
    }

    #[test]
    fn extracted_frame_removed_with_prepared_frame() {
        let dir = tempfile::tempdir().expect("dir");
        let path = dir.path().join("two.tiff");
        write_multipage_tiff(&path, 2);
        let source = SourceImage::open(&path).expect("open");
        let scope = TempScope::new().expect("scope");

        let prepared = PaginationController::new(Preprocessing::Disabled)
            .prepare(&source, 1, &scope)
            .expect("prepare");
        let written = prepared.image_path().to_path_buf();
        assert!(written.is_file());
        drop(prepared);
        assert!(!written.exists());
    }
}
