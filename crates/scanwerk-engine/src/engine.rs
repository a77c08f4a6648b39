// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine seam: one trait, independent implementations selected by config.

use std::path::{Path, PathBuf};

use scanwerk_core::error::Result;
use scanwerk_core::types::OutputMode;

use crate::temp::{TempArtifact, TempScope};

/// One request to run the engine over a single-frame image.
#[derive(Debug, Clone)]
pub struct InvocationRequest {
    /// Image the engine reads. Always a single frame.
    pub image: PathBuf,
    /// Frame of the original source this image represents.
    pub frame_index: u32,
    /// Artifacts wanted, one per mode.
    pub modes: Vec<OutputMode>,
    /// Resolution of the image, forwarded when the config has no explicit hint.
    pub dpi: Option<u32>,
}

impl InvocationRequest {
    pub fn new(image: impl Into<PathBuf>, frame_index: u32, mode: OutputMode) -> Self {
        Self {
            image: image.into(),
            frame_index,
            modes: vec![mode],
            dpi: None,
        }
    }

    /// Also request a plain-text pass over the same frame.
    pub fn with_auxiliary_text(mut self) -> Self {
        if !self.modes.contains(&OutputMode::PlainText) {
            self.modes.push(OutputMode::PlainText);
        }
        self
    }

    pub fn with_dpi(mut self, dpi: Option<u32>) -> Self {
        self.dpi = dpi;
        self
    }
}

/// An engine output file, owned by the temp scope and deleted on drop.
#[derive(Debug)]
pub struct RawArtifact {
    file: TempArtifact,
    mode: OutputMode,
}

impl RawArtifact {
    pub fn new(file: TempArtifact, mode: OutputMode) -> Self {
        Self { file, mode }
    }

    /// Reserve an artifact path for `mode` inside `scope`.
    pub fn allocate(scope: &TempScope, mode: OutputMode) -> Self {
        Self::new(scope.allocate(mode.extension()), mode)
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Read the artifact as UTF-8 (lossy).
    pub fn read_to_string(&self) -> Result<String> {
        let bytes = std::fs::read(self.path())?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Pick the artifact produced for `mode`, if any.
pub fn artifact_for(artifacts: &[RawArtifact], mode: OutputMode) -> Option<&RawArtifact> {
    artifacts.iter().find(|a| a.mode() == mode)
}

/// An OCR engine handle.
///
/// A handle is exclusively owned by one in-flight invocation (`&mut self`).
/// Implementations check their resources before doing any work and write
/// only into the given scope.
pub trait OcrEngine: Send {
    /// Engine identifier used in logs and errors.
    fn name(&self) -> &'static str;

    /// Verify language data, models and the like exist.
    fn check_resources(&self) -> Result<()>;

    /// Run the engine for one frame; returns one artifact per requested mode.
    fn invoke(
        &mut self,
        request: &InvocationRequest,
        scope: &TempScope,
    ) -> Result<Vec<RawArtifact>>;

    /// A stale handle must not be reused; the pool rebuilds it.
    fn is_stale(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auxiliary_text_added_once() {
        let req = InvocationRequest::new("/tmp/a.png", 0, OutputMode::Structured)
            .with_auxiliary_text()
            .with_auxiliary_text();
        assert_eq!(req.modes, vec![OutputMode::Structured, OutputMode::PlainText]);
    }

    #[test]
    fn raw_artifact_uses_mode_extension() {
        let scope = TempScope::new().expect("scope");
        let artifact = RawArtifact::allocate(&scope, OutputMode::Structured);
        assert_eq!(
            artifact.path().extension().and_then(|e| e.to_str()),
            Some("hocr")
        );
        std::fs::write(artifact.path(), "<p>hi</p>").expect("write");
        assert_eq!(artifact.read_to_string().expect("read"), "<p>hi</p>");
    }

    #[test]
    fn artifact_lookup_by_mode() {
        let scope = TempScope::new().expect("scope");
        let artifacts = vec![
            RawArtifact::allocate(&scope, OutputMode::Structured),
            RawArtifact::allocate(&scope, OutputMode::PlainText),
        ];
        assert_eq!(
            artifact_for(&artifacts, OutputMode::PlainText).map(RawArtifact::mode),
            Some(OutputMode::PlainText)
        );
    }
}
