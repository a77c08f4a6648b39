// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Temp scope. Owns the per-run directory and every transient artifact
// (extracted frames, markup, plain text) written into it.
//
// Each artifact is an RAII guard: it is removed exactly once when dropped,
// whatever happened to the stage that used it. Removal failures are logged as
// `TempResourceCleanupFailed` and never propagated.

use std::path::{Path, PathBuf};

use scanwerk_core::error::{Result, ScanwerkError};
use tempfile::TempDir;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// A process-local temporary directory for one pipeline.
///
/// Artifact names are `<uuid>.<ext>`, so two invocations never share a path.
/// The directory itself is removed when the scope is dropped.
pub struct TempScope {
    dir: TempDir,
}

impl TempScope {
    /// Create a scope under the system temporary directory.
    #[instrument]
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("scanwerk-").tempdir()?;
        debug!(path = %dir.path().display(), "temp scope created");
        Ok(Self { dir })
    }

    /// Create a scope under `parent`.
    pub fn new_in(parent: impl AsRef<Path>) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("scanwerk-")
            .tempdir_in(parent.as_ref())?;
        Ok(Self { dir })
    }

    /// Root directory of the scope.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Reserve a uniquely named artifact with the given extension.
    ///
    /// Nothing is created on disk; whoever writes the path hands cleanup to
    /// the returned guard.
    pub fn allocate(&self, extension: &str) -> TempArtifact {
        let path = self
            .dir
            .path()
            .join(format!("{}.{}", Uuid::new_v4().simple(), extension));
        TempArtifact { path }
    }

    /// Reserve a unique base path without an extension, for engines that
    /// append their own suffixes.
    pub fn allocate_base(&self) -> PathBuf {
        self.dir.path().join(Uuid::new_v4().simple().to_string())
    }
}

/// A transient file removed when the guard drops.
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
}

impl TempArtifact {
    /// Adopt an existing path; it will be deleted on drop.
    pub fn adopt(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        remove_best_effort(&self.path);
    }
}

/// Delete `path`, logging (not returning) any failure other than absence.
fn remove_best_effort(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "temp artifact removed"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "temp artifact was never written");
        }
        Err(err) => {
            let failure = ScanwerkError::TempResourceCleanupFailed {
                path: path.to_path_buf(),
                reason: err.to_string(),
            };
            warn!(error = %failure, "temp cleanup failed");
        }
    }
}
