// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Scanwerk.
//
// Fatal errors abort the current input file and propagate to the caller.
// Recoverable errors are absorbed where they occur and only logged.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for all Scanwerk operations.
#[derive(Debug, Error)]
pub enum ScanwerkError {
    // -- Input --
    #[error("unsupported input format: {0}")]
    UnsupportedInputFormat(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    // -- Engine --
    #[error("missing engine resource {resource}: expected at {}", expected_path.display())]
    MissingEngineResource {
        resource: String,
        expected_path: PathBuf,
    },

    #[error("OCR engine {engine} failed: {diagnostic}")]
    EngineInvocationFailed { engine: String, diagnostic: String },

    // -- Pagination --
    #[error("page index {index} out of range (image has {frame_count} frames)")]
    PageIndexOutOfRange { index: u32, frame_count: u32 },

    // -- Markup --
    #[error("malformed markup: {0}")]
    MalformedMarkup(String),

    #[error("unreadable markup artifact {}: {reason}", path.display())]
    MarkupSyntax { path: PathBuf, reason: String },

    // -- Temp artifacts --
    #[error("failed to remove temporary artifact {}: {reason}", path.display())]
    TempResourceCleanupFailed { path: PathBuf, reason: String },

    // -- Rendering --
    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("PDF operation failed: {0}")]
    PdfError(String),

    // -- Batch --
    #[error("batch worker failed: {0}")]
    WorkerFailed(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// How far an error reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Aborts the current input file.
    Fatal,
    /// Absorbed at the component boundary; processing continues.
    Recoverable,
}

impl ScanwerkError {
    /// Classify this error for propagation decisions.
    pub fn severity(&self) -> Severity {
        match self {
            ScanwerkError::MalformedMarkup(_)
            | ScanwerkError::PageIndexOutOfRange { .. }
            | ScanwerkError::TempResourceCleanupFailed { .. } => Severity::Recoverable,

            ScanwerkError::UnsupportedInputFormat(_)
            | ScanwerkError::InvalidConfiguration(_)
            | ScanwerkError::MissingEngineResource { .. }
            | ScanwerkError::EngineInvocationFailed { .. }
            | ScanwerkError::MarkupSyntax { .. }
            | ScanwerkError::ImageError(_)
            | ScanwerkError::PdfError(_)
            | ScanwerkError::WorkerFailed(_)
            | ScanwerkError::Io(_)
            | ScanwerkError::Serialization(_) => Severity::Fatal,
        }
    }

    /// Shorthand for `severity() == Severity::Fatal`.
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScanwerkError>;
