// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanwerk-engine: runs the OCR engine for one page at a time.
//
// Provides the engine seam (`OcrEngine`), a tesseract subprocess backend, an
// optional in-process `ocrs` backend, a pool of independently owned engine
// handles, and the temp scope that owns every artifact an invocation writes.

pub mod engine;
pub mod pool;
pub mod temp;
pub mod tesseract;

#[cfg(feature = "ocr")]
pub mod native;

pub use engine::{InvocationRequest, OcrEngine, RawArtifact};
pub use pool::{EnginePool, PooledEngine};
pub use temp::{TempArtifact, TempScope};
pub use tesseract::TesseractCli;

#[cfg(feature = "ocr")]
pub use native::OcrsEngine;
