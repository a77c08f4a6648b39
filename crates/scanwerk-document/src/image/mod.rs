// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module: input sources and page preprocessing.

pub mod preprocess;
pub mod source;

pub use preprocess::FramePreprocessor;
pub use source::SourceImage;
