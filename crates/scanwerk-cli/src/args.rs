// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line arguments and their mapping onto `RunConfig`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use scanwerk_core::config::{EngineBackend, RunConfig};
use scanwerk_core::types::{Granularity, PaperSize, ScaleMode};

#[derive(Debug, Parser)]
#[command(name = "scanwerk", version, about = "Turn scanned page images into searchable PDFs")]
pub struct Cli {
    /// Page images to process (JPEG, PNG, TIFF, BMP, GIF).
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Directory for the PDFs; defaults to each input's own directory.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// JSON configuration file; flags below override its values.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub granularity: Option<GranularityArg>,

    /// Drop fragments below this confidence (0-100).
    #[arg(long)]
    pub min_confidence: Option<f32>,

    /// Also request plain text and prefer it for page 1.
    #[arg(long)]
    pub auxiliary_text: bool,

    /// Flatten and clean each frame before recognition.
    #[arg(long)]
    pub preprocess: bool,

    #[arg(long, value_enum)]
    pub scale: Option<ScaleArg>,

    /// Page size for the fit-* scale modes.
    #[arg(long, value_enum)]
    pub paper: Option<PaperArg>,

    /// Engine language selection, e.g. `eng+deu`.
    #[arg(short, long)]
    pub language: Option<String>,

    /// Page segmentation mode.
    #[arg(long)]
    pub psm: Option<u8>,

    /// DPI hint passed to the engine.
    #[arg(long)]
    pub dpi: Option<u32>,

    #[arg(long)]
    pub tessdata_dir: Option<PathBuf>,

    /// Custom vocabulary file.
    #[arg(long)]
    pub user_words: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub engine: Option<EngineArg>,

    /// Model directory for the native engine.
    #[arg(long)]
    pub model_dir: Option<PathBuf>,

    /// Zero-based frames to process, comma separated.
    #[arg(long, value_delimiter = ',')]
    pub frames: Option<Vec<u32>>,

    /// Draw the text layer visibly.
    #[arg(long)]
    pub visible_text: bool,

    #[arg(long, conflicts_with = "no_text_layer")]
    pub no_image_layer: bool,

    #[arg(long)]
    pub no_text_layer: bool,

    /// Files processed in parallel.
    #[arg(short, long, default_value_t = 1)]
    pub jobs: usize,

    /// Print the effective configuration as JSON and exit.
    #[arg(long)]
    pub print_config: bool,

    /// Debug logging unless `RUST_LOG` says otherwise.
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GranularityArg {
    Line,
    Word,
}

impl From<GranularityArg> for Granularity {
    fn from(arg: GranularityArg) -> Self {
        match arg {
            GranularityArg::Line => Granularity::ByLine,
            GranularityArg::Word => Granularity::ByWord,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScaleArg {
    Original,
    FitWidth,
    FitHeight,
    FitToBox,
}

impl From<ScaleArg> for ScaleMode {
    fn from(arg: ScaleArg) -> Self {
        match arg {
            ScaleArg::Original => ScaleMode::Original,
            ScaleArg::FitWidth => ScaleMode::FitWidth,
            ScaleArg::FitHeight => ScaleMode::FitHeight,
            ScaleArg::FitToBox => ScaleMode::FitToBox,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PaperArg {
    A3,
    A4,
    A5,
    Letter,
    Legal,
    Tabloid,
}

impl From<PaperArg> for PaperSize {
    fn from(arg: PaperArg) -> Self {
        match arg {
            PaperArg::A3 => PaperSize::A3,
            PaperArg::A4 => PaperSize::A4,
            PaperArg::A5 => PaperSize::A5,
            PaperArg::Letter => PaperSize::Letter,
            PaperArg::Legal => PaperSize::Legal,
            PaperArg::Tabloid => PaperSize::Tabloid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EngineArg {
    Tesseract,
    Ocrs,
}

impl From<EngineArg> for EngineBackend {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::Tesseract => EngineBackend::Tesseract,
            EngineArg::Ocrs => EngineBackend::Ocrs,
        }
    }
}

impl Cli {
    /// Overlay the flags that were given onto `config`.
    pub fn apply(&self, config: &mut RunConfig) {
        if let Some(granularity) = self.granularity {
            config.granularity = granularity.into();
        }
        if let Some(min_confidence) = self.min_confidence {
            config.min_confidence = min_confidence;
        }
        config.auxiliary_text |= self.auxiliary_text;
        config.preprocess |= self.preprocess;
        if let Some(scale) = self.scale {
            config.scale = scale.into();
        }
        if let Some(paper) = self.paper {
            config.paper = paper.into();
        }
        if let Some(language) = &self.language {
            config.engine.language = language.clone();
        }
        if let Some(psm) = self.psm {
            config.engine.segmentation_mode = psm;
        }
        if self.dpi.is_some() {
            config.engine.dpi_hint = self.dpi;
        }
        if self.tessdata_dir.is_some() {
            config.engine.tessdata_dir = self.tessdata_dir.clone();
        }
        if self.user_words.is_some() {
            config.engine.user_words = self.user_words.clone();
        }
        if let Some(engine) = self.engine {
            config.engine.backend = engine.into();
        }
        if self.model_dir.is_some() {
            config.engine.model_dir = self.model_dir.clone();
        }
        if self.frames.is_some() {
            config.frames = self.frames.clone();
        }
        if self.visible_text {
            config.text.invisible = false;
        }
        if self.no_image_layer {
            config.layers.image = false;
        }
        if self.no_text_layer {
            config.layers.text = false;
        }
    }
}
