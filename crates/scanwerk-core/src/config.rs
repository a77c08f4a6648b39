// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Run configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, ScanwerkError};
use crate::types::{Granularity, PaperSize, Preprocessing, ScaleMode, TextColor};

/// Which engine implementation serves invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineBackend {
    /// External `tesseract` executable.
    #[default]
    Tesseract,
    /// In-process `ocrs` models (requires the `ocr` feature).
    Ocrs,
}

/// Parameters passed through to the OCR engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub backend: EngineBackend,
    /// Executable name or path for the subprocess backend.
    pub executable: PathBuf,
    /// Language selection string, e.g. `eng+deu`.
    pub language: String,
    /// Page segmentation mode.
    pub segmentation_mode: u8,
    /// DPI hint forwarded to the engine.
    pub dpi_hint: Option<u32>,
    /// Optional custom vocabulary file.
    pub user_words: Option<PathBuf>,
    /// Language data directory; `TESSDATA_PREFIX` or the engine default when unset.
    pub tessdata_dir: Option<PathBuf>,
    /// Model directory for the native backend.
    pub model_dir: Option<PathBuf>,
    /// Maximum number of idle engine handles kept for reuse.
    pub pool_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: EngineBackend::Tesseract,
            executable: PathBuf::from("tesseract"),
            language: "eng".to_string(),
            segmentation_mode: 3,
            dpi_hint: None,
            user_words: None,
            tessdata_dir: None,
            model_dir: None,
            pool_size: 1,
        }
    }
}

/// Appearance of the text layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextLayerConfig {
    /// Draw text with the invisible rendering mode.
    pub invisible: bool,
    pub color: TextColor,
}

impl Default for TextLayerConfig {
    fn default() -> Self {
        Self {
            invisible: true,
            color: TextColor::default(),
        }
    }
}

/// Which content layers are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerConfig {
    pub image: bool,
    pub text: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            image: true,
            text: true,
        }
    }
}

/// Settings for one run over a batch of input files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub engine: EngineConfig,
    pub granularity: Granularity,
    /// Fragments below this confidence are dropped; 0 disables filtering.
    pub min_confidence: f32,
    /// Request a plain-text pass and prefer its text for page 1.
    pub auxiliary_text: bool,
    /// Flatten and clean each frame before invocation.
    pub preprocess: bool,
    pub scale: ScaleMode,
    /// Page size for the fixed-size scale modes.
    pub paper: PaperSize,
    pub text: TextLayerConfig,
    pub layers: LayerConfig,
    /// Resolution assumed when an image carries none.
    pub fallback_dpi: f32,
    /// Zero-based frames to process; all frames when unset.
    pub frames: Option<Vec<u32>>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            granularity: Granularity::ByLine,
            min_confidence: 0.0,
            auxiliary_text: false,
            preprocess: false,
            scale: ScaleMode::Original,
            paper: PaperSize::A4,
            text: TextLayerConfig::default(),
            layers: LayerConfig::default(),
            fallback_dpi: 96.0,
            frames: None,
        }
    }
}

impl RunConfig {
    /// Read a JSON configuration file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: RunConfig = serde_json::from_str(&raw)?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn preprocessing(&self) -> Preprocessing {
        Preprocessing::from(self.preprocess)
    }

    /// Reject contradictory or out-of-range settings.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.min_confidence) {
            return Err(ScanwerkError::InvalidConfiguration(format!(
                "min_confidence must be within 0..=100, got {}",
                self.min_confidence
            )));
        }
        if self.auxiliary_text && self.min_confidence > 0.0 {
            return Err(ScanwerkError::InvalidConfiguration(
                "auxiliary_text and min_confidence cannot be combined; disable one of them".into(),
            ));
        }
        if !self.layers.image && !self.layers.text {
            return Err(ScanwerkError::InvalidConfiguration(
                "at least one of the image and text layers must be enabled".into(),
            ));
        }
        let (w, h) = self.paper.dimensions_mm();
        if self.scale != ScaleMode::Original && (w == 0 || h == 0) {
            return Err(ScanwerkError::InvalidConfiguration(format!(
                "paper size {w}x{h}mm is empty"
            )));
        }
        if !self.text.color.is_valid() {
            return Err(ScanwerkError::InvalidConfiguration(
                "text colour channels must lie within 0..=1".into(),
            ));
        }
        if self.engine.language.trim().is_empty() {
            return Err(ScanwerkError::InvalidConfiguration(
                "engine language must not be empty".into(),
            ));
        }
        if matches!(&self.frames, Some(frames) if frames.is_empty()) {
            return Err(ScanwerkError::InvalidConfiguration(
                "frame selection must name at least one frame".into(),
            ));
        }
        if self.engine.segmentation_mode > 13 {
            return Err(ScanwerkError::InvalidConfiguration(format!(
                "segmentation mode {} is out of range 0..=13",
                self.engine.segmentation_mode
            )));
        }
        Ok(())
    }
}
