// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-process OCR backend using the `ocrs` crate, a pure-Rust OCR engine backed
// by neural network models executed via `rten`.
//
// # Feature Gate
//
// This module is only available when the `ocr` feature is enabled:
//
// ```toml
// scanwerk-engine = { path = "crates/scanwerk-engine", features = ["ocr"] }
// ```
//
// # Model Setup
//
// The engine requires two model files:
//
// - **Detection model** (`text-detection.rten`) locates text regions.
// - **Recognition model** (`text-recognition.rten`) decodes characters.
//
// Lookup order: `engine.model_dir` from the run configuration, then the
// `SCANWERK_MODEL_DIR` environment variable, then the cache that `ocrs-cli`
// downloads into (`$XDG_CACHE_HOME/ocrs` or `~/.cache/ocrs`).
//
// The recognised lines and words are written out as hOCR so that both
// backends feed the same markup parser.

use std::fmt;
use std::path::{Path, PathBuf};

use ocrs::{ImageSource, OcrEngine as OcrsInner, OcrEngineParams, TextItem};
use rten::Model;
use scanwerk_core::config::EngineConfig;
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::OutputMode;
use tracing::{debug, info, instrument, warn};

use crate::engine::{InvocationRequest, OcrEngine, RawArtifact};
use crate::temp::TempScope;

const ENGINE_NAME: &str = "ocrs";

/// Well-known filenames for the detection and recognition models.
const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

/// Environment override for the model directory.
pub const MODEL_DIR_ENV: &str = "SCANWERK_MODEL_DIR";

/// Pick the model directory: configured path, then the environment override,
/// then the `ocrs-cli` download cache. `env` looks up a variable by name.
fn resolve_model_dir(configured: Option<&Path>, env: impl Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(dir) = configured {
        return dir.to_path_buf();
    }
    if let Some(dir) = env(MODEL_DIR_ENV).filter(|dir| !dir.is_empty()) {
        return PathBuf::from(dir);
    }
    let cache = env("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .or_else(|| env("HOME").map(|home| Path::new(&home).join(".cache")));
    match cache {
        Some(cache) => cache.join("ocrs"),
        None => PathBuf::from("ocrs-models"),
    }
}

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Locations of the two model files.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub detection_model_path: PathBuf,
    pub recognition_model_path: PathBuf,
}

impl ModelConfig {
    /// Expects `dir` to contain `text-detection.rten` and `text-recognition.rten`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            detection_model_path: dir.join(DETECTION_MODEL_FILENAME),
            recognition_model_path: dir.join(RECOGNITION_MODEL_FILENAME),
        }
    }

    /// Models for `config`, resolved as described at the top of this module.
    pub fn from_engine_config(config: &EngineConfig) -> Self {
        Self::from_dir(resolve_model_dir(config.model_dir.as_deref(), process_env))
    }

    /// Verify that both model files exist.
    pub fn validate(&self) -> Result<()> {
        for (resource, path) in [
            ("detection model", &self.detection_model_path),
            ("recognition model", &self.recognition_model_path),
        ] {
            if !path.is_file() {
                return Err(ScanwerkError::MissingEngineResource {
                    resource: resource.into(),
                    expected_path: path.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Native engine handle with both models loaded.
///
/// Model loading is the expensive step, so handles are pooled. A handle whose
/// recognition call failed is marked stale and rebuilt by the pool.
pub struct OcrsEngine {
    config: ModelConfig,
    engine: OcrsInner,
    poisoned: bool,
}

impl OcrsEngine {
    /// Load both models. Debug builds of `ocrs`/`rten` are very slow here.
    #[instrument(skip_all, fields(
        detection = %config.detection_model_path.display(),
        recognition = %config.recognition_model_path.display(),
    ))]
    pub fn new(config: ModelConfig) -> Result<Self> {
        config.validate()?;
        let params = OcrEngineParams {
            detection_model: Some(load_model("detection", &config.detection_model_path)?),
            recognition_model: Some(load_model("recognition", &config.recognition_model_path)?),
            ..Default::default()
        };
        let engine = OcrsInner::new(params)
            .map_err(|err| engine_failure(format!("engine setup: {err}")))?;
        info!("ocrs models loaded");

        Ok(Self {
            config,
            engine,
            poisoned: false,
        })
    }

    /// Recognise the image and return lines of words with pixel boxes.
    fn recognize(&self, path: &Path) -> Result<(u32, u32, Vec<RecognizedLine>)> {
        let image = image::open(path).map_err(|err| {
            ScanwerkError::ImageError(format!("failed to open {}: {}", path.display(), err))
        })?;
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();

        let source = ImageSource::from_bytes(rgb.as_raw(), (width, height)).map_err(|err| {
            engine_failure(format!("failed to create image source ({}x{}): {}", width, height, err))
        })?;
        let input = self
            .engine
            .prepare_input(source)
            .map_err(|err| engine_failure(format!("preprocessing failed: {}", err)))?;

        let word_rects = self
            .engine
            .detect_words(&input)
            .map_err(|err| engine_failure(format!("word detection failed: {}", err)))?;
        let line_rects = self.engine.find_text_lines(&input, &word_rects);
        let line_texts = self
            .engine
            .recognize_text(&input, &line_rects)
            .map_err(|err| engine_failure(format!("line recognition failed: {}", err)))?;

        let mut lines = Vec::with_capacity(line_texts.len());
        for line in line_texts.iter().flatten() {
            let words: Vec<RecognizedWord> = line
                .words()
                .map(|word| {
                    let rect = word.bounding_rect();
                    RecognizedWord {
                        text: word.to_string(),
                        bbox: [
                            clamp_px(rect.left()),
                            clamp_px(rect.top()),
                            clamp_px(rect.right()),
                            clamp_px(rect.bottom()),
                        ],
                    }
                })
                .filter(|w| !w.text.trim().is_empty())
                .collect();
            if words.is_empty() {
                continue;
            }
            let rect = line.bounding_rect();
            lines.push(RecognizedLine {
                bbox: [
                    clamp_px(rect.left()),
                    clamp_px(rect.top()),
                    clamp_px(rect.right()),
                    clamp_px(rect.bottom()),
                ],
                words,
            });
        }

        debug!(lines = lines.len(), "ocrs recognition complete");
        Ok((width, height, lines))
    }
}

impl OcrEngine for OcrsEngine {
    fn name(&self) -> &'static str {
        ENGINE_NAME
    }

    fn check_resources(&self) -> Result<()> {
        self.config.validate()
    }

    #[instrument(
        skip(self, scope),
        fields(image = %request.image.display(), frame = request.frame_index)
    )]
    fn invoke(
        &mut self,
        request: &InvocationRequest,
        scope: &TempScope,
    ) -> Result<Vec<RawArtifact>> {
        self.check_resources()?;

        let artifacts: Vec<RawArtifact> = request
            .modes
            .iter()
            .map(|mode| RawArtifact::allocate(scope, *mode))
            .collect();

        let (width, height, lines) = match self.recognize(&request.image) {
            Ok(result) => result,
            Err(err) => {
                warn!(error = %err, "ocrs recognition failed; handle marked stale");
                self.poisoned = true;
                return Err(err);
            }
        };

        for artifact in &artifacts {
            let body = match artifact.mode() {
                OutputMode::Structured => render_hocr(width, height, &lines),
                OutputMode::PlainText => render_plain_text(&lines),
            };
            std::fs::write(artifact.path(), body)?;
        }
        Ok(artifacts)
    }

    fn is_stale(&self) -> bool {
        self.poisoned
    }
}

struct RecognizedWord {
    text: String,
    bbox: [u32; 4],
}

struct RecognizedLine {
    bbox: [u32; 4],
    words: Vec<RecognizedWord>,
}

fn load_model(role: &str, path: &Path) -> Result<Model> {
    debug!(role, path = %path.display(), "Loading ocrs model");
    Model::load_file(path)
        .map_err(|err| engine_failure(format!("{role} model {}: {err}", path.display())))
}

fn engine_failure(diagnostic: String) -> ScanwerkError {
    ScanwerkError::EngineInvocationFailed {
        engine: ENGINE_NAME.into(),
        diagnostic,
    }
}

fn clamp_px(v: i32) -> u32 {
    v.max(0) as u32
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Minimal single-page hOCR with line and word boxes.
struct HocrPage<'a> {
    width: u32,
    height: u32,
    lines: &'a [RecognizedLine],
}

impl fmt::Display for HocrPage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
        writeln!(f, "<html xmlns=\"http://www.w3.org/1999/xhtml\">\n<body>")?;
        writeln!(
            f,
            "<div class=\"ocr_page\" id=\"page_1\" title=\"bbox 0 0 {} {}\">",
            self.width, self.height
        )?;
        for (li, line) in self.lines.iter().enumerate() {
            let [l, t, r, b] = line.bbox;
            write!(
                f,
                "<span class=\"ocr_line\" id=\"line_1_{}\" title=\"bbox {l} {t} {r} {b}\">",
                li + 1
            )?;
            for (wi, word) in line.words.iter().enumerate() {
                let [l, t, r, b] = word.bbox;
                write!(
                    f,
                    "<span class=\"ocrx_word\" id=\"word_1_{}_{}\" title=\"bbox {l} {t} {r} {b}\">",
                    li + 1,
                    wi + 1
                )?;
                write!(f, "{}</span> ", escape_xml(&word.text))?;
            }
            writeln!(f, "</span>")?;
        }
        writeln!(f, "</div>\n</body>\n</html>")
    }
}

fn render_hocr(width: u32, height: u32, lines: &[RecognizedLine]) -> String {
    HocrPage {
        width,
        height,
        lines,
    }
    .to_string()
}

fn render_plain_text(lines: &[RecognizedLine]) -> String {
    lines
        .iter()
        .map(|line| {
            line.words
                .iter()
                .map(|w| w.text.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
