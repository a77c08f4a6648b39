// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tesseract subprocess backend.
//
// Runs `tesseract <image> <base> [options] hocr [txt]` synchronously. The
// engine appends `.hocr` / `.txt` to the base path itself, so artifact guards
// are created for those exact paths before the process is spawned; whatever
// the outcome, partial output is cleaned up with them.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use scanwerk_core::config::EngineConfig;
use scanwerk_core::error::{Result, ScanwerkError};
use tracing::{debug, info, instrument, warn};

use crate::engine::{InvocationRequest, OcrEngine, RawArtifact};
use crate::temp::{TempArtifact, TempScope};

const ENGINE_NAME: &str = "tesseract";

/// Language data file suffix inside the tessdata directory.
const TRAINEDDATA_SUFFIX: &str = ".traineddata";

/// Handle for the external `tesseract` executable.
///
/// Holds no process state between calls, so a handle never goes stale.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    config: EngineConfig,
}

impl TesseractCli {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Language data directory: explicit config, then `TESSDATA_PREFIX`.
    fn tessdata_dir(&self) -> Option<PathBuf> {
        self.config
            .tessdata_dir
            .clone()
            .or_else(|| std::env::var_os("TESSDATA_PREFIX").map(PathBuf::from))
    }

    /// Arguments after the executable name.
    fn command_args(&self, request: &InvocationRequest, base: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            request.image.clone().into_os_string(),
            base.as_os_str().to_os_string(),
            "-l".into(),
            self.config.language.clone().into(),
            "--psm".into(),
            self.config.segmentation_mode.to_string().into(),
        ];

        if let Some(dpi) = self.config.dpi_hint.or(request.dpi) {
            args.push("--dpi".into());
            args.push(dpi.to_string().into());
        }
        if let Some(dir) = &self.config.tessdata_dir {
            args.push("--tessdata-dir".into());
            args.push(dir.clone().into_os_string());
        }
        if let Some(words) = &self.config.user_words {
            args.push("--user-words".into());
            args.push(words.clone().into_os_string());
        }
        for mode in &request.modes {
            args.push(mode.engine_config_name().into());
        }
        args
    }
}

impl OcrEngine for TesseractCli {
    fn name(&self) -> &'static str {
        ENGINE_NAME
    }

    fn check_resources(&self) -> Result<()> {
        if let Some(dir) = self.tessdata_dir() {
            if !dir.is_dir() {
                return Err(ScanwerkError::MissingEngineResource {
                    resource: "tessdata directory".into(),
                    expected_path: dir,
                });
            }
            for lang in self.config.language.split('+').filter(|l| !l.is_empty()) {
                let file = dir.join(format!("{lang}{TRAINEDDATA_SUFFIX}"));
                if !file.is_file() {
                    return Err(ScanwerkError::MissingEngineResource {
                        resource: format!("language data '{lang}'"),
                        expected_path: file,
                    });
                }
            }
        }
        if let Some(words) = &self.config.user_words {
            if !words.is_file() {
                return Err(ScanwerkError::MissingEngineResource {
                    resource: "user words file".into(),
                    expected_path: words.clone(),
                });
            }
        }
        Ok(())
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

        let base = scope.allocate_base();
        let artifacts: Vec<RawArtifact> = request
            .modes
            .iter()
            .map(|mode| {
                RawArtifact::new(
                    TempArtifact::adopt(base.with_extension(mode.extension())),
                    *mode,
                )
            })
            .collect();

        let args = self.command_args(request, &base);
        debug!(?args, "spawning tesseract");

        let output = Command::new(&self.config.executable)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|err| {
                if err.kind() == std::io::ErrorKind::NotFound {
                    ScanwerkError::MissingEngineResource {
                        resource: "tesseract executable".into(),
                        expected_path: self.config.executable.clone(),
                    }
                } else {
                    ScanwerkError::EngineInvocationFailed {
                        engine: ENGINE_NAME.into(),
                        diagnostic: format!("failed to spawn: {err}"),
                    }
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(status = ?output.status, "tesseract exited with failure");
            return Err(ScanwerkError::EngineInvocationFailed {
                engine: ENGINE_NAME.into(),
                diagnostic: if stderr.is_empty() {
                    format!("exit status {}", output.status)
                } else {
                    stderr
                },
            });
        }

        if let Some(missing) = artifacts.iter().find(|a| !a.path().is_file()) {
            return Err(ScanwerkError::EngineInvocationFailed {
                engine: ENGINE_NAME.into(),
                diagnostic: format!(
                    "expected output {} was not produced",
                    missing.path().display()
                ),
            });
        }

        info!(artifacts = artifacts.len(), "tesseract invocation complete");
        Ok(artifacts)
    }
}
