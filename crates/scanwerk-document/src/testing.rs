// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Test fixtures shared across modules: hOCR builders, in-memory images, and a
// scripted engine standing in for tesseract.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ::image::{GrayImage, ImageFormat, Luma};
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::OutputMode;
use scanwerk_engine::{EnginePool, InvocationRequest, OcrEngine, RawArtifact, TempScope};

/// Tesseract-shaped hOCR document around the given page elements.
pub(crate) fn hocr_document(pages: &[String]) -> String {
    format!(
        concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
            "<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0 Transitional//EN\"\n",
            "    \"http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd\">\n",
            "<html xmlns=\"http://www.w3.org/1999/xhtml\" xml:lang=\"en\" lang=\"en\">\n",
            " <head><title></title><meta name=\"ocr-system\" content=\"tesseract\" /></head>\n",
            " <body>\n{}\n </body>\n</html>\n"
        ),
        pages.join("\n")
    )
}

pub(crate) fn hocr_page(number: u32, lines: &[String]) -> String {
    format!(
        concat!(
            "  <div class=\"ocr_page\" id=\"page_{number}\" ",
            "title=\"bbox 0 0 400 300; ppageno {}\">\n",
            "   <div class=\"ocr_carea\" id=\"block_{number}_1\">\n",
            "    <p class=\"ocr_par\" id=\"par_{number}_1\">\n{}\n    </p>\n",
            "   </div>\n  </div>"
        ),
        number.saturating_sub(1),
        lines.join("\n"),
        number = number
    )
}

/// A line; with no words it carries the literal text `line`.
pub(crate) fn hocr_line(title: &str, words: &[(&str, &str, u32)]) -> String {
    let body = if words.is_empty() {
        "line".to_string()
    } else {
        words
            .iter()
            .map(|(bbox, text, conf)| {
                format!("<span class=\"ocrx_word\" title=\"{bbox}; x_wconf {conf}\">{text}</span>")
            })
            .collect::<Vec<_>>()
            .join(" ")
    };
    format!(
        "     <span class=\"ocr_line\" title=\"{title}; baseline 0 -4; x_size 20\">{body}</span>"
    )
}

pub(crate) fn write_png(path: &Path, width: u32, height: u32) {
    GrayImage::from_pixel(width, height, Luma([220u8]))
        .save_with_format(path, ImageFormat::Png)
        .expect("png fixture");
}

/// Multi-page 8-bit grayscale TIFF; page `i` is filled with `i * 40`.
pub(crate) fn write_multipage_tiff(path: &Path, pages: u8) {
    use tiff::encoder::{TiffEncoder, colortype};
    let file = File::create(path).expect("tiff file");
    let mut encoder = TiffEncoder::new(file).expect("encoder");
    for page in 0..pages {
        let data = vec![page * 40; 32 * 16];
        encoder
            .write_image::<colortype::Gray8>(32, 16, &data)
            .expect("tiff page");
    }
}

/// Uncompressed little-endian bilevel TIFF, one directory per entry of
/// `pages`, each holding packed rows (MSB first, padded to a byte).
///
/// `photometric` is written as-is: 0 for WhiteIsZero, 1 for BlackIsZero.
pub(crate) fn write_bilevel_tiff(
    path: &Path,
    width: u32,
    height: u32,
    photometric: u16,
    pages: &[Vec<u8>],
) {
    const ENTRIES: u16 = 9;
    const IFD_LEN: u32 = 2 + ENTRIES as u32 * 12 + 4;
    let short = |tag: u16, value: u16| (tag, 3u16, u32::from(value));
    let long = |tag: u16, value: u32| (tag, 4u16, value);

    let mut bytes = b"II".to_vec();
    bytes.extend_from_slice(&42u16.to_le_bytes());
    bytes.extend_from_slice(&8u32.to_le_bytes());

    for (i, data) in pages.iter().enumerate() {
        let ifd_offset = bytes.len() as u32;
        let data_offset = ifd_offset + IFD_LEN;
        let end = data_offset + data.len() as u32;
        let next = if i + 1 == pages.len() { 0 } else { end + end % 2 };
        let entries = [
            long(256, width),
            long(257, height),
            short(258, 1),
            short(259, 1),
            short(262, photometric),
            long(273, data_offset),
            short(277, 1),
            long(278, height),
            long(279, data.len() as u32),
        ];

        bytes.extend_from_slice(&ENTRIES.to_le_bytes());
        for (tag, kind, value) in entries {
            bytes.extend_from_slice(&tag.to_le_bytes());
            bytes.extend_from_slice(&kind.to_le_bytes());
            bytes.extend_from_slice(&1u32.to_le_bytes());
            if kind == 3 {
                bytes.extend_from_slice(&(value as u16).to_le_bytes());
                bytes.extend_from_slice(&[0, 0]);
            } else {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
        }
        bytes.extend_from_slice(&next.to_le_bytes());
        bytes.extend_from_slice(data);
        if end % 2 == 1 {
            bytes.push(0);
        }
    }
    std::fs::write(path, bytes).expect("bilevel tiff");
}

/// Engine that writes one word per frame (`frame<i>`) and fails on chosen frames.
///
/// A single-use engine reports itself stale after its first call and
/// refuses any further call.
pub(crate) struct ScriptedEngine {
    fail_frames: Vec<u32>,
    seen: Arc<Mutex<Vec<(u32, PathBuf)>>>,
    single_use: bool,
    calls: u32,
}

impl OcrEngine for ScriptedEngine {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn check_resources(&self) -> Result<()> {
        Ok(())
    }

    fn invoke(
        &mut self,
        request: &InvocationRequest,
        scope: &TempScope,
    ) -> Result<Vec<RawArtifact>> {
        if self.is_stale() {
            return Err(ScanwerkError::EngineInvocationFailed {
                engine: "scripted".into(),
                diagnostic: "handle already disposed".into(),
            });
        }
        self.calls += 1;
        self.seen
            .lock()
            .expect("seen lock")
            .push((request.frame_index, request.image.clone()));

        let artifacts: Vec<RawArtifact> = request
            .modes
            .iter()
            .map(|mode| RawArtifact::allocate(scope, *mode))
            .collect();

        if self.fail_frames.contains(&request.frame_index) {
            return Err(ScanwerkError::EngineInvocationFailed {
                engine: "scripted".into(),
                diagnostic: format!("frame {} unreadable", request.frame_index),
            });
        }

        let word = format!("frame{}", request.frame_index);
        for artifact in &artifacts {
            let body = match artifact.mode() {
                OutputMode::Structured => hocr_document(&[hocr_page(
                    1,
                    &[hocr_line("bbox 2 2 30 12", &[("bbox 2 2 30 12", &word, 90)])],
                )]),
                OutputMode::PlainText => format!("{word}\n"),
            };
            std::fs::write(artifact.path(), body)?;
        }
        Ok(artifacts)
    }

    fn is_stale(&self) -> bool {
        self.single_use && self.calls > 0
    }
}

/// Pool of scripted engines plus the log of `(frame, image)` they were asked for.
pub(crate) fn scripted_pool(
    fail_frames: &[u32],
) -> (EnginePool, Arc<Mutex<Vec<(u32, PathBuf)>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let fail_frames = fail_frames.to_vec();
    let pool = EnginePool::new(
        move || {
            Ok(Box::new(ScriptedEngine {
                fail_frames: fail_frames.clone(),
                seen: Arc::clone(&log),
                single_use: false,
                calls: 0,
            }) as Box<dyn OcrEngine>)
        },
        1,
    );
    (pool, seen)
}

/// Pool of single-use scripted engines plus the number of handles built.
pub(crate) fn single_use_pool() -> (EnginePool, Arc<AtomicUsize>) {
    let built = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&built);
    let pool = EnginePool::new(
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedEngine {
                fail_frames: Vec::new(),
                seen: Arc::new(Mutex::new(Vec::new())),
                single_use: true,
                calls: 0,
            }) as Box<dyn OcrEngine>)
        },
        1,
    );
    (pool, built)
}
