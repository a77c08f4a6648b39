// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Source images: format detection, frame counting, resolution lookup, and
// frame extraction.
//
// The kind is decided by content sniffing; a disagreeing extension is only
// logged. Only TIFF may hold more than one frame; every other kind reports exactly one.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use ::image::{DynamicImage, GrayImage, ImageFormat, ImageReader, RgbImage, RgbaImage};
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::ImageKind;
use scanwerk_engine::{TempArtifact, TempScope};
use tiff::ColorType;
use tiff::decoder::ifd::Value;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;
use tracing::{debug, info, instrument, warn};

/// Bytes read from the head of a file for sniffing and header-based DPI.
const HEADER_SNIFF_LEN: usize = 64 * 1024;

const CM_PER_INCH: f32 = 2.54;
const METRES_PER_INCH: f32 = 0.0254;

/// One accepted input file.
///
/// Immutable once opened. The frame count and resolution are read from the
/// file headers; pixel data is decoded per frame on demand.
#[derive(Debug, Clone)]
pub struct SourceImage {
    path: PathBuf,
    kind: ImageKind,
    frame_count: u32,
    dpi: Option<f32>,
}

impl SourceImage {
    /// Resolve `path` into a source image.
    ///
    /// Returns `UnsupportedInputFormat` when the content is not one of the
    /// accepted image kinds, whatever the extension says.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let header = read_header(path)?;
        let kind = detect_kind(path, &header)?;

        let (frame_count, dpi) = match kind {
            ImageKind::Tiff => tiff_frames_and_dpi(path)?,
            ImageKind::Png => (1, png_dpi(&header)),
            ImageKind::Jpeg => (1, jfif_dpi(&header)),
            ImageKind::Bmp => (1, bmp_dpi(&header)),
            ImageKind::Gif => (1, None),
        };

        info!(?kind, frame_count, dpi, "Source image resolved");
        Ok(Self {
            path: path.to_path_buf(),
            kind,
            frame_count,
            dpi,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> ImageKind {
        self.kind
    }

    /// Number of frames in the file (at least 1).
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Horizontal resolution in dots per inch, when the file records one.
    pub fn dpi(&self) -> Option<f32> {
        self.dpi
    }

    pub fn is_multi_frame(&self) -> bool {
        self.frame_count > 1
    }

    /// Decode frame `index`.
    pub fn load_frame(&self, index: u32) -> Result<DynamicImage> {
        if index >= self.frame_count {
            return Err(ScanwerkError::PageIndexOutOfRange {
                index,
                frame_count: self.frame_count,
            });
        }

        if self.kind == ImageKind::Tiff {
            return decode_tiff_frame(&self.path, index);
        }

        let reader = ImageReader::open(&self.path)?
            .with_guessed_format()
            .map_err(ScanwerkError::Io)?;
        reader.decode().map_err(|err| {
            ScanwerkError::ImageError(format!(
                "failed to decode {}: {}",
                self.path.display(),
                err
            ))
        })
    }

    /// Decode frame `index` and write it as a single-frame PNG into `scope`.
    ///
    /// The returned guard owns the file.
    pub fn extract_frame(&self, index: u32, scope: &TempScope) -> Result<TempArtifact> {
        let frame = self.load_frame(index)?;
        let artifact = scope.allocate("png");
        frame
            .save_with_format(artifact.path(), ImageFormat::Png)
            .map_err(|err| {
                ScanwerkError::ImageError(format!("failed to write frame {index}: {err}"))
            })?;
        debug!(index, path = %artifact.path().display(), "Frame extracted");
        Ok(artifact)
    }
}

fn read_header(path: &Path) -> Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut header = Vec::with_capacity(HEADER_SNIFF_LEN);
    file.take(HEADER_SNIFF_LEN as u64).read_to_end(&mut header)?;
    Ok(header)
}

fn detect_kind(path: &Path, header: &[u8]) -> Result<ImageKind> {
    let sniffed = ::image::guess_format(header).ok().and_then(kind_from_format);
    let by_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(ImageKind::from_extension);

    match (sniffed, by_extension) {
        (Some(kind), Some(ext_kind)) if kind != ext_kind => {
            warn!(?kind, ?ext_kind, "File extension disagrees with content; using content");
            Ok(kind)
        }
        (Some(kind), _) => Ok(kind),
        // An extension alone is not enough: the bytes must decode as an image.
        (None, _) => Err(ScanwerkError::UnsupportedInputFormat(format!(
            "{} is not a recognised image (accepted: JPEG, PNG, TIFF, BMP, GIF)",
            path.display()
        ))),
    }
}

fn kind_from_format(format: ImageFormat) -> Option<ImageKind> {
    match format {
        ImageFormat::Jpeg => Some(ImageKind::Jpeg),
        ImageFormat::Png => Some(ImageKind::Png),
        ImageFormat::Tiff => Some(ImageKind::Tiff),
        ImageFormat::Bmp => Some(ImageKind::Bmp),
        ImageFormat::Gif => Some(ImageKind::Gif),
        _ => None,
    }
}

fn tiff_decoder(path: &Path) -> Result<Decoder<BufReader<File>>> {
    let file = BufReader::new(File::open(path)?);
    Decoder::new(file).map_err(|err| ScanwerkError::ImageError(format!("TIFF decode: {err}")))
}

/// Count TIFF frames and read the first frame's resolution.
fn tiff_frames_and_dpi(path: &Path) -> Result<(u32, Option<f32>)> {
    let mut decoder = tiff_decoder(path)?;
    let dpi = tiff_dpi(&mut decoder);

    let mut count = 1;
    while decoder.more_images() {
        if decoder.next_image().is_err() {
            warn!(decoded = count, "Stopped counting TIFF frames at an unreadable directory");
            break;
        }
        count += 1;
    }
    Ok((count, dpi))
}

fn tiff_dpi(decoder: &mut Decoder<BufReader<File>>) -> Option<f32> {
    let resolution = match decoder.find_tag(Tag::XResolution).ok()?? {
        Value::Rational(n, d) if d != 0 => n as f32 / d as f32,
        Value::Short(v) => f32::from(v),
        Value::Unsigned(v) => v as f32,
        Value::Float(v) => v,
        Value::Double(v) => v as f32,
        _ => return None,
    };
    // ResolutionUnit: 1 = none, 2 = inch (default), 3 = centimetre.
    let unit = match decoder.find_tag(Tag::ResolutionUnit).ok().flatten() {
        Some(Value::Short(u)) => u,
        _ => 2,
    };
    let dpi = match unit {
        2 => resolution,
        3 => resolution * CM_PER_INCH,
        _ => return None,
    };
    (dpi > 0.0).then_some(dpi)
}

/// Decode one TIFF directory into an 8-bit image.
///
/// Bilevel frames are expanded to grayscale, 16-bit samples are narrowed, and
/// CMYK is flattened to RGB. The decoder has already inverted WhiteIsZero data.
fn decode_tiff_frame(path: &Path, index: u32) -> Result<DynamicImage> {
    let mut decoder = tiff_decoder(path)?;
    let tiff_err =
        |err: tiff::TiffError| ScanwerkError::ImageError(format!("TIFF frame {index}: {err}"));
    for _ in 0..index {
        decoder.next_image().map_err(tiff_err)?;
    }

    let (width, height) = decoder.dimensions().map_err(tiff_err)?;
    let color = decoder.colortype().map_err(tiff_err)?;
    let data = decoder.read_image().map_err(tiff_err)?;

    let bad_buffer =
        || ScanwerkError::ImageError(format!("TIFF frame {index}: pixel buffer size mismatch"));
    let gray = |buf: Vec<u8>| {
        GrayImage::from_raw(width, height, buf)
            .map(DynamicImage::ImageLuma8)
            .ok_or_else(bad_buffer)
    };
    let rgb = |buf: Vec<u8>| {
        RgbImage::from_raw(width, height, buf)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(bad_buffer)
    };
    let rgba = |buf: Vec<u8>| {
        RgbaImage::from_raw(width, height, buf)
            .map(DynamicImage::ImageRgba8)
            .ok_or_else(bad_buffer)
    };

    match (color, data) {
        (ColorType::Gray(8), DecodingResult::U8(buf)) => gray(buf),
        (ColorType::Gray(bits @ (1 | 2 | 4)), DecodingResult::U8(buf)) => {
            gray(unpack_gray(&buf, width, height, bits).ok_or_else(bad_buffer)?)
        }
        (ColorType::Gray(16), DecodingResult::U16(buf)) => gray(narrow(buf)),
        (ColorType::RGB(8), DecodingResult::U8(buf)) => rgb(buf),
        (ColorType::RGB(16), DecodingResult::U16(buf)) => rgb(narrow(buf)),
        (ColorType::RGBA(8), DecodingResult::U8(buf)) => rgba(buf),
        (ColorType::RGBA(16), DecodingResult::U16(buf)) => rgba(narrow(buf)),
        (ColorType::CMYK(8), DecodingResult::U8(buf)) => rgb(cmyk_to_rgb(&buf)),
        (ColorType::CMYK(16), DecodingResult::U16(buf)) => rgb(cmyk_to_rgb(&narrow(buf))),
        (other, _) => Err(ScanwerkError::ImageError(format!(
            "TIFF frame {index}: unsupported colour type {other:?}"
        ))),
    }
}

fn narrow(samples: Vec<u16>) -> Vec<u8> {
    samples.into_iter().map(|v| (v >> 8) as u8).collect()
}

/// Expand packed sub-byte gray rows (MSB first, rows padded to a byte) to one
/// byte per pixel, stretching the sample range to 0..=255.
fn unpack_gray(packed: &[u8], width: u32, height: u32, bits: u8) -> Option<Vec<u8>> {
    let width = width as usize;
    let bits = usize::from(bits);
    let row_bytes = (width * bits).div_ceil(8);
    if row_bytes == 0 || packed.len() < row_bytes * height as usize {
        return None;
    }
    let max = (1u16 << bits) - 1;
    let mut pixels = Vec::with_capacity(width * height as usize);
    for row in packed.chunks_exact(row_bytes).take(height as usize) {
        for x in 0..width {
            let bit = x * bits;
            let shift = 8 - bits - bit % 8;
            let sample = u16::from(row[bit / 8] >> shift) & max;
            pixels.push((sample * 255 / max) as u8);
        }
    }
    Some(pixels)
}

/// Naive separated-ink conversion; no colour profile is applied.
fn cmyk_to_rgb(samples: &[u8]) -> Vec<u8> {
    samples
        .chunks_exact(4)
        .flat_map(|ink| {
            let white = 255 - u16::from(ink[3]);
            let channel = |c: u8| ((255 - u16::from(c)) * white / 255) as u8;
            [channel(ink[0]), channel(ink[1]), channel(ink[2])]
        })
        .collect()
}

/// Resolution from a PNG `pHYs` chunk (pixels per metre).
fn png_dpi(bytes: &[u8]) -> Option<f32> {
    let mut pos = 8;
    while pos + 8 <= bytes.len() {
        let len = u32::from_be_bytes(bytes[pos..pos + 4].try_into().ok()?) as usize;
        let chunk_type = &bytes[pos + 4..pos + 8];
        let data_start = pos + 8;
        if chunk_type == b"pHYs" {
            let data = bytes.get(data_start..data_start + 9)?;
            let ppu_x = u32::from_be_bytes(data[0..4].try_into().ok()?);
            // Unit 1 is metres; 0 means aspect ratio only.
            if data[8] != 1 || ppu_x == 0 {
                return None;
            }
            return Some(ppu_x as f32 * METRES_PER_INCH);
        }
        if chunk_type == b"IDAT" || chunk_type == b"IEND" {
            return None;
        }
        pos = data_start + len + 4;
    }
    None
}

/// Resolution from a JPEG JFIF `APP0` segment.
fn jfif_dpi(bytes: &[u8]) -> Option<f32> {
    if bytes.get(0..2)? != [0xFF, 0xD8] {
        return None;
    }
    let mut pos = 2;
    while pos + 4 <= bytes.len() {
        if bytes[pos] != 0xFF {
            return None;
        }
        let marker = bytes[pos + 1];
        let len = u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]) as usize;
        let segment = bytes.get(pos + 4..pos + 2 + len)?;
        if marker == 0xE0 && segment.starts_with(b"JFIF\0") && segment.len() >= 12 {
            let units = segment[7];
            let density = f32::from(u16::from_be_bytes([segment[8], segment[9]]));
            return match units {
                1 if density > 0.0 => Some(density),
                2 if density > 0.0 => Some(density * CM_PER_INCH),
                _ => None,
            };
        }
        // Start of scan: no more header segments.
        if marker == 0xDA {
            return None;
        }
        pos += 2 + len;
    }
    None
}

/// Resolution from a BMP info header (pixels per metre).
fn bmp_dpi(bytes: &[u8]) -> Option<f32> {
    let field = bytes.get(38..42)?;
    let ppm = i32::from_le_bytes(field.try_into().ok()?);
    (ppm > 0).then(|| ppm as f32 * METRES_PER_INCH)
}
