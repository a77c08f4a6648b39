// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Font metrics for the font-size search.

use printpdf::BuiltinFont;

/// Advance-width measurement for one font.
pub trait FontMetrics: Send + Sync {
    /// The PDF base font the widths belong to.
    fn builtin_font(&self) -> BuiltinFont;

    /// Width in points of `text` set at `size` points.
    fn text_width(&self, text: &str, size: f32) -> f32;
}

/// Helvetica, the standard-14 font the text layer is drawn in.
#[derive(Debug, Clone, Copy, Default)]
pub struct Helvetica;

/// Width used for characters outside the table, in 1/1000 em.
const HELVETICA_DEFAULT_WIDTH: u16 = 556;

/// Printable ASCII (0x20..=0x7E) advance widths in 1/1000 em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
    278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // 'A'..'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N'..'Z'
    278, 278, 278, 469, 556, 333, // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // 'a'..'m'
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'n'..'z'
    334, 260, 334, 584, // '{'..'~'
];

impl Helvetica {
    fn char_width(ch: char) -> u16 {
        match ch as u32 {
            code @ 0x20..=0x7E => HELVETICA_WIDTHS[(code - 0x20) as usize],
            _ => HELVETICA_DEFAULT_WIDTH,
        }
    }
}

impl FontMetrics for Helvetica {
    fn builtin_font(&self) -> BuiltinFont {
        BuiltinFont::Helvetica
    }

    fn text_width(&self, text: &str, size: f32) -> f32 {
        let units: u32 = text.chars().map(|ch| u32::from(Self::char_width(ch))).sum();
        units as f32 * size / 1000.0
    }
}
