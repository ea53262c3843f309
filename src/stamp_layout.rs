//! Where the parts of one stamp go: the signature image, the label above it
//! and the attestation lines below it.
//!
//! Layout is computed in page coordinates and does not touch the pdf, so the
//! visual result can be checked without rendering anything.

use crate::attestation::SignatureAttestation;
use crate::config::StampStyle;
use crate::rectangle::{PageSize, Rectangle};

/// Gap between the top of the stamp and the label baseline.
const LABEL_GAP: f64 = 2.0;
/// Horizontal inset of all text from the stamp's left edge.
const TEXT_INSET: f64 = 2.0;
/// Helvetica ascender, per unit of font size.
const HELVETICA_ASCENT: f64 = 0.718;
/// Helvetica descender (positive), per unit of font size.
const HELVETICA_DESCENT: f64 = 0.207;

#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    /// WinAnsi encoded text, ready for a `Tj` operator.
    pub encoded: Vec<u8>,
    pub x: f64,
    pub baseline: f64,
    pub size: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StampLayout {
    pub stamp: Rectangle,
    pub label: Option<TextLine>,
    /// Name, email and date, in that order, as far as they fit.
    pub lines: Vec<TextLine>,
}

impl StampLayout {
    pub fn compute(
        stamp: Rectangle,
        page: PageSize,
        attestation: &SignatureAttestation,
        style: &StampStyle,
    ) -> Self {
        let text_x = stamp.x1 + TEXT_INSET;
        let available_width = (page.width - text_x).max(0.0);

        let label_baseline = stamp.y2 + LABEL_GAP + style.label_size * HELVETICA_DESCENT;
        let label = if !style.label.is_empty()
            && label_baseline + style.label_size * HELVETICA_ASCENT <= page.height
        {
            fit_line(&style.label, text_x, label_baseline, style.label_size, available_width)
        } else {
            log::debug!("No room for the stamp label above ({:.1}, {:.1}).", stamp.x1, stamp.y2);
            None
        };

        // The first baseline sits low enough that ascenders stay below the stamp.
        let first_baseline =
            stamp.y1 - style.first_line_offset.max(style.detail_size * HELVETICA_ASCENT);
        let lowest_baseline = style
            .bottom_text_limit
            .max(style.detail_size * HELVETICA_DESCENT);
        let mut lines = Vec::with_capacity(3);
        let texts = [
            attestation.signer_name.trim(),
            attestation.signer_email.trim(),
            attestation.signed_date.trim(),
        ];
        for (index, text) in texts.iter().enumerate() {
            let baseline = first_baseline - index as f64 * style.line_gap;
            if baseline < lowest_baseline {
                break;
            }
            match fit_line(text, text_x, baseline, style.detail_size, available_width) {
                Some(line) => lines.push(line),
                None => break,
            }
        }
        if lines.len() < texts.len() {
            log::debug!(
                "Stamp at ({:.1}, {:.1}) shows {} of {} attestation lines.",
                stamp.x1,
                stamp.y1,
                lines.len(),
                texts.len()
            );
        }

        StampLayout {
            stamp,
            label,
            lines,
        }
    }

    /// Everything drawn for this stamp, text included.
    pub fn bounding_box(&self) -> Rectangle {
        let mut bbox = self.stamp;
        for line in self.label.iter().chain(self.lines.iter()) {
            bbox.x1 = bbox.x1.min(line.x);
            bbox.x2 = bbox.x2.max(line.x + text_width(&line.encoded, line.size));
            bbox.y1 = bbox.y1.min(line.baseline - line.size * HELVETICA_DESCENT);
            bbox.y2 = bbox.y2.max(line.baseline + line.size * HELVETICA_ASCENT);
        }
        bbox
    }
}

/// Text that does not fit is shortened with `...`. Returns `None` when not
/// even the ellipsis fits.
fn fit_line(text: &str, x: f64, baseline: f64, size: f64, max_width: f64) -> Option<TextLine> {
    let mut encoded = encode_win_ansi(text);
    if text_width(&encoded, size) > max_width {
        let ellipsis = b"...";
        while !encoded.is_empty() {
            encoded.pop();
            let mut candidate = encoded.clone();
            candidate.extend_from_slice(ellipsis);
            if text_width(&candidate, size) <= max_width {
                encoded = candidate;
                break;
            }
        }
        if encoded.is_empty() {
            return None;
        }
    }
    Some(TextLine {
        encoded,
        x,
        baseline,
        size,
    })
}

/// Latin-1 is passed through along with the extra WinAnsi glyphs in
/// 0x80..=0x9F. Control characters become spaces, anything else `?`.
pub(crate) fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0..=0x1F | 0x7F..=0x9F => b' ',
            code @ 0x20..=0xFF => code as u8,
            _ => WIN_ANSI_EXTRAS
                .iter()
                .find(|(_, extra, _)| *extra == c)
                .map_or(b'?', |(byte, _, _)| *byte),
        })
        .collect()
}

// WinAnsi bytes 0x80..=0x9F that carry a glyph, with their Helvetica widths.
const WIN_ANSI_EXTRAS: [(u8, char, u16); 27] = [
    (0x80, '\u{20AC}', 556),
    (0x82, '\u{201A}', 222),
    (0x83, '\u{0192}', 556),
    (0x84, '\u{201E}', 333),
    (0x85, '\u{2026}', 1000),
    (0x86, '\u{2020}', 556),
    (0x87, '\u{2021}', 556),
    (0x88, '\u{02C6}', 333),
    (0x89, '\u{2030}', 1000),
    (0x8A, '\u{0160}', 667),
    (0x8B, '\u{2039}', 333),
    (0x8C, '\u{0152}', 1000),
    (0x8E, '\u{017D}', 611),
    (0x91, '\u{2018}', 222),
    (0x92, '\u{2019}', 222),
    (0x93, '\u{201C}', 333),
    (0x94, '\u{201D}', 333),
    (0x95, '\u{2022}', 350),
    (0x96, '\u{2013}', 556),
    (0x97, '\u{2014}', 1000),
    (0x98, '\u{02DC}', 333),
    (0x99, '\u{2122}', 1000),
    (0x9A, '\u{0161}', 500),
    (0x9B, '\u{203A}', 333),
    (0x9C, '\u{0153}', 944),
    (0x9E, '\u{017E}', 500),
    (0x9F, '\u{0178}', 667),
];

pub(crate) fn text_width(encoded: &[u8], size: f64) -> f64 {
    let units: u32 = encoded.iter().map(|byte| glyph_width(*byte)).sum();
    units as f64 * size / 1000.0
}

// Helvetica advance widths from the standard AFM, for printable ASCII.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

fn glyph_width(byte: u8) -> u32 {
    match byte {
        0x20..=0x7E => HELVETICA_WIDTHS[(byte - 0x20) as usize] as u32,
        0x80..=0x9F => WIN_ANSI_EXTRAS
            .iter()
            .find(|(extra, _, _)| *extra == byte)
            .map_or(556, |(_, _, width)| *width as u32),
        _ => 556,
    }
}
