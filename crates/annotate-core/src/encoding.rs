//! WinAnsiEncoding for the base-14 page font
//!
//! WinAnsi matches Latin-1 for 0x20..=0x7E and 0xA0..=0xFF; the 0x80..=0x9F
//! block carries typographic punctuation instead of C1 controls.

use crate::error::RenderError;

/// Unicode code points for the 0x80..=0x9F block. `None` marks unused slots.
const HIGH_BLOCK: [Option<char>; 32] = [
    Some('\u{20AC}'), // 0x80 euro sign
    None,
    Some('\u{201A}'),
    Some('\u{0192}'),
    Some('\u{201E}'),
    Some('\u{2026}'),
    Some('\u{2020}'),
    Some('\u{2021}'),
    Some('\u{02C6}'),
    Some('\u{2030}'),
    Some('\u{0160}'),
    Some('\u{2039}'),
    Some('\u{0152}'),
    None,
    Some('\u{017D}'),
    None,
    None, // 0x90
    Some('\u{2018}'),
    Some('\u{2019}'),
    Some('\u{201C}'),
    Some('\u{201D}'),
    Some('\u{2022}'),
    Some('\u{2013}'),
    Some('\u{2014}'),
    Some('\u{02DC}'),
    Some('\u{2122}'),
    Some('\u{0161}'),
    Some('\u{203A}'),
    Some('\u{0153}'),
    None,
    Some('\u{017E}'),
    Some('\u{0178}'),
];

/// Encode one character, if the font can show it
pub fn encode_char(c: char) -> Option<u8> {
    match c {
        '\t' => Some(b' '),
        ' '..='~' => Some(c as u8),
        '\u{A0}'..='\u{FF}' => Some(c as u32 as u8),
        _ => HIGH_BLOCK
            .iter()
            .position(|slot| *slot == Some(c))
            .map(|idx| 0x80 + idx as u8),
    }
}

/// Encode a single line of text
pub fn encode_line(line: &str) -> Result<Vec<u8>, RenderError> {
    line.chars()
        .map(|c| encode_char(c).ok_or(RenderError::UnencodableText(c)))
        .collect()
}
