//! Plain-text decoding over an ordered list of candidate encodings.
//!
//! Latin-1 is decoded strictly: bytes `0x80..=0x9F` are C1 control codes
//! that almost never occur in real latin-1 text, but they are exactly
//! where windows-1252 puts curly quotes, dashes and the euro sign. Treating
//! them as a latin-1 failure lets such files reach the windows-1252 step.

use ragline_core::{Error, Result};

#[derive(Debug, Clone, Copy)]
enum Encoding {
    Utf8,
    Ascii,
    Latin1,
    Windows1252,
}

const ENCODINGS: [Encoding; 4] = [
    Encoding::Utf8,
    Encoding::Ascii,
    Encoding::Latin1,
    Encoding::Windows1252,
];

/// windows-1252 code points for bytes `0x80..=0x9F`; `None` is undefined.
const WINDOWS_1252_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'),
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
    None,
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

impl Encoding {
    fn name(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Ascii => "ascii",
            Encoding::Latin1 => "latin-1",
            Encoding::Windows1252 => "windows-1252",
        }
    }

    fn decode(&self, bytes: &[u8]) -> Option<String> {
        match self {
            Encoding::Utf8 => std::str::from_utf8(bytes).ok().map(str::to_string),
            Encoding::Ascii => bytes
                .is_ascii()
                .then(|| bytes.iter().map(|&b| b as char).collect()),
            Encoding::Latin1 => bytes
                .iter()
                .map(|&b| (!(0x80..=0x9F).contains(&b)).then_some(b as char))
                .collect(),
            Encoding::Windows1252 => bytes
                .iter()
                .map(|&b| match b {
                    0x80..=0x9F => WINDOWS_1252_HIGH[(b - 0x80) as usize],
                    _ => Some(b as char),
                })
                .collect(),
        }
    }
}

/// Decode with the first encoding that accepts every byte.
pub(super) fn decode(bytes: &[u8], label: &str) -> Result<String> {
    for encoding in ENCODINGS {
        if let Some(text) = encoding.decode(bytes) {
            if !matches!(encoding, Encoding::Utf8) {
                tracing::debug!(file = label, encoding = encoding.name(), "decoded text file");
            }
            return Ok(text);
        }
    }
    Err(Error::Decode {
        path: label.to_string(),
        tried: ENCODINGS.iter().map(Encoding::name).collect(),
    })
}
