//! Character set handling for thermal printers
//!
//! Printers do not speak UTF-8 unless told to. This module maps the
//! configured charset to:
//! - the ESC/POS sequence that selects the matching code page
//! - the byte encoding of text for that code page

use std::fmt;
use std::str::FromStr;

use crate::error::PrintError;
use tracing::warn;

/// Code page used for text sent to the printer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    /// Raw UTF-8, for printers with native Unicode support
    #[default]
    Utf8,
    /// GBK with Chinese mode enabled
    Gbk,
    /// Windows-1256 (Arabic)
    Cp1256,
}

impl Charset {
    /// ESC/POS sequence selecting this charset, sent right after init
    pub fn select_sequence(self) -> &'static [u8] {
        match self {
            Charset::Utf8 => &[],
            // FS & - Enable Chinese mode, FS C 1 - Select GBK code page
            Charset::Gbk => &[0x1C, 0x26, 0x1C, 0x43, 0x01],
            // FS . - Leave Chinese mode, ESC t 50 - WPC1256
            Charset::Cp1256 => &[0x1C, 0x2E, 0x1B, 0x74, 50],
        }
    }

    /// Encode text for this charset
    ///
    /// Characters the code page cannot represent are replaced by the
    /// codec's substitute.
    pub fn encode(self, text: &str) -> Vec<u8> {
        let codec = match self {
            Charset::Utf8 => return text.as_bytes().to_vec(),
            Charset::Gbk => encoding_rs::GBK,
            Charset::Cp1256 => encoding_rs::WINDOWS_1256,
        };

        let (bytes, _, had_errors) = codec.encode(text);
        if had_errors {
            warn!(charset = %self, "Text contains characters outside the code page");
        }
        bytes.into_owned()
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Charset::Utf8 => "utf8",
            Charset::Gbk => "gbk",
            Charset::Cp1256 => "cp1256",
        })
    }
}

impl FromStr for Charset {
    type Err = PrintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Charset::Utf8),
            "gbk" => Ok(Charset::Gbk),
            "cp1256" | "windows-1256" => Ok(Charset::Cp1256),
            other => Err(PrintError::InvalidConfig(format!("Unknown charset: {}", other))),
        }
    }
}
