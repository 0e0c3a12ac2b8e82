//! Text direction detection
//!
//! Printers have no bidi engine, so the only thing we derive from the script
//! is which edge of the paper the text hugs.

use serde::{Deserialize, Serialize};

/// Writing direction of a piece of text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextDirection {
    #[default]
    LeftToRight,
    RightToLeft,
}

/// Arabic Unicode block
const ARABIC_BLOCK: std::ops::RangeInclusive<char> = '\u{0600}'..='\u{06FF}';

/// Classify text as right-to-left if it contains any Arabic character
pub fn detect_direction(text: &str) -> TextDirection {
    if text.chars().any(|c| ARABIC_BLOCK.contains(&c)) {
        TextDirection::RightToLeft
    } else {
        TextDirection::LeftToRight
    }
}

impl TextDirection {
    pub fn is_rtl(self) -> bool {
        self == TextDirection::RightToLeft
    }
}
