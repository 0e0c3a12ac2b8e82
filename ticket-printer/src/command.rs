//! Device-independent print commands
//!
//! A ticket is an ordered list of [`PrintCommand`]s. The device interprets
//! the stream statefully, so order matters: the style must come before the
//! text it applies to, and feed/cut must come after all text.

use crate::script::TextDirection;
use serde::{Deserialize, Serialize};

/// Lines fed before cutting, so the last line clears the cutter
pub const FEED_LINES: u8 = 4;

/// Horizontal alignment of printed text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

impl From<TextDirection> for Alignment {
    fn from(direction: TextDirection) -> Self {
        match direction {
            TextDirection::LeftToRight => Alignment::Left,
            TextDirection::RightToLeft => Alignment::Right,
        }
    }
}

/// Text style applied to everything that follows it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextStyle {
    pub direction: TextDirection,
    pub alignment: Alignment,
    /// Character width multiplier (1-8)
    pub width: u8,
    /// Character height multiplier (1-8)
    pub height: u8,
}

impl TextStyle {
    /// Normal-size style for the given direction
    pub fn for_direction(direction: TextDirection) -> Self {
        Self {
            direction,
            alignment: direction.into(),
            width: 1,
            height: 1,
        }
    }
}

/// A single device command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "arg", rename_all = "snake_case")]
pub enum PrintCommand {
    SetStyle(TextStyle),
    EmitText(String),
    Feed(u8),
    Cut,
}

/// Ordered list of commands making up one ticket
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommandSequence(Vec<PrintCommand>);

impl CommandSequence {
    pub fn commands(&self) -> &[PrintCommand] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PrintCommand> {
        self.0.iter()
    }

    /// The style governing the ticket's text
    pub fn style(&self) -> Option<&TextStyle> {
        self.0.iter().find_map(|c| match c {
            PrintCommand::SetStyle(style) => Some(style),
            _ => None,
        })
    }
}

impl<'a> IntoIterator for &'a CommandSequence {
    type Item = &'a PrintCommand;
    type IntoIter = std::slice::Iter<'a, PrintCommand>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Build the command sequence for a ticket
///
/// Always: one style, the text, a fixed feed, then a full cut.
pub fn encode(text: &str, direction: TextDirection) -> CommandSequence {
    CommandSequence(vec![
        PrintCommand::SetStyle(TextStyle::for_direction(direction)),
        PrintCommand::EmitText(text.to_string()),
        PrintCommand::Feed(FEED_LINES),
        PrintCommand::Cut,
    ])
}
