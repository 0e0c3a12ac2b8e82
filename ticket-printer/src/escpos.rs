//! ESC/POS byte encoding
//!
//! [`EscPosBuilder`] is a fluent writer for raw ESC/POS bytes.
//! [`EscPosProtocol`] uses it to turn each [`PrintCommand`] into the frame
//! that is written to the device.

use crate::command::{Alignment, PrintCommand, TextStyle};
use crate::encoding::Charset;

/// Turns device-independent commands into device bytes
///
/// One call produces one frame, which the session writes as a single
/// transmission.
pub trait DeviceProtocol: Send + Sync {
    fn encode(&self, command: &PrintCommand) -> Vec<u8>;
}

/// ESC/POS command builder
///
/// Builds ESC/POS byte sequences for thermal printers.
/// Text is encoded with the builder's charset as it is written.
#[derive(Debug)]
pub struct EscPosBuilder {
    buf: Vec<u8>,
    charset: Charset,
}

impl EscPosBuilder {
    pub fn new(charset: Charset) -> Self {
        Self {
            buf: Vec::with_capacity(64),
            charset,
        }
    }

    // === Setup ===

    /// Reset printer to default state (ESC @)
    pub fn init(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x40]);
        self
    }

    /// Select the code page matching the builder's charset
    pub fn select_charset(&mut self) -> &mut Self {
        self.buf.extend_from_slice(self.charset.select_sequence());
        self
    }

    // === Text Output ===

    /// Write text in the builder's charset
    pub fn text(&mut self, s: &str) -> &mut Self {
        let bytes = self.charset.encode(s);
        self.buf.extend_from_slice(&bytes);
        self
    }

    /// Write text followed by newline
    pub fn line(&mut self, s: &str) -> &mut Self {
        self.text(s);
        self.buf.push(b'\n');
        self
    }

    /// Print and feed n lines
    pub fn feed(&mut self, lines: u8) -> &mut Self {
        // ESC d n
        self.buf.extend_from_slice(&[0x1B, 0x64, lines]);
        self
    }

    // === Alignment ===

    pub fn align(&mut self, alignment: Alignment) -> &mut Self {
        // ESC a n
        let n = match alignment {
            Alignment::Left => 0x00,
            Alignment::Center => 0x01,
            Alignment::Right => 0x02,
        };
        self.buf.extend_from_slice(&[0x1B, 0x61, n]);
        self
    }

    // === Text Style ===

    /// Character size, multipliers are clamped to 1-8
    pub fn size(&mut self, width: u8, height: u8) -> &mut Self {
        // GS ! n - high nibble width, low nibble height, both zero-based
        let w = width.clamp(1, 8) - 1;
        let h = height.clamp(1, 8) - 1;
        self.buf.extend_from_slice(&[0x1D, 0x21, (w << 4) | h]);
        self
    }

    // === Paper Control ===

    /// Cut paper (full cut)
    pub fn cut(&mut self) -> &mut Self {
        // GS V 0
        self.buf.extend_from_slice(&[0x1D, 0x56, 0x00]);
        self
    }

    // === Build ===

    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}

/// ESC/POS encoding for [`PrintCommand`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct EscPosProtocol {
    charset: Charset,
}

impl EscPosProtocol {
    pub fn new(charset: Charset) -> Self {
        Self { charset }
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    fn style(&self, b: &mut EscPosBuilder, style: &TextStyle) {
        // The style opens every ticket, so it carries the init too
        b.init()
            .select_charset()
            .align(style.alignment)
            .size(style.width, style.height);
    }
}

impl DeviceProtocol for EscPosProtocol {
    fn encode(&self, command: &PrintCommand) -> Vec<u8> {
        let mut b = EscPosBuilder::new(self.charset);
        match command {
            PrintCommand::SetStyle(style) => self.style(&mut b, style),
            PrintCommand::EmitText(text) => {
                b.line(text);
            }
            PrintCommand::Feed(lines) => {
                b.feed(*lines);
            }
            PrintCommand::Cut => {
                b.cut();
            }
        }
        b.build()
    }
}
