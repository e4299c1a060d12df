//! Self-loading bootstrap program encoder
//!
//! Turns a machine code blob with a 2-byte little-endian load address header
//! into BASIC immediate-mode text suitable for `*EXEC`. Each statement pokes
//! one 32-bit word (`!addr=value`), statements are packed onto lines up to a
//! length limit, and a final `CALL` transfers control to the load address.

use crate::error::{BootDiskError, Result};

/// Maximum length of an emitted line (exclusive)
///
/// BASIC 4 accepts lines up to 0xEE characters; this leaves some slack.
pub const MAX_LINE_LENGTH: usize = 0xE0;

/// Switches the target into the BASIC interpreter
pub const BASIC_PREFIX: &[u8] = b"*BASIC\r";

/// Disables VDU output so the loading text stays hidden
pub const HIDE_PREFIX: &[u8] = b"VDU21\r";

/// VDU 6, re-enables output; sent with the last line
pub const VDU_ENABLE: u8 = 0x06;

/// Line terminator
pub const CR: u8 = 0x0D;

/// Statement separator
pub const SEPARATOR: char = ':';

/// Render a value as `&` hex or signed 32-bit decimal, whichever is shorter
///
/// Hex is preferred when both forms have the same length.
pub fn shortest_literal(value: u32) -> String {
    let hex = format!("&{value:X}");
    let decimal = (value as i32).to_string();
    if decimal.len() < hex.len() {
        decimal
    } else {
        hex
    }
}

/// Encoder for `*EXEC` bootstrap programs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapEncoder {
    hidden: bool,
    max_line_length: usize,
}

impl BootstrapEncoder {
    /// Create an encoder with default settings
    pub fn new() -> Self {
        Self {
            hidden: false,
            max_line_length: MAX_LINE_LENGTH,
        }
    }

    /// Hide the loading text with `VDU21`
    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Set the line length limit (lines stay strictly shorter than this)
    pub fn max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }

    /// Is the loading text hidden?
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Every statement of the program, in order, ending with the `CALL`
    pub fn statements(&self, blob: &[u8]) -> Result<Vec<String>> {
        if blob.len() < 3 {
            return Err(BootDiskError::BootstrapTooSmall { size: blob.len() });
        }

        let load_addr = u16::from_le_bytes([blob[0], blob[1]]) as u32;
        let mut code = blob[2..].to_vec();
        code.resize(code.len().next_multiple_of(4), 0);

        let mut statements: Vec<String> = code
            .chunks_exact(4)
            .enumerate()
            .map(|(i, word)| {
                let addr = load_addr + (i * 4) as u32;
                let value = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
                format!("!{}={}", shortest_literal(addr), shortest_literal(value))
            })
            .collect();
        statements.push(format!("CALL{}", shortest_literal(load_addr)));

        Ok(statements)
    }

    /// Statements greedily packed onto lines
    ///
    /// A statement joins the current line only if the line stays strictly
    /// shorter than the limit; a statement that is too long on its own still
    /// gets a line to itself.
    pub fn lines(&self, blob: &[u8]) -> Result<Vec<String>> {
        let mut lines: Vec<String> = Vec::new();
        for stmt in self.statements(blob)? {
            match lines.last_mut() {
                Some(line) if line.len() + 1 + stmt.len() < self.max_line_length => {
                    line.push(SEPARATOR);
                    line.push_str(&stmt);
                }
                _ => lines.push(stmt),
            }
        }
        Ok(lines)
    }

    /// The complete `*EXEC` text
    pub fn encode(&self, blob: &[u8]) -> Result<Vec<u8>> {
        let lines = self.lines(blob)?;

        let mut out = Vec::new();
        out.extend_from_slice(BASIC_PREFIX);
        if self.hidden {
            out.extend_from_slice(HIDE_PREFIX);
        }
        for (index, line) in lines.iter().enumerate() {
            out.extend_from_slice(line.as_bytes());
            if index == lines.len() - 1 {
                out.push(VDU_ENABLE);
            }
            out.push(CR);
        }

        tracing::debug!(
            code_bytes = blob.len() - 2,
            lines = lines.len(),
            bytes = out.len(),
            "encoded bootstrap"
        );
        Ok(out)
    }
}

impl Default for BootstrapEncoder {
    fn default() -> Self {
        Self::new()
    }
}
