//! Feed line formats.
//!
//! Accepted, one frame per line:
//! - ADSBSpy:      `*8D4BAB4558AB031C446849B72535;1D5D32D0;0A;32AB;`
//!   (frame, receiver clock ticks, signal level, trailing fields ignored)
//! - dump1090 raw: `*8D4BAB4558AB031C446849B72535;`
//! - plain hex:    `8D4BAB4558AB031C446849B72535`

use crate::types::{hex_decode, ModesError, Result};

/// One frame read from a feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedLine {
    pub frame: Vec<u8>,
    /// Receiver clock at capture, when the feed provides it.
    pub ticks: Option<u32>,
    pub signal: Option<u8>,
}

/// Parse a single feed line.
pub fn parse_line(line: &str) -> Result<FeedLine> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Err(ModesError::UnsupportedLine(line.to_string()));
    }

    let (hex, ticks, signal) = match line.strip_prefix('*') {
        Some(rest) => {
            let mut fields = rest.split(';');
            let hex = fields.next().unwrap_or_default();
            let ticks = fields.next().and_then(|f| u32::from_str_radix(f, 16).ok());
            let signal = fields.next().and_then(|f| u8::from_str_radix(f, 16).ok());
            (hex, ticks, signal)
        }
        None => (line, None, None),
    };

    let frame = hex_decode(hex).ok_or_else(|| ModesError::InvalidHex(hex.to_string()))?;
    if frame.is_empty() {
        return Err(ModesError::UnsupportedLine(line.to_string()));
    }

    Ok(FeedLine {
        frame,
        ticks,
        signal,
    })
}
