//! Decoding of reply lines.
//!
//! Numeric replies are plain decimal text in volts or amps, e.g. `12.72` or `02.504`. The
//! device pads some fields with leading zeros and not others, so we normalize the text
//! before display. The parsed value is identical either way.

use core::fmt;

use thiserror::Error;

/// Upper bound on a single reply line, excluding the line terminator.
///
/// Real replies are 5-6 bytes. Anything longer is rejected rather than truncated.
pub const MAX_REPLY_LEN: usize = 16;

/// Why a reply line could not be decoded.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyError {
    #[error("reply is empty")]
    Empty,
    #[error("reply exceeds {MAX_REPLY_LEN} bytes")]
    TooLong,
    #[error("reply is not a decimal number")]
    NotNumeric,
}

/// A decoded decimal reply: normalized display text plus its numeric value.
#[derive(Debug, Clone, PartialEq)]
pub struct Decimal {
    text: heapless::String<MAX_REPLY_LEN>,
    value: f64,
}

impl Decimal {
    /// Parse a raw reply line, with line terminators already stripped.
    pub fn parse(line: &[u8]) -> Result<Self, ReplyError> {
        if line.is_empty() {
            return Err(ReplyError::Empty);
        }
        if line.len() > MAX_REPLY_LEN {
            return Err(ReplyError::TooLong);
        }
        let raw = core::str::from_utf8(line).map_err(|_| ReplyError::NotNumeric)?;
        if !is_plain_decimal(raw) {
            return Err(ReplyError::NotNumeric);
        }
        let text = normalize(raw);
        let value = text.parse::<f64>().map_err(|_| ReplyError::NotNumeric)?;
        let mut owned = heapless::String::new();
        owned.push_str(text).map_err(|_| ReplyError::TooLong)?;
        Ok(Self { text: owned, value })
    }

    /// Normalized text, as shown to the user.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Strip extraneous leading zeros: `0004.001` => `4.001`.
///
/// A zero is only dropped while the character after it is still a digit, so `0.001` and a
/// lone `0` are left alone. Applying this twice gives the same result as applying it once.
pub fn normalize(text: &str) -> &str {
    let mut text = text;
    while let [b'0', next, ..] = text.as_bytes() {
        if !next.is_ascii_digit() {
            break;
        }
        text = &text[1..];
    }
    text
}

/// Digits with at most one dot and at least one digit. Rejects what `f64::from_str` would
/// otherwise accept (`inf`, `1e3`, `+1`).
fn is_plain_decimal(text: &str) -> bool {
    let mut dots = 0;
    let mut digits = 0;
    for byte in text.bytes() {
        match byte {
            b'0'..=b'9' => digits += 1,
            b'.' => dots += 1,
            _ => return false,
        }
    }
    digits > 0 && dots <= 1
}

/// Remove a trailing `\n` and then an optional `\r` from a raw line.
pub fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
