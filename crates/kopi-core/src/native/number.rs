//! Numeric parsing for the long-parse native

use std::fmt;
use std::num::IntErrorKind;

/// Why a numeric text was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberFormatErrorKind {
    /// No digits at all (empty text, a lone sign, or null)
    Empty,
    /// A character that is not a decimal digit
    InvalidDigit,
    /// Well-formed digits whose magnitude is out of range
    Overflow,
}

impl fmt::Display for NumberFormatErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NumberFormatErrorKind::Empty => "no digits",
            NumberFormatErrorKind::InvalidDigit => "invalid digit",
            NumberFormatErrorKind::Overflow => "out of range",
        })
    }
}

/// Numeric text could not be parsed as a 64-bit signed integer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Number format error: {kind} for input string \"{input}\"")]
pub struct NumberFormatError {
    /// Rejected text
    pub input: String,
    /// Failure kind
    pub kind: NumberFormatErrorKind,
}

impl NumberFormatError {
    /// Create an error for `input`
    pub fn new(input: impl Into<String>, kind: NumberFormatErrorKind) -> Self {
        Self {
            input: input.into(),
            kind,
        }
    }

    /// Whether this is the overflow sub-kind
    pub fn is_overflow(&self) -> bool {
        self.kind == NumberFormatErrorKind::Overflow
    }
}

/// Parse an optionally signed decimal integer in `[i64::MIN, i64::MAX]`
///
/// No surrounding whitespace, no grouping, no radix prefix.
pub fn parse_long(input: &str) -> Result<i64, NumberFormatError> {
    let digits = input.strip_prefix(&['+', '-'][..]).unwrap_or(input);
    if digits.is_empty() {
        return Err(NumberFormatError::new(input, NumberFormatErrorKind::Empty));
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(NumberFormatError::new(input, NumberFormatErrorKind::InvalidDigit));
    }

    input.parse::<i64>().map_err(|e| {
        let kind = match e.kind() {
            IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => NumberFormatErrorKind::Overflow,
            IntErrorKind::Empty => NumberFormatErrorKind::Empty,
            _ => NumberFormatErrorKind::InvalidDigit,
        };
        NumberFormatError::new(input, kind)
    })
}
