//! Number parsing and formatting.

use super::error::SequenceError;

/// Width of the zero-padded numeric suffix.
pub const SUFFIX_WIDTH: usize = 6;

/// Largest suffix that fits in [`SUFFIX_WIDTH`] digits.
pub const MAX_SUFFIX: u32 = 999_999;

/// Formats `prefix` and `counter` as `PREFIX-NNNNNN`.
///
/// # Errors
///
/// Returns `SequenceError::Overflow` when the counter needs more than
/// [`SUFFIX_WIDTH`] digits.
pub fn format_number(prefix: &str, counter: u32) -> Result<String, SequenceError> {
    if counter > MAX_SUFFIX {
        return Err(SequenceError::Overflow {
            prefix: prefix.to_string(),
        });
    }
    Ok(format!("{prefix}-{counter:0width$}", width = SUFFIX_WIDTH))
}

/// Extracts the counter from a number issued under `prefix`.
///
/// Only the trailing digits are read, so legacy numbers without the dash
/// (`SI000042`) still parse.
///
/// # Errors
///
/// Returns `PrefixMismatch` if the number does not start with the prefix and
/// `Malformed` if it has no trailing digits.
pub fn parse_number(prefix: &str, number: &str) -> Result<u32, SequenceError> {
    let number = number.trim();
    let Some(rest) = number.strip_prefix(prefix) else {
        return Err(SequenceError::PrefixMismatch {
            prefix: prefix.to_string(),
            number: number.to_string(),
        });
    };

    let digits_start = rest
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i);

    let Some(start) = digits_start else {
        return Err(SequenceError::Malformed(number.to_string()));
    };

    rest[start..]
        .parse::<u32>()
        .map_err(|_| SequenceError::Malformed(number.to_string()))
}

/// Computes the number following `last` (or the first number when `None`).
///
/// # Errors
///
/// Propagates parse failures and suffix overflow.
pub fn next_number(prefix: &str, last: Option<&str>) -> Result<String, SequenceError> {
    let counter = match last {
        Some(last) => parse_number(prefix, last)?
            .checked_add(1)
            .ok_or_else(|| SequenceError::Overflow {
                prefix: prefix.to_string(),
            })?,
        None => 1,
    };
    format_number(prefix, counter)
}
