//! NMEA 0183 checksum handling
//!
//! The checksum is the XOR of every byte strictly between the `$` start marker and
//! the `*` separator, transmitted as two hex digits.

use std::fmt::Write;

use crate::error::DecodeError;

/// Sentence start marker
pub const START_MARKER: char = '$';

/// Separator between sentence body and checksum
pub const CHECKSUM_SEPARATOR: char = '*';

/// XOR of all bytes in `body`
pub fn compute_checksum(body: &str) -> u8 {
    body.bytes().fold(0u8, |acc, b| acc ^ b)
}

/// Strip the start marker and checksum from a trimmed line, verifying the checksum
/// when one is present.
///
/// Returns the body (the text between `$` and `*`, or everything after `$` when no
/// checksum is transmitted).
pub fn validated_body(line: &str) -> Result<&str, DecodeError> {
    let Some(rest) = line.strip_prefix(START_MARKER) else {
        return Err(DecodeError::InvalidFormat(format!(
            "sentence does not start with '{}'",
            START_MARKER
        )));
    };

    let Some((body, digits)) = rest.split_once(CHECKSUM_SEPARATOR) else {
        // No checksum field: accepted unchecked
        return Ok(rest);
    };

    if digits.len() != 2 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(DecodeError::InvalidFormat(format!(
            "checksum '{}' is not two hex digits",
            digits
        )));
    }
    // Two validated hex digits always fit in a u8
    let expected = u8::from_str_radix(digits, 16)
        .map_err(|_| DecodeError::InvalidFormat(format!("checksum '{}'", digits)))?;
    let computed = compute_checksum(body);
    if expected != computed {
        return Err(DecodeError::ChecksumFailed { expected, computed });
    }
    Ok(body)
}

/// Format a sentence body as a complete line: `$<body>*HH\r\n`
///
/// # Example
/// ```
/// use seawatch_core::nmea::checksum::format_sentence;
/// assert_eq!(format_sentence("GPHDT,274.07,T"), "$GPHDT,274.07,T*03\r\n");
/// ```
pub fn format_sentence(body: &str) -> String {
    let mut line = String::with_capacity(body.len() + 6);
    line.push(START_MARKER);
    line.push_str(body);
    let _ = write!(&mut line, "{}{:02X}\r\n", CHECKSUM_SEPARATOR, compute_checksum(body));
    line
}
