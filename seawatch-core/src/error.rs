//! Error types for seawatch-core

use thiserror::Error;

/// Errors raised while decoding a single instrument sentence.
///
/// Only structural and integrity problems are errors. A recognised sentence with
/// empty optional fields decodes to a partial reading instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Missing start marker, malformed address or an unparseable field
    #[error("Invalid sentence format: {0}")]
    InvalidFormat(String),

    /// The transmitted checksum does not match the XOR of the sentence body
    #[error("Checksum mismatch: sentence says {expected:02X}, computed {computed:02X}")]
    ChecksumFailed { expected: u8, computed: u8 },
}

impl DecodeError {
    pub(crate) fn invalid_field(field: &str, value: &str) -> Self {
        DecodeError::InvalidFormat(format!("field '{}' has unparseable value '{}'", field, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_display() {
        assert_eq!(
            DecodeError::ChecksumFailed {
                expected: 0x6A,
                computed: 0x0B
            }
            .to_string(),
            "Checksum mismatch: sentence says 6A, computed 0B"
        );
        assert_eq!(
            DecodeError::invalid_field("latitude", "abc").to_string(),
            "Invalid sentence format: field 'latitude' has unparseable value 'abc'"
        );
    }
}
