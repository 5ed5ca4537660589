//! Encoding and time helpers shared by the crypto modules.

use base64::{
    engine::general_purpose::{STANDARD, STANDARD_NO_PAD},
    Engine,
};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::errors::{CryptoError, Result};

/// Decode standard base64, tolerating missing padding and surrounding whitespace.
///
/// FMD servers strip `=` padding from most values they emit, so strict
/// decoding would reject perfectly good data.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let trimmed: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    let unpadded = trimmed.trim_end_matches('=');
    STANDARD_NO_PAD
        .decode(unpadded)
        .or_else(|_| STANDARD.decode(&trimmed))
        .map_err(|e| CryptoError::InvalidEncoding(format!("base64: {e}")))
}

/// Encode bytes as standard base64 without trailing padding.
pub fn encode_base64_unpadded(data: &[u8]) -> String {
    STANDARD_NO_PAD.encode(data)
}

/// Current Unix time in milliseconds.
///
/// Returns 0 if the system clock is set before the Unix epoch.
pub fn current_timestamp_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_accepts_missing_padding() {
        assert_eq!(decode_base64("aGVsbG8").unwrap(), b"hello");
        assert_eq!(decode_base64("aGVsbG8=").unwrap(), b"hello");
    }

    #[test]
    fn test_decode_ignores_whitespace() {
        assert_eq!(decode_base64(" aGVs\nbG8= ").unwrap(), b"hello");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_base64("not base64!"),
            Err(CryptoError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_encode_has_no_padding() {
        assert_eq!(encode_base64_unpadded(b"hello"), "aGVsbG8");
    }

    #[test]
    fn test_current_timestamp_ms_is_recent() {
        // 2020-01-01T00:00:00Z
        assert!(current_timestamp_ms() > 1_577_836_800_000);
    }
}
