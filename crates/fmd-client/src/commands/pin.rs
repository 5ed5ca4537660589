use tracing::warn;

use crate::error::{ClientError, Result};

/// PINs shorter than this are accepted with a warning.
pub const RECOMMENDED_PIN_LEN: usize = 16;

/// Check a wipe PIN: non-empty ASCII letters and digits only.
pub fn validate_pin(pin: &str) -> Result<()> {
    if pin.is_empty() {
        return Err(ClientError::InvalidPin("PIN is empty".into()));
    }
    if pin.chars().any(char::is_whitespace) {
        return Err(ClientError::InvalidPin("PIN must not contain whitespace".into()));
    }
    if !pin.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ClientError::InvalidPin(
            "PIN must contain only ASCII letters and digits".into(),
        ));
    }
    if pin.len() < RECOMMENDED_PIN_LEN {
        warn!(
            pin_len = pin.len(),
            recommended = RECOMMENDED_PIN_LEN,
            "Wipe PIN is shorter than recommended"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_pins() {
        assert!(validate_pin("1234").is_ok());
        assert!(validate_pin("abcDEF0123456789xyz").is_ok());
    }

    #[test]
    fn test_invalid_pins() {
        for pin in ["", "12 34", "pin!", " 1234", "1234\n", "pïn", "12-34"] {
            assert!(
                matches!(validate_pin(pin), Err(ClientError::InvalidPin(_))),
                "{pin:?} should be rejected"
            );
        }
    }
}
