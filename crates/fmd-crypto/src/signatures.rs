//! RSA-PSS command signatures.
//!
//! The device verifies `"<unix_ms>:<command>"` signed with PSS/SHA-256 and a
//! 32-byte salt, transmitted as unpadded base64.

use rand::{CryptoRng, RngCore};
use rsa::{
    pss::{Signature, SigningKey, VerifyingKey},
    signature::{RandomizedSigner, SignatureEncoding, Verifier},
    RsaPublicKey,
};
use sha2::Sha256;

use crate::constants::COMMAND_SIGNATURE_SALT_LEN;
use crate::errors::{CryptoError, Result};
use crate::utils::{decode_base64, encode_base64_unpadded};
use crate::vault::AccountKey;

fn signed_message(command: &str, unix_time_ms: i64) -> String {
    format!("{unix_time_ms}:{command}")
}

/// Sign `command` for dispatch at `unix_time_ms`.
pub fn sign_command_with_rng<R: CryptoRng + RngCore>(
    key: &AccountKey,
    command: &str,
    unix_time_ms: i64,
    rng: &mut R,
) -> Result<String> {
    let signing_key =
        SigningKey::<Sha256>::new_with_salt_len(key.rsa().clone(), COMMAND_SIGNATURE_SALT_LEN);
    let signature = signing_key
        .try_sign_with_rng(rng, signed_message(command, unix_time_ms).as_bytes())
        .map_err(|e| CryptoError::Signing(e.to_string()))?;
    Ok(encode_base64_unpadded(&signature.to_vec()))
}

/// Sign `command` using the thread-local RNG.
pub fn sign_command(key: &AccountKey, command: &str, unix_time_ms: i64) -> Result<String> {
    sign_command_with_rng(key, command, unix_time_ms, &mut rand::thread_rng())
}

/// Verify a command signature the way the device does.
pub fn verify_command_signature(
    public: &RsaPublicKey,
    command: &str,
    unix_time_ms: i64,
    signature_b64: &str,
) -> Result<()> {
    let raw = decode_base64(signature_b64)?;
    let signature = Signature::try_from(raw.as_slice())
        .map_err(|e| CryptoError::Signing(format!("malformed signature: {e}")))?;
    VerifyingKey::<Sha256>::new_with_salt_len(public.clone(), COMMAND_SIGNATURE_SALT_LEN)
        .verify(signed_message(command, unix_time_ms).as_bytes(), &signature)
        .map_err(|_| CryptoError::Signing("signature does not verify".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::tests::test_key;

    #[test]
    fn test_signature_verifies_over_timestamped_command() {
        let key = test_key();
        let sig = sign_command(key, "ring", 1_700_000_000_000).unwrap();
        assert!(!sig.ends_with('='));
        verify_command_signature(&key.public_key(), "ring", 1_700_000_000_000, &sig).unwrap();
    }

    #[test]
    fn test_signature_is_bound_to_timestamp_and_command() {
        let key = test_key();
        let sig = sign_command(key, "lock", 1000).unwrap();
        assert!(verify_command_signature(&key.public_key(), "lock", 1001, &sig).is_err());
        assert!(verify_command_signature(&key.public_key(), "ring", 1000, &sig).is_err());
    }

    #[test]
    fn test_signatures_are_randomized() {
        let key = test_key();
        let a = sign_command(key, "ring", 1).unwrap();
        let b = sign_command(key, "ring", 1).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_signature_length_matches_modulus() {
        let key = test_key();
        let sig = sign_command(key, "locate", 5).unwrap();
        assert_eq!(decode_base64(&sig).unwrap().len(), key.size());
    }
}
