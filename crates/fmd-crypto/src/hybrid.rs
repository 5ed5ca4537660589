//! Hybrid RSA-OAEP + AES-GCM blobs.
//!
//! Layout: `wrapped_session_key ‖ iv(12) ‖ ciphertext ‖ tag(16)`, where the
//! wrapped key is exactly one RSA modulus long. Offsets therefore follow the
//! loaded key's size rather than a hard-coded 384 bytes.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes128Gcm, Aes256Gcm, Nonce,
};
use rand::{CryptoRng, RngCore};
use rsa::{traits::PublicKeyParts, Oaep, RsaPublicKey};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::constants::{AES_GCM_NONCE_SIZE, AES_GCM_TAG_SIZE, SESSION_KEY_SIZE};
use crate::errors::{CryptoError, Result};
use crate::utils::{decode_base64, encode_base64_unpadded};
use crate::vault::AccountKey;

/// A decoded encrypted record (location or photo).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedBlob {
    bytes: Vec<u8>,
}

impl EncryptedBlob {
    /// Decode a base64 blob as served by the `location` and `pictures` endpoints.
    ///
    /// Blank input decodes to an empty blob, which [`decrypt_blob`] reports as
    /// [`CryptoError::EmptyOrCorruptBlob`].
    pub fn from_base64(data: &str) -> Result<Self> {
        if data.trim().is_empty() {
            return Ok(Self { bytes: Vec::new() });
        }
        Ok(Self {
            bytes: decode_base64(data)?,
        })
    }

    /// Wrap raw blob bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Unpadded base64 encoding of the blob
    pub fn to_base64(&self) -> String {
        encode_base64_unpadded(&self.bytes)
    }

    /// Raw blob bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True if the blob holds no bytes at all
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Smallest blob that can be well-formed for a key of `key_size` bytes.
pub fn min_blob_len(key_size: usize) -> usize {
    key_size + AES_GCM_NONCE_SIZE + AES_GCM_TAG_SIZE
}

/// Decrypt a blob with the account key.
///
/// Blobs shorter than [`min_blob_len`] yield `EmptyOrCorruptBlob` without any
/// RSA work. A failed session-key unwrap or AEAD tag check yields `Integrity`.
pub fn decrypt_blob(blob: &EncryptedBlob, key: &AccountKey) -> Result<Vec<u8>> {
    let key_size = key.size();
    let min = min_blob_len(key_size);
    if blob.len() < min {
        return Err(CryptoError::EmptyOrCorruptBlob {
            len: blob.len(),
            min,
        });
    }

    let bytes = blob.as_bytes();
    let (wrapped, rest) = bytes.split_at(key_size);
    let (iv, ciphertext) = rest.split_at(AES_GCM_NONCE_SIZE);

    let session_key = Zeroizing::new(
        key.rsa()
            .decrypt(Oaep::new::<Sha256>(), wrapped)
            .map_err(|_| CryptoError::Integrity("session key unwrap failed".into()))?,
    );

    let nonce = Nonce::from_slice(iv);
    let plaintext = match session_key.len() {
        32 => Aes256Gcm::new_from_slice(&session_key)
            .map_err(|e| CryptoError::Integrity(format!("session key: {e}")))?
            .decrypt(nonce, ciphertext),
        16 => Aes128Gcm::new_from_slice(&session_key)
            .map_err(|e| CryptoError::Integrity(format!("session key: {e}")))?
            .decrypt(nonce, ciphertext),
        n => {
            return Err(CryptoError::Integrity(format!(
                "unexpected session key length {n}"
            )))
        }
    };
    plaintext.map_err(|_| CryptoError::Integrity("authentication tag mismatch".into()))
}

/// Decode and decrypt a base64 blob in one step.
pub fn decrypt_base64(data: &str, key: &AccountKey) -> Result<Vec<u8>> {
    decrypt_blob(&EncryptedBlob::from_base64(data)?, key)
}

/// Encrypt `plaintext` for `recipient` in the same layout the device uses.
pub fn encrypt_blob<R: CryptoRng + RngCore>(
    recipient: &RsaPublicKey,
    plaintext: &[u8],
    rng: &mut R,
) -> Result<EncryptedBlob> {
    let mut session_key = Zeroizing::new([0u8; SESSION_KEY_SIZE]);
    let mut iv = [0u8; AES_GCM_NONCE_SIZE];
    rng.fill_bytes(session_key.as_mut());
    rng.fill_bytes(&mut iv);

    let wrapped = recipient
        .encrypt(rng, Oaep::new::<Sha256>(), session_key.as_ref())
        .map_err(|e| CryptoError::InvalidInput(format!("session key wrap: {e}")))?;
    debug_assert_eq!(wrapped.len(), recipient.size());

    let ciphertext = Aes256Gcm::new_from_slice(session_key.as_ref())
        .map_err(|e| CryptoError::InvalidInput(format!("session key: {e}")))?
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|e| CryptoError::InvalidInput(format!("encrypt: {e}")))?;

    let mut bytes = Vec::with_capacity(wrapped.len() + iv.len() + ciphertext.len());
    bytes.extend_from_slice(&wrapped);
    bytes.extend_from_slice(&iv);
    bytes.extend_from_slice(&ciphertext);
    Ok(EncryptedBlob::from_bytes(bytes))
}
