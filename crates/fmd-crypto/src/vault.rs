//! The account private key and its password-wrapped form.
//!
//! The server stores the private key as `base64(salt ‖ iv ‖ AES-GCM(key))`
//! where the AES key is derived from the account password. The key itself is
//! PEM (PKCS#8 or PKCS#1) or raw DER.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::{CryptoRng, RngCore};
use rsa::{
    pkcs1::DecodeRsaPrivateKey,
    pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding},
    traits::PublicKeyParts,
    RsaPrivateKey, RsaPublicKey,
};
use std::fmt;
use zeroize::Zeroizing;

use crate::constants::{AES_GCM_NONCE_SIZE, AES_GCM_TAG_SIZE, KEY_WRAP_SALT_SIZE};
use crate::errors::{CryptoError, Result};
use crate::kdf::{derive_unwrap_key, KdfParams};
use crate::utils::{decode_base64, encode_base64_unpadded};

/// The account's RSA private key.
///
/// Used for unwrapping session keys and signing commands. Debug output never
/// includes key material.
#[derive(Clone)]
pub struct AccountKey {
    inner: RsaPrivateKey,
}

impl AccountKey {
    /// Parse a private key from PEM or DER bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if let Ok(text) = std::str::from_utf8(bytes) {
            if text.trim_start().starts_with("-----BEGIN") {
                let pem = text.trim();
                let inner = RsaPrivateKey::from_pkcs8_pem(pem)
                    .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
                    .map_err(|e| CryptoError::KeyUnwrap(format!("unreadable PEM key: {e}")))?;
                return Ok(Self { inner });
            }
        }
        let inner = RsaPrivateKey::from_pkcs8_der(bytes)
            .or_else(|_| RsaPrivateKey::from_pkcs1_der(bytes))
            .map_err(|e| CryptoError::KeyUnwrap(format!("unreadable DER key: {e}")))?;
        Ok(Self { inner })
    }

    /// Parse a PEM-encoded key, as stored in persisted auth artifacts.
    pub fn from_pem(pem: &str) -> Result<Self> {
        Self::from_bytes(pem.as_bytes())
    }

    /// Wrap an existing RSA key.
    pub fn from_rsa(inner: RsaPrivateKey) -> Self {
        Self { inner }
    }

    /// Generate a fresh key. Only servers and tests need this.
    pub fn generate<R: CryptoRng + RngCore>(rng: &mut R, bits: usize) -> Result<Self> {
        let inner = RsaPrivateKey::new(rng, bits)
            .map_err(|e| CryptoError::InvalidInput(format!("RSA key generation: {e}")))?;
        Ok(Self { inner })
    }

    /// Serialize as PKCS#8 PEM.
    pub fn to_pem(&self) -> Result<Zeroizing<String>> {
        self.inner
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| CryptoError::InvalidEncoding(format!("PEM encoding: {e}")))
    }

    /// Modulus size in bytes. Determines the wrapped session-key length in blobs.
    pub fn size(&self) -> usize {
        self.inner.size()
    }

    /// Public half of the key
    pub fn public_key(&self) -> RsaPublicKey {
        self.inner.to_public_key()
    }

    pub(crate) fn rsa(&self) -> &RsaPrivateKey {
        &self.inner
    }
}

impl fmt::Debug for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountKey")
            .field("bits", &(self.size() * 8))
            .field("material", &"[REDACTED]")
            .finish()
    }
}

/// A decoded, still-encrypted private key blob.
#[derive(Clone)]
pub struct WrappedPrivateKey {
    bytes: Vec<u8>,
}

impl WrappedPrivateKey {
    const HEADER: usize = KEY_WRAP_SALT_SIZE + AES_GCM_NONCE_SIZE;

    /// Decode the base64 blob returned by the server's `key` endpoint.
    pub fn parse(blob_b64: &str) -> Result<Self> {
        let bytes =
            decode_base64(blob_b64).map_err(|e| CryptoError::KeyUnwrap(format!("key blob: {e}")))?;
        let min = Self::HEADER + AES_GCM_TAG_SIZE;
        if bytes.len() < min {
            return Err(CryptoError::KeyUnwrap(format!(
                "key blob too short: {} bytes, need at least {min}",
                bytes.len()
            )));
        }
        Ok(Self { bytes })
    }

    /// Argon2 salt for the unwrap key
    pub fn salt(&self) -> &[u8] {
        &self.bytes[..KEY_WRAP_SALT_SIZE]
    }

    fn nonce(&self) -> &[u8] {
        &self.bytes[KEY_WRAP_SALT_SIZE..Self::HEADER]
    }

    fn ciphertext(&self) -> &[u8] {
        &self.bytes[Self::HEADER..]
    }

    /// Open the blob with an already-derived unwrap key.
    pub fn unwrap(&self, unwrap_key: &[u8; 32]) -> Result<AccountKey> {
        let cipher = Aes256Gcm::new_from_slice(unwrap_key)
            .map_err(|e| CryptoError::KeyUnwrap(format!("unwrap key: {e}")))?;
        let plaintext = Zeroizing::new(
            cipher
                .decrypt(Nonce::from_slice(self.nonce()), self.ciphertext())
                .map_err(|_| {
                    CryptoError::KeyUnwrap("authentication failed, wrong password?".into())
                })?,
        );
        AccountKey::from_bytes(&plaintext)
    }
}

impl fmt::Debug for WrappedPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrappedPrivateKey")
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Derive the unwrap key from `password` and open `blob_b64`.
pub fn unwrap_private_key(blob_b64: &str, password: &str, params: &KdfParams) -> Result<AccountKey> {
    let wrapped = WrappedPrivateKey::parse(blob_b64)?;
    let key = derive_unwrap_key(password, wrapped.salt(), params)?;
    wrapped.unwrap(&key)
}

/// Produce the server-side wrapped form of `key`.
///
/// Clients never upload keys, but this is the exact inverse of
/// [`unwrap_private_key`] and is what a provisioning tool or fake server uses.
pub fn wrap_private_key<R: CryptoRng + RngCore>(
    key: &AccountKey,
    password: &str,
    params: &KdfParams,
    rng: &mut R,
) -> Result<String> {
    let mut salt = [0u8; KEY_WRAP_SALT_SIZE];
    let mut nonce = [0u8; AES_GCM_NONCE_SIZE];
    rng.fill_bytes(&mut salt);
    rng.fill_bytes(&mut nonce);

    let unwrap_key = derive_unwrap_key(password, &salt, params)?;
    let cipher = Aes256Gcm::new_from_slice(unwrap_key.as_ref())
        .map_err(|e| CryptoError::InvalidInput(format!("wrap key: {e}")))?;
    let pem = key.to_pem()?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), pem.as_bytes())
        .map_err(|e| CryptoError::InvalidInput(format!("wrap: {e}")))?;

    let mut out = Vec::with_capacity(salt.len() + nonce.len() + ciphertext.len());
    out.extend_from_slice(&salt);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(encode_base64_unpadded(&out))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rsa::pkcs1::EncodeRsaPrivateKey;
    use std::sync::OnceLock;

    pub(crate) fn test_key() -> &'static AccountKey {
        static KEY: OnceLock<AccountKey> = OnceLock::new();
        KEY.get_or_init(|| AccountKey::generate(&mut rand::thread_rng(), 1024).unwrap())
    }

    fn cheap() -> KdfParams {
        KdfParams::new(64, 1, 1)
    }

    #[test]
    fn test_wrap_then_unwrap_recovers_key() {
        let key = test_key();
        let blob = wrap_private_key(key, "correct horse", &cheap(), &mut rand::thread_rng()).unwrap();
        let opened = unwrap_private_key(&blob, "correct horse", &cheap()).unwrap();
        assert_eq!(opened.public_key(), key.public_key());
    }

    #[test]
    fn test_wrong_password_fails_unwrap() {
        let blob = wrap_private_key(test_key(), "right", &cheap(), &mut rand::thread_rng()).unwrap();
        let err = unwrap_private_key(&blob, "wrong", &cheap()).unwrap_err();
        assert!(matches!(err, CryptoError::KeyUnwrap(_)));
    }

    #[test]
    fn test_truncated_blob_fails_unwrap() {
        let err = unwrap_private_key("AAAA", "pw", &cheap()).unwrap_err();
        assert!(matches!(err, CryptoError::KeyUnwrap(_)));
    }

    #[test]
    fn test_parses_pkcs1_pem_and_der() {
        let key = test_key();
        let pkcs1 = key.rsa().to_pkcs1_pem(LineEnding::LF).unwrap();
        let from_pem = AccountKey::from_bytes(pkcs1.as_bytes()).unwrap();
        assert_eq!(from_pem.public_key(), key.public_key());

        let der = key.rsa().to_pkcs8_der().unwrap();
        let from_der = AccountKey::from_bytes(der.as_bytes()).unwrap();
        assert_eq!(from_der.public_key(), key.public_key());
    }

    #[test]
    fn test_garbage_key_bytes_rejected() {
        let err = AccountKey::from_bytes(b"definitely not a key").unwrap_err();
        assert!(matches!(err, CryptoError::KeyUnwrap(_)));
    }

    #[test]
    fn test_debug_hides_material() {
        let dbg = format!("{:?}", test_key());
        assert!(dbg.contains("REDACTED"));
        assert!(dbg.contains("1024"));
    }
}
