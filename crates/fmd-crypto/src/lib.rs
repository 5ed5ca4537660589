//! # fmd-crypto
//!
//! Cryptographic primitives for talking to an FMD server without ever handing
//! it plaintext: Argon2id password derivation, unwrapping of the account's
//! RSA private key, hybrid (RSA-OAEP + AES-GCM) blob decryption, and RSA-PSS
//! command signatures.
//!
//! Nothing in this crate performs I/O. Every operation is synchronous and
//! CPU-bound; async callers are expected to offload them.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod constants;
pub mod errors;
pub mod hybrid;
pub mod kdf;
pub mod signatures;
pub mod utils;
pub mod vault;

pub use constants::*;
pub use errors::{CryptoError, Result};
pub use hybrid::{decrypt_base64, decrypt_blob, encrypt_blob, min_blob_len, EncryptedBlob};
pub use kdf::{derive_auth_hash, derive_keys, derive_unwrap_key, AuthHash, DerivedKeys, KdfParams};
pub use signatures::{sign_command, sign_command_with_rng, verify_command_signature};
pub use utils::{current_timestamp_ms, decode_base64, encode_base64_unpadded};
pub use vault::{unwrap_private_key, wrap_private_key, AccountKey, WrappedPrivateKey};

// Re-exported so callers can hold public keys without depending on `rsa` directly.
pub use rsa::RsaPublicKey;
