//! Error types for cryptographic operations.

use thiserror::Error;

/// Errors produced by key derivation, key unwrapping and blob decryption.
///
/// `EmptyOrCorruptBlob` and `Integrity` are deliberately separate: the former
/// marks a record that simply is not there (servers hand out short
/// placeholders for empty slots), the latter a record that exists but failed
/// authentication.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Salt or Argon2 parameters were rejected
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// The wrapped private key could not be opened or parsed
    #[error("private key unwrap failed: {0}")]
    KeyUnwrap(String),

    /// Session-key unwrap or AEAD tag verification failed
    #[error("integrity check failed: {0}")]
    Integrity(String),

    /// Blob is shorter than the smallest well-formed ciphertext
    #[error("blob is empty or truncated ({len} bytes, need at least {min})")]
    EmptyOrCorruptBlob {
        /// Actual length in bytes
        len: usize,
        /// Minimum length for the loaded key
        min: usize,
    },

    /// Input was not valid base64 or PEM
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Signing a command failed
    #[error("signing failed: {0}")]
    Signing(String),

    /// Caller supplied an argument outside the supported range
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for cryptographic operations
pub type Result<T> = std::result::Result<T, CryptoError>;
