//! Client error taxonomy.

use fmd_crypto::CryptoError;
use thiserror::Error;

use crate::server::ServerError;

/// Errors surfaced to the host.
///
/// Crypto and authentication failures always propagate. `EmptyOrCorruptBlob`
/// marks absent data and is expected to be skipped; `Integrity` marks data
/// that exists but failed verification and must never be swallowed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Credentials were rejected. Terminal; the user must re-enter them.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Stored artifacts are stale and carry no password hash to recover with
    #[error("session expired and cannot be renewed without the password")]
    ReauthRequired,

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("private key unwrap failed: {0}")]
    KeyUnwrap(String),

    /// Authenticated decryption failed. Security relevant.
    #[error("integrity check failed: {0}")]
    Integrity(String),

    #[error("blob is empty or truncated ({len} bytes, need at least {min})")]
    EmptyOrCorruptBlob { len: usize, min: usize },

    /// Wipe attempted without a live arm
    #[error("wipe interlock is not armed")]
    NotArmed,

    #[error("invalid PIN: {0}")]
    InvalidPin(String),

    #[error("transient network failure: {0}")]
    TransientNetwork(String),

    #[error("request timed out")]
    Timeout,

    #[error("server rejected request ({status}): {message}")]
    PermanentServer { status: u16, message: String },

    #[error("unexpected server response: {0}")]
    InvalidResponse(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("cryptographic operation failed: {0}")]
    Crypto(String),

    /// No decryptable location matched the current filter
    #[error("no usable location available")]
    NoLocation,
}

impl ClientError {
    /// Failures the scheduler's next cycle may recover from on its own.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientNetwork(_) | Self::Timeout)
    }

    /// Failures that mean "nothing here", not "something is wrong".
    pub fn is_skippable(&self) -> bool {
        matches!(self, Self::EmptyOrCorruptBlob { .. })
    }
}

impl From<CryptoError> for ClientError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::KeyDerivation(msg) => Self::KeyDerivation(msg),
            CryptoError::KeyUnwrap(msg) => Self::KeyUnwrap(msg),
            CryptoError::Integrity(msg) => Self::Integrity(msg),
            CryptoError::EmptyOrCorruptBlob { len, min } => Self::EmptyOrCorruptBlob { len, min },
            CryptoError::InvalidEncoding(msg) => Self::InvalidResponse(msg),
            CryptoError::Signing(msg) | CryptoError::InvalidInput(msg) => Self::Crypto(msg),
        }
    }
}

impl From<ServerError> for ClientError {
    fn from(err: ServerError) -> Self {
        match err {
            // Reaching this conversion means the session layer already tried a refresh.
            ServerError::Unauthorized => Self::ReauthRequired,
            ServerError::Transient(msg) => Self::TransientNetwork(msg),
            ServerError::Timeout => Self::Timeout,
            ServerError::Status { status, message } => Self::PermanentServer { status, message },
            ServerError::InvalidResponse(msg) => Self::InvalidResponse(msg),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ServerError::from(err).into()
    }
}

impl From<tokio::task::JoinError> for ClientError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Crypto(format!("worker task failed: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
