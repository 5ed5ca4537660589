//! The server collaborator seam.
//!
//! Everything above this trait deals in tokens, blobs and typed failures.
//! [`crate::infra::HttpServer`] is the production implementation; tests
//! substitute an in-memory one.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Transport-level failures, before session handling interprets them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServerError {
    /// 401/403: the token (or the login hash) was rejected
    #[error("unauthorized")]
    Unauthorized,

    /// Connection refused/reset, 5xx, 408, 429
    #[error("transient failure: {0}")]
    Transient(String),

    #[error("timed out")]
    Timeout,

    /// Any other non-success status
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ServerError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

impl From<reqwest::Error> for ServerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else if let Some(status) = err.status() {
            classify_status(status.as_u16(), err.to_string())
        } else {
            Self::Transient(err.to_string())
        }
    }
}

/// Map a non-success HTTP status onto a [`ServerError`].
pub fn classify_status(status: u16, message: String) -> ServerError {
    match status {
        401 | 403 => ServerError::Unauthorized,
        408 | 429 => ServerError::Transient(format!("HTTP {status}: {message}")),
        s if s >= 500 => ServerError::Transient(format!("HTTP {status}: {message}")),
        _ => ServerError::Status { status, message },
    }
}

/// A signed command ready for the `command` endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct SignedCommand {
    pub command: String,
    pub unix_time_ms: i64,
    pub signature: String,
}

impl SignedCommand {
    /// First word of the command. Safe to log; arguments may carry a PIN.
    pub fn verb(&self) -> &str {
        self.command.split_whitespace().next().unwrap_or("")
    }
}

impl fmt::Debug for SignedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedCommand")
            .field("verb", &self.verb())
            .field("unix_time_ms", &self.unix_time_ms)
            .finish_non_exhaustive()
    }
}

/// Operations an FMD server exposes to an account holder.
///
/// Blobs are returned as the server sends them (base64 text). An empty
/// string is a legitimate placeholder for a slot with no data.
#[async_trait]
pub trait FmdServer: Send + Sync {
    /// Base address, recorded in exported artifacts
    fn base_url(&self) -> &str;

    /// Base64 login salt for `fmd_id`
    async fn salt(&self, fmd_id: &str) -> Result<String, ServerError>;

    /// Exchange the login hash for a bearer token valid for `session_duration_secs`
    async fn request_access(
        &self,
        fmd_id: &str,
        auth_hash: &str,
        session_duration_secs: u64,
    ) -> Result<String, ServerError>;

    /// The password-wrapped private key
    async fn private_key_blob(&self, token: &str) -> Result<String, ServerError>;

    /// Number of stored location records
    async fn location_count(&self, token: &str) -> Result<usize, ServerError>;

    /// Location blob at `index` (0 = oldest)
    async fn location(&self, token: &str, index: usize) -> Result<String, ServerError>;

    /// All stored picture blobs, oldest first
    async fn pictures(&self, token: &str) -> Result<Vec<String>, ServerError>;

    /// Queue a command for the device. Success only means the server accepted it.
    async fn command(&self, token: &str, command: &SignedCommand) -> Result<(), ServerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(classify_status(401, String::new()), ServerError::Unauthorized);
        assert_eq!(classify_status(403, String::new()), ServerError::Unauthorized);
        assert!(matches!(classify_status(503, String::new()), ServerError::Transient(_)));
        assert!(matches!(classify_status(429, String::new()), ServerError::Transient(_)));
        assert_eq!(
            classify_status(404, "nope".into()),
            ServerError::Status {
                status: 404,
                message: "nope".into()
            }
        );
    }

    #[test]
    fn test_signed_command_debug_hides_arguments() {
        let cmd = SignedCommand {
            command: "delete s3cretpin".into(),
            unix_time_ms: 1,
            signature: "sig".into(),
        };
        let dbg = format!("{cmd:?}");
        assert!(dbg.contains("delete"));
        assert!(!dbg.contains("s3cretpin"));
        assert!(!dbg.contains("sig\""));
    }
}
