//! Protocol constants shared with the FMD server and the Android agent.
//!
//! These values are fixed by the server protocol. Changing any of them breaks
//! interoperability with existing accounts.

/// Context prefix mixed into the password before deriving the login hash
pub const CONTEXT_LOGIN_AUTHENTICATION: &str = "context:loginAuthentication";

/// Context prefix mixed into the password before deriving the key-wrap key
pub const CONTEXT_ASYMMETRIC_KEY_WRAP: &str = "context:asymmetricKeyWrap";

/// Size of the Argon2 salt embedded at the front of the wrapped private key
pub const KEY_WRAP_SALT_SIZE: usize = 16;

/// Size of AES-GCM nonces in bytes (96 bits)
pub const AES_GCM_NONCE_SIZE: usize = 12;

/// Size of AES-GCM authentication tags in bytes (128 bits)
pub const AES_GCM_TAG_SIZE: usize = 16;

/// Size of an RSA-3072 modulus in bytes, the key size FMD accounts are created with
pub const DEFAULT_RSA_KEY_SIZE: usize = 384;

/// Salt length used for RSA-PSS command signatures
pub const COMMAND_SIGNATURE_SALT_LEN: usize = 32;

/// Size of the symmetric key generated per encrypted blob
pub const SESSION_KEY_SIZE: usize = 32;

/// Argon2id parameters used by FMD servers for both login and key wrapping
pub mod argon2_params {
    use argon2::Version;

    /// Memory cost: 128 MiB
    pub const MEMORY_COST: u32 = 131_072;

    /// Time cost: 1 iteration
    pub const TIME_COST: u32 = 1;

    /// Parallelism: 4 lanes
    pub const PARALLELISM: u32 = 4;

    /// Output length: 32 bytes
    pub const OUTPUT_LENGTH: usize = 32;

    /// Argon2 version (0x13, rendered as `v=19`)
    pub const VERSION: Version = Version::V0x13;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_strings_are_distinct() {
        assert_ne!(CONTEXT_LOGIN_AUTHENTICATION, CONTEXT_ASYMMETRIC_KEY_WRAP);
        assert!(CONTEXT_LOGIN_AUTHENTICATION.starts_with("context:"));
        assert!(CONTEXT_ASYMMETRIC_KEY_WRAP.starts_with("context:"));
    }

    #[test]
    fn test_default_rsa_key_size_is_3072_bits() {
        assert_eq!(DEFAULT_RSA_KEY_SIZE * 8, 3072);
    }
}
