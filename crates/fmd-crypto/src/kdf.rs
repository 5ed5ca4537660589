//! Argon2id password derivation.
//!
//! The account password is stretched twice, under two distinct context
//! prefixes: once into the login hash sent to the server, once into the AES
//! key that opens the wrapped private key. The server only ever sees the
//! former.

use argon2::{Algorithm, Argon2, Params};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

use crate::constants::{
    argon2_params, CONTEXT_ASYMMETRIC_KEY_WRAP, CONTEXT_LOGIN_AUTHENTICATION,
};
use crate::errors::{CryptoError, Result};
use crate::utils::{decode_base64, encode_base64_unpadded};

/// Argon2id cost parameters.
///
/// The defaults match what FMD servers expect. Cheaper settings only make
/// sense against a test server that was provisioned with the same values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes
    pub iterations: u32,
    /// Degree of parallelism
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: argon2_params::MEMORY_COST,
            iterations: argon2_params::TIME_COST,
            parallelism: argon2_params::PARALLELISM,
        }
    }
}

impl KdfParams {
    /// Create a parameter set with explicit costs.
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Self {
        Self {
            memory_kib,
            iterations,
            parallelism,
        }
    }

    fn argon2(&self) -> Result<Argon2<'static>> {
        let params = Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(argon2_params::OUTPUT_LENGTH),
        )
        .map_err(|e| CryptoError::KeyDerivation(format!("invalid Argon2 parameters: {e}")))?;
        Ok(Argon2::new(
            Algorithm::Argon2id,
            argon2_params::VERSION,
            params,
        ))
    }

    fn hash_into(&self, secret: &[u8], salt: &[u8]) -> Result<Zeroizing<[u8; 32]>> {
        let argon2 = self.argon2()?;
        let mut out = Zeroizing::new([0u8; 32]);
        argon2
            .hash_password_into(secret, salt, out.as_mut())
            .map_err(|e| CryptoError::KeyDerivation(format!("Argon2id failed: {e}")))?;
        Ok(out)
    }
}

/// The PHC-formatted login hash sent to `requestAccess`.
///
/// Holding this value is enough to obtain new access tokens, so it is treated
/// as a secret and never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthHash(Zeroizing<String>);

impl AuthHash {
    /// Wrap an already-derived PHC string, e.g. one restored from disk.
    pub fn from_phc(phc: impl Into<String>) -> Self {
        Self(Zeroizing::new(phc.into()))
    }

    /// The PHC string as sent to the server
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for AuthHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthHash([REDACTED])")
    }
}

/// Derive the login hash for `password` using the server-provided base64 salt.
///
/// The salt is embedded in the output exactly as the server sent it. Servers
/// compare the whole string, so re-encoding it would break login.
pub fn derive_auth_hash(password: &str, salt_b64: &str, params: &KdfParams) -> Result<AuthHash> {
    let salt = decode_base64(salt_b64)
        .map_err(|e| CryptoError::KeyDerivation(format!("server salt: {e}")))?;
    let secret = Zeroizing::new(format!("{CONTEXT_LOGIN_AUTHENTICATION}{password}"));
    let hash = params.hash_into(secret.as_bytes(), &salt)?;

    let phc = format!(
        "$argon2id$v=19$m={},t={},p={}${}${}",
        params.memory_kib,
        params.iterations,
        params.parallelism,
        salt_b64,
        encode_base64_unpadded(hash.as_ref()),
    );
    Ok(AuthHash::from_phc(phc))
}

/// Derive the 32-byte AES key that opens the wrapped private key.
pub fn derive_unwrap_key(
    password: &str,
    salt: &[u8],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; 32]>> {
    let secret = Zeroizing::new(format!("{CONTEXT_ASYMMETRIC_KEY_WRAP}{password}"));
    params.hash_into(secret.as_bytes(), salt)
}

/// Both derivations for one password.
#[derive(Debug)]
pub struct DerivedKeys {
    /// Login hash for `requestAccess`
    pub auth_hash: AuthHash,
    /// AES key for the wrapped private key
    pub unwrap_key: Zeroizing<[u8; 32]>,
}

/// Run both derivations. Their outputs never coincide because the context
/// prefixes differ even when the salts are equal.
pub fn derive_keys(
    password: &str,
    login_salt_b64: &str,
    key_wrap_salt: &[u8],
    params: &KdfParams,
) -> Result<DerivedKeys> {
    Ok(DerivedKeys {
        auth_hash: derive_auth_hash(password, login_salt_b64, params)?,
        unwrap_key: derive_unwrap_key(password, key_wrap_salt, params)?,
    })
}
