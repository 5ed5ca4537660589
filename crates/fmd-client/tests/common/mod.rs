//! In-memory FMD server for integration tests.
//!
//! Uses the real crypto: the private key is Argon2id-wrapped, locations and
//! photos are hybrid-encrypted to the account key, and command signatures are
//! verified on receipt.

#![allow(dead_code)]

use async_trait::async_trait;
use fmd_client::{
    ClientConfig, Credentials, FmdClient, FmdServer, ServerError, SignedCommand,
};
use fmd_crypto::{
    derive_auth_hash, encode_base64_unpadded, encrypt_blob, verify_command_signature,
    wrap_private_key, AccountKey, KdfParams,
};
use rand::RngCore;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

pub const BASE_URL: &str = "https://fmd.test";
pub const FMD_ID: &str = "pixel-7";
pub const PASSWORD: &str = "correct horse battery staple";

pub fn cheap_kdf() -> KdfParams {
    KdfParams::new(64, 1, 1)
}

pub fn test_config() -> ClientConfig {
    ClientConfig {
        kdf: cheap_kdf(),
        ..ClientConfig::default()
    }
}

pub fn credentials() -> Credentials {
    Credentials::new(BASE_URL, FMD_ID, PASSWORD)
}

pub fn account_key() -> &'static AccountKey {
    static KEY: OnceLock<AccountKey> = OnceLock::new();
    KEY.get_or_init(|| AccountKey::generate(&mut rand::thread_rng(), 1024).unwrap())
}

pub fn location_json(provider: &str, date_ms: i64) -> serde_json::Value {
    serde_json::json!({
        "time": format!("t{date_ms}"),
        "date": date_ms,
        "provider": provider,
        "bat": 77,
        "lat": 48.1,
        "lon": 11.5,
        "accuracy": 12.0
    })
}

#[derive(Default)]
struct MockState {
    tokens: HashSet<String>,
    issued: u64,
    locations: Vec<String>,
    pictures: Vec<String>,
    commands: Vec<SignedCommand>,
    calls: HashMap<&'static str, usize>,
    location_failure: Option<ServerError>,
    command_failure: Option<ServerError>,
    request_access_delay: Duration,
    location_count_delay: Duration,
}

pub struct MockServer {
    salt_b64: String,
    auth_hash: String,
    key_blob: String,
    state: Mutex<MockState>,
}

impl MockServer {
    pub fn new() -> Arc<Self> {
        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        let salt_b64 = encode_base64_unpadded(&salt);
        let auth_hash = derive_auth_hash(PASSWORD, &salt_b64, &cheap_kdf())
            .unwrap()
            .as_str()
            .to_string();
        let key_blob =
            wrap_private_key(account_key(), PASSWORD, &cheap_kdf(), &mut rand::thread_rng())
                .unwrap();
        Arc::new(Self {
            salt_b64,
            auth_hash,
            key_blob,
            state: Mutex::new(MockState::default()),
        })
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    fn record_call(&self, name: &'static str) {
        *self.state().calls.entry(name).or_default() += 1;
    }

    fn check_token(&self, token: &str) -> Result<(), ServerError> {
        if self.state().tokens.contains(token) {
            Ok(())
        } else {
            Err(ServerError::Unauthorized)
        }
    }

    pub fn encrypt(plaintext: &[u8]) -> String {
        encrypt_blob(&account_key().public_key(), plaintext, &mut rand::thread_rng())
            .unwrap()
            .to_base64()
    }

    /// Append a location (becomes the newest).
    pub fn push_location(&self, record: serde_json::Value) {
        let blob = Self::encrypt(record.to_string().as_bytes());
        self.state().locations.push(blob);
    }

    pub fn push_empty_location(&self) {
        self.state().locations.push(String::new());
    }

    /// Encrypt, then flip a bit in the GCM tag.
    pub fn tampered(plaintext: &[u8]) -> String {
        let blob = encrypt_blob(&account_key().public_key(), plaintext, &mut rand::thread_rng())
            .unwrap();
        let mut bytes = blob.as_bytes().to_vec();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x55;
        encode_base64_unpadded(&bytes)
    }

    pub fn push_tampered_location(&self, record: serde_json::Value) {
        let blob = Self::tampered(record.to_string().as_bytes());
        self.state().locations.push(blob);
    }

    /// Append a photo; `payload` is the decrypted form (base64 text or data URI).
    pub fn push_picture(&self, payload: &str) {
        let blob = Self::encrypt(payload.as_bytes());
        self.state().pictures.push(blob);
    }

    pub fn push_tampered_picture(&self, payload: &str) {
        let blob = Self::tampered(payload.as_bytes());
        self.state().pictures.push(blob);
    }

    pub fn push_raw_picture(&self, blob: &str) {
        self.state().pictures.push(blob.to_string());
    }

    /// Invalidate every issued token, as if they all expired server-side.
    pub fn expire_tokens(&self) {
        self.state().tokens.clear();
    }

    pub fn fail_locations(&self, failure: Option<ServerError>) {
        self.state().location_failure = failure;
    }

    pub fn fail_commands(&self, failure: Option<ServerError>) {
        self.state().command_failure = failure;
    }

    pub fn set_request_access_delay(&self, delay: Duration) {
        self.state().request_access_delay = delay;
    }

    pub fn set_location_count_delay(&self, delay: Duration) {
        self.state().location_count_delay = delay;
    }

    pub fn calls(&self, name: &str) -> usize {
        self.state().calls.get(name).copied().unwrap_or(0)
    }

    /// Commands accepted so far, after checking each signature.
    pub fn commands(&self) -> Vec<String> {
        let public = account_key().public_key();
        self.state()
            .commands
            .iter()
            .map(|c| {
                verify_command_signature(&public, &c.command, c.unix_time_ms, &c.signature)
                    .expect("command signature must verify");
                c.command.clone()
            })
            .collect()
    }
}

#[async_trait]
impl FmdServer for MockServer {
    fn base_url(&self) -> &str {
        BASE_URL
    }

    async fn salt(&self, fmd_id: &str) -> Result<String, ServerError> {
        self.record_call("salt");
        if fmd_id != FMD_ID {
            return Err(ServerError::Status {
                status: 404,
                message: "unknown id".into(),
            });
        }
        Ok(self.salt_b64.clone())
    }

    async fn request_access(
        &self,
        fmd_id: &str,
        auth_hash: &str,
        _session_duration_secs: u64,
    ) -> Result<String, ServerError> {
        self.record_call("request_access");
        let delay = self.state().request_access_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if fmd_id != FMD_ID || auth_hash != self.auth_hash {
            return Err(ServerError::Unauthorized);
        }
        let mut state = self.state();
        state.issued += 1;
        let token = format!("token-{}", state.issued);
        state.tokens.insert(token.clone());
        Ok(token)
    }

    async fn private_key_blob(&self, token: &str) -> Result<String, ServerError> {
        self.record_call("key");
        self.check_token(token)?;
        Ok(self.key_blob.clone())
    }

    async fn location_count(&self, token: &str) -> Result<usize, ServerError> {
        self.record_call("location_count");
        let delay = self.state().location_count_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.check_token(token)?;
        let state = self.state();
        if let Some(failure) = &state.location_failure {
            return Err(failure.clone());
        }
        Ok(state.locations.len())
    }

    async fn location(&self, token: &str, index: usize) -> Result<String, ServerError> {
        self.record_call("location");
        self.check_token(token)?;
        let state = self.state();
        if let Some(failure) = &state.location_failure {
            return Err(failure.clone());
        }
        state
            .locations
            .get(index)
            .cloned()
            .ok_or_else(|| ServerError::Status {
                status: 404,
                message: format!("no location {index}"),
            })
    }

    async fn pictures(&self, token: &str) -> Result<Vec<String>, ServerError> {
        self.record_call("pictures");
        self.check_token(token)?;
        Ok(self.state().pictures.clone())
    }

    async fn command(&self, token: &str, command: &SignedCommand) -> Result<(), ServerError> {
        self.record_call("command");
        self.check_token(token)?;
        let mut state = self.state();
        if let Some(failure) = &state.command_failure {
            return Err(failure.clone());
        }
        state.commands.push(command.clone());
        Ok(())
    }
}

/// A logged-in client against a fresh mock server.
pub async fn connected_client() -> (Arc<MockServer>, FmdClient) {
    connected_client_with(test_config()).await
}

pub async fn connected_client_with(config: ClientConfig) -> (Arc<MockServer>, FmdClient) {
    let server = MockServer::new();
    let (client, _artifacts) =
        FmdClient::authenticate_with(server.clone(), &credentials(), config)
            .await
            .expect("authentication against mock server");
    (server, client)
}
