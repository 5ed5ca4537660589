use chrono::Utc;
use fmd_crypto::{
    current_timestamp_ms, derive_auth_hash, sign_command, unwrap_private_key, AccountKey,
    AuthHash,
};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use super::artifacts::{renew_deadline, AuthArtifacts, Credentials};
use crate::commands::Ack;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::server::{FmdServer, ServerError, SignedCommand};

/// Lifecycle of a [`Session`]'s bearer token.
///
/// A `Session` only exists once a login or resume has produced a token, so it
/// starts out `Authenticated`. Renewal moves it through `Expired` and
/// `Reauthenticating`, and ends in `Authenticated` or, when the stored login
/// hash is rejected, `Unauthenticated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
    Expired,
    Reauthenticating,
}

/// Turns credentials or stored artifacts into a live [`Session`].
pub struct SessionAuthenticator {
    server: Arc<dyn FmdServer>,
    config: ClientConfig,
}

impl SessionAuthenticator {
    pub fn new(server: Arc<dyn FmdServer>, config: ClientConfig) -> Self {
        Self { server, config }
    }

    /// Full login: salt, login hash, token, then private key unwrap.
    ///
    /// Rejected credentials fail with [`ClientError::Auth`] and are not retried.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<Session> {
        let fmd_id = credentials.fmd_id.as_str();
        info!(fmd_id = %fmd_id, "Authenticating");

        let salt = self.server.salt(fmd_id).await.map_err(login_error)?;
        if salt.trim().is_empty() {
            return Err(ClientError::Auth("server returned no salt for this account".into()));
        }

        let kdf = self.config.kdf;
        let password = credentials.password.clone();
        let auth_hash = tokio::task::spawn_blocking(move || {
            derive_auth_hash(password.as_str(), salt.trim(), &kdf)
        })
        .await??;

        let duration = self.config.session_duration_secs;
        let token = self
            .server
            .request_access(fmd_id, auth_hash.as_str(), duration)
            .await
            .map_err(login_error)?;
        let issued_at = Utc::now().timestamp();
        debug!(fmd_id = %fmd_id, "Access token issued");

        let blob = self.server.private_key_blob(&token).await?;
        let password = credentials.password.clone();
        let key = tokio::task::spawn_blocking(move || {
            unwrap_private_key(&blob, password.as_str(), &kdf)
        })
        .await??;

        info!(fmd_id = %fmd_id, key_bits = key.size() * 8, "Authenticated");
        Ok(Session::new(
            Arc::clone(&self.server),
            fmd_id.to_string(),
            key,
            Some(auth_hash),
            token,
            issued_at,
            duration,
            &self.config,
        ))
    }

    /// Rebuild a session from stored artifacts without the password.
    ///
    /// A token the server no longer honors is renewed from the embedded login
    /// hash when there is one; otherwise this fails with
    /// [`ClientError::ReauthRequired`].
    pub async fn resume(&self, artifacts: &AuthArtifacts) -> Result<Session> {
        artifacts.validate()?;
        if artifacts.base_url.trim_end_matches('/') != self.server.base_url().trim_end_matches('/')
        {
            return Err(ClientError::InvalidInput(format!(
                "artifacts belong to {}, not {}",
                artifacts.base_url,
                self.server.base_url()
            )));
        }

        let pem = Zeroizing::new(artifacts.private_key.clone());
        let key = tokio::task::spawn_blocking(move || AccountKey::from_pem(pem.as_str())).await??;

        let session = Session::new(
            Arc::clone(&self.server),
            artifacts.fmd_id.clone(),
            key,
            artifacts.password_hash.clone().map(AuthHash::from_phc),
            artifacts.access_token.clone(),
            artifacts.token_issued_at,
            artifacts.session_duration_secs,
            &self.config,
        );

        if artifacts.is_expired(self.config.token_expiry_skew_secs) {
            info!(fmd_id = %artifacts.fmd_id, "Stored token expired, renewing");
            session.refresh(0).await?;
            return Ok(session);
        }

        let probe = session
            .server
            .location_count(&artifacts.access_token)
            .await;
        match probe {
            Ok(_) => {}
            Err(ServerError::Unauthorized) => {
                info!(fmd_id = %artifacts.fmd_id, "Stored token rejected, renewing");
                session.refresh(0).await?;
            }
            Err(e) => {
                warn!(fmd_id = %artifacts.fmd_id, error = %e, "Could not verify stored token, continuing");
            }
        }
        info!(fmd_id = %artifacts.fmd_id, "Session resumed");
        Ok(session)
    }
}

fn login_error(err: ServerError) -> ClientError {
    match err {
        ServerError::Unauthorized => ClientError::Auth("credentials rejected".into()),
        ServerError::Status { status, message } if (400..500).contains(&status) => {
            ClientError::Auth(format!("credentials rejected ({status}): {message}"))
        }
        other => other.into(),
    }
}

struct TokenState {
    token: Zeroizing<String>,
    issued_at: i64,
    /// Lifetime granted to `token`
    duration_secs: u64,
    /// Bumped on every renewal so concurrent refreshers can tell they lost the race
    generation: u64,
    state: SessionState,
}

/// An authenticated account session.
///
/// Shared behind an `Arc`; token renewal is serialized so concurrent callers
/// that all hit an expired token trigger a single re-authentication.
pub struct Session {
    server: Arc<dyn FmdServer>,
    fmd_id: String,
    key: Arc<AccountKey>,
    password_hash: Option<AuthHash>,
    /// Lifetime asked for on renewal
    requested_duration_secs: u64,
    expiry_skew_secs: u64,
    token: RwLock<TokenState>,
    refresh_lock: Mutex<()>,
}

impl Session {
    fn new(
        server: Arc<dyn FmdServer>,
        fmd_id: String,
        key: AccountKey,
        password_hash: Option<AuthHash>,
        token: String,
        issued_at: i64,
        duration_secs: u64,
        config: &ClientConfig,
    ) -> Self {
        Self {
            server,
            fmd_id,
            key: Arc::new(key),
            password_hash,
            requested_duration_secs: config.session_duration_secs,
            expiry_skew_secs: config.token_expiry_skew_secs,
            token: RwLock::new(TokenState {
                token: Zeroizing::new(token),
                issued_at,
                duration_secs,
                generation: 0,
                state: SessionState::Authenticated,
            }),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn fmd_id(&self) -> &str {
        &self.fmd_id
    }

    pub fn server(&self) -> &Arc<dyn FmdServer> {
        &self.server
    }

    pub fn account_key(&self) -> Arc<AccountKey> {
        Arc::clone(&self.key)
    }

    pub async fn state(&self) -> SessionState {
        self.token.read().await.state
    }

    /// Snapshot the session for password-free resumption.
    pub async fn export_artifacts(&self) -> Result<AuthArtifacts> {
        let key = Arc::clone(&self.key);
        let pem = tokio::task::spawn_blocking(move || key.to_pem()).await??;
        let state = self.token.read().await;
        Ok(AuthArtifacts {
            base_url: self.server.base_url().to_string(),
            fmd_id: self.fmd_id.clone(),
            access_token: state.token.to_string(),
            private_key: pem.to_string(),
            password_hash: self.password_hash.as_ref().map(|h| h.as_str().to_string()),
            session_duration_secs: state.duration_secs,
            token_issued_at: state.issued_at,
        })
    }

    /// Current token and its generation, renewing first if it is about to expire.
    async fn ensure_fresh(&self) -> Result<(Zeroizing<String>, u64)> {
        let (expired, generation) = {
            let st = self.token.read().await;
            let deadline = renew_deadline(st.issued_at, st.duration_secs, self.expiry_skew_secs);
            (Utc::now().timestamp() >= deadline, st.generation)
        };
        if expired && self.password_hash.is_some() {
            debug!(fmd_id = %self.fmd_id, "Token near expiry, renewing proactively");
            self.refresh(generation).await?;
        }
        let st = self.token.read().await;
        Ok((st.token.clone(), st.generation))
    }

    /// Renew the token unless someone else already did since `observed_generation`.
    async fn refresh(&self, observed_generation: u64) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;

        {
            let mut st = self.token.write().await;
            if st.generation != observed_generation {
                return Ok(());
            }
            st.state = SessionState::Expired;
        }

        let Some(hash) = &self.password_hash else {
            warn!(fmd_id = %self.fmd_id, "Token expired and no login hash is stored");
            return Err(ClientError::ReauthRequired);
        };

        self.token.write().await.state = SessionState::Reauthenticating;
        let result = self
            .server
            .request_access(&self.fmd_id, hash.as_str(), self.requested_duration_secs)
            .await;

        let mut st = self.token.write().await;
        match result {
            Ok(token) => {
                st.token = Zeroizing::new(token);
                st.issued_at = Utc::now().timestamp();
                st.duration_secs = self.requested_duration_secs;
                st.generation += 1;
                st.state = SessionState::Authenticated;
                info!(fmd_id = %self.fmd_id, generation = st.generation, "Session token renewed");
                Ok(())
            }
            Err(ServerError::Unauthorized) | Err(ServerError::Status { .. }) => {
                st.state = SessionState::Unauthenticated;
                warn!(fmd_id = %self.fmd_id, "Stored login hash rejected");
                Err(ClientError::ReauthRequired)
            }
            Err(e) => {
                st.state = SessionState::Expired;
                Err(e.into())
            }
        }
    }

    /// Run a server call with a valid token, renewing and retrying once on 401.
    ///
    /// Only for idempotent reads. Commands go through [`Session::send_command`].
    pub async fn call<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn(Arc<dyn FmdServer>, Zeroizing<String>) -> Fut,
        Fut: Future<Output = std::result::Result<T, ServerError>>,
    {
        let (token, generation) = self.ensure_fresh().await?;
        match op(Arc::clone(&self.server), token).await {
            Err(ServerError::Unauthorized) => {
                debug!(fmd_id = %self.fmd_id, "Token rejected, renewing");
                self.refresh(generation).await?;
                let token = self.token.read().await.token.clone();
                Ok(op(Arc::clone(&self.server), token).await?)
            }
            other => Ok(other?),
        }
    }

    /// Like [`Session::call`] but never replays the operation.
    ///
    /// A 401 still renews the token so the next attempt can succeed.
    async fn call_once<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce(Arc<dyn FmdServer>, Zeroizing<String>) -> Fut,
        Fut: Future<Output = std::result::Result<T, ServerError>>,
    {
        let (token, generation) = self.ensure_fresh().await?;
        match op(Arc::clone(&self.server), token).await {
            Err(ServerError::Unauthorized) => {
                self.refresh(generation).await?;
                Err(ClientError::TransientNetwork(
                    "token was rejected and has been renewed; command was not delivered".into(),
                ))
            }
            other => Ok(other?),
        }
    }

    /// Sign and submit a raw command string. Sent at most once.
    pub async fn send_command(&self, command: &str) -> Result<Ack> {
        let key = Arc::clone(&self.key);
        let cmd = command.to_string();
        let signed = tokio::task::spawn_blocking(move || {
            let unix_time_ms = current_timestamp_ms();
            sign_command(&key, &cmd, unix_time_ms).map(|signature| SignedCommand {
                command: cmd,
                unix_time_ms,
                signature,
            })
        })
        .await??;

        let verb = signed.verb().to_string();
        self.call_once(|server, token| async move { server.command(&token, &signed).await })
            .await?;

        debug!(fmd_id = %self.fmd_id, command = %verb, "Command accepted by server");
        Ok(Ack {
            command: verb,
            accepted_at: Utc::now(),
        })
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("fmd_id", &self.fmd_id)
            .field("base_url", &self.server.base_url())
            .field("can_renew", &self.password_hash.is_some())
            .finish_non_exhaustive()
    }
}
