/*!
 * Command implementations
 */

use anyhow::{bail, Context, Result};
use fmd_client::{ArtifactStore, AuthArtifacts, ClientConfig, ClientError, FmdClient};
use std::path::PathBuf;
use tracing::debug;

pub mod device;
pub mod export;
pub mod locate;
pub mod login;
pub mod photos;
pub mod wipe;

pub(crate) fn artifact_store(path: Option<PathBuf>) -> Result<ArtifactStore> {
    match path {
        Some(path) => Ok(ArtifactStore::new(path)),
        None => ArtifactStore::default_location().context("Failed to locate config directory"),
    }
}

/// Resume the stored session, persisting any token renewal.
pub(crate) async fn connect(store: &ArtifactStore, config: ClientConfig) -> Result<FmdClient> {
    if !store.exists() {
        bail!("Not logged in. Run 'fmd login' first.");
    }
    let artifacts = store.load().context("Failed to load stored session")?;
    let client = match FmdClient::resume(&artifacts, config).await {
        Ok(client) => client,
        Err(ClientError::ReauthRequired) => {
            bail!("Stored session has expired and cannot be renewed. Run 'fmd login' again.")
        }
        Err(e) => return Err(e).context("Failed to resume session"),
    };
    persist_renewal(store, &client, &artifacts).await?;
    Ok(client)
}

/// Save the artifacts again if the token changed since `previous`.
pub(crate) async fn persist_renewal(
    store: &ArtifactStore,
    client: &FmdClient,
    previous: &AuthArtifacts,
) -> Result<()> {
    let current = client.export_artifacts().await?;
    if current.access_token != previous.access_token {
        store.save(&current).context("Failed to save renewed session")?;
        debug!(path = %store.path().display(), "Saved renewed session");
    }
    Ok(())
}
