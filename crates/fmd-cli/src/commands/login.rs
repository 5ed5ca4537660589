/*!
 * Login and logout
 */

use anyhow::{Context, Result};
use colored::*;
use fmd_client::{ArtifactStore, ClientConfig, Credentials, FmdClient};

use crate::prompt::prompt_secret;

pub async fn login(
    store: &ArtifactStore,
    config: ClientConfig,
    server: &str,
    fmd_id: &str,
    no_renew: bool,
) -> Result<()> {
    println!("{}", "=== Logging in ===".bold().cyan());
    println!("  Server: {}", server);
    println!("  Device: {}", fmd_id);

    let password = prompt_secret("Password: ")?;
    let credentials = Credentials::new(server, fmd_id, password.as_str());
    drop(password);

    println!("\n{}", "Deriving keys (this takes a moment)...".yellow());
    let (_client, mut artifacts) = FmdClient::authenticate(&credentials, config)
        .await
        .context("Login failed")?;
    drop(credentials);

    if no_renew {
        artifacts.password_hash = None;
    }
    store.save(&artifacts).context("Failed to save session")?;

    println!("{}", "✓ Logged in".green());
    println!("  Session stored at {}", store.path().display());
    if no_renew {
        println!(
            "{}",
            "  Session will not renew itself; log in again when it expires.".yellow()
        );
    } else {
        println!(
            "{}",
            "  The stored session grants full account access. Keep it private.".yellow()
        );
    }
    Ok(())
}

pub fn logout(store: &ArtifactStore) -> Result<()> {
    if !store.exists() {
        println!("Not logged in.");
        return Ok(());
    }
    store.delete().context("Failed to delete session")?;
    println!("{}", "✓ Stored session deleted".green());
    Ok(())
}
