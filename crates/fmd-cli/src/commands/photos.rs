/*!
 * Photo download
 */

use anyhow::{Context, Result};
use colored::*;
use fmd_client::{ArtifactStore, ClientConfig};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

use super::connect;

pub async fn download(
    store: &ArtifactStore,
    config: ClientConfig,
    dir: &Path,
    count: usize,
) -> Result<()> {
    let client = connect(store, config).await?;

    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    client.photos().mark_known(existing_hashes(dir)?);

    let batch = client
        .list_photos(count)
        .await
        .context("Failed to fetch photos")?;

    for photo in &batch.photos {
        let path = dir.join(photo.file_name());
        fs::write(&path, &photo.bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("{} {}", "✓".green(), path.display());
    }

    println!(
        "\n{} new, {} already downloaded, {} skipped",
        batch.photos.len(),
        batch.duplicates,
        batch.skipped
    );
    if batch.integrity_failures > 0 {
        println!(
            "{}",
            format!(
                "⚠ {} photo(s) failed verification and were not saved",
                batch.integrity_failures
            )
            .red()
            .bold()
        );
    }
    Ok(())
}

/// Content hashes of photos already in `dir`.
fn existing_hashes(dir: &Path) -> Result<Vec<String>> {
    let mut hashes = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let is_photo = entry.file_name().to_string_lossy().starts_with("photo_");
        if !is_photo || !entry.file_type()?.is_file() {
            continue;
        }
        let bytes = fs::read(entry.path())?;
        hashes.push(hex::encode(Sha256::digest(&bytes)));
    }
    Ok(hashes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_existing_hashes_only_reads_photos() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("photo_abcd1234.jpg"), b"image").unwrap();
        fs::write(dir.path().join("notes.txt"), b"not a photo").unwrap();
        fs::create_dir(dir.path().join("photo_dir")).unwrap();

        let hashes = existing_hashes(dir.path()).unwrap();
        assert_eq!(hashes, vec![hex::encode(Sha256::digest(b"image"))]);
    }
}
