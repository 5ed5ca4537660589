use chrono::NaiveDateTime;
use fmd_crypto::{decrypt_base64, AccountKey};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use super::metadata::capture_time;
use super::payload::{decode_photo_payload, extension_for, sniff_mime};
use crate::error::{ClientError, Result};
use crate::session::Session;

/// An encrypted photo as listed by the server.
#[derive(Clone, PartialEq, Eq)]
pub struct BlobRef {
    /// Position in the server's list, 0 = oldest
    pub position: usize,
    pub blob: String,
}

impl BlobRef {
    /// Hex SHA-256 of the ciphertext; identifies a blob without decrypting it.
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(self.blob.trim().as_bytes()))
    }
}

impl fmt::Debug for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobRef")
            .field("position", &self.position)
            .field("len", &self.blob.len())
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct DecryptedPhoto {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    /// From EXIF, camera local time
    pub captured_at: Option<NaiveDateTime>,
    /// Hex SHA-256 of `bytes`
    pub content_hash: String,
}

impl DecryptedPhoto {
    fn from_plaintext(plaintext: &[u8]) -> Result<Self> {
        let (bytes, declared) = decode_photo_payload(plaintext)?;
        let mime_type = declared
            .or_else(|| sniff_mime(&bytes).map(str::to_string))
            .unwrap_or_else(|| "application/octet-stream".into());
        let content_hash = hex::encode(Sha256::digest(&bytes));
        let captured_at = capture_time(&bytes);
        Ok(Self {
            bytes,
            mime_type,
            captured_at,
            content_hash,
        })
    }

    pub fn short_hash(&self) -> &str {
        &self.content_hash[..self.content_hash.len().min(8)]
    }

    pub fn extension(&self) -> &'static str {
        extension_for(&self.mime_type)
    }

    /// `photo_<YYYYmmdd_HHMMSS>_<hash8>.<ext>`, or `photo_<hash8>.<ext>` without EXIF time.
    pub fn file_name(&self) -> String {
        match self.captured_at {
            Some(ts) => format!(
                "photo_{}_{}.{}",
                ts.format("%Y%m%d_%H%M%S"),
                self.short_hash(),
                self.extension()
            ),
            None => format!("photo_{}.{}", self.short_hash(), self.extension()),
        }
    }
}

impl fmt::Debug for DecryptedPhoto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptedPhoto")
            .field("len", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .field("captured_at", &self.captured_at)
            .field("content_hash", &self.content_hash)
            .finish()
    }
}

/// New photos from one fetch, newest first.
#[derive(Debug, Default)]
pub struct PhotoBatch {
    pub photos: Vec<DecryptedPhoto>,
    /// Already known by content hash
    pub duplicates: usize,
    /// Empty or undecodable entries
    pub skipped: usize,
    pub integrity_failures: usize,
}

/// Fetches and decrypts photos, remembering what it has already produced.
pub struct PhotoPipeline {
    session: Arc<Session>,
    known_hashes: Mutex<HashSet<String>>,
    /// Ciphertext digest to content hash, so known blobs are not decrypted again
    digests: Mutex<HashMap<String, String>>,
}

/// Helper to handle mutex lock with poison recovery
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        warn!("Photo cache mutex was poisoned, recovering");
        poisoned.into_inner()
    })
}

impl PhotoPipeline {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            known_hashes: Mutex::new(HashSet::new()),
            digests: Mutex::new(HashMap::new()),
        }
    }

    /// Seed with content hashes of photos the host already has.
    pub fn mark_known<I, S>(&self, hashes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        lock(&self.known_hashes).extend(hashes.into_iter().map(Into::into));
    }

    pub fn is_known(&self, content_hash: &str) -> bool {
        lock(&self.known_hashes).contains(content_hash)
    }

    /// The `n` newest non-empty photo blobs, newest first.
    pub async fn list_recent(&self, n: usize) -> Result<Vec<BlobRef>> {
        let all = self
            .session
            .call(|server, token| async move { server.pictures(&token).await })
            .await?;
        let total = all.len();
        let refs: Vec<BlobRef> = all
            .into_iter()
            .enumerate()
            .rev()
            .filter(|(_, blob)| !blob.trim().is_empty())
            .take(n)
            .map(|(position, blob)| BlobRef { position, blob })
            .collect();
        debug!(total, selected = refs.len(), "Listed photos");
        Ok(refs)
    }

    /// Decrypt one photo off the async threads.
    pub async fn decrypt(&self, blob: &BlobRef) -> Result<DecryptedPhoto> {
        let key = self.session.account_key();
        let data = blob.blob.clone();
        tokio::task::spawn_blocking(move || decrypt_photo(&key, &data)).await?
    }

    /// Fetch the `n` newest photos, skipping any whose content is already known.
    pub async fn fetch_new(&self, n: usize) -> Result<PhotoBatch> {
        let refs = self.list_recent(n).await?;
        let mut batch = PhotoBatch::default();

        for blob in refs {
            let digest = blob.digest();
            let cached = lock(&self.digests).get(&digest).cloned();
            if let Some(hash) = cached {
                if self.is_known(&hash) {
                    debug!(position = blob.position, "Known photo, not decrypting");
                    batch.duplicates += 1;
                    continue;
                }
            }

            let photo = match self.decrypt(&blob).await {
                Ok(photo) => photo,
                Err(e) if e.is_skippable() => {
                    debug!(position = blob.position, "Empty photo placeholder, skipping");
                    batch.skipped += 1;
                    continue;
                }
                Err(ClientError::Integrity(msg)) => {
                    error!(position = blob.position, reason = %msg, "Photo failed integrity check");
                    batch.integrity_failures += 1;
                    continue;
                }
                Err(e) => {
                    warn!(position = blob.position, error = %e, "Could not decode photo");
                    batch.skipped += 1;
                    continue;
                }
            };

            lock(&self.digests).insert(digest, photo.content_hash.clone());
            let fresh = lock(&self.known_hashes).insert(photo.content_hash.clone());
            if !fresh {
                batch.duplicates += 1;
                continue;
            }
            batch.photos.push(photo);
        }

        info!(
            new = batch.photos.len(),
            duplicates = batch.duplicates,
            skipped = batch.skipped,
            integrity_failures = batch.integrity_failures,
            "Photo fetch completed"
        );
        Ok(batch)
    }
}

fn decrypt_photo(key: &AccountKey, blob: &str) -> Result<DecryptedPhoto> {
    let plaintext = decrypt_base64(blob, key)?;
    DecryptedPhoto::from_plaintext(&plaintext)
}
