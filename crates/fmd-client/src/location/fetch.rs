use fmd_crypto::{decrypt_base64, AccountKey};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::record::LocationRecord;
use super::selection::{select_location, LocationFilter, MAX_CANDIDATES};
use super::source::LocationSource;
use crate::commands::Ack;
use crate::error::{ClientError, Result};
use crate::session::Session;

/// Minimum number of indices probed when skipping empty placeholders.
pub const MAX_EMPTY_SKIP_ATTEMPTS: usize = 10;

/// Non-empty blobs, newest first, with their server index.
#[derive(Debug, Default)]
pub struct FetchedBlobs {
    pub blobs: Vec<(usize, String)>,
    pub empty_skipped: usize,
}

/// Fetch up to `wanted` non-empty location blobs, walking back from the newest.
///
/// Servers leave empty placeholders for slots without data; those are skipped
/// and counted. At most `max(wanted, MAX_EMPTY_SKIP_ATTEMPTS)` indices are
/// probed.
pub async fn fetch_latest_blobs(session: &Session, wanted: usize) -> Result<FetchedBlobs> {
    let count = session
        .call(|server, token| async move { server.location_count(&token).await })
        .await?;
    let mut fetched = FetchedBlobs::default();
    if count == 0 || wanted == 0 {
        debug!(fmd_id = %session.fmd_id(), "No locations stored");
        return Ok(fetched);
    }

    let attempts = wanted.max(MAX_EMPTY_SKIP_ATTEMPTS).min(count);
    for index in (count - attempts..count).rev() {
        let blob = session
            .call(|server, token| async move { server.location(&token, index).await })
            .await?;
        if blob.trim().is_empty() {
            debug!(index, "Empty location placeholder, skipping");
            fetched.empty_skipped += 1;
            continue;
        }
        fetched.blobs.push((index, blob));
        if fetched.blobs.len() >= wanted {
            break;
        }
    }

    if fetched.blobs.is_empty() {
        warn!(
            fmd_id = %session.fmd_id(),
            probed = attempts,
            "No non-empty locations among the newest records"
        );
    }
    Ok(fetched)
}

/// Decrypted records, newest first, plus what had to be skipped.
#[derive(Debug, Clone, Default)]
pub struct DecodedBatch {
    pub records: Vec<(usize, LocationRecord)>,
    pub empty_skipped: usize,
    pub integrity_failures: usize,
    pub decode_failures: usize,
}

impl DecodedBatch {
    pub fn select(&self, filter: &LocationFilter) -> Option<&LocationRecord> {
        select_location(self.records.iter().map(|(_, r)| r), filter).map(|(_, r)| r)
    }
}

/// Decrypt and parse blobs. CPU-bound; call from a blocking context.
pub fn decrypt_locations(key: &AccountKey, fetched: FetchedBlobs) -> DecodedBatch {
    let mut batch = DecodedBatch {
        empty_skipped: fetched.empty_skipped,
        ..DecodedBatch::default()
    };

    for (index, blob) in fetched.blobs {
        let plaintext = match decrypt_base64(&blob, key).map_err(ClientError::from) {
            Ok(p) => p,
            Err(e) if e.is_skippable() => {
                debug!(index, error = %e, "Location blob too short, treating as empty");
                batch.empty_skipped += 1;
                continue;
            }
            Err(ClientError::Integrity(msg)) => {
                error!(index, reason = %msg, "Location record failed integrity check");
                batch.integrity_failures += 1;
                continue;
            }
            Err(e) => {
                warn!(index, error = %e, "Could not decrypt location record");
                batch.decode_failures += 1;
                continue;
            }
        };
        match LocationRecord::from_json(&plaintext) {
            Ok(record) => batch.records.push((index, record)),
            Err(e) => {
                warn!(index, error = %e, "Decrypted location is not a valid record");
                batch.decode_failures += 1;
            }
        }
    }
    batch
}

/// Location reads and requests for one session.
#[derive(Clone)]
pub struct LocationService {
    session: Arc<Session>,
}

impl LocationService {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Fetch and decrypt the `n` newest non-empty records.
    pub async fn recent(&self, n: usize) -> Result<DecodedBatch> {
        let fetched = fetch_latest_blobs(&self.session, n).await?;
        let key = self.session.account_key();
        Ok(tokio::task::spawn_blocking(move || decrypt_locations(&key, fetched)).await?)
    }

    /// Read what the server already has, without prompting the device.
    pub async fn passive(&self, filter: &LocationFilter) -> Result<DecodedBatch> {
        let window = if filter.allow_inaccurate {
            1
        } else {
            filter.window.clamp(1, MAX_CANDIDATES)
        };
        self.recent(window).await
    }

    /// Ask the device for a fresh fix.
    pub async fn request_update(&self, source: LocationSource) -> Result<Ack> {
        info!(fmd_id = %self.session.fmd_id(), source = %source, "Requesting location update");
        self.session.send_command(source.command()).await
    }

    /// Best location the server already holds.
    ///
    /// Asking the device for a new fix is the tracker's job, see
    /// [`crate::TrackingScheduler::refresh`].
    pub async fn latest(&self, filter: &LocationFilter) -> Result<LocationRecord> {
        let batch = self.passive(filter).await?;
        if let Some(record) = batch.select(filter) {
            return Ok(record.clone());
        }
        if batch.integrity_failures > 0 {
            return Err(ClientError::Integrity(format!(
                "{} recent location record(s) failed verification",
                batch.integrity_failures
            )));
        }
        Err(ClientError::NoLocation)
    }
}
