use tracing::{debug, warn};

use super::record::LocationRecord;
use crate::config::TrackerConfig;

/// Upper bound on how many of the newest records are inspected.
pub const MAX_CANDIDATES: usize = 5;

/// Providers known to produce coarse fixes
const KNOWN_INACCURATE: &[&str] = &["beacondb", ""];

/// Accuracy filter applied when choosing among recent records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationFilter {
    pub allow_inaccurate: bool,
    /// Lowercase provider names considered accurate
    pub accepted_providers: Vec<String>,
    pub window: usize,
}

impl Default for LocationFilter {
    fn default() -> Self {
        Self::from(&TrackerConfig::default())
    }
}

impl From<&TrackerConfig> for LocationFilter {
    fn from(config: &TrackerConfig) -> Self {
        Self {
            allow_inaccurate: config.allow_inaccurate,
            accepted_providers: config
                .accepted_providers
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
            window: config.candidate_window,
        }
    }
}

impl LocationFilter {
    pub fn accept_any() -> Self {
        Self {
            allow_inaccurate: true,
            ..Self::default()
        }
    }

    fn window(&self) -> usize {
        self.window.clamp(1, MAX_CANDIDATES)
    }
}

/// Whether `provider` is on the accepted list (case-insensitive).
///
/// Providers that are neither accepted nor known to be coarse are logged,
/// since they usually mean the device software changed.
pub fn is_accurate_provider(provider: &str, accepted: &[String]) -> bool {
    let provider = provider.trim().to_lowercase();
    if accepted.iter().any(|p| *p == provider) {
        return true;
    }
    if !KNOWN_INACCURATE.contains(&provider.as_str()) {
        warn!(provider = %provider, "Unknown location provider, treating as inaccurate");
    }
    false
}

/// Pick the newest acceptable record from `candidates` (ordered newest first).
///
/// Returns the position within `candidates` together with the record.
pub fn select_location<'a, I>(candidates: I, filter: &LocationFilter) -> Option<(usize, &'a LocationRecord)>
where
    I: IntoIterator<Item = &'a LocationRecord>,
{
    let mut window = candidates.into_iter().take(filter.window()).enumerate();

    if filter.allow_inaccurate {
        return window.next();
    }

    let mut scanned = 0;
    for (idx, record) in window {
        scanned += 1;
        if is_accurate_provider(&record.provider, &filter.accepted_providers) {
            if idx > 0 {
                debug!(
                    index = idx,
                    provider = %record.provider,
                    "Skipped newer inaccurate locations"
                );
            }
            return Some((idx, record));
        }
    }
    if scanned > 0 {
        debug!(candidates = scanned, "No accurate location among candidates");
    }
    None
}
