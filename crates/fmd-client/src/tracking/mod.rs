//! Recurring location polling for one device.

mod scheduler;

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::error::{ClientError, Result};
use crate::location::{LocationRecord, LocationSource};

pub use scheduler::TrackingScheduler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollingMode {
    /// Passive reads of whatever the device last uploaded
    Normal,
    /// Every cycle asks the device for a fresh fix first
    HighFrequency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollKind {
    Passive,
    Active,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// A record was accepted and differs from the previous one
    Updated,
    /// The accepted record is the one already known
    Unchanged,
    /// Nothing usable came back; the previous location is kept
    NoLocation,
    /// The poll failed; the previous location is kept
    Failed(ClientError),
}

/// Result of one poll, broadcast to subscribers.
#[derive(Debug, Clone)]
pub struct PollReport {
    pub kind: PollKind,
    pub outcome: PollOutcome,
    /// Record accepted by this poll, if any
    pub location: Option<LocationRecord>,
    pub empty_skipped: usize,
    pub integrity_failures: usize,
    pub finished_at: DateTime<Utc>,
}

impl PollReport {
    /// The accepted record, or the reason this poll produced none.
    pub fn into_location(self) -> Result<LocationRecord> {
        let integrity_failures = self.integrity_failures;
        match (self.outcome, self.location) {
            (PollOutcome::Failed(e), _) => Err(e),
            (_, Some(record)) => Ok(record),
            _ if integrity_failures > 0 => Err(ClientError::Integrity(format!(
                "{integrity_failures} recent location record(s) failed verification"
            ))),
            _ => Err(ClientError::NoLocation),
        }
    }
}

/// Snapshot of the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct PollingState {
    pub mode: PollingMode,
    pub interval: Duration,
    pub in_flight: bool,
    pub running: bool,
    pub last_success: Option<DateTime<Utc>>,
    pub location_source: LocationSource,
}
