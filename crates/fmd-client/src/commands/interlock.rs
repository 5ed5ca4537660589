//! Arm/disarm gate in front of the destructive wipe command.
//!
//! The armed state is a single generation counter: 0 means disarmed, any other
//! value identifies one particular arm. Every transition to disarmed is a
//! compare-and-swap from a specific generation, so the timeout, a manual
//! disarm and a wipe attempt can race freely and exactly one of them wins.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::{ClientError, Result};

const DISARMED: u64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterlockStatus {
    pub armed: bool,
    pub armed_at: Option<DateTime<Utc>>,
    pub auto_disarm_at: Option<DateTime<Utc>>,
}

struct ArmRecord {
    generation: u64,
    armed_at: DateTime<Utc>,
    auto_disarm_at: DateTime<Utc>,
    timer: JoinHandle<()>,
}

pub struct SafetyInterlock {
    armed: AtomicU64,
    next_generation: AtomicU64,
    timeout: Duration,
    record: Mutex<Option<ArmRecord>>,
}

/// Helper to handle mutex lock with poison recovery
fn lock_record(mutex: &Mutex<Option<ArmRecord>>) -> MutexGuard<'_, Option<ArmRecord>> {
    mutex.lock().unwrap_or_else(|poisoned| {
        warn!("Interlock mutex was poisoned, recovering");
        poisoned.into_inner()
    })
}

impl SafetyInterlock {
    pub fn new(timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            armed: AtomicU64::new(DISARMED),
            next_generation: AtomicU64::new(1),
            timeout,
            record: Mutex::new(None),
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst) != DISARMED
    }

    /// Arm, replacing any earlier arm and restarting the timeout.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn arm(self: &Arc<Self>) -> InterlockStatus {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let armed_at = Utc::now();
        let auto_disarm_at = armed_at
            + chrono::Duration::from_std(self.timeout).unwrap_or_else(|_| chrono::Duration::zero());

        let weak = Arc::downgrade(self);
        let timeout = self.timeout;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(interlock) = weak.upgrade() {
                if interlock.transition_from(generation) {
                    warn!(timeout_secs = timeout.as_secs(), "Wipe interlock auto-disarmed");
                }
            }
        });

        let mut record = lock_record(&self.record);
        self.armed.store(generation, Ordering::SeqCst);
        if let Some(previous) = record.replace(ArmRecord {
            generation,
            armed_at,
            auto_disarm_at,
            timer,
        }) {
            previous.timer.abort();
        }
        drop(record);

        warn!(
            timeout_secs = self.timeout.as_secs(),
            "Wipe interlock ARMED"
        );
        self.status()
    }

    /// Disarm manually. Returns false if it was not armed.
    pub fn disarm(&self) -> bool {
        let current = self.armed.load(Ordering::SeqCst);
        if current == DISARMED || !self.transition_from(current) {
            return false;
        }
        info!("Wipe interlock disarmed");
        true
    }

    /// Take the arm for one execution attempt.
    pub fn consume(&self) -> Result<()> {
        loop {
            let current = self.armed.load(Ordering::SeqCst);
            if current == DISARMED {
                return Err(ClientError::NotArmed);
            }
            if self.transition_from(current) {
                return Ok(());
            }
        }
    }

    /// CAS `generation -> disarmed`; true for the single caller that wins.
    fn transition_from(&self, generation: u64) -> bool {
        let won = self
            .armed
            .compare_exchange(generation, DISARMED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if won {
            let mut record = lock_record(&self.record);
            if record.as_ref().is_some_and(|r| r.generation == generation) {
                if let Some(r) = record.take() {
                    r.timer.abort();
                }
            }
        }
        won
    }

    pub fn status(&self) -> InterlockStatus {
        let record = lock_record(&self.record);
        let current = self.armed.load(Ordering::SeqCst);
        match record.as_ref() {
            Some(r) if r.generation == current => InterlockStatus {
                armed: true,
                armed_at: Some(r.armed_at),
                auto_disarm_at: Some(r.auto_disarm_at),
            },
            _ => InterlockStatus {
                armed: false,
                armed_at: None,
                auto_disarm_at: None,
            },
        }
    }
}

impl Drop for SafetyInterlock {
    fn drop(&mut self) {
        if let Some(r) = lock_record(&self.record).take() {
            r.timer.abort();
        }
    }
}
