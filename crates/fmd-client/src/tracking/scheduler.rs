use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, error, info, warn};

use super::{PollKind, PollOutcome, PollReport, PollingMode, PollingState};
use crate::config::TrackerConfig;
use crate::error::{ClientError, Result};
use crate::location::{LocationFilter, LocationRecord, LocationService, LocationSource};

const REPORT_CHANNEL_CAPACITY: usize = 16;

/// Helper to handle mutex lock with poison recovery
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        warn!("Tracker mutex was poisoned, recovering");
        poisoned.into_inner()
    })
}

struct TrackerInner {
    locations: LocationService,
    config: watch::Sender<TrackerConfig>,
    in_flight: AtomicBool,
    stopped: AtomicBool,
    stop: Notify,
    last_known: Mutex<Option<LocationRecord>>,
    last_success: Mutex<Option<DateTime<Utc>>>,
    reports: broadcast::Sender<PollReport>,
}

/// Clears the in-flight flag when a poll ends, however it ends.
struct InFlightGuard(Arc<TrackerInner>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.in_flight.store(false, Ordering::Release);
    }
}

/// Drives periodic polls for a single device.
///
/// At most one poll runs at a time, whether it was started by a tick, by
/// [`poll_now`](Self::poll_now) or by an on-demand [`refresh`](Self::refresh).
/// A tick that finds a poll in flight is dropped. Configuration lives in a
/// watch channel and is re-read at every scheduling decision.
pub struct TrackingScheduler {
    inner: Arc<TrackerInner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TrackingScheduler {
    pub fn new(locations: LocationService, config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        let (config, _) = watch::channel(config);
        let (reports, _) = broadcast::channel(REPORT_CHANNEL_CAPACITY);
        Ok(Self {
            inner: Arc::new(TrackerInner {
                locations,
                config,
                in_flight: AtomicBool::new(false),
                stopped: AtomicBool::new(true),
                stop: Notify::new(),
                last_known: Mutex::new(None),
                last_success: Mutex::new(None),
                reports,
            }),
            task: Mutex::new(None),
        })
    }

    /// Start the timer loop. No-op if already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        let mut task = lock(&self.task);
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }
        self.inner.stopped.store(false, Ordering::SeqCst);
        let interval = self.inner.config.borrow().current_interval();
        info!(
            fmd_id = %self.inner.locations.session().fmd_id(),
            interval_secs = interval.as_secs(),
            "Tracking started"
        );
        *task = Some(tokio::spawn(run(Arc::clone(&self.inner))));
    }

    /// Stop scheduling. A poll already in flight runs to completion.
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        self.inner.stop.notify_one();
        if let Some(task) = lock(&self.task).take() {
            task.abort();
        }
        info!(fmd_id = %self.inner.locations.session().fmd_id(), "Tracking stopped");
    }

    pub fn is_running(&self) -> bool {
        !self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Switch mode, optionally changing that mode's interval (minutes).
    ///
    /// Entering high-frequency mode while running triggers an immediate
    /// active poll.
    pub fn set_polling_mode(&self, mode: PollingMode, interval_mins: Option<u32>) -> Result<()> {
        let mut applied = Ok(false);
        self.inner.config.send_if_modified(|current| {
            let mut next = current.clone();
            match mode {
                PollingMode::Normal => {
                    next.high_frequency_mode = false;
                    if let Some(mins) = interval_mins {
                        next.polling_interval_mins = mins;
                    }
                }
                PollingMode::HighFrequency => {
                    next.high_frequency_mode = true;
                    if let Some(mins) = interval_mins {
                        next.high_frequency_interval_mins = mins;
                    }
                }
            }
            if let Err(e) = next.validate() {
                applied = Err(e);
                return false;
            }
            let was_high_frequency = current.high_frequency_mode;
            *current = next;
            applied = Ok(was_high_frequency);
            true
        });
        let was_high_frequency = applied?;
        info!(?mode, interval_secs = self.config().current_interval().as_secs(), "Polling mode set");

        if mode == PollingMode::HighFrequency && !was_high_frequency && self.is_running() {
            spawn_poll(&self.inner, PollKind::Active);
        }
        Ok(())
    }

    /// Replace the configuration. Takes effect at the next scheduling decision.
    pub fn update_config(&self, config: TrackerConfig) -> Result<()> {
        config.validate()?;
        self.inner.config.send_replace(config);
        Ok(())
    }

    pub fn config(&self) -> TrackerConfig {
        self.inner.config.borrow().clone()
    }

    /// Run a poll right now on the caller's task.
    ///
    /// Returns `None` if another poll is already in flight.
    pub async fn poll_now(&self, kind: PollKind) -> Option<PollReport> {
        let guard = try_begin(&self.inner)?;
        Some(self.inner.run_poll(guard, kind, None).await)
    }

    /// Ask the device for a fresh `source` fix and return the best location.
    ///
    /// Goes through the same overlap guard as scheduled polls. When a poll is
    /// already in flight no second request is sent; its report is awaited and
    /// used instead.
    pub async fn refresh(&self, source: LocationSource) -> Result<LocationRecord> {
        // Subscribe before trying the guard so the in-flight report can't be missed.
        let mut reports = self.inner.reports.subscribe();
        let report = match try_begin(&self.inner) {
            Some(guard) => {
                self.inner
                    .run_poll(guard, PollKind::Active, Some(source))
                    .await
            }
            None => {
                debug!(
                    fmd_id = %self.inner.locations.session().fmd_id(),
                    "Poll already in flight, waiting for its result"
                );
                loop {
                    match reports.recv().await {
                        Ok(report) => break report,
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => {
                            return Err(ClientError::InvalidInput(
                                "tracker shut down during refresh".into(),
                            ))
                        }
                    }
                }
            }
        };
        report.into_location()
    }

    pub fn last_known(&self) -> Option<LocationRecord> {
        lock(&self.inner.last_known).clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PollReport> {
        self.inner.reports.subscribe()
    }

    pub fn state(&self) -> PollingState {
        let config = self.config();
        PollingState {
            mode: if config.high_frequency_mode {
                PollingMode::HighFrequency
            } else {
                PollingMode::Normal
            },
            interval: config.current_interval(),
            in_flight: self.inner.in_flight.load(Ordering::Acquire),
            running: self.is_running(),
            last_success: *lock(&self.inner.last_success),
            location_source: config.location_source,
        }
    }
}

impl Drop for TrackingScheduler {
    fn drop(&mut self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        if let Some(task) = lock(&self.task).take() {
            task.abort();
        }
    }
}

fn try_begin(inner: &Arc<TrackerInner>) -> Option<InFlightGuard> {
    inner
        .in_flight
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .ok()
        .map(|_| InFlightGuard(Arc::clone(inner)))
}

/// Start a poll in the background unless one is already running.
fn spawn_poll(inner: &Arc<TrackerInner>, kind: PollKind) -> bool {
    let Some(guard) = try_begin(inner) else {
        debug!(?kind, "Previous poll still in flight, skipping");
        return false;
    };
    let inner = Arc::clone(inner);
    tokio::spawn(async move {
        inner.run_poll(guard, kind, None).await;
    });
    true
}

async fn run(inner: Arc<TrackerInner>) {
    let mut config_rx = inner.config.subscribe();
    let mut cycle_start = Instant::now();

    loop {
        if inner.stopped.load(Ordering::SeqCst) {
            break;
        }
        let (interval, kind) = {
            let config = config_rx.borrow_and_update();
            let kind = if config.high_frequency_mode {
                PollKind::Active
            } else {
                PollKind::Passive
            };
            (config.current_interval(), kind)
        };

        tokio::select! {
            _ = sleep_until(cycle_start + interval) => {
                cycle_start = Instant::now();
                if inner.stopped.load(Ordering::SeqCst) {
                    break;
                }
                spawn_poll(&inner, kind);
            }
            changed = config_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                debug!("Tracker configuration changed, rescheduling");
            }
            _ = inner.stop.notified() => {}
        }
    }
    debug!("Tracking loop exited");
}

impl TrackerInner {
    /// Run one poll, release the guard, then publish the report.
    ///
    /// The guard is dropped before the broadcast so a caller that found the
    /// poll in flight is always subscribed in time to see its report.
    async fn run_poll(
        &self,
        guard: InFlightGuard,
        kind: PollKind,
        source: Option<LocationSource>,
    ) -> PollReport {
        let report = self.poll(kind, source).await;
        drop(guard);
        // No subscribers is fine.
        let _ = self.reports.send(report.clone());
        report
    }

    async fn poll(&self, kind: PollKind, source: Option<LocationSource>) -> PollReport {
        let config = self.config.borrow().clone();
        let source = source.unwrap_or(config.location_source);
        let filter = LocationFilter::from(&config);
        let fmd_id = self.locations.session().fmd_id().to_string();
        debug!(fmd_id = %fmd_id, ?kind, "Poll started");

        if kind == PollKind::Active {
            match self.locations.request_update(source).await {
                Ok(_) => sleep(config.request_grace()).await,
                Err(e) => {
                    warn!(fmd_id = %fmd_id, error = %e, "Location request failed, reading cached data")
                }
            }
        }

        let mut report = PollReport {
            kind,
            outcome: PollOutcome::NoLocation,
            location: None,
            empty_skipped: 0,
            integrity_failures: 0,
            finished_at: Utc::now(),
        };

        match self.locations.passive(&filter).await {
            Ok(batch) => {
                report.empty_skipped = batch.empty_skipped;
                report.integrity_failures = batch.integrity_failures;
                if let Some(record) = batch.select(&filter) {
                    let mut last = lock(&self.last_known);
                    report.outcome = if last.as_ref() == Some(record) {
                        PollOutcome::Unchanged
                    } else {
                        PollOutcome::Updated
                    };
                    *last = Some(record.clone());
                    drop(last);
                    *lock(&self.last_success) = Some(Utc::now());
                    report.location = Some(record.clone());
                    info!(
                        fmd_id = %fmd_id,
                        provider = %record.provider,
                        battery = ?record.battery,
                        outcome = ?report.outcome,
                        "Location poll completed"
                    );
                } else {
                    info!(fmd_id = %fmd_id, "No acceptable location, keeping previous");
                }
            }
            Err(e) => {
                if matches!(e, ClientError::ReauthRequired | ClientError::Auth(_)) {
                    error!(fmd_id = %fmd_id, error = %e, "Location poll failed, session needs attention");
                } else {
                    warn!(fmd_id = %fmd_id, error = %e, "Location poll failed, keeping previous location");
                }
                report.outcome = PollOutcome::Failed(e);
            }
        }

        report.finished_at = Utc::now();
        report
    }
}
