/*!
 * Location lookup and live tracking
 */

use anyhow::{Context, Result};
use chrono::Local;
use colored::*;
use fmd_client::{
    ArtifactStore, ClientConfig, ClientError, LocationRecord, LocationSource, PollKind,
    PollOutcome, PollReport, PollingMode,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use super::{connect, persist_renewal};

pub async fn locate(
    store: &ArtifactStore,
    config: ClientConfig,
    refresh: bool,
    source: LocationSource,
    json: bool,
) -> Result<()> {
    let grace_secs = config.tracker.request_grace_secs;
    let client = connect(store, config).await?;

    if refresh {
        println!(
            "{}",
            format!("Requesting a {source} fix, waiting {grace_secs}s for the device...").yellow()
        );
    }
    let record = match client.get_latest_location(refresh, source).await {
        Ok(record) => record,
        Err(ClientError::NoLocation) => {
            println!("{}", "No usable location on the server yet.".yellow());
            return Ok(());
        }
        Err(e) => return Err(e).context("Failed to fetch location"),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print_location(&record);
    }
    Ok(())
}

pub async fn track(
    store: &ArtifactStore,
    config: ClientConfig,
    high_frequency: bool,
    interval_mins: Option<u32>,
) -> Result<()> {
    let client = connect(store, config).await?;
    let before = client.export_artifacts().await?;
    let tracker = client.tracker();
    let mut reports = tracker.subscribe();

    tracker.start();
    let mode = if high_frequency {
        PollingMode::HighFrequency
    } else {
        PollingMode::Normal
    };
    client
        .set_polling_mode(mode, interval_mins)
        .context("Invalid polling interval")?;

    let state = tracker.state();
    println!(
        "{}",
        format!(
            "Tracking every {} min ({}). Press Ctrl-C to stop.",
            state.interval.as_secs() / 60,
            if high_frequency { "active" } else { "passive" }
        )
        .bold()
        .cyan()
    );
    if !high_frequency {
        // Show where things stand now instead of waiting a full interval.
        tracker.poll_now(PollKind::Passive).await;
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            report = reports.recv() => match report {
                Ok(report) => print_report(&report),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Missed poll reports"),
                Err(RecvError::Closed) => break,
            },
            _ = &mut ctrl_c => break,
        }
    }

    tracker.stop();
    persist_renewal(store, &client, &before).await?;
    println!("\n{}", "Tracking stopped".green());
    Ok(())
}

pub(crate) fn print_location(record: &LocationRecord) {
    println!("{}", "Location".bold());
    println!("  Coordinates: {:.6}, {:.6}", record.lat, record.lon);
    println!("  Provider:    {}", record.provider);
    if let Some(accuracy) = record.accuracy {
        println!("  Accuracy:    {:.0} m", accuracy);
    }
    if let Some(battery) = record.battery {
        println!("  Battery:     {}%", battery);
    }
    match record.captured_at() {
        Some(ts) => println!(
            "  Captured:    {}",
            ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
        ),
        None => println!("  Captured:    {}", record.time),
    }
    println!(
        "  Map:         https://www.openstreetmap.org/?mlat={}&mlon={}",
        record.lat, record.lon
    );
}

fn print_report(report: &PollReport) {
    let at = report.finished_at.with_timezone(&Local).format("%H:%M:%S");
    match (&report.outcome, &report.location) {
        (PollOutcome::Updated, Some(record)) => println!(
            "[{at}] {} {:.6}, {:.6} via {}{}",
            "●".green(),
            record.lat,
            record.lon,
            record.provider,
            record
                .battery
                .map(|b| format!(", battery {b}%"))
                .unwrap_or_default()
        ),
        (PollOutcome::Updated | PollOutcome::Unchanged, _) => {
            println!("[{at}] {}", "no change".dimmed())
        }
        (PollOutcome::NoLocation, _) => {
            println!("[{at}] {}", "no usable location".yellow())
        }
        (PollOutcome::Failed(reason), _) => {
            println!("[{at}] {} {}", "poll failed:".red(), reason)
        }
    }
    if report.integrity_failures > 0 {
        println!(
            "{}",
            format!(
                "  ⚠ {} record(s) failed verification and were ignored",
                report.integrity_failures
            )
            .red()
            .bold()
        );
    }
}
