/*!
 * CSV export of recent locations
 */

use anyhow::{Context, Result};
use chrono::SecondsFormat;
use colored::*;
use fmd_client::{ArtifactStore, ClientConfig, LocationRecord};
use std::borrow::Cow;
use std::fmt::Display;
use std::fs;
use std::path::Path;

use super::connect;

const HEADER: &str = "captured_at,time,provider,lat,lon,accuracy,battery,altitude,speed,heading";

pub async fn export(
    store: &ArtifactStore,
    config: ClientConfig,
    output: Option<&Path>,
    count: usize,
) -> Result<()> {
    let client = connect(store, config).await?;
    let batch = client
        .locations()
        .recent(count)
        .await
        .context("Failed to fetch locations")?;

    // Oldest first reads naturally in a spreadsheet.
    let csv = to_csv(batch.records.iter().rev().map(|(_, record)| record));
    match output {
        Some(path) => {
            fs::write(path, &csv).with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!(
                "{} {} location(s) written to {}",
                "✓".green(),
                batch.records.len(),
                path.display()
            );
        }
        None => print!("{csv}"),
    }

    let skipped = batch.integrity_failures + batch.decode_failures;
    if skipped > 0 {
        eprintln!(
            "{}",
            format!("{skipped} record(s) could not be decrypted and were left out").yellow()
        );
    }
    Ok(())
}

fn to_csv<'a>(records: impl IntoIterator<Item = &'a LocationRecord>) -> String {
    let mut out = String::from(HEADER);
    out.push('\n');
    for record in records {
        let captured_at = record
            .captured_at()
            .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_default();
        let row = [
            Cow::Owned(captured_at),
            csv_field(&record.time),
            csv_field(&record.provider),
            Cow::Owned(record.lat.to_string()),
            Cow::Owned(record.lon.to_string()),
            Cow::Owned(optional(record.accuracy)),
            Cow::Owned(optional(record.battery)),
            Cow::Owned(optional(record.altitude)),
            Cow::Owned(optional(record.speed)),
            Cow::Owned(optional(record.heading)),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

fn optional<T: Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(provider: &str) -> LocationRecord {
        LocationRecord::from_json(
            format!(
                r#"{{"time":"Mon, 1 Jan","date":1700000000000,"provider":"{provider}","bat":"55","lat":"48.5","lon":11.25}}"#
            )
            .as_bytes(),
        )
        .unwrap()
    }

    #[test]
    fn test_csv_rows() {
        let csv = to_csv([&record("gps")]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], HEADER);
        assert_eq!(
            lines[1],
            "2023-11-14T22:13:20Z,\"Mon, 1 Jan\",gps,48.5,11.25,,55,,,"
        );
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
