use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{ClientError, Result};

/// A decrypted location report.
///
/// The device is inconsistent about numeric types, sending some fields as
/// strings, so numeric fields are parsed leniently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    /// Human-readable capture time as reported by the device
    pub time: String,
    /// Capture time, milliseconds since the Unix epoch
    #[serde(rename = "date", deserialize_with = "de_epoch_ms")]
    pub date_ms: i64,
    pub provider: String,
    /// Battery percentage; absent if the device sent something unusable
    #[serde(rename = "bat", default, deserialize_with = "de_battery")]
    pub battery: Option<u8>,
    #[serde(deserialize_with = "de_f64")]
    pub lat: f64,
    #[serde(deserialize_with = "de_f64")]
    pub lon: f64,
    /// Accuracy radius in meters
    #[serde(default, alias = "acc", deserialize_with = "de_opt_f64", skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64", skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    /// Meters per second, only present while moving
    #[serde(default, deserialize_with = "de_opt_f64", skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// Degrees 0-360, only present while moving
    #[serde(default, deserialize_with = "de_opt_f64", skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
}

impl LocationRecord {
    /// Parse decrypted plaintext.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| ClientError::InvalidResponse(format!("location record: {e}")))
    }

    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.date_ms)
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn de_f64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<f64, D::Error> {
    let value = Value::deserialize(d)?;
    value_as_f64(&value)
        .filter(|v| v.is_finite())
        .ok_or_else(|| serde::de::Error::custom(format!("expected a number, got {value}")))
}

fn de_opt_f64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<f64>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    Ok(value.as_ref().and_then(value_as_f64).filter(|v| v.is_finite()))
}

fn de_epoch_ms<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<i64, D::Error> {
    let value = Value::deserialize(d)?;
    match &value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| serde::de::Error::custom(format!("expected epoch milliseconds, got {value}")))
}

fn de_battery<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<u8>, D::Error> {
    let value = Option::<Value>::deserialize(d)?;
    let Some(value) = value else {
        return Ok(None);
    };
    let parsed = match &value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    match parsed.and_then(|v| u8::try_from(v).ok()).filter(|v| *v <= 100) {
        Some(v) => Ok(Some(v)),
        None => {
            warn!(value = %value, "Invalid battery value, ignoring");
            Ok(None)
        }
    }
}
