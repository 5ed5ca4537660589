//! Client configuration.
//!
//! Values come from defaults, a serialized config, or `FMD_*` environment
//! variables. Secrets are never read from here.

use fmd_crypto::KdfParams;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ClientError, Result};
use crate::location::LocationSource;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SESSION_DURATION_SECS: u64 = 3600;
pub const DEFAULT_TOKEN_EXPIRY_SKEW_SECS: u64 = 60;

pub const DEFAULT_POLLING_INTERVAL_MINS: u32 = 30;
pub const POLLING_INTERVAL_RANGE: (u32, u32) = (1, 1440);
pub const DEFAULT_HIGH_FREQUENCY_INTERVAL_MINS: u32 = 5;
pub const HIGH_FREQUENCY_INTERVAL_RANGE: (u32, u32) = (1, 60);
pub const DEFAULT_REQUEST_GRACE_SECS: u64 = 10;
pub const DEFAULT_CANDIDATE_WINDOW: usize = 5;

pub const DEFAULT_WIPE_ARM_TIMEOUT_SECS: u64 = 60;

/// Top-level client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Lifetime requested for each bearer token
    pub session_duration_secs: u64,
    /// Refresh this long before the token's nominal expiry
    pub token_expiry_skew_secs: u64,
    pub kdf: KdfParams,
    pub tracker: TrackerConfig,
    pub gateway: GatewayConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            session_duration_secs: DEFAULT_SESSION_DURATION_SECS,
            token_expiry_skew_secs: DEFAULT_TOKEN_EXPIRY_SKEW_SECS,
            kdf: KdfParams::default(),
            tracker: TrackerConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        let kdf = KdfParams::new(
            parse_var(&lookup, "FMD_KDF_MEMORY_KIB", d.kdf.memory_kib)?,
            parse_var(&lookup, "FMD_KDF_ITERATIONS", d.kdf.iterations)?,
            parse_var(&lookup, "FMD_KDF_PARALLELISM", d.kdf.parallelism)?,
        );

        let accepted_providers = match lookup("FMD_ACCEPTED_PROVIDERS") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            None => d.tracker.accepted_providers.clone(),
        };

        let tracker = TrackerConfig {
            polling_interval_mins: parse_var(
                &lookup,
                "FMD_POLLING_INTERVAL_MINS",
                d.tracker.polling_interval_mins,
            )?,
            high_frequency_interval_mins: parse_var(
                &lookup,
                "FMD_HIGH_FREQUENCY_INTERVAL_MINS",
                d.tracker.high_frequency_interval_mins,
            )?,
            high_frequency_mode: parse_var(&lookup, "FMD_HIGH_FREQUENCY_MODE", false)?,
            allow_inaccurate: parse_var(&lookup, "FMD_ALLOW_INACCURATE", false)?,
            location_source: parse_var(&lookup, "FMD_LOCATION_SOURCE", LocationSource::All)?,
            accepted_providers,
            request_grace_secs: parse_var(
                &lookup,
                "FMD_REQUEST_GRACE_SECS",
                d.tracker.request_grace_secs,
            )?,
            candidate_window: d.tracker.candidate_window,
        };

        let config = Self {
            request_timeout_secs: parse_var(
                &lookup,
                "FMD_REQUEST_TIMEOUT_SECS",
                d.request_timeout_secs,
            )?,
            connect_timeout_secs: parse_var(
                &lookup,
                "FMD_CONNECT_TIMEOUT_SECS",
                d.connect_timeout_secs,
            )?,
            session_duration_secs: parse_var(
                &lookup,
                "FMD_SESSION_DURATION_SECS",
                d.session_duration_secs,
            )?,
            token_expiry_skew_secs: parse_var(
                &lookup,
                "FMD_TOKEN_EXPIRY_SKEW_SECS",
                d.token_expiry_skew_secs,
            )?,
            kdf,
            tracker,
            gateway: GatewayConfig {
                wipe_arm_timeout_secs: parse_var(
                    &lookup,
                    "FMD_WIPE_ARM_TIMEOUT_SECS",
                    d.gateway.wipe_arm_timeout_secs,
                )?,
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 || self.connect_timeout_secs == 0 {
            return Err(ClientError::InvalidInput(
                "network timeouts must be at least one second".into(),
            ));
        }
        if self.session_duration_secs == 0 {
            return Err(ClientError::InvalidInput(
                "session duration must be positive".into(),
            ));
        }
        self.tracker.validate()?;
        self.gateway.validate()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ClientError::InvalidInput(format!("{key}: cannot parse {raw:?}"))),
        None => Ok(default),
    }
}

/// Tracking behavior for one device. Read fresh at the start of every cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub polling_interval_mins: u32,
    pub high_frequency_interval_mins: u32,
    pub high_frequency_mode: bool,
    /// Accept the newest record regardless of provider
    pub allow_inaccurate: bool,
    /// Source requested by active polls
    pub location_source: LocationSource,
    /// Providers considered accurate, lowercase
    pub accepted_providers: Vec<String>,
    /// Wait between a location request and the follow-up read
    pub request_grace_secs: u64,
    /// How many of the newest records to consider
    pub candidate_window: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            polling_interval_mins: DEFAULT_POLLING_INTERVAL_MINS,
            high_frequency_interval_mins: DEFAULT_HIGH_FREQUENCY_INTERVAL_MINS,
            high_frequency_mode: false,
            allow_inaccurate: false,
            location_source: LocationSource::All,
            accepted_providers: vec!["gps".into(), "network".into()],
            request_grace_secs: DEFAULT_REQUEST_GRACE_SECS,
            candidate_window: DEFAULT_CANDIDATE_WINDOW,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<()> {
        check_range(
            "polling interval",
            self.polling_interval_mins,
            POLLING_INTERVAL_RANGE,
        )?;
        check_range(
            "high-frequency interval",
            self.high_frequency_interval_mins,
            HIGH_FREQUENCY_INTERVAL_RANGE,
        )?;
        if self.candidate_window == 0 {
            return Err(ClientError::InvalidInput(
                "candidate window must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Interval for the mode currently in effect
    pub fn current_interval(&self) -> Duration {
        let mins = if self.high_frequency_mode {
            self.high_frequency_interval_mins
        } else {
            self.polling_interval_mins
        };
        Duration::from_secs(u64::from(mins) * 60)
    }

    pub fn request_grace(&self) -> Duration {
        Duration::from_secs(self.request_grace_secs)
    }
}

fn check_range(what: &str, value: u32, (min, max): (u32, u32)) -> Result<()> {
    if value < min || value > max {
        return Err(ClientError::InvalidInput(format!(
            "{what} must be between {min} and {max} minutes, got {value}"
        )));
    }
    Ok(())
}

/// Command gateway settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Seconds an armed wipe stays armed
    pub wipe_arm_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            wipe_arm_timeout_secs: DEFAULT_WIPE_ARM_TIMEOUT_SECS,
        }
    }
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.wipe_arm_timeout_secs == 0 {
            return Err(ClientError::InvalidInput(
                "wipe arm timeout must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn wipe_arm_timeout(&self) -> Duration {
        Duration::from_secs(self.wipe_arm_timeout_secs)
    }
}
