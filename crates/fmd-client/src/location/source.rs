use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ClientError;

/// Which positioning source an active request asks the device to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationSource {
    #[default]
    All,
    Gps,
    Cell,
    /// Report the last fix without acquiring a new one
    #[serde(rename = "last")]
    LastKnown,
}

impl LocationSource {
    /// Command string sent to the device
    pub fn command(self) -> &'static str {
        match self {
            Self::All => "locate",
            Self::Gps => "locate gps",
            Self::Cell => "locate cell",
            Self::LastKnown => "locate last",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Gps => "gps",
            Self::Cell => "cell",
            Self::LastKnown => "last",
        }
    }
}

impl fmt::Display for LocationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocationSource {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "" => Ok(Self::All),
            "gps" => Ok(Self::Gps),
            "cell" | "network" => Ok(Self::Cell),
            "last" | "last_known" => Ok(Self::LastKnown),
            other => Err(ClientError::InvalidInput(format!(
                "unknown location source {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_strings() {
        assert_eq!(LocationSource::All.command(), "locate");
        assert_eq!(LocationSource::Gps.command(), "locate gps");
        assert_eq!(LocationSource::Cell.command(), "locate cell");
        assert_eq!(LocationSource::LastKnown.command(), "locate last");
    }

    #[test]
    fn test_parse_and_serde_agree() {
        for source in [
            LocationSource::All,
            LocationSource::Gps,
            LocationSource::Cell,
            LocationSource::LastKnown,
        ] {
            assert_eq!(source.as_str().parse::<LocationSource>().unwrap(), source);
            let json = serde_json::to_string(&source).unwrap();
            assert_eq!(json, format!("\"{}\"", source.as_str()));
        }
        assert!("satellite".parse::<LocationSource>().is_err());
    }
}
