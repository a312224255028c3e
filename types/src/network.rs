//! Network identifier.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Identifies which chain a node follows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkId {
    /// The production network.
    Live,
    /// The public test network.
    Test,
    /// Local development network.
    Dev,
}

#[derive(Debug, Error)]
#[error("unknown network '{0}', expected live, test or dev")]
pub struct ParseNetworkError(String);

impl NetworkId {
    /// Human-readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Test => "test",
            Self::Dev => "dev",
        }
    }
}

impl FromStr for NetworkId {
    type Err = ParseNetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "live" => Ok(Self::Live),
            "test" => Ok(Self::Test),
            "dev" => Ok(Self::Dev),
            other => Err(ParseNetworkError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("LIVE".parse::<NetworkId>().unwrap(), NetworkId::Live);
        assert_eq!("dev".parse::<NetworkId>().unwrap(), NetworkId::Dev);
        assert!("mainnet".parse::<NetworkId>().is_err());
    }
}
