use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;
use thiserror::Error;

/// Container network isolation level. The ordering is meaningful: a mode is
/// allowed when it is `<=` the server's configured maximum.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    #[default]
    None,
    Bridge,
    Host,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid networkMode '{0}'. Expected: none|bridge|host")]
pub struct ParseNetworkModeError(pub String);

impl NetworkMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bridge => "bridge",
            Self::Host => "host",
        }
    }

    pub const ALL: [NetworkMode; 3] = [Self::None, Self::Bridge, Self::Host];

    /// Human-readable list of every mode allowed under `max`, e.g. "none, bridge".
    pub fn allowed_display(max: NetworkMode) -> String {
        Self::ALL
            .iter()
            .filter(|m| **m <= max)
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Display for NetworkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkMode {
    type Err = ParseNetworkModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "bridge" => Ok(Self::Bridge),
            "host" => Ok(Self::Host),
            _ => Err(ParseNetworkModeError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_order_by_openness() {
        assert!(NetworkMode::None < NetworkMode::Bridge);
        assert!(NetworkMode::Bridge < NetworkMode::Host);
    }

    #[test]
    fn parse_accepts_mixed_case_and_whitespace() {
        assert_eq!(" Bridge ".parse::<NetworkMode>(), Ok(NetworkMode::Bridge));
        assert!("vpn".parse::<NetworkMode>().is_err());
    }

    #[test]
    fn allowed_display_lists_modes_up_to_max() {
        assert_eq!(NetworkMode::allowed_display(NetworkMode::None), "none");
        assert_eq!(
            NetworkMode::allowed_display(NetworkMode::Bridge),
            "none, bridge"
        );
        assert_eq!(
            NetworkMode::allowed_display(NetworkMode::Host),
            "none, bridge, host"
        );
    }
}
