//! Network identifier.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::GovProxyError;

/// Identifies which relay chain a referendum lives on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// The Polkadot relay chain.
    Polkadot,
    /// The Kusama canary network.
    Kusama,
}

impl Network {
    /// All known networks, in key order.
    pub const ALL: [Network; 2] = [Network::Polkadot, Network::Kusama];

    /// Human-readable name, also used as the policy table key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Polkadot => "polkadot",
            Self::Kusama => "kusama",
        }
    }

    /// Single-byte tag used as the leading byte of storage keys.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Polkadot => 0,
            Self::Kusama => 1,
        }
    }

    /// Inverse of [`Network::tag`].
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Polkadot),
            1 => Some(Self::Kusama),
            _ => None,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = GovProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "polkadot" | "dot" => Ok(Self::Polkadot),
            "kusama" | "ksm" => Ok(Self::Kusama),
            _ => Err(GovProxyError::UnknownNetwork(s.to_string())),
        }
    }
}
