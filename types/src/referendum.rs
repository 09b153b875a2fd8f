//! Referendum identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Network;

/// On-chain referendum index. Unique per network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReferendumId(u32);

impl ReferendumId {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ReferendumId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Globally unique key of a referendum record: `(network, referendum_id)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub network: Network,
    pub referendum_id: ReferendumId,
}

impl RecordKey {
    /// Length of [`RecordKey::to_bytes`].
    pub const ENCODED_LEN: usize = 5;

    pub fn new(network: Network, referendum_id: ReferendumId) -> Self {
        Self {
            network,
            referendum_id,
        }
    }

    /// Binary key `network_tag ++ index_be`, so keys sort by network, then index.
    pub fn to_bytes(&self) -> [u8; Self::ENCODED_LEN] {
        let mut key = [0u8; Self::ENCODED_LEN];
        key[0] = self.network.tag();
        key[1..].copy_from_slice(&self.referendum_id.as_u32().to_be_bytes());
        key
    }

    /// Inverse of [`RecordKey::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != Self::ENCODED_LEN {
            return None;
        }
        let network = Network::from_tag(bytes[0])?;
        let index = u32::from_be_bytes(bytes[1..].try_into().ok()?);
        Some(Self::new(network, ReferendumId::new(index)))
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.referendum_id)
    }
}
