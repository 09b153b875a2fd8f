//! Vote period policy: per-network, per-origin voting windows.
//!
//! The table is loaded once at startup from a versioned TOML file and
//! validated eagerly, so a malformed table stops the process before any
//! referendum is evaluated:
//!
//! ```toml
//! version = 1
//!
//! [kusama.Treasurer]
//! decision_period_days = 14
//! internal_vote_period_days = 5
//! revote_period_days = 10
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use govproxy_types::{Network, Origin};

use crate::PolicyError;

/// Voting windows of one origin on one network, in whole days of referendum age.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyEntry {
    /// Total days the referendum accepts votes.
    pub decision_period_days: u32,
    /// Age at which the first sentiment sample is taken and the first vote cast.
    pub internal_vote_period_days: u32,
    /// Age at which a second sample may trigger a corrective vote.
    pub revote_period_days: u32,
}

impl PolicyEntry {
    pub fn new(
        decision_period_days: u32,
        internal_vote_period_days: u32,
        revote_period_days: u32,
    ) -> Self {
        Self {
            decision_period_days,
            internal_vote_period_days,
            revote_period_days,
        }
    }

    /// Check `0 < internal < revote <= decision`.
    pub fn validate(&self) -> Result<(), String> {
        if self.internal_vote_period_days == 0 {
            return Err("internal_vote_period_days must be positive".into());
        }
        if self.internal_vote_period_days >= self.revote_period_days {
            return Err(format!(
                "internal_vote_period_days ({}) must be less than revote_period_days ({})",
                self.internal_vote_period_days, self.revote_period_days
            ));
        }
        if self.revote_period_days > self.decision_period_days {
            return Err(format!(
                "revote_period_days ({}) must not exceed decision_period_days ({})",
                self.revote_period_days, self.decision_period_days
            ));
        }
        Ok(())
    }
}

/// Validated lookup table from `(network, origin)` to [`PolicyEntry`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PolicyTable {
    entries: BTreeMap<(Network, Origin), PolicyEntry>,
}

impl PolicyTable {
    /// The only table format version this build understands.
    pub const SUPPORTED_VERSION: u32 = 1;

    /// Build a table from explicit entries, validating each one.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (Network, Origin, PolicyEntry)>,
    ) -> Result<Self, PolicyError> {
        let mut table = Self::default();
        for (network, origin, entry) in entries {
            entry
                .validate()
                .map_err(|reason| PolicyError::InvalidEntry {
                    network,
                    origin,
                    reason,
                })?;
            table.entries.insert((network, origin), entry);
        }
        Ok(table)
    }

    /// Load and validate a table from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, PolicyError> {
        let contents = std::fs::read_to_string(path).map_err(|e| PolicyError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate a table from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, PolicyError> {
        let mut root: toml::Table = s.parse().map_err(|e: toml::de::Error| {
            PolicyError::Parse(e.to_string())
        })?;

        let version = match root.remove("version") {
            Some(toml::Value::Integer(v)) => v,
            Some(other) => {
                return Err(PolicyError::Parse(format!(
                    "version must be an integer, found {}",
                    other.type_str()
                )))
            }
            None => return Err(PolicyError::Parse("missing version".into())),
        };
        if version != i64::from(Self::SUPPORTED_VERSION) {
            return Err(PolicyError::UnsupportedVersion {
                found: version,
                expected: Self::SUPPORTED_VERSION,
            });
        }

        let mut entries = Vec::new();
        for (network_name, origins) in root {
            let network: Network = network_name
                .parse()
                .map_err(|_| PolicyError::UnknownNetwork(network_name.clone()))?;
            let toml::Value::Table(origins) = origins else {
                return Err(PolicyError::Parse(format!(
                    "[{network_name}] must be a table of origins"
                )));
            };
            for (origin_name, value) in origins {
                let origin: Origin =
                    origin_name
                        .parse()
                        .map_err(|_| PolicyError::UnknownOriginName {
                            network,
                            name: origin_name.clone(),
                        })?;
                let entry: PolicyEntry = value.try_into().map_err(|e: toml::de::Error| {
                    PolicyError::Parse(format!("{network}.{origin}: {e}"))
                })?;
                entries.push((network, origin, entry));
            }
        }

        Self::from_entries(entries)
    }

    /// The entry for `origin` on `network`. Fails closed for anything not in the table.
    pub fn lookup(&self, network: Network, origin: Origin) -> Result<&PolicyEntry, PolicyError> {
        self.entries
            .get(&(network, origin))
            .ok_or(PolicyError::UnknownOrigin { network, origin })
    }

    /// Whether the table has at least one entry for `network`.
    pub fn covers(&self, network: Network) -> bool {
        self.entries.keys().any(|(n, _)| *n == network)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Network, Origin, &PolicyEntry)> {
        self.entries.iter().map(|((n, o), e)| (*n, *o, e))
    }
}
