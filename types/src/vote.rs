//! Vote decisions, convictions, and internal sentiment tallies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::GovProxyError;

/// The direction of an on-chain vote.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDecision {
    Aye,
    Nay,
    Abstain,
}

impl VoteDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aye => "aye",
            Self::Nay => "nay",
            Self::Abstain => "abstain",
        }
    }
}

impl fmt::Display for VoteDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_ascii_uppercase())
    }
}

impl FromStr for VoteDecision {
    type Err = GovProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aye" => Ok(Self::Aye),
            "nay" => Ok(Self::Nay),
            "abstain" => Ok(Self::Abstain),
            _ => Err(GovProxyError::InvalidDecision(s.to_string())),
        }
    }
}

/// Conviction multiplier attached to a standard vote.
///
/// Abstain votes are submitted without conviction by the chain, but the
/// submitter still receives the configured value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Conviction {
    /// 0.1x voting weight, no lock.
    #[default]
    None,
    Locked1x,
    Locked2x,
    Locked3x,
    Locked4x,
    Locked5x,
    Locked6x,
}

/// Aggregated internal sentiment weights for one referendum.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tally {
    pub aye: u64,
    pub nay: u64,
    pub abstain: u64,
}

impl Tally {
    pub fn new(aye: u64, nay: u64, abstain: u64) -> Self {
        Self { aye, nay, abstain }
    }

    /// Total participating weight.
    pub fn total(&self) -> u64 {
        self.aye.saturating_add(self.nay).saturating_add(self.abstain)
    }

    /// Map this tally to a vote decision under `rule`.
    ///
    /// - Below `min_participation` total weight: `Abstain`.
    /// - Aye or nay strictly ahead of both other options: that option.
    /// - Any tie at the top, or an abstain plurality: `Abstain`.
    pub fn decide(&self, rule: &DecisionRule) -> VoteDecision {
        if self.total() < rule.min_participation {
            return VoteDecision::Abstain;
        }
        if self.aye > self.nay && self.aye > self.abstain {
            VoteDecision::Aye
        } else if self.nay > self.aye && self.nay > self.abstain {
            VoteDecision::Nay
        } else {
            VoteDecision::Abstain
        }
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "aye={} nay={} abstain={}",
            self.aye, self.nay, self.abstain
        )
    }
}

/// Acknowledgement returned by the chain for a submitted vote.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    /// Hash of the included extrinsic, when the submitter reports one.
    pub extrinsic_hash: Option<String>,
    /// True when the vote was recovered from on-chain history instead of a
    /// direct submission acknowledgement.
    pub reconciled: bool,
}

impl VoteReceipt {
    pub fn submitted(extrinsic_hash: impl Into<String>) -> Self {
        Self {
            extrinsic_hash: Some(extrinsic_hash.into()),
            reconciled: false,
        }
    }

    pub fn reconciled() -> Self {
        Self {
            extrinsic_hash: None,
            reconciled: true,
        }
    }
}

/// Parameters of the tally-to-decision mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRule {
    /// Minimum total weight required before a non-abstain decision is taken.
    #[serde(default = "default_min_participation")]
    pub min_participation: u64,
}

fn default_min_participation() -> u64 {
    1
}

impl Default for DecisionRule {
    fn default() -> Self {
        Self {
            min_participation: default_min_participation(),
        }
    }
}
