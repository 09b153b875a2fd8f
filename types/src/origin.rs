//! Governance origins (OpenGov tracks).
//!
//! Every referendum is submitted on exactly one origin, and every origin has
//! its own voting-timing policy per network.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::GovProxyError;

/// A named governance track.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Origin {
    Root,
    WhitelistedCaller,
    WishForChange,
    StakingAdmin,
    Treasurer,
    LeaseAdmin,
    FellowshipAdmin,
    GeneralAdmin,
    AuctionAdmin,
    ReferendumCanceller,
    ReferendumKiller,
    SmallTipper,
    BigTipper,
    SmallSpender,
    MediumSpender,
    BigSpender,
}

impl Origin {
    pub const ALL: [Origin; 16] = [
        Origin::Root,
        Origin::WhitelistedCaller,
        Origin::WishForChange,
        Origin::StakingAdmin,
        Origin::Treasurer,
        Origin::LeaseAdmin,
        Origin::FellowshipAdmin,
        Origin::GeneralAdmin,
        Origin::AuctionAdmin,
        Origin::ReferendumCanceller,
        Origin::ReferendumKiller,
        Origin::SmallTipper,
        Origin::BigTipper,
        Origin::SmallSpender,
        Origin::MediumSpender,
        Origin::BigSpender,
    ];

    /// Canonical track name, as it appears on chain and in the policy table.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Root => "Root",
            Self::WhitelistedCaller => "WhitelistedCaller",
            Self::WishForChange => "WishForChange",
            Self::StakingAdmin => "StakingAdmin",
            Self::Treasurer => "Treasurer",
            Self::LeaseAdmin => "LeaseAdmin",
            Self::FellowshipAdmin => "FellowshipAdmin",
            Self::GeneralAdmin => "GeneralAdmin",
            Self::AuctionAdmin => "AuctionAdmin",
            Self::ReferendumCanceller => "ReferendumCanceller",
            Self::ReferendumKiller => "ReferendumKiller",
            Self::SmallTipper => "SmallTipper",
            Self::BigTipper => "BigTipper",
            Self::SmallSpender => "SmallSpender",
            Self::MediumSpender => "MediumSpender",
            Self::BigSpender => "BigSpender",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Origin {
    type Err = GovProxyError;

    /// Exact, case-sensitive match on the canonical track name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Origin::ALL
            .iter()
            .copied()
            .find(|origin| origin.name() == s)
            .ok_or_else(|| GovProxyError::UnknownOrigin(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_name_parses_back() {
        for origin in Origin::ALL {
            assert_eq!(origin.name().parse::<Origin>().unwrap(), origin);
        }
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = "treasurer".parse::<Origin>().unwrap_err();
        assert!(matches!(err, GovProxyError::UnknownOrigin(ref name) if name == "treasurer"));
    }

    #[test]
    fn serde_uses_track_name() {
        let json = serde_json::to_string(&Origin::SmallTipper).unwrap();
        assert_eq!(json, "\"SmallTipper\"");
    }
}
