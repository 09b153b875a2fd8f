//! HTTP clients for the engine's external collaborators.
//!
//! Wire format, all JSON:
//!
//! | Call | Request | Success |
//! |---|---|---|
//! | sentiment | `GET {sentiment}/tally/{network}/{id}` | `{"aye":..,"nay":..,"abstain":..}` |
//! | submit | `POST {submitter}/votes` | `{"extrinsic_hash": "0x.."}` |
//! | on-chain vote | `GET {submitter}/votes/{network}/{id}` | `{"decision": "aye"}`, 404 if none |
//! | feed | `GET {feed}/referenda?network={network}` | `[{"referendum_id":..,"origin":..,"submitted_at":..}]` |
//!
//! The submitter answers 400, 409 or 422 when the chain refused a vote;
//! any other failure is treated as transient.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use govproxy_governance::{
    FeedError, ReferendumFeed, ReferendumInfo, SentimentError, SentimentProvider,
    SubmissionError, VoteSubmitter,
};
use govproxy_types::{
    Conviction, DecisionRule, Network, Origin, RecordKey, ReferendumId, Tally, Timestamp,
    VoteDecision, VoteReceipt,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct VoteRequest {
    pub network: Network,
    pub referendum_id: u32,
    pub decision: VoteDecision,
    pub conviction: Conviction,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoteResponse {
    #[serde(default)]
    pub extrinsic_hash: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordedVoteResponse {
    pub decision: VoteDecision,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeedEntry {
    pub referendum_id: u32,
    /// Canonical track name, e.g. `"Treasurer"`.
    pub origin: String,
    pub submitted_at: u64,
}

/// Statuses with which the submitter reports a vote refused by the chain.
fn is_rejection(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY
    )
}

fn base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

// ── Sentiment ──────────────────────────────────────────────────────────

pub struct HttpSentimentProvider {
    base_url: String,
    client: reqwest::Client,
    rule: DecisionRule,
    timeout: Duration,
}

impl HttpSentimentProvider {
    pub fn new(base_url: &str, rule: DecisionRule, timeout: Duration) -> Self {
        Self {
            base_url: base(base_url),
            client: reqwest::Client::new(),
            rule,
            timeout,
        }
    }
}

impl SentimentProvider for HttpSentimentProvider {
    async fn current_tally(&self, key: RecordKey) -> Result<Tally, SentimentError> {
        let url = format!(
            "{}/tally/{}/{}",
            self.base_url,
            key.network,
            key.referendum_id.as_u32()
        );
        let resp = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| SentimentError::Unavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(SentimentError::Unavailable(format!(
                "HTTP {} from {}",
                resp.status(),
                url
            )));
        }

        resp.json()
            .await
            .map_err(|e| SentimentError::Unavailable(format!("malformed tally: {e}")))
    }

    fn decision_rule(&self) -> DecisionRule {
        self.rule
    }
}

// ── Vote submission ────────────────────────────────────────────────────

pub struct HttpVoteSubmitter {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpVoteSubmitter {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base(base_url),
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

impl VoteSubmitter for HttpVoteSubmitter {
    async fn submit_vote(
        &self,
        key: RecordKey,
        decision: VoteDecision,
        conviction: Conviction,
    ) -> Result<VoteReceipt, SubmissionError> {
        let url = format!("{}/votes", self.base_url);
        let request = VoteRequest {
            network: key.network,
            referendum_id: key.referendum_id.as_u32(),
            decision,
            conviction,
        };
        let resp = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| SubmissionError::Transient(e.to_string()))?;

        let status = resp.status();
        if is_rejection(status) {
            let body = resp.text().await.unwrap_or_default();
            return Err(SubmissionError::Rejected(format!("HTTP {status}: {body}")));
        }
        if !status.is_success() {
            return Err(SubmissionError::Transient(format!("HTTP {status} from {url}")));
        }

        // The vote is in. A garbled body only loses the extrinsic hash.
        let receipt = match resp.json::<VoteResponse>().await {
            Ok(body) => VoteReceipt {
                extrinsic_hash: body.extrinsic_hash,
                reconciled: false,
            },
            Err(e) => {
                tracing::warn!(%key, error = %e, "unreadable submission receipt");
                VoteReceipt::default()
            }
        };
        Ok(receipt)
    }

    async fn recorded_vote(&self, key: RecordKey) -> Result<Option<VoteDecision>, SubmissionError> {
        let url = format!(
            "{}/votes/{}/{}",
            self.base_url,
            key.network,
            key.referendum_id.as_u32()
        );
        let resp = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| SubmissionError::Transient(e.to_string()))?;

        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => resp
                .json::<RecordedVoteResponse>()
                .await
                .map(|body| Some(body.decision))
                .map_err(|e| SubmissionError::Transient(format!("malformed vote record: {e}"))),
            status => Err(SubmissionError::Transient(format!(
                "HTTP {status} from {url}"
            ))),
        }
    }
}

// ── Referendum feed ────────────────────────────────────────────────────

pub struct HttpReferendumFeed {
    base_url: String,
    client: reqwest::Client,
    network: Network,
    timeout: Duration,
}

impl HttpReferendumFeed {
    pub fn new(base_url: &str, network: Network, timeout: Duration) -> Self {
        Self {
            base_url: base(base_url),
            client: reqwest::Client::new(),
            network,
            timeout,
        }
    }

    fn to_info(&self, entry: FeedEntry) -> Option<ReferendumInfo> {
        match entry.origin.parse::<Origin>() {
            Ok(origin) => Some(ReferendumInfo {
                key: RecordKey::new(self.network, ReferendumId::new(entry.referendum_id)),
                origin,
                submitted_at: Timestamp::new(entry.submitted_at),
            }),
            Err(e) => {
                tracing::warn!(
                    referendum = entry.referendum_id,
                    error = %e,
                    "ignoring referendum on an unrecognised track"
                );
                None
            }
        }
    }
}

impl ReferendumFeed for HttpReferendumFeed {
    async fn ongoing(&self) -> Result<Vec<ReferendumInfo>, FeedError> {
        let url = format!("{}/referenda", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[("network", self.network.as_str())])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| FeedError::Unavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(FeedError::Unavailable(format!(
                "HTTP {} from {}",
                resp.status(),
                url
            )));
        }

        let entries: Vec<FeedEntry> = resp
            .json()
            .await
            .map_err(|e| FeedError::Unavailable(format!("malformed feed: {e}")))?;
        Ok(entries.into_iter().filter_map(|e| self.to_info(e)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refusal_statuses_are_rejections() {
        assert!(is_rejection(StatusCode::BAD_REQUEST));
        assert!(is_rejection(StatusCode::UNPROCESSABLE_ENTITY));
        assert!(!is_rejection(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_rejection(StatusCode::NOT_FOUND));
    }

    #[test]
    fn feed_entries_on_unknown_tracks_are_dropped() {
        let feed = HttpReferendumFeed::new("http://feed/", Network::Kusama, Duration::from_secs(1));
        assert_eq!(feed.base_url, "http://feed");
        let known = feed.to_info(FeedEntry {
            referendum_id: 4,
            origin: "SmallTipper".into(),
            submitted_at: 10,
        });
        assert_eq!(
            known.map(|i| (i.key, i.origin)),
            Some((
                RecordKey::new(Network::Kusama, ReferendumId::new(4)),
                Origin::SmallTipper
            ))
        );
        let unknown = feed.to_info(FeedEntry {
            referendum_id: 5,
            origin: "Candidates".into(),
            submitted_at: 10,
        });
        assert!(unknown.is_none());
    }
}
