//! RPC request handlers and their JSON shapes.

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};

use govproxy_store::{PendingVote, ReferendumRecord, VoteSlot};
use govproxy_types::{
    Network, RecordKey, ReferendumId, Tally, Timestamp, VoteDecision, VoteReceipt,
};

use crate::control::RecordControl;
use crate::error::RpcError;
use crate::server::RpcState;

// ── Requests ─────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct RecordsQuery {
    /// `true`: only open records. Absent or `false`: every record.
    #[serde(default)]
    pub open: bool,
}

#[derive(Debug, Deserialize)]
pub struct CloseRecordRequest {
    pub note: String,
}

// ── Responses ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordsResponse {
    pub count: usize,
    pub records: Vec<RecordView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordView {
    pub network: Network,
    pub referendum_id: u32,
    pub origin: String,
    pub submitted_at: u64,
    /// Whole days since `submitted_at`, as of the request.
    pub age_days: u64,
    pub phase: String,
    pub first_vote: Option<VoteView>,
    pub second_vote: Option<VoteView>,
    /// Tally taken at the revote check, whether or not it led to a revote.
    pub second_sample: Option<Tally>,
    /// Revote checks that found sentiment unavailable.
    pub revote_deferrals: u32,
    pub pending_vote: Option<PendingVoteView>,
    pub closed_at: Option<u64>,
    pub close_reason: Option<String>,
    pub transitions: Vec<TransitionView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoteView {
    pub decision: VoteDecision,
    pub voted_at: u64,
    pub tally: Option<Tally>,
    pub extrinsic_hash: Option<String>,
    pub reconciled: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PendingVoteView {
    pub slot: String,
    pub decision: VoteDecision,
    pub tally: Tally,
    pub attempts: u32,
    pub first_attempt_at: u64,
    pub last_attempt_at: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransitionView {
    pub phase: String,
    pub at: u64,
}

impl RecordView {
    pub fn new(record: &ReferendumRecord, now: Timestamp) -> Self {
        Self {
            network: record.key.network,
            referendum_id: record.key.referendum_id.as_u32(),
            origin: record.origin.to_string(),
            submitted_at: record.submitted_at.as_secs(),
            age_days: record.age_days(now),
            phase: record.phase.to_string(),
            first_vote: vote_view(
                record.first_vote_decision,
                record.first_voted_at,
                record.first_tally_snapshot,
                record.first_vote_receipt.as_ref(),
            ),
            second_vote: vote_view(
                record.second_vote_decision,
                record.second_voted_at,
                record.second_tally_snapshot,
                record.second_vote_receipt.as_ref(),
            ),
            second_sample: record.second_tally_snapshot,
            revote_deferrals: record.revote_deferrals,
            pending_vote: record.pending_vote.as_ref().map(PendingVoteView::from),
            closed_at: record.closed_at.map(|t| t.as_secs()),
            close_reason: record.close_reason.as_ref().map(|r| r.to_string()),
            transitions: record
                .transitions
                .iter()
                .map(|t| TransitionView {
                    phase: t.phase.to_string(),
                    at: t.at.as_secs(),
                })
                .collect(),
        }
    }
}

fn vote_view(
    decision: Option<VoteDecision>,
    voted_at: Option<Timestamp>,
    tally: Option<Tally>,
    receipt: Option<&VoteReceipt>,
) -> Option<VoteView> {
    let (decision, voted_at) = decision.zip(voted_at)?;
    Some(VoteView {
        decision,
        voted_at: voted_at.as_secs(),
        tally,
        extrinsic_hash: receipt.and_then(|r| r.extrinsic_hash.clone()),
        reconciled: receipt.is_some_and(|r| r.reconciled),
    })
}

impl From<&PendingVote> for PendingVoteView {
    fn from(p: &PendingVote) -> Self {
        Self {
            slot: match p.slot {
                VoteSlot::First => "first".into(),
                VoteSlot::Second => "second".into(),
            },
            decision: p.decision,
            tally: p.tally,
            attempts: p.attempts,
            first_attempt_at: p.first_attempt_at.as_secs(),
            last_attempt_at: p.last_attempt_at.as_secs(),
        }
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────

fn parse_key(network: &str, id: u32) -> Result<RecordKey, RpcError> {
    let network =
        Network::from_str(network).map_err(|e| RpcError::InvalidRequest(e.to_string()))?;
    Ok(RecordKey::new(network, ReferendumId::new(id)))
}

/// `GET /records?open=true|false`
pub async fn list_records<C: RecordControl>(
    State(state): State<Arc<RpcState<C>>>,
    Query(query): Query<RecordsQuery>,
) -> Result<Json<RecordsResponse>, RpcError> {
    let now = state.clock.now();
    let records: Vec<RecordView> = state
        .control
        .records(query.open)?
        .iter()
        .map(|r| RecordView::new(r, now))
        .collect();
    Ok(Json(RecordsResponse {
        count: records.len(),
        records,
    }))
}

/// `GET /records/:network/:id`
pub async fn get_record<C: RecordControl>(
    State(state): State<Arc<RpcState<C>>>,
    Path((network, id)): Path<(String, u32)>,
) -> Result<Json<RecordView>, RpcError> {
    let key = parse_key(&network, id)?;
    let record = state
        .control
        .record(&key)?
        .ok_or_else(|| RpcError::RecordNotFound(key.to_string()))?;
    Ok(Json(RecordView::new(&record, state.clock.now())))
}

/// `POST /records/:network/:id/close` with `{"note": "..."}`
pub async fn close_record<C: RecordControl>(
    State(state): State<Arc<RpcState<C>>>,
    Path((network, id)): Path<(String, u32)>,
    Json(request): Json<CloseRecordRequest>,
) -> Result<Json<RecordView>, RpcError> {
    let key = parse_key(&network, id)?;
    let note = request.note.trim().to_string();
    if note.is_empty() {
        return Err(RpcError::InvalidRequest("close note must not be empty".into()));
    }
    tracing::info!(%key, %note, "operator close requested");
    let now = state.clock.now();
    let record = state.control.force_close(key, note, now).await?;
    Ok(Json(RecordView::new(&record, now)))
}

/// `GET /metrics` in the Prometheus text exposition format.
pub async fn metrics<C: RecordControl>(
    State(state): State<Arc<RpcState<C>>>,
) -> Result<impl IntoResponse, RpcError> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&state.registry.gather(), &mut buffer)
        .map_err(|e| RpcError::Server(e.to_string()))?;
    let body = String::from_utf8(buffer).map_err(|e| RpcError::Server(e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, encoder.format_type().to_string())], body))
}
