use crate::batch::{BatchPhase, Metric};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// --- Requests ---

#[derive(Debug, Deserialize)]
pub struct TransferOwnershipRequest {
    pub caller: String,
    pub new_owner: String,
}

#[derive(Debug, Deserialize)]
pub struct ProviderRequest {
    pub caller: String,
    pub provider: String,
}

#[derive(Debug, Deserialize)]
pub struct PauseRequest {
    pub caller: String,
}

#[derive(Debug, Deserialize)]
pub struct CooldownRequest {
    pub caller: String,
    pub cooldown_seconds: u64,
}

#[derive(Debug, Deserialize)]
pub struct OpenBatchRequest {
    pub caller: String,
}

#[derive(Debug, Deserialize)]
pub struct CloseBatchRequest {
    pub caller: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub caller: String,

    /// Base64 of the canonical compressed ciphertext bytes.
    pub ciphertext_b64: String,
}

#[derive(Debug, Deserialize)]
pub struct SummaryRequestBody {
    pub caller: String,
}

#[derive(Debug, Deserialize)]
pub struct OracleCallbackRequest {
    pub request_id: u64,
    pub cleartexts_b64: String,
    pub proof_b64: String,
}

#[derive(Debug, Deserialize)]
pub struct ListEventsParams {
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

// --- Responses ---

#[derive(Debug, Serialize)]
pub struct OwnershipResponse {
    pub owner: String,
}

#[derive(Debug, Serialize)]
pub struct ProviderResponse {
    pub provider: String,

    /// False when the call was an idempotent no-op.
    pub changed: bool,
}

#[derive(Debug, Serialize)]
pub struct PausedResponse {
    pub paused: bool,
}

#[derive(Debug, Serialize)]
pub struct CooldownResponse {
    pub cooldown_seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct OpenBatchResponse {
    pub batch_id: u64,
}

#[derive(Debug, Serialize)]
pub struct CloseBatchResponse {
    pub batch_id: u64,
    pub phase: BatchPhase,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub batch_id: u64,
    pub metric: Metric,

    /// Handle of the accumulator after the merge.
    pub accumulator_handle_hex: String,
}

#[derive(Debug, Serialize)]
pub struct SummaryRequestResponse {
    pub request_id: u64,
    pub batch_id: u64,
    pub state_hash_hex: String,
}

#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    pub request_id: u64,
    pub batch_id: u64,
    pub contributions_total: u64,
    pub usage_total: u64,
}

#[derive(Debug, Serialize)]
pub struct BatchGetResponse {
    pub batch_id: u64,
    pub phase: BatchPhase,
    pub contributions_handle_hex: String,
    pub usage_handle_hex: String,

    /// Canonical ciphertext bytes, for oracle pickup and independent auditing.
    pub contributions_ciphertext_b64: String,
    pub usage_ciphertext_b64: String,
}

#[derive(Debug, Serialize)]
pub struct PendingRequestItem {
    pub request_id: u64,
    pub batch_id: u64,
    pub state_hash_hex: String,
}

#[derive(Debug, Serialize)]
pub struct PendingRequestsResponse {
    pub requests: Vec<PendingRequestItem>,
}

#[derive(Debug, Serialize)]
pub struct EventItem {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub kind: String,
    pub payload: Value,
}

#[derive(Debug, Serialize)]
pub struct EventListResponse {
    pub offset: u64,
    pub limit: u64,
    pub events: Vec<EventItem>,
}
