use crate::access::Principal;
use crate::batch::{BatchPhase, Metric};
use crate::db;
use crate::errors::LedgerError;
use crate::models::*;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use chrono::Utc;
use enc_core::value::EncryptedValue;
use tower_http::cors::{Any, CorsLayer};

pub fn router(state: AppState) -> Router {
    let oracle_routes = Router::new()
        .route("/api/v1/oracle/callback", post(oracle_callback))
        .layer(middleware::from_fn(oracle_auth_middleware));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/v1/admin/transfer-ownership", post(transfer_ownership))
        .route("/api/v1/admin/providers/add", post(add_provider))
        .route("/api/v1/admin/providers/remove", post(remove_provider))
        .route("/api/v1/admin/pause", post(pause))
        .route("/api/v1/admin/unpause", post(unpause))
        .route("/api/v1/admin/cooldown", post(set_cooldown))
        .route("/api/v1/batches", post(open_batch))
        .route("/api/v1/batches/:id", get(get_batch))
        .route("/api/v1/batches/:id/close", post(close_batch))
        .route("/api/v1/batches/:id/contributions", post(submit_contribution))
        .route("/api/v1/batches/:id/usage", post(report_usage))
        .route("/api/v1/batches/:id/summary-requests", post(request_summary))
        .route("/api/v1/oracle/requests", get(list_pending_requests))
        .route("/api/v1/events", get(list_events))
        .merge(oracle_routes)
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// The callback route is reachable by the oracle operator only.
async fn oracle_auth_middleware(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // In production, this should be a strong secret from environment.
    let expected_key = std::env::var("ORACLE_KEY").unwrap_or_else(|_| "dev-oracle-key".to_string());

    if let Some(provided_key) = headers.get("X-ORACLE-KEY") {
        if provided_key == expected_key.as_str() {
            return Ok(next.run(request).await);
        }
    }

    tracing::warn!("unauthorized oracle callback attempt");
    Err(StatusCode::UNAUTHORIZED)
}

fn decode_b64(label: &str, value: &str) -> Result<Vec<u8>, LedgerError> {
    base64::engine::general_purpose::STANDARD
        .decode(value)
        .map_err(|_| LedgerError::BadRequest(format!("invalid {label}")))
}

fn decode_ciphertext(value: &str) -> Result<EncryptedValue, LedgerError> {
    let bytes = decode_b64("ciphertext_b64", value)?;
    EncryptedValue::from_bytes(&bytes).map_err(|_| LedgerError::BadRequest("invalid ciphertext".to_string()))
}

fn encode_b64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

// --- Role administration ---

async fn transfer_ownership(
    State(state): State<AppState>,
    Json(req): Json<TransferOwnershipRequest>,
) -> Result<Json<OwnershipResponse>, LedgerError> {
    let caller = Principal::new(req.caller);
    let new_owner = Principal::new(req.new_owner);

    let mut ledger = state.ledger.lock().await;
    let event = ledger.transfer_ownership(&caller, new_owner)?;
    db::insert_event(&state.db, &event).await?;

    Ok(Json(OwnershipResponse {
        owner: ledger.owner().to_string(),
    }))
}

async fn add_provider(
    State(state): State<AppState>,
    Json(req): Json<ProviderRequest>,
) -> Result<Json<ProviderResponse>, LedgerError> {
    let caller = Principal::new(req.caller);
    let provider = Principal::new(req.provider.clone());

    let mut ledger = state.ledger.lock().await;
    let event = ledger.add_provider(&caller, provider)?;
    let changed = event.is_some();
    if let Some(event) = event {
        db::insert_event(&state.db, &event).await?;
    }

    Ok(Json(ProviderResponse {
        provider: req.provider,
        changed,
    }))
}

async fn remove_provider(
    State(state): State<AppState>,
    Json(req): Json<ProviderRequest>,
) -> Result<Json<ProviderResponse>, LedgerError> {
    let caller = Principal::new(req.caller);
    let provider = Principal::new(req.provider.clone());

    let mut ledger = state.ledger.lock().await;
    let event = ledger.remove_provider(&caller, &provider)?;
    let changed = event.is_some();
    if let Some(event) = event {
        db::insert_event(&state.db, &event).await?;
    }

    Ok(Json(ProviderResponse {
        provider: req.provider,
        changed,
    }))
}

async fn pause(
    State(state): State<AppState>,
    Json(req): Json<PauseRequest>,
) -> Result<Json<PausedResponse>, LedgerError> {
    let caller = Principal::new(req.caller);

    let mut ledger = state.ledger.lock().await;
    let event = ledger.pause(&caller)?;
    db::insert_event(&state.db, &event).await?;

    Ok(Json(PausedResponse { paused: true }))
}

async fn unpause(
    State(state): State<AppState>,
    Json(req): Json<PauseRequest>,
) -> Result<Json<PausedResponse>, LedgerError> {
    let caller = Principal::new(req.caller);

    let mut ledger = state.ledger.lock().await;
    let event = ledger.unpause(&caller)?;
    db::insert_event(&state.db, &event).await?;

    Ok(Json(PausedResponse { paused: false }))
}

async fn set_cooldown(
    State(state): State<AppState>,
    Json(req): Json<CooldownRequest>,
) -> Result<Json<CooldownResponse>, LedgerError> {
    let caller = Principal::new(req.caller);

    let mut ledger = state.ledger.lock().await;
    let event = ledger.set_cooldown_seconds(&caller, req.cooldown_seconds)?;
    db::insert_event(&state.db, &event).await?;

    Ok(Json(CooldownResponse {
        cooldown_seconds: ledger.cooldown_seconds(),
    }))
}

// --- Batch lifecycle ---

async fn open_batch(
    State(state): State<AppState>,
    Json(req): Json<OpenBatchRequest>,
) -> Result<Json<OpenBatchResponse>, LedgerError> {
    let caller = Principal::new(req.caller);

    let mut ledger = state.ledger.lock().await;
    let (batch_id, event) = ledger.open_batch(&caller)?;
    db::insert_event(&state.db, &event).await?;

    Ok(Json(OpenBatchResponse { batch_id }))
}

async fn close_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<u64>,
    Json(req): Json<CloseBatchRequest>,
) -> Result<Json<CloseBatchResponse>, LedgerError> {
    let caller = Principal::new(req.caller);

    let mut ledger = state.ledger.lock().await;
    let event = ledger.close_batch(&caller, batch_id)?;
    db::insert_event(&state.db, &event).await?;

    Ok(Json(CloseBatchResponse {
        batch_id,
        phase: BatchPhase::Closed,
    }))
}

async fn get_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<u64>,
) -> Result<Json<BatchGetResponse>, LedgerError> {
    let ledger = state.ledger.lock().await;
    let view = ledger.batch_view(batch_id)?;

    let contributions_bytes = view.contributions.to_bytes().map_err(|_| LedgerError::Internal)?;
    let usage_bytes = view.usage.to_bytes().map_err(|_| LedgerError::Internal)?;

    Ok(Json(BatchGetResponse {
        batch_id,
        phase: view.phase,
        contributions_handle_hex: view.contributions.handle().hex(),
        usage_handle_hex: view.usage.handle().hex(),
        contributions_ciphertext_b64: encode_b64(&contributions_bytes),
        usage_ciphertext_b64: encode_b64(&usage_bytes),
    }))
}

// --- Submissions ---

async fn submit_contribution(
    State(state): State<AppState>,
    Path(batch_id): Path<u64>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, LedgerError> {
    let caller = Principal::new(req.caller);
    let delta = decode_ciphertext(&req.ciphertext_b64)?;

    let mut ledger = state.ledger.lock().await;
    let event = ledger.submit_contribution(&caller, batch_id, &delta, Utc::now())?;
    db::insert_event(&state.db, &event).await?;

    let view = ledger.batch_view(batch_id)?;
    Ok(Json(SubmitResponse {
        batch_id,
        metric: Metric::Contributions,
        accumulator_handle_hex: view.contributions.handle().hex(),
    }))
}

async fn report_usage(
    State(state): State<AppState>,
    Path(batch_id): Path<u64>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, LedgerError> {
    let caller = Principal::new(req.caller);
    let delta = decode_ciphertext(&req.ciphertext_b64)?;

    let mut ledger = state.ledger.lock().await;
    let event = ledger.report_usage(&caller, batch_id, &delta, Utc::now())?;
    db::insert_event(&state.db, &event).await?;

    let view = ledger.batch_view(batch_id)?;
    Ok(Json(SubmitResponse {
        batch_id,
        metric: Metric::Usage,
        accumulator_handle_hex: view.usage.handle().hex(),
    }))
}

// --- Decryption round trip ---

async fn request_summary(
    State(state): State<AppState>,
    Path(batch_id): Path<u64>,
    Json(req): Json<SummaryRequestBody>,
) -> Result<Json<SummaryRequestResponse>, LedgerError> {
    let caller = Principal::new(req.caller);

    let mut ledger = state.ledger.lock().await;
    let (request, event) = ledger.request_summary(&caller, batch_id, Utc::now())?;
    db::insert_event(&state.db, &event).await?;

    Ok(Json(SummaryRequestResponse {
        request_id: request.request_id,
        batch_id: request.batch_id,
        state_hash_hex: request.state_hash_hex,
    }))
}

async fn oracle_callback(
    State(state): State<AppState>,
    Json(req): Json<OracleCallbackRequest>,
) -> Result<Json<CallbackResponse>, LedgerError> {
    let cleartexts = decode_b64("cleartexts_b64", &req.cleartexts_b64)?;
    let proof = decode_b64("proof_b64", &req.proof_b64)?;

    let mut ledger = state.ledger.lock().await;
    let (summary, event) = ledger.on_callback(req.request_id, &cleartexts, &proof)?;
    db::insert_event(&state.db, &event).await?;

    Ok(Json(CallbackResponse {
        request_id: summary.request_id,
        batch_id: summary.batch_id,
        contributions_total: summary.contributions_total,
        usage_total: summary.usage_total,
    }))
}

async fn list_pending_requests(
    State(state): State<AppState>,
) -> Result<Json<PendingRequestsResponse>, LedgerError> {
    let ledger = state.ledger.lock().await;

    let requests = ledger
        .pending_requests()
        .into_iter()
        .map(|p| PendingRequestItem {
            request_id: p.request_id,
            batch_id: p.batch_id,
            state_hash_hex: p.state_hash_hex,
        })
        .collect();

    Ok(Json(PendingRequestsResponse { requests }))
}

async fn list_events(
    State(state): State<AppState>,
    Query(params): Query<ListEventsParams>,
) -> Result<Json<EventListResponse>, LedgerError> {
    let offset = params.offset.unwrap_or(0);
    let limit = params.limit.unwrap_or(50).min(500);

    let events = db::list_events(&state.db, offset, limit).await?;

    Ok(Json(EventListResponse {
        offset,
        limit,
        events,
    }))
}
