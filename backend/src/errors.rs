use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("caller is not the owner")]
    NotOwner,

    #[error("caller is not a registered provider")]
    NotProvider,

    #[error("ledger is paused")]
    Paused,

    #[error("ledger is not paused")]
    NotPaused,

    #[error("batch {0} is not open")]
    BatchNotOpen(u64),

    #[error("batch {0} is still open")]
    BatchStillOpen(u64),

    #[error("batch {0} has no initialized accumulators")]
    InvalidBatchId(u64),

    #[error("cooldown active, retry in {retry_after_secs}s")]
    CooldownActive { retry_after_secs: u64 },

    #[error("request {0} is unknown or already processed")]
    ReplayDetected(u64),

    #[error("ciphertext state changed since request {0} was issued")]
    StateMismatch(u64),

    #[error("decryption proof rejected for request {request_id}: {reason}")]
    InvalidProof { request_id: u64, reason: String },

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error")]
    Internal,
}

impl LedgerError {
    /// Coarse class for operator tooling: "try again later" (rate_limit), "wrong
    /// phase" (lifecycle), "not allowed" (authorization), or "investigate" (integrity).
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::NotOwner | LedgerError::NotProvider => "authorization",
            LedgerError::Paused
            | LedgerError::NotPaused
            | LedgerError::BatchNotOpen(_)
            | LedgerError::BatchStillOpen(_)
            | LedgerError::InvalidBatchId(_) => "lifecycle",
            LedgerError::CooldownActive { .. } => "rate_limit",
            LedgerError::ReplayDetected(_)
            | LedgerError::StateMismatch(_)
            | LedgerError::InvalidProof { .. } => "integrity",
            LedgerError::BadRequest(_) => "request",
            LedgerError::Internal => "internal",
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    kind: &'static str,
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let status = match &self {
            LedgerError::NotOwner | LedgerError::NotProvider => StatusCode::FORBIDDEN,
            LedgerError::Paused
            | LedgerError::NotPaused
            | LedgerError::BatchNotOpen(_)
            | LedgerError::BatchStillOpen(_) => StatusCode::CONFLICT,
            LedgerError::InvalidBatchId(_) => StatusCode::NOT_FOUND,
            LedgerError::CooldownActive { .. } => StatusCode::TOO_MANY_REQUESTS,
            LedgerError::ReplayDetected(_)
            | LedgerError::StateMismatch(_)
            | LedgerError::InvalidProof { .. }
            | LedgerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            LedgerError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = ErrorBody {
            kind: self.kind(),
            error: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
