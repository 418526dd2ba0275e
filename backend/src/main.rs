mod access;
mod api;
mod batch;
mod db;
mod errors;
mod events;
mod ledger;
mod models;
mod oracle;
mod ratelimit;
mod state;

use crate::access::Principal;
use crate::errors::LedgerError;
use crate::ledger::Ledger;
use crate::oracle::KeyedVerifier;
use crate::state::AppState;
use rand::RngCore;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), LedgerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    // Store local state under backend/data (ignored by git).
    let data_dir = PathBuf::from("data");
    std::fs::create_dir_all(&data_dir).map_err(|_| LedgerError::Internal)?;

    let db_path = data_dir.join("ledger.sqlite");
    let db_url = format!("sqlite:{}", db_path.to_string_lossy());

    let db = db::connect(&db_url).await?;
    db::init_schema(&db).await?;

    let owner = Principal::new(std::env::var("LEDGER_OWNER").unwrap_or_else(|_| "owner-dev".to_string()));
    let cooldown_seconds = std::env::var("LEDGER_COOLDOWN_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(60);

    // Shared with the oracle operator: authenticates both the callback route and the
    // delivery proof transcript.
    let oracle_key = std::env::var("ORACLE_KEY").unwrap_or_else(|_| "dev-oracle-key".to_string());

    // Fresh instance identity, absorbed into every state digest. Protocol state is
    // in-memory, so pending requests never outlive the identity that hashed them.
    let mut identity = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut identity);

    let ledger = Ledger::new(
        owner.clone(),
        cooldown_seconds,
        identity,
        Box::new(KeyedVerifier::new(oracle_key.into_bytes())),
    );

    let state = AppState::new(db, ledger);

    let app = api::router(state);

    let addr = std::env::var("LEDGER_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|_| LedgerError::Internal)?;

    tracing::info!(%addr, %owner, cooldown_seconds, identity = %hex::encode(identity), "ledger listening");

    axum::serve(listener, app).await.map_err(|_| LedgerError::Internal)?;

    Ok(())
}
