use crate::db::Db;
use crate::ledger::Ledger;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared application state.
///
/// The ledger sits behind one mutex: every protocol operation runs as a single
/// serialized unit, which is exactly the concurrency model the protocol assumes.
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub ledger: Arc<Mutex<Ledger>>,
}

impl AppState {
    pub fn new(db: Db, ledger: Ledger) -> Self {
        Self {
            db,
            ledger: Arc::new(Mutex::new(ledger)),
        }
    }
}
