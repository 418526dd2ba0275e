use crate::errors::LedgerError;
use crate::events::Event;
use crate::models::EventItem;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Row, Sqlite};
use uuid::Uuid;

pub type Db = Pool<Sqlite>;

pub async fn connect(db_url: &str) -> Result<Db, LedgerError> {
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .map_err(|_| LedgerError::Internal)
}

pub async fn init_schema(db: &Db) -> Result<(), LedgerError> {
    // Append-only audit journal. Protocol state itself is in-memory; this table is the
    // externally visible trace of accepted transitions.
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS events (
  id TEXT PRIMARY KEY,
  created_at TEXT NOT NULL,
  kind TEXT NOT NULL,
  payload_json TEXT NOT NULL
);
"#,
    )
    .execute(db)
    .await
    .map_err(|_| LedgerError::Internal)?;

    Ok(())
}

pub async fn insert_event(db: &Db, event: &Event) -> Result<(), LedgerError> {
    let id = Uuid::new_v4();
    let created_at = Utc::now().to_rfc3339();
    let payload_json = serde_json::to_string(event).map_err(|_| LedgerError::Internal)?;

    sqlx::query(
        r#"INSERT INTO events (id, created_at, kind, payload_json)
           VALUES (?, ?, ?, ?)"#,
    )
    .bind(id.to_string())
    .bind(created_at)
    .bind(event.kind())
    .bind(payload_json)
    .execute(db)
    .await
    .map_err(|_| LedgerError::Internal)?;

    Ok(())
}

pub async fn list_events(db: &Db, offset: u64, limit: u64) -> Result<Vec<EventItem>, LedgerError> {
    let rows = sqlx::query(
        r#"SELECT id, created_at, kind, payload_json
           FROM events
           ORDER BY rowid
           LIMIT ? OFFSET ?"#,
    )
    .bind(limit as i64)
    .bind(offset as i64)
    .fetch_all(db)
    .await
    .map_err(|_| LedgerError::Internal)?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let id: String = row.get(0);
        let created_at: String = row.get(1);
        let kind: String = row.get(2);
        let payload_json: String = row.get(3);

        let id = Uuid::parse_str(&id).map_err(|_| LedgerError::Internal)?;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map_err(|_| LedgerError::Internal)?
            .with_timezone(&Utc);
        let payload = serde_json::from_str(&payload_json).map_err(|_| LedgerError::Internal)?;

        out.push(EventItem {
            id,
            created_at,
            kind,
            payload,
        });
    }

    Ok(out)
}
