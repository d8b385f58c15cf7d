use serde::{Deserialize, Serialize};
use tracing::instrument;

use taxthink_core::types::{now_rfc3339, Currency, Jurisdiction, SessionStatus};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

/// A stored advisory session. Serialized field names match the HTTP wire
/// format.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRow {
    pub id: i64,
    pub title: String,
    pub jurisdiction: Jurisdiction,
    pub currency: Currency,
    pub status: SessionStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields a session update may change. Absent fields keep their stored
/// value; `updated_at` is refreshed even when every field is absent.
#[derive(Clone, Debug, Default)]
pub struct SessionPatch {
    pub title: Option<String>,
    pub jurisdiction: Option<Jurisdiction>,
    pub currency: Option<Currency>,
    pub status: Option<SessionStatus>,
}

pub struct SessionRepo {
    db: Database,
}

impl SessionRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a new session. Ids are allocated by the store and strictly
    /// increase across creates.
    #[instrument(skip(self, title))]
    pub fn create(
        &self,
        title: &str,
        jurisdiction: Jurisdiction,
        currency: Currency,
    ) -> Result<SessionRow, StoreError> {
        let now = now_rfc3339();

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (title, jurisdiction, currency, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 'active', ?4, ?4)",
                rusqlite::params![title, jurisdiction.to_string(), currency.to_string(), now],
            )?;
            let id = conn.last_insert_rowid();

            Ok(SessionRow {
                id,
                title: title.to_string(),
                jurisdiction,
                currency,
                status: SessionStatus::Active,
                created_at: now.clone(),
                updated_at: now.clone(),
            })
        })
    }

    /// Get a session by id.
    #[instrument(skip(self))]
    pub fn get(&self, id: i64) -> Result<SessionRow, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, jurisdiction, currency, status, created_at, updated_at
                 FROM sessions WHERE id = ?1",
            )?;
            let mut rows = stmt.query([id])?;
            match rows.next()? {
                Some(row) => row_to_session(row),
                None => Err(StoreError::NotFound(format!("session {id}"))),
            }
        })
    }

    /// List every session, most recently touched first.
    #[instrument(skip(self))]
    pub fn list(&self) -> Result<Vec<SessionRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, jurisdiction, currency, status, created_at, updated_at
                 FROM sessions ORDER BY updated_at DESC, id DESC",
            )?;
            let mut rows = stmt.query([])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_session(row)?);
            }
            Ok(results)
        })
    }

    /// Merge the patch into a session and refresh `updated_at`.
    /// `created_at` is never touched. An empty patch acts as a "touch".
    #[instrument(skip(self, patch))]
    pub fn update(&self, id: i64, patch: SessionPatch) -> Result<SessionRow, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, jurisdiction, currency, status, created_at, updated_at
                 FROM sessions WHERE id = ?1",
            )?;
            let mut rows = stmt.query([id])?;
            let mut session = match rows.next()? {
                Some(row) => row_to_session(row)?,
                None => return Err(StoreError::NotFound(format!("session {id}"))),
            };
            drop(rows);
            drop(stmt);

            if let Some(title) = patch.title {
                session.title = title;
            }
            if let Some(jurisdiction) = patch.jurisdiction {
                session.jurisdiction = jurisdiction;
            }
            if let Some(currency) = patch.currency {
                session.currency = currency;
            }
            if let Some(status) = patch.status {
                session.status = status;
            }
            session.updated_at = now_rfc3339();

            conn.execute(
                "UPDATE sessions
                 SET title = ?1, jurisdiction = ?2, currency = ?3, status = ?4, updated_at = ?5
                 WHERE id = ?6",
                rusqlite::params![
                    session.title,
                    session.jurisdiction.to_string(),
                    session.currency.to_string(),
                    session.status.to_string(),
                    session.updated_at,
                    id,
                ],
            )?;

            Ok(session)
        })
    }
}

fn row_to_session(row: &rusqlite::Row<'_>) -> Result<SessionRow, StoreError> {
    let jurisdiction: String = row_helpers::get(row, 2, "sessions", "jurisdiction")?;
    let currency: String = row_helpers::get(row, 3, "sessions", "currency")?;
    let status: String = row_helpers::get(row, 4, "sessions", "status")?;

    Ok(SessionRow {
        id: row_helpers::get(row, 0, "sessions", "id")?,
        title: row_helpers::get(row, 1, "sessions", "title")?,
        jurisdiction: row_helpers::parse_enum(&jurisdiction, "sessions", "jurisdiction")?,
        currency: row_helpers::parse_enum(&currency, "sessions", "currency")?,
        status: row_helpers::parse_enum(&status, "sessions", "status")?,
        created_at: row_helpers::get(row, 5, "sessions", "created_at")?,
        updated_at: row_helpers::get(row, 6, "sessions", "updated_at")?,
    })
}
