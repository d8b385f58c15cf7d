use serde::{Deserialize, Serialize};
use tracing::instrument;

use taxthink_core::reply::MessageMetadata;
use taxthink_core::types::{now_rfc3339, Role};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

/// A stored conversation turn. Immutable once written.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRow {
    pub id: i64,
    pub session_id: i64,
    pub role: Role,
    pub content: String,
    pub metadata: Option<MessageMetadata>,
    pub created_at: String,
}

pub struct MessageRepo {
    db: Database,
}

impl MessageRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Append a message. The session id is recorded as given; it is not
    /// checked against the sessions table.
    #[instrument(skip(self, content, metadata))]
    pub fn create(
        &self,
        session_id: i64,
        role: Role,
        content: &str,
        metadata: Option<&MessageMetadata>,
    ) -> Result<MessageRow, StoreError> {
        let now = now_rfc3339();
        let metadata_json = metadata.map(serde_json::to_string).transpose()?;

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (session_id, role, content, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![session_id, role.to_string(), content, metadata_json, now],
            )?;
            let id = conn.last_insert_rowid();

            Ok(MessageRow {
                id,
                session_id,
                role,
                content: content.to_string(),
                metadata: metadata.cloned(),
                created_at: now.clone(),
            })
        })
    }

    /// All messages for a session, oldest first.
    #[instrument(skip(self))]
    pub fn list_for_session(&self, session_id: i64) -> Result<Vec<MessageRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, role, content, metadata, created_at
                 FROM messages WHERE session_id = ?1
                 ORDER BY created_at ASC, id ASC",
            )?;
            let mut rows = stmt.query([session_id])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_message(row)?);
            }
            Ok(results)
        })
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> Result<MessageRow, StoreError> {
    let role: String = row_helpers::get(row, 2, "messages", "role")?;
    let metadata = row_helpers::get_opt::<String>(row, 4, "messages", "metadata")?
        .map(|raw| row_helpers::parse_json(&raw, "messages", "metadata"))
        .transpose()?;

    Ok(MessageRow {
        id: row_helpers::get(row, 0, "messages", "id")?,
        session_id: row_helpers::get(row, 1, "messages", "session_id")?,
        role: row_helpers::parse_enum(&role, "messages", "role")?,
        content: row_helpers::get(row, 3, "messages", "content")?,
        metadata,
        created_at: row_helpers::get(row, 5, "messages", "created_at")?,
    })
}
