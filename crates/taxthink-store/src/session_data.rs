use serde::{Deserialize, Serialize};
use tracing::instrument;

use taxthink_core::types::now_rfc3339;

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

/// A structured fact extracted from a conversation, addressed by the
/// (session, category, key) triple.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDatumRow {
    pub id: i64,
    pub session_id: i64,
    pub category: String,
    pub data_key: String,
    pub data_value: serde_json::Value,
    pub updated_at: String,
}

pub struct SessionDataRepo {
    db: Database,
}

impl SessionDataRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert or update by (session_id, category, data_key). A matching
    /// triple keeps its id and gets the new value and timestamp; otherwise a
    /// new row is created. The session id is not checked against the
    /// sessions table.
    #[instrument(skip(self, data_value))]
    pub fn upsert(
        &self,
        session_id: i64,
        category: &str,
        data_key: &str,
        data_value: &serde_json::Value,
    ) -> Result<SessionDatumRow, StoreError> {
        let now = now_rfc3339();
        let value_json = serde_json::to_string(data_value)?;

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO session_data (session_id, category, data_key, data_value, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(session_id, category, data_key)
                 DO UPDATE SET data_value = excluded.data_value, updated_at = excluded.updated_at",
                rusqlite::params![session_id, category, data_key, value_json, now],
            )?;

            let mut stmt = conn.prepare(
                "SELECT id, session_id, category, data_key, data_value, updated_at
                 FROM session_data
                 WHERE session_id = ?1 AND category = ?2 AND data_key = ?3",
            )?;
            let mut rows = stmt.query(rusqlite::params![session_id, category, data_key])?;
            match rows.next()? {
                Some(row) => row_to_datum(row),
                None => Err(StoreError::Unavailable("upsert row vanished".to_string())),
            }
        })
    }

    /// Data for a session, optionally narrowed to one category. Insertion
    /// order.
    #[instrument(skip(self))]
    pub fn list(
        &self,
        session_id: i64,
        category: Option<&str>,
    ) -> Result<Vec<SessionDatumRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut results = Vec::new();
            match category {
                Some(category) => {
                    let mut stmt = conn.prepare(
                        "SELECT id, session_id, category, data_key, data_value, updated_at
                         FROM session_data
                         WHERE session_id = ?1 AND category = ?2
                         ORDER BY id ASC",
                    )?;
                    let mut rows = stmt.query(rusqlite::params![session_id, category])?;
                    while let Some(row) = rows.next()? {
                        results.push(row_to_datum(row)?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(
                        "SELECT id, session_id, category, data_key, data_value, updated_at
                         FROM session_data
                         WHERE session_id = ?1
                         ORDER BY id ASC",
                    )?;
                    let mut rows = stmt.query([session_id])?;
                    while let Some(row) = rows.next()? {
                        results.push(row_to_datum(row)?);
                    }
                }
            }
            Ok(results)
        })
    }
}

fn row_to_datum(row: &rusqlite::Row<'_>) -> Result<SessionDatumRow, StoreError> {
    let raw_value: String = row_helpers::get(row, 4, "session_data", "data_value")?;

    Ok(SessionDatumRow {
        id: row_helpers::get(row, 0, "session_data", "id")?,
        session_id: row_helpers::get(row, 1, "session_data", "session_id")?,
        category: row_helpers::get(row, 2, "session_data", "category")?,
        data_key: row_helpers::get(row, 3, "session_data", "data_key")?,
        data_value: row_helpers::parse_json(&raw_value, "session_data", "data_value")?,
        updated_at: row_helpers::get(row, 5, "session_data", "updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn setup() -> SessionDataRepo {
        SessionDataRepo::new(Database::in_memory().unwrap())
    }

    #[test]
    fn upsert_creates_then_updates_in_place() {
        let repo = setup();
        let first = repo
            .upsert(1, "personal_income", "salary", &json!({"amount": 90000}))
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = repo
            .upsert(1, "personal_income", "salary", &json!({"amount": 95000}))
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.data_value["amount"], 95000);
        assert!(second.updated_at > first.updated_at);

        let all = repo.list(1, None).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].data_value["amount"], 95000);
    }

    #[test]
    fn distinct_triples_create_distinct_rows() {
        let repo = setup();
        repo.upsert(1, "personal_income", "salary", &json!(90000)).unwrap();
        repo.upsert(1, "personal_income", "bonus", &json!(5000)).unwrap();
        repo.upsert(1, "deductions", "salary", &json!(1200)).unwrap();
        repo.upsert(2, "personal_income", "salary", &json!(70000)).unwrap();

        assert_eq!(repo.list(1, None).unwrap().len(), 3);
        assert_eq!(repo.list(2, None).unwrap().len(), 1);
    }

    #[test]
    fn list_filters_by_category() {
        let repo = setup();
        repo.upsert(1, "personal_income", "salary", &json!(90000)).unwrap();
        repo.upsert(1, "deductions", "home_office", &json!(2400)).unwrap();
        repo.upsert(1, "deductions", "equipment", &json!(1800)).unwrap();

        let deductions = repo.list(1, Some("deductions")).unwrap();
        assert_eq!(deductions.len(), 2);
        assert!(deductions.iter().all(|d| d.category == "deductions"));

        assert!(repo.list(1, Some("compliance")).unwrap().is_empty());
    }

    #[test]
    fn arbitrary_json_values_roundtrip() {
        let repo = setup();
        let value = json!({
            "entries": [{"q": 1, "paid": true}, {"q": 2, "paid": false}],
            "note": "estimated payments"
        });
        let datum = repo.upsert(1, "compliance", "quarterly", &value).unwrap();
        assert_eq!(datum.data_value, value);

        let listed = repo.list(1, Some("compliance")).unwrap();
        assert_eq!(listed[0].data_value, value);
    }

    #[test]
    fn unknown_session_id_is_accepted() {
        let repo = setup();
        let datum = repo.upsert(999, "business", "entity", &json!("llc")).unwrap();
        assert_eq!(datum.session_id, 999);
    }

    #[test]
    fn row_serializes_camel_case() {
        let repo = setup();
        let datum = repo.upsert(1, "business", "entity", &json!("llc")).unwrap();
        let json = serde_json::to_value(&datum).unwrap();
        assert!(json.get("sessionId").is_some());
        assert!(json.get("dataKey").is_some());
        assert!(json.get("dataValue").is_some());
        assert!(json.get("updatedAt").is_some());
    }
}
