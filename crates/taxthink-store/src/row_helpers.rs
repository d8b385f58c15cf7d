use crate::error::StoreError;

/// Get a required column value from a row, returning CorruptRow on failure.
pub fn get<T: rusqlite::types::FromSql>(
    row: &rusqlite::Row<'_>,
    idx: usize,
    table: &'static str,
    column: &'static str,
) -> Result<T, StoreError> {
    row.get(idx).map_err(|e| StoreError::CorruptRow {
        table,
        column,
        detail: e.to_string(),
    })
}

/// Get an optional column value.
pub fn get_opt<T: rusqlite::types::FromSql>(
    row: &rusqlite::Row<'_>,
    idx: usize,
    table: &'static str,
    column: &'static str,
) -> Result<Option<T>, StoreError> {
    row.get(idx).map_err(|e| StoreError::CorruptRow {
        table,
        column,
        detail: e.to_string(),
    })
}

/// Parse a JSON text column, returning CorruptRow on parse failure.
pub fn parse_json<T: serde::de::DeserializeOwned>(
    raw: &str,
    table: &'static str,
    column: &'static str,
) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::CorruptRow {
        table,
        column,
        detail: format!("invalid JSON: {e}"),
    })
}

/// Parse a text column into an enum, returning CorruptRow on failure.
pub fn parse_enum<T: std::str::FromStr>(
    raw: &str,
    table: &'static str,
    column: &'static str,
) -> Result<T, StoreError> {
    raw.parse().map_err(|_| StoreError::CorruptRow {
        table,
        column,
        detail: format!("unknown variant: {raw}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use taxthink_core::types::SessionStatus;

    #[test]
    fn parse_enum_success() {
        let status: SessionStatus = parse_enum("completed", "sessions", "status").unwrap();
        assert_eq!(status, SessionStatus::Completed);
    }

    #[test]
    fn parse_enum_failure() {
        let result: Result<SessionStatus, _> = parse_enum("INVALID", "sessions", "status");
        assert!(matches!(
            result,
            Err(StoreError::CorruptRow { table: "sessions", column: "status", .. })
        ));
    }

    #[test]
    fn parse_json_success() {
        let value: serde_json::Value =
            parse_json(r#"{"amount": 1200}"#, "session_data", "data_value").unwrap();
        assert_eq!(value["amount"], 1200);
    }

    #[test]
    fn parse_json_failure() {
        let result: Result<serde_json::Value, _> =
            parse_json("not valid json", "session_data", "data_value");
        assert!(matches!(
            result,
            Err(StoreError::CorruptRow { table: "session_data", column: "data_value", .. })
        ));
    }
}
