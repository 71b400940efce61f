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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;

    #[test]
    fn get_reports_corrupt_row() {
        let db = Database::in_memory().unwrap();
        let result = db.with_conn(|conn| {
            conn.query_row("SELECT 'not-a-number'", [], |row| {
                Ok(get::<i64>(row, 0, "games", "state"))
            })
            .map_err(|e| StoreError::Database(e.to_string()))
        });
        assert!(matches!(
            result.unwrap(),
            Err(StoreError::CorruptRow { table: "games", column: "state", .. })
        ));
    }

    #[test]
    fn get_opt_handles_null() {
        let db = Database::in_memory().unwrap();
        let result = db.with_conn(|conn| {
            conn.query_row("SELECT NULL", [], |row| {
                Ok(get_opt::<String>(row, 0, "games", "second_user_id"))
            })
            .map_err(|e| StoreError::Database(e.to_string()))
        });
        assert!(result.unwrap().unwrap().is_none());
    }
}
