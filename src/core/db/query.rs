/// Query Result Module
///
/// Result types returned by `SafeConnection::query` and the value formatting
/// used to render rows for display.

use rusqlite::types::ValueRef;

/// Represents the rows produced by executing a statement
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    /// Column names from the query result
    pub columns: Vec<String>,
    /// Rows of data as string values
    pub rows: Vec<Vec<String>>,
    /// Number of rows returned
    pub row_count: usize,
}

impl QueryResult {
    /// Creates a new QueryResult from column names and row data
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let row_count = rows.len();
        QueryResult {
            columns,
            rows,
            row_count,
        }
    }
}

/// Outcome of a successful execution.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// The statement produced a result set
    Rows(QueryResult),
    /// The statement produced no result set
    Completed { affected_rows: usize },
}

impl QueryOutcome {
    /// Returns the result set, if the statement produced one.
    pub fn rows(&self) -> Option<&QueryResult> {
        match self {
            QueryOutcome::Rows(result) => Some(result),
            QueryOutcome::Completed { .. } => None,
        }
    }

    pub fn into_rows(self) -> Option<QueryResult> {
        match self {
            QueryOutcome::Rows(result) => Some(result),
            QueryOutcome::Completed { .. } => None,
        }
    }
}

/// Formats a database value for display
pub fn format_value(value: ValueRef) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).to_string(),
        ValueRef::Blob(b) => format!("<BLOB: {} bytes>", b.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_result_row_count() {
        let result = QueryResult::new(
            vec!["id".to_string()],
            vec![vec!["1".to_string()], vec!["2".to_string()]],
        );
        assert_eq!(result.row_count, 2);
    }

    #[test]
    fn test_outcome_accessors() {
        let rows = QueryOutcome::Rows(QueryResult::new(vec![], vec![]));
        assert!(rows.rows().is_some());

        let done = QueryOutcome::Completed { affected_rows: 3 };
        assert!(done.rows().is_none());
        assert!(done.into_rows().is_none());
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(ValueRef::Null), "NULL");
        assert_eq!(format_value(ValueRef::Integer(42)), "42");
        assert_eq!(format_value(ValueRef::Real(123.45)), "123.45");
        assert_eq!(format_value(ValueRef::Text(b"Alice")), "Alice");
        assert_eq!(format_value(ValueRef::Blob(&[1, 2, 3])), "<BLOB: 3 bytes>");
    }
}
