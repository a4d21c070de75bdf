/// SQLite Driver Module
///
/// Implements the driver contract on top of rusqlite. `ConnectionInfo::database`
/// is the database path (`":memory:"` for an in-memory database); host,
/// username and password have no meaning for SQLite and are ignored.

use crate::core::db::driver::{
    check_arity, BindError, ConnectionInfo, Driver, DriverConnection, DriverError, DriverStatement,
};
use crate::core::db::params::{Param, TypeCode, TypeSignature};
use crate::core::db::query::{format_value, QueryOutcome, QueryResult};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::rc::Rc;
use tracing::debug;

/// Code reported when a primitive is used on a handle that was already closed.
const HANDLE_CLOSED: i32 = -1;

impl From<rusqlite::Error> for DriverError {
    fn from(e: rusqlite::Error) -> Self {
        let code = match &e {
            rusqlite::Error::SqliteFailure(err, _) => err.extended_code,
            _ => HANDLE_CLOSED,
        };
        DriverError::new(e.to_string(), code)
    }
}

/// Driver that opens SQLite databases through rusqlite.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDriver;

impl Driver for SqliteDriver {
    type Connection = SqliteConnection;
    type Statement = SqliteStatement;

    fn open(&self, info: &ConnectionInfo) -> Result<SqliteConnection, DriverError> {
        let conn = Connection::open(&info.database)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        debug!("Opened SQLite database {:?}", info.database);
        Ok(SqliteConnection {
            inner: Some(Rc::new(conn)),
        })
    }
}

/// A SQLite connection shared with the statements prepared on it.
#[derive(Debug)]
pub struct SqliteConnection {
    inner: Option<Rc<Connection>>,
}

impl SqliteConnection {
    /// The underlying rusqlite connection, unless closed.
    pub fn raw(&self) -> Option<&Connection> {
        self.inner.as_deref()
    }
}

impl DriverConnection for SqliteConnection {
    type Statement = SqliteStatement;

    fn prepare(&mut self, template: &str) -> Result<SqliteStatement, DriverError> {
        let conn = self
            .inner
            .as_ref()
            .ok_or_else(|| DriverError::new("connection is closed", HANDLE_CLOSED))?;
        let parameter_count = conn.prepare_cached(template)?.parameter_count();

        Ok(SqliteStatement {
            conn: Some(Rc::clone(conn)),
            template: template.to_string(),
            parameter_count,
            bound: Vec::new(),
        })
    }

    fn close(&mut self) -> Result<(), DriverError> {
        let Some(shared) = self.inner.take() else {
            return Ok(());
        };
        match Rc::try_unwrap(shared) {
            Ok(conn) => conn.close().map_err(|(conn, e)| {
                self.inner = Some(Rc::new(conn));
                e.into()
            }),
            Err(_shared) => {
                // The statement holds the last reference and releases it on close.
                debug!("SQLite connection closed with a statement still attached");
                Ok(())
            }
        }
    }
}

/// A prepared SQLite statement and its bound values.
#[derive(Debug)]
pub struct SqliteStatement {
    conn: Option<Rc<Connection>>,
    template: String,
    parameter_count: usize,
    bound: Vec<Value>,
}

impl SqliteStatement {
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Number of placeholders in the template.
    pub fn parameter_count(&self) -> usize {
        self.parameter_count
    }
}

impl DriverStatement for SqliteStatement {
    fn bind(&mut self, signature: &TypeSignature, values: &[String]) -> Result<(), BindError> {
        check_arity(signature, values)?;
        if values.len() != self.parameter_count {
            return Err(BindError::PlaceholderCount {
                expected: self.parameter_count,
                actual: values.len(),
            });
        }

        self.bound = signature
            .codes()
            .iter()
            .zip(values)
            .enumerate()
            .map(|(index, (code, value))| coerce(index, *code, value))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(())
    }

    fn execute(&mut self, params: &[Param]) -> Result<QueryOutcome, DriverError> {
        let conn = self
            .conn
            .as_ref()
            .ok_or_else(|| DriverError::new("statement is closed", HANDLE_CLOSED))?;
        let values: Vec<Value> = if params.is_empty() {
            self.bound.clone()
        } else {
            params.iter().map(to_value).collect()
        };

        let mut stmt = conn.prepare_cached(&self.template)?;
        if stmt.column_count() == 0 {
            let affected_rows = stmt.execute(params_from_iter(values.iter()))?;
            return Ok(QueryOutcome::Completed { affected_rows });
        }

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let column_count = columns.len();
        let rows = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                (0..column_count)
                    .map(|i| row.get_ref(i).map(format_value))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(QueryOutcome::Rows(QueryResult::new(columns, rows)))
    }

    fn close(&mut self) -> Result<(), DriverError> {
        self.conn = None;
        self.bound.clear();
        Ok(())
    }
}

/// Reads a sanitized value as the SQLite type its code names.
fn coerce(index: usize, code: TypeCode, value: &str) -> Result<Value, BindError> {
    let mismatch = || BindError::TypeMismatch {
        index,
        code: code.as_char(),
        value: value.to_string(),
    };
    match code {
        TypeCode::Integer => value.parse::<i64>().map(Value::Integer).map_err(|_| mismatch()),
        TypeCode::Double => value.parse::<f64>().map(Value::Real).map_err(|_| mismatch()),
        TypeCode::String => Ok(Value::Text(value.to_string())),
        TypeCode::Blob => Ok(Value::Blob(value.as_bytes().to_vec())),
    }
}

fn to_value(param: &Param) -> Value {
    match param {
        Param::Int(i) => Value::Integer(*i),
        Param::Float(f) => Value::Real(*f),
        Param::Text(s) => Value::Text(s.clone()),
        Param::Blob(b) => Value::Blob(b.clone()),
        Param::Bool(b) => Value::Integer(i64::from(*b)),
        Param::Null => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_info() -> ConnectionInfo {
        ConnectionInfo::new("localhost", "", "", ":memory:")
    }

    fn setup_test_table(conn: &SqliteConnection) {
        conn.raw()
            .unwrap()
            .execute_batch(
                "
                CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT, value REAL);
                INSERT INTO test (name, value) VALUES ('Alice', 123.45);
                INSERT INTO test (name, value) VALUES (NULL, NULL);
            ",
            )
            .unwrap();
    }

    #[test]
    fn test_open_and_close() {
        let mut conn = SqliteDriver.open(&memory_info()).unwrap();
        assert!(conn.raw().is_some());
        conn.close().unwrap();
        assert!(conn.raw().is_none());
        // Closing twice is a no-op
        conn.close().unwrap();
    }

    #[test]
    fn test_open_failure_reports_code() {
        let info = ConnectionInfo::new("localhost", "", "", "/nonexistent/path/database.db");
        let err = SqliteDriver.open(&info).unwrap_err();
        assert_ne!(err.code, 0);
        assert!(!err.message.is_empty());
    }

    #[test]
    fn test_prepare_invalid_sql() {
        let mut conn = SqliteDriver.open(&memory_info()).unwrap();
        let err = conn.prepare("SELECT * FROM nonexistent_table").unwrap_err();
        assert!(err.message.contains("no such table"));
    }

    #[test]
    fn test_bind_and_execute_rows() {
        let mut conn = SqliteDriver.open(&memory_info()).unwrap();
        setup_test_table(&conn);

        let mut stmt = conn.prepare("SELECT id, name, value FROM test WHERE id = ?").unwrap();
        assert_eq!(stmt.parameter_count(), 1);
        stmt.bind(&"i".parse().unwrap(), &["1".to_string()]).unwrap();

        let outcome = stmt.execute(&[]).unwrap();
        let rows = outcome.rows().unwrap();
        assert_eq!(rows.columns, vec!["id", "name", "value"]);
        assert_eq!(rows.rows, vec![vec!["1", "Alice", "123.45"]]);

        // Execute-time parameters replace the bound ones
        let outcome = stmt.execute(&[Param::Int(2)]).unwrap();
        assert_eq!(outcome.rows().unwrap().rows, vec![vec!["2", "NULL", "NULL"]]);
    }

    #[test]
    fn test_execute_without_result_set() {
        let mut conn = SqliteDriver.open(&memory_info()).unwrap();
        setup_test_table(&conn);

        let mut stmt = conn.prepare("UPDATE test SET value = ?").unwrap();
        stmt.bind(&"d".parse().unwrap(), &["1.5".to_string()]).unwrap();
        assert_eq!(
            stmt.execute(&[]).unwrap(),
            QueryOutcome::Completed { affected_rows: 2 }
        );
    }

    #[test]
    fn test_bind_rejects_bad_values() {
        let mut conn = SqliteDriver.open(&memory_info()).unwrap();
        let mut stmt = conn.prepare("SELECT ?, ?").unwrap();

        assert_eq!(
            stmt.bind(&"ii".parse().unwrap(), &["1".to_string()]),
            Err(BindError::Arity { expected: 2, actual: 1 })
        );
        assert_eq!(
            stmt.bind(&"i".parse().unwrap(), &["1".to_string()]),
            Err(BindError::PlaceholderCount { expected: 2, actual: 1 })
        );
        assert_eq!(
            stmt.bind(&"is".parse().unwrap(), &["x".to_string(), "y".to_string()]),
            Err(BindError::TypeMismatch {
                index: 0,
                code: 'i',
                value: "x".to_string()
            })
        );
    }

    #[test]
    fn test_connection_close_with_attached_statement() {
        let mut conn = SqliteDriver.open(&memory_info()).unwrap();
        let mut stmt = conn.prepare("SELECT 1").unwrap();

        conn.close().unwrap();
        assert!(conn.raw().is_none());

        // The statement keeps working until it is closed itself
        assert!(stmt.execute(&[]).is_ok());
        stmt.close().unwrap();
        assert_eq!(stmt.execute(&[]).unwrap_err().code, HANDLE_CLOSED);
    }
}
