//! End-to-end tests for `SafeConnection` over the rusqlite driver
//!
//! These tests run the full connect / set / query / reset cycle against
//! real SQLite databases, in memory and on disk.

#[cfg(test)]
mod tests {
    use safeconn::{
        ConnectionInfo, Options, Param, QueryOutcome, SafeConnError, SafeConnection, SqliteDriver,
    };
    use tempfile::TempDir;

    fn memory_info() -> ConnectionInfo {
        ConnectionInfo::new("localhost", "", "", ":memory:")
    }

    fn execute(conn: &mut SafeConnection<SqliteDriver>, sql: &str, params: &[Param]) -> QueryOutcome {
        conn.set(sql, params).unwrap();
        conn.query(&[]).unwrap()
    }

    fn setup_users(conn: &mut SafeConnection<SqliteDriver>) {
        execute(
            conn,
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, score REAL)",
            &[],
        );
        execute(
            conn,
            "INSERT INTO users (name, score) VALUES (?, ?)",
            &[Param::from("alice"), Param::Float(9.5)],
        );
        execute(
            conn,
            "INSERT INTO users (name, score) VALUES (?, ?)",
            &[Param::from("bob"), Param::Float(7.25)],
        );
    }

    #[test]
    fn test_select_by_id() {
        let mut conn = SafeConnection::new(SqliteDriver, memory_info(), Options::default());
        assert!(conn.connection().is_some());
        setup_users(&mut conn);

        conn.set("SELECT * FROM users WHERE id=?", &[Param::Int(1)]).unwrap();
        assert_eq!(conn.type_signature().unwrap().to_string(), "i");

        let result = conn.query(&[]).unwrap().into_rows().unwrap();
        assert_eq!(result.columns, vec!["id", "name", "score"]);
        assert_eq!(result.rows, vec![vec!["1", "alice", "9.5"]]);
    }

    #[test]
    fn test_insert_reports_affected_rows() {
        let mut conn = SafeConnection::new(SqliteDriver, memory_info(), Options::default());
        setup_users(&mut conn);

        let outcome = execute(&mut conn, "UPDATE users SET score = ? WHERE score > ?", &[
            Param::Float(1.0),
            Param::Int(5),
        ]);
        assert_eq!(outcome, QueryOutcome::Completed { affected_rows: 2 });
    }

    #[test]
    fn test_values_are_stored_escaped() {
        let mut conn = SafeConnection::new(SqliteDriver, memory_info(), Options::default());
        setup_users(&mut conn);

        execute(
            &mut conn,
            "INSERT INTO users (name) VALUES (?)",
            &[Param::from("<script>'x'</script>")],
        );
        let result = execute(&mut conn, "SELECT name FROM users WHERE id = ?", &[Param::Int(3)])
            .into_rows()
            .unwrap();
        assert_eq!(result.rows, vec![vec!["&lt;script&gt;&#039;x&#039;&lt;/script&gt;"]]);
    }

    #[test]
    fn test_query_repeatedly_with_exec_params() {
        let mut conn = SafeConnection::new(SqliteDriver, memory_info(), Options::default());
        setup_users(&mut conn);

        conn.set("SELECT name FROM users WHERE id = ?", &[Param::Int(1)]).unwrap();
        let first = conn.query(&[]).unwrap().into_rows().unwrap();
        let second = conn.query(&[Param::Int(2)]).unwrap().into_rows().unwrap();
        let again = conn.query(&[]).unwrap().into_rows().unwrap();

        assert_eq!(first.rows, vec![vec!["alice"]]);
        assert_eq!(second.rows, vec![vec!["bob"]]);
        assert_eq!(again.rows, first.rows);
    }

    #[test]
    fn test_invalid_template_sets_statement_error() {
        let mut conn = SafeConnection::new(SqliteDriver, memory_info(), Options::default());

        let result = conn.set("SELECT * FROM missing WHERE id = ?", &[Param::Int(1)]);
        assert!(matches!(result, Err(SafeConnError::Prepare(_))));
        assert!(conn.statement_error().message().unwrap().contains("no such table"));
        assert_ne!(conn.statement_error().code, 0);
        assert!(conn.statement().is_none());
    }

    #[test]
    fn test_type_mismatch_fails_bind() {
        let mut conn = SafeConnection::new(SqliteDriver, memory_info(), Options::default());
        setup_users(&mut conn);
        conn.set_option_code(1, false, &["i"]).unwrap();

        let result = conn.set("SELECT * FROM users WHERE id = ?", &[Param::from("one")]);
        assert!(matches!(result, Err(SafeConnError::Bind(_))));
        assert_eq!(conn.statement_error().message(), Some("binding parameters failed"));
        assert!(conn.bind_error().unwrap().contains("not a valid 'i'"));
    }

    #[test]
    fn test_constraint_violation_sets_db_error() {
        let mut conn = SafeConnection::new(SqliteDriver, memory_info(), Options::default());
        setup_users(&mut conn);

        conn.set("INSERT INTO users (id, name) VALUES (?, ?)", &[Param::Int(1), Param::from("dup")])
            .unwrap();
        assert!(matches!(conn.query(&[]), Err(SafeConnError::Execute(_))));
        assert!(conn.db_error().message().unwrap().contains("UNIQUE"));
        assert_ne!(conn.db_error().code, 0);
    }

    #[test]
    fn test_connect_to_invalid_path_fails() {
        let info = ConnectionInfo::new("localhost", "", "", "/nonexistent/path/database.db");
        let mut conn = SafeConnection::new(SqliteDriver, info, Options::default());

        assert!(conn.connection().is_none());
        assert!(conn.connect_error().is_set());
        assert!(matches!(
            conn.set("SELECT 1", &[]),
            Err(SafeConnError::NoActiveConnection)
        ));
    }

    #[test]
    fn test_reuse_statement_across_reconnect() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shop.db");
        let info = ConnectionInfo::new("localhost", "", "", path.to_string_lossy());

        let mut conn = SafeConnection::new(SqliteDriver, info, Options::default());
        setup_users(&mut conn);
        conn.set("SELECT name FROM users WHERE score > ?", &[Param::Float(8.0)])
            .unwrap();
        conn.set_option(safeconn::SessionOption::ReuseStatement(true)).unwrap();

        conn.connect(None).unwrap();
        let result = conn.query(&[]).unwrap().into_rows().unwrap();
        assert_eq!(result.rows, vec![vec!["alice"]]);
    }

    #[test]
    fn test_teardown_releases_database_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("teardown.db");
        let info = ConnectionInfo::new("localhost", "", "", path.to_string_lossy());

        {
            let mut conn = SafeConnection::new(SqliteDriver, info.clone(), Options::default());
            setup_users(&mut conn);
            conn.set("SELECT * FROM users", &[]).unwrap();
        }

        let mut conn = SafeConnection::new(SqliteDriver, info, Options::default());
        let result = execute(&mut conn, "SELECT COUNT(*) FROM users", &[]).into_rows().unwrap();
        assert_eq!(result.rows, vec![vec!["2"]]);
    }
}
