/// Driver Module
///
/// The connection wrapper never talks to a database library directly. It
/// goes through the [`Driver`] and [`Session`] traits defined here, which
/// expose the handful of primitives the wrapper needs: open a connection,
/// escape a string, execute one statement, and read back affected rows and
/// the generated insert id.
///
/// [`SqliteDriver`] is the bundled rusqlite backend.

use crate::core::db::connection::ConnectionConfig;
use crate::core::db::value::{ResultSet, Value};
use rusqlite::{types::ValueRef, Connection};
use thiserror::Error;
use tracing::debug;

/// SQL flavour spoken by a session. Only the INSERT statement differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `INSERT INTO t SET a=1, b=2`
    MySql,
    /// `INSERT INTO t (a, b) VALUES (1, 2)`
    Sqlite,
}

/// Error text reported by the underlying client.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct DriverError {
    pub message: String,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        DriverError {
            message: message.into(),
        }
    }
}

impl From<rusqlite::Error> for DriverError {
    fn from(e: rusqlite::Error) -> Self {
        DriverError::new(e.to_string())
    }
}

/// What a successfully executed statement produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Execution {
    /// The statement returned a result set
    Rows(ResultSet),
    /// The statement ran without returning rows
    Done,
}

/// Factory for sessions.
pub trait Driver {
    type Session: Session;

    /// Opens a connection with the given credentials.
    fn connect(&self, config: &ConnectionConfig) -> Result<Self::Session, DriverError>;
}

/// An open connection.
pub trait Session {
    fn dialect(&self) -> Dialect;

    /// Escapes a string for use inside a single-quoted literal, using the
    /// connection's own rules.
    fn escape(&self, input: &str) -> String;

    /// Executes exactly one statement.
    fn execute(&mut self, sql: &str) -> Result<Execution, DriverError>;

    /// Rows changed by the last data-modifying statement.
    fn affected_rows(&self) -> u64;

    /// Id generated by the last INSERT, 0 if none.
    fn insert_id(&self) -> i64;

    /// Releases the connection handle.
    fn close(self) -> Result<(), DriverError>;
}

/// Context-free escaping with the classic MySQL `escape_string` rules.
///
/// It does not know the connection's character set, so it is only a fallback
/// for when no session is open.
pub fn legacy_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\u{1a}' => out.push_str("\\Z"),
            c => out.push(c),
        }
    }
    out
}

/// rusqlite-backed driver. The `database` credential is the file path;
/// `:memory:` opens a private in-memory database.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDriver;

impl Driver for SqliteDriver {
    type Session = SqliteSession;

    fn connect(&self, config: &ConnectionConfig) -> Result<SqliteSession, DriverError> {
        let conn = Connection::open(&config.database)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(SqliteSession {
            conn,
            last_changes: 0,
        })
    }
}

/// An open SQLite connection.
#[derive(Debug)]
pub struct SqliteSession {
    conn: Connection,
    last_changes: u64,
}

impl SqliteSession {
    /// Gives access to the underlying rusqlite connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Session for SqliteSession {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    /// Doubles quotes. A NUL cannot appear inside an SQLite literal, so it
    /// closes the literal and is spliced in as a one-byte text cast.
    fn escape(&self, input: &str) -> String {
        input
            .replace('\'', "''")
            .replace('\0', "'||CAST(X'00' AS TEXT)||'")
    }

    fn execute(&mut self, sql: &str) -> Result<Execution, DriverError> {
        let execution = {
            let mut stmt = self.conn.prepare(sql)?;

            if stmt.column_count() == 0 {
                stmt.execute([])?;
                Execution::Done
            } else {
                let columns: Vec<String> =
                    stmt.column_names().into_iter().map(String::from).collect();
                let column_count = columns.len();

                let mut rows = Vec::new();
                let mut cursor = stmt.query([])?;
                while let Some(row) = cursor.next()? {
                    let mut values = Vec::with_capacity(column_count);
                    for i in 0..column_count {
                        values.push(convert_value(row.get_ref(i)?));
                    }
                    rows.push(values);
                }

                debug!("SQLite statement returned {} rows", rows.len());
                Execution::Rows(ResultSet::new(columns, rows))
            }
        };

        // Read after the statement is finalized so RETURNING counts too.
        self.last_changes = self.conn.changes();
        Ok(execution)
    }

    fn affected_rows(&self) -> u64 {
        self.last_changes
    }

    /// 0 when the last statement changed nothing, e.g. a skipped
    /// `INSERT OR IGNORE`.
    fn insert_id(&self) -> i64 {
        if self.last_changes == 0 {
            0
        } else {
            self.conn.last_insert_rowid()
        }
    }

    fn close(self) -> Result<(), DriverError> {
        self.conn.close().map_err(|(_, e)| DriverError::from(e))
    }
}

/// Converts a SQLite value into an owned [`Value`].
fn convert_value(value: ValueRef) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> ConnectionConfig {
        ConnectionConfig::new("", "tester", "", ":memory:")
    }

    #[test]
    fn test_legacy_escape() {
        assert_eq!(legacy_escape("O'Brien"), "O\\'Brien");
        assert_eq!(legacy_escape("a\\b"), "a\\\\b");
        assert_eq!(legacy_escape("line\nbreak\r"), "line\\nbreak\\r");
        assert_eq!(legacy_escape("say \"hi\""), "say \\\"hi\\\"");
        assert_eq!(legacy_escape("nul\0sub\u{1a}"), "nul\\0sub\\Z");
        assert_eq!(legacy_escape("plain"), "plain");
    }

    #[test]
    fn test_sqlite_session_execution() {
        let mut session = SqliteDriver.connect(&memory_config()).unwrap();
        assert_eq!(session.dialect(), Dialect::Sqlite);

        let created = session
            .execute("CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT, data BLOB)")
            .unwrap();
        assert_eq!(created, Execution::Done);

        session
            .execute("INSERT INTO items (name, data) VALUES ('bolt', X'48656C6C6F')")
            .unwrap();
        assert_eq!(session.affected_rows(), 1);
        assert_eq!(session.insert_id(), 1);

        match session.execute("SELECT id, name, data FROM items").unwrap() {
            Execution::Rows(mut set) => {
                assert_eq!(set.columns(), &["id", "name", "data"]);
                let row = set.next().unwrap();
                assert_eq!(row.get("name"), Some(&Value::from("bolt")));
                assert_eq!(row.get("data"), Some(&Value::Bytes(b"Hello".to_vec())));
            }
            other => panic!("Expected rows, got {:?}", other),
        }

        session.close().unwrap();
    }

    #[test]
    fn test_sqlite_escape_doubles_quotes() {
        let session = SqliteDriver.connect(&memory_config()).unwrap();
        assert_eq!(session.escape("O'Brien"), "O''Brien");
    }

    #[test]
    fn test_sqlite_escape_splices_nul() {
        let mut session = SqliteDriver.connect(&memory_config()).unwrap();
        let sql = format!("SELECT '{}' AS v", session.escape("a\0'b"));

        match session.execute(&sql).unwrap() {
            Execution::Rows(mut set) => {
                let row = set.next().unwrap();
                assert_eq!(row.get("v"), Some(&Value::from("a\0'b")));
            }
            other => panic!("Expected rows, got {:?}", other),
        }
    }

    #[test]
    fn test_sqlite_counts_follow_the_last_statement() {
        let mut session = SqliteDriver.connect(&memory_config()).unwrap();
        session
            .execute("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();
        session.execute("INSERT INTO t (id, name) VALUES (1, 'a')").unwrap();
        session.execute("UPDATE t SET name = 'b'").unwrap();
        assert_eq!(session.affected_rows(), 1);

        let returned = session
            .execute("UPDATE t SET name = 'c' WHERE id = 999 RETURNING id")
            .unwrap();
        assert!(matches!(returned, Execution::Rows(ref set) if set.num_rows() == 0));
        assert_eq!(session.affected_rows(), 0);

        session.execute("UPDATE t SET name = 'd' RETURNING id").unwrap();
        assert_eq!(session.affected_rows(), 1);

        session.execute("INSERT OR IGNORE INTO t (id) VALUES (1)").unwrap();
        assert_eq!(session.affected_rows(), 0);
        assert_eq!(session.insert_id(), 0);
    }

    #[test]
    fn test_sqlite_error_text() {
        let mut session = SqliteDriver.connect(&memory_config()).unwrap();
        let err = session.execute("SELECT * FROM nonexistent_table").unwrap_err();
        assert!(err.message.contains("no such table"));
    }

    #[test]
    fn test_sqlite_connect_failure() {
        let config = ConnectionConfig::new("", "tester", "", "/nonexistent/path/database.db");
        assert!(SqliteDriver.connect(&config).is_err());
    }
}
