/// # Test Utilities Module
///
/// Testing infrastructure for QuickDB:
/// - A scripted in-memory driver that records every statement
/// - SQLite database fixtures with a small sample schema

use crate::core::db::connection::{ConnectionConfig, Database};
use crate::core::db::driver::{legacy_escape, Dialect, Driver, DriverError, Execution, Session, SqliteDriver};
use crate::core::db::value::{ResultSet, Value};
use crate::core::Result;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Shared state behind a [`MockDriver`] and the sessions it opens.
#[derive(Debug, Default)]
pub struct MockState {
    executed: Vec<String>,
    responses: VecDeque<std::result::Result<Execution, DriverError>>,
    affected_rows: u64,
    insert_id: i64,
    connect_attempts: usize,
    refuse_with: Option<String>,
    fail_close: bool,
    closed: usize,
    session_escapes: usize,
}

/// Driver speaking the MySQL dialect whose answers are scripted by the test.
///
/// Statements without a scripted response succeed without rows.
#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    state: Rc<RefCell<MockState>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// A driver whose every connection attempt fails with `reason`.
    pub fn refusing(reason: &str) -> Self {
        let driver = Self::new();
        driver.state.borrow_mut().refuse_with = Some(reason.to_string());
        driver
    }

    pub fn respond_rows(&self, columns: &[&str], rows: Vec<Vec<Value>>) {
        let columns = columns.iter().map(|c| c.to_string()).collect();
        self.state
            .borrow_mut()
            .responses
            .push_back(Ok(Execution::Rows(ResultSet::new(columns, rows))));
    }

    pub fn fail_next(&self, reason: &str) {
        self.state
            .borrow_mut()
            .responses
            .push_back(Err(DriverError::new(reason)));
    }

    pub fn fail_close(&self) {
        self.state.borrow_mut().fail_close = true;
    }

    pub fn set_affected_rows(&self, rows: u64) {
        self.state.borrow_mut().affected_rows = rows;
    }

    pub fn set_insert_id(&self, id: i64) {
        self.state.borrow_mut().insert_id = id;
    }

    pub fn executed(&self) -> Vec<String> {
        self.state.borrow().executed.clone()
    }

    pub fn connect_attempts(&self) -> usize {
        self.state.borrow().connect_attempts
    }

    pub fn closed(&self) -> usize {
        self.state.borrow().closed
    }

    pub fn session_escapes(&self) -> usize {
        self.state.borrow().session_escapes
    }
}

impl Driver for MockDriver {
    type Session = MockSession;

    fn connect(&self, _config: &ConnectionConfig) -> std::result::Result<MockSession, DriverError> {
        let mut state = self.state.borrow_mut();
        state.connect_attempts += 1;
        match &state.refuse_with {
            Some(reason) => Err(DriverError::new(reason.clone())),
            None => Ok(MockSession {
                state: Rc::clone(&self.state),
            }),
        }
    }
}

#[derive(Debug)]
pub struct MockSession {
    state: Rc<RefCell<MockState>>,
}

impl Session for MockSession {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn escape(&self, input: &str) -> String {
        self.state.borrow_mut().session_escapes += 1;
        legacy_escape(input)
    }

    fn execute(&mut self, sql: &str) -> std::result::Result<Execution, DriverError> {
        let mut state = self.state.borrow_mut();
        state.executed.push(sql.to_string());
        state.responses.pop_front().unwrap_or(Ok(Execution::Done))
    }

    fn affected_rows(&self) -> u64 {
        self.state.borrow().affected_rows
    }

    fn insert_id(&self) -> i64 {
        self.state.borrow().insert_id
    }

    fn close(self) -> std::result::Result<(), DriverError> {
        let mut state = self.state.borrow_mut();
        if state.fail_close {
            return Err(DriverError::new("MySQL server has gone away"));
        }
        state.closed += 1;
        Ok(())
    }
}

/// A wrapper over a fresh [`MockDriver`], plus a handle to inspect it.
pub fn mock_database() -> (Database<MockDriver>, MockDriver) {
    let driver = MockDriver::new();
    let db = Database::with_driver(
        driver.clone(),
        ConnectionConfig::new("localhost", "app", "secret", "shop"),
    );
    (db, driver)
}

/// Isolated in-memory SQLite database
pub struct DatabaseFixture {
    pub database: Database<SqliteDriver>,
}

impl DatabaseFixture {
    /// Create an empty in-memory database
    pub fn new() -> Result<Self> {
        let mut database = Database::new("", "tester", "", ":memory:");
        database.connect()?;
        Ok(DatabaseFixture { database })
    }

    /// Create fixture with the sample `users` table and two rows
    pub fn with_sample_data() -> Result<Self> {
        let mut fixture = Self::new()?;
        fixture.database.query(
            "CREATE TABLE users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                age INTEGER,
                active INTEGER DEFAULT 1
            )",
            false,
        )?;
        fixture
            .database
            .insert("users", [("username", Value::from("alice")), ("age", Value::from(30))])?;
        fixture
            .database
            .insert("users", [("username", Value::from("bob")), ("age", Value::from(25))])?;
        Ok(fixture)
    }
}
