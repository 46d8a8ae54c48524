/// Connection Management Module
///
/// The [`Database`] wrapper stores credentials, opens the connection on
/// first use, runs statements classified by verb and keeps the metadata of
/// the last operation. It also renders and runs the SELECT, INSERT and
/// UPDATE helpers and hands out record collectors.
///
/// A `Database` is a single-owner object: every statement blocks until the
/// driver answers and nothing inside it is synchronized. Share it across
/// threads only behind your own lock.

use crate::config::Config;
use crate::core::db::builder::{render_insert, render_update, usable_fields, Filter, Select, Source};
use crate::core::db::collector::{Collector, CollectorKind};
use crate::core::db::driver::{legacy_escape, Dialect, Driver, Execution, Session, SqliteDriver};
use crate::core::db::query::{QueryOutput, StatementType};
use crate::core::db::value::{FieldMap, ResultSet, Row, Value};
use crate::core::{DbError, ErrorKind, Result};
use serde::Deserialize;
use std::fmt;
use tracing::{debug, error, info, warn};

/// Credentials used to open the connection. Empty strings count as missing.
#[derive(Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub hostname: String,
    pub username: String,
    pub password: String,
    pub database: String,
}

impl ConnectionConfig {
    pub fn new(hostname: &str, username: &str, password: &str, database: &str) -> Self {
        ConnectionConfig {
            hostname: hostname.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            database: database.to_string(),
        }
    }

    /// A connection needs at least a username and a database name.
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.database.is_empty()
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("hostname", &self.hostname)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

/// Metadata of the last statement of each kind.
///
/// `num_rows` is set by SELECT, `affected_rows` by UPDATE and `insert_id`
/// by INSERT. Nothing is kept beyond the most recent value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationMetadata {
    pub affected_rows: Option<u64>,
    pub insert_id: Option<i64>,
    pub num_rows: Option<u64>,
}

/// Lazily-connecting database wrapper.
pub struct Database<D: Driver = SqliteDriver> {
    config: ConnectionConfig,
    driver: D,
    session: Option<D::Session>,
    metadata: OperationMetadata,
    /// Log every failure through `tracing`
    pub debug: bool,
    /// With `debug` off, terminate the process on fatal errors
    pub strict: bool,
}

impl Database<SqliteDriver> {
    /// Stores the credentials for a SQLite database. No connection is opened
    /// until the first statement runs.
    pub fn new(hostname: &str, username: &str, password: &str, database: &str) -> Self {
        Database::with_driver(
            SqliteDriver,
            ConnectionConfig::new(hostname, username, password, database),
        )
    }

    /// Builds a SQLite-backed wrapper from a settings file.
    pub fn from_config(config: &Config) -> Self {
        let mut db = Database::with_driver(SqliteDriver, config.connection.clone());
        db.debug = config.debug.debug;
        db.strict = config.debug.strict;
        db
    }
}

impl<D: Driver> Database<D> {
    pub fn with_driver(driver: D, config: ConnectionConfig) -> Self {
        Database {
            config,
            driver,
            session: None,
            metadata: OperationMetadata::default(),
            debug: true,
            strict: false,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// The open session, if any.
    pub fn session(&self) -> Option<&D::Session> {
        self.session.as_ref()
    }

    pub fn metadata(&self) -> OperationMetadata {
        self.metadata
    }

    pub fn affected_rows(&self) -> Option<u64> {
        self.metadata.affected_rows
    }

    pub fn insert_id(&self) -> Option<i64> {
        self.metadata.insert_id
    }

    pub fn num_rows(&self) -> Option<u64> {
        self.metadata.num_rows
    }

    /// Opens the connection.
    ///
    /// Calling it on an open connection changes nothing and returns
    /// [`DbError::AlreadyConnected`].
    pub fn connect(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Err(self.report(DbError::AlreadyConnected));
        }

        let session = self.open_session()?;
        self.session = Some(session);
        Ok(())
    }

    fn open_session(&self) -> Result<D::Session> {
        if !self.config.is_complete() {
            return Err(self.report(DbError::InvalidParameters));
        }

        match self.driver.connect(&self.config) {
            Ok(session) => {
                info!(
                    "Connected to database {}@{}",
                    self.config.database, self.config.hostname
                );
                Ok(session)
            }
            Err(e) => Err(self.report(DbError::Connection {
                database: self.config.database.clone(),
                hostname: self.config.hostname.clone(),
                reason: e.message,
            })),
        }
    }

    /// Marks the wrapper disconnected and releases the connection handle.
    pub fn close(&mut self) -> Result<()> {
        match self.session.take() {
            Some(session) => {
                session
                    .close()
                    .map_err(|e| self.report(DbError::Close(e.message)))?;
                info!("Closed connection to database {}", self.config.database);
                Ok(())
            }
            None => Err(self.report(DbError::NotConnected)),
        }
    }

    /// Escapes a string for use inside a quoted literal.
    ///
    /// Uses the open session's rules. Without a session it degrades to the
    /// context-free [`legacy_escape`], which ignores the connection's
    /// character set; the helpers below always connect before escaping.
    pub fn escape(&self, input: &str) -> String {
        match &self.session {
            Some(session) => session.escape(input),
            None => {
                debug!("No open connection, escaping without connection context");
                legacy_escape(input)
            }
        }
    }

    /// Runs one statement.
    ///
    /// Connects first if needed; when that attempt fails its error is
    /// returned and nothing is executed. SELECT records `num_rows`, UPDATE
    /// records `affected_rows`, INSERT records `insert_id`. With `smart` set,
    /// UPDATE returns the affected row count and INSERT the generated id
    /// (or [`QueryOutput::Success`] when that number is 0).
    pub fn query(&mut self, sql: &str, smart: bool) -> Result<QueryOutput> {
        let kind = StatementType::from_sql(sql);
        let session = self.live_session()?;
        debug!(?kind, "Executing statement: {}", sql);

        let executed = session.execute(sql);
        let (affected, insert_id) = (session.affected_rows(), session.insert_id());
        let execution = executed.map_err(|e| {
            self.report(DbError::Query {
                sql: sql.to_string(),
                reason: e.message,
            })
        })?;

        match kind {
            StatementType::Select => {
                let num_rows = match &execution {
                    Execution::Rows(set) => set.num_rows() as u64,
                    Execution::Done => 0,
                };
                self.metadata.num_rows = Some(num_rows);
                Ok(raw_output(execution))
            }
            StatementType::Update => {
                self.metadata.affected_rows = Some(affected);
                if !smart {
                    Ok(raw_output(execution))
                } else if affected != 0 {
                    Ok(QueryOutput::Affected(affected))
                } else {
                    Ok(QueryOutput::Success)
                }
            }
            StatementType::Insert => {
                self.metadata.insert_id = Some(insert_id);
                if !smart {
                    Ok(raw_output(execution))
                } else if insert_id != 0 {
                    Ok(QueryOutput::InsertId(insert_id))
                } else {
                    Ok(QueryOutput::Success)
                }
            }
            StatementType::Other => Ok(raw_output(execution)),
        }
    }

    /// Returns the first column of the first row.
    pub fn fetch_one(&mut self, source: impl Into<Source>) -> Result<Option<Value>> {
        let first_row = self.fetch_set(source.into())?.and_then(|mut set| set.next());
        Ok(first_row.and_then(|row| row.into_values().into_iter().next()))
    }

    /// Returns the first row as a field-name keyed record.
    pub fn fetch_row(&mut self, source: impl Into<Source>) -> Result<Option<Row>> {
        Ok(self.fetch_set(source.into())?.and_then(|mut set| set.next()))
    }

    /// Returns every row. A query matching nothing yields an empty vector.
    pub fn fetch(&mut self, source: impl Into<Source>) -> Result<Vec<Row>> {
        Ok(self
            .fetch_set(source.into())?
            .map(|set| set.collect())
            .unwrap_or_default())
    }

    fn fetch_set(&mut self, source: Source) -> Result<Option<ResultSet>> {
        let sql = match source {
            Source::Sql(sql) => sql,
            Source::Select(select) => {
                self.ensure_connected()?;
                self.build_query(&select)
            }
        };

        Ok(self.query(&sql, false)?.into_rows())
    }

    /// Updates `table`, setting every field with a non-empty name.
    ///
    /// [`Filter::All`] updates every row of the table.
    pub fn update<I, K, V>(
        &mut self,
        table: &str,
        values: I,
        filter: impl Into<Filter>,
    ) -> Result<QueryOutput>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        if table.is_empty() {
            return Err(self.report(DbError::InvalidData("update")));
        }

        let fields = match usable_fields(values.into_iter().collect()) {
            Some(fields) => fields,
            None => return Err(self.report(DbError::Malformed("update"))),
        };
        let filter = filter.into();

        self.ensure_connected()?;
        let sql = render_update(table, &fields, &filter, &|s: &str| self.escape(s));

        self.query(&sql, true)
    }

    /// Inserts one row into `table` from every field with a non-empty name.
    pub fn insert<I, K, V>(&mut self, table: &str, values: I) -> Result<QueryOutput>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        if table.is_empty() {
            return Err(self.report(DbError::InvalidData("insertion")));
        }

        let fields: FieldMap = match usable_fields(values.into_iter().collect()) {
            Some(fields) => fields,
            None => return Err(self.report(DbError::Malformed("insertion"))),
        };

        self.ensure_connected()?;
        let dialect = self
            .session
            .as_ref()
            .map_or(Dialect::MySql, |s| s.dialect());
        let sql = render_insert(dialect, table, &fields, &|s: &str| self.escape(s));

        self.query(&sql, true)
    }

    /// Starts a collector that inserts a row into `table` on save.
    pub fn add(&mut self, table: &str) -> Collector<'_, D> {
        Collector::new(self, table, CollectorKind::Insert)
    }

    /// Starts a collector that updates `table` on save.
    pub fn modify(&mut self, table: &str) -> Collector<'_, D> {
        Collector::new(self, table, CollectorKind::Update)
    }

    fn build_query(&self, select: &Select) -> String {
        select.render(&|s: &str| self.escape(s))
    }

    fn ensure_connected(&mut self) -> Result<()> {
        self.live_session().map(|_| ())
    }

    /// The open session, connecting first when there is none.
    fn live_session(&mut self) -> Result<&mut D::Session> {
        let session = match self.session.take() {
            Some(session) => session,
            None => self.open_session()?,
        };
        Ok(self.session.insert(session))
    }

    /// Debug sink every wrapper error passes through.
    ///
    /// With `debug` on the error is logged with its kind label. With `debug`
    /// off and `strict` on, a fatal error terminates the process. Otherwise
    /// the error is handed back untouched.
    pub(crate) fn report(&self, err: DbError) -> DbError {
        let kind = err.kind();

        if self.debug {
            match kind {
                ErrorKind::Fatal => error!(kind = kind.label(), "Database interface: {}", err),
                ErrorKind::Notice => warn!(kind = kind.label(), "Database interface: {}", err),
                ErrorKind::Other => info!(kind = kind.label(), "Database interface: {}", err),
            }
        } else if self.strict && kind == ErrorKind::Fatal {
            error!("Database interface: fatal error, terminating");
            std::process::exit(1);
        }

        err
    }
}

fn raw_output(execution: Execution) -> QueryOutput {
    match execution {
        Execution::Rows(set) => QueryOutput::Rows(set),
        Execution::Done => QueryOutput::Success,
    }
}
