/// Database Module
///
/// This module provides the connection wrapper and its helpers, organized
/// into focused submodules.
///
/// ## Architecture
///
/// - **Connection Management** (`connection.rs`): the `Database` wrapper, lazy connection, debug sink
/// - **Query Classification** (`query.rs`): verb detection and the values a query returns
/// - **Statement Building** (`builder.rs`): WHERE clauses, SELECT/INSERT/UPDATE rendering
/// - **Record Collection** (`collector.rs`): single-use insert/update builders
/// - **Drivers** (`driver.rs`): the client library seam and the bundled SQLite backend
/// - **Values** (`value.rs`): column values, rows, result sets and field maps
///
/// ## Error Handling
///
/// All operations return `DbError` through the crate `Result` alias. Each
/// error is also passed through the wrapper's debug sink, see `Database::report`.
pub mod builder;
pub mod collector;
pub mod connection;
pub mod driver;
pub mod query;
pub mod value;

pub use builder::{Filter, Joiner, Select, Source, WhereClause};
pub use collector::{Collector, CollectorKind};
pub use connection::{ConnectionConfig, Database, OperationMetadata};
pub use driver::{legacy_escape, Dialect, Driver, DriverError, Execution, Session, SqliteDriver, SqliteSession};
pub use query::{QueryOutput, StatementType};
pub use value::{FieldMap, ResultSet, Row, Value};
