// Core infrastructure modules
pub mod core;

// Settings file
pub mod config;

#[cfg(test)]
pub(crate) mod test_utils;

pub use crate::core::db::{
    Collector, CollectorKind, ConnectionConfig, Database, Filter, QueryOutput, Row, Select, Value,
    WhereClause,
};
pub use crate::core::{DbError, ErrorKind, Result};
