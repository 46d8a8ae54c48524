/// Query Classification Module
///
/// Verb detection for statements passed to `Database::query` and the value
/// such a call hands back.

use crate::core::db::value::ResultSet;

/// Statement kinds the wrapper treats differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementType {
    /// SELECT statement
    Select,
    /// INSERT statement
    Insert,
    /// UPDATE statement
    Update,
    /// Anything else, run as a passthrough
    Other,
}

impl StatementType {
    /// Classifies a statement by its first seven characters, trimmed and
    /// lowercased. Leading whitespace therefore eats into the window:
    /// `" select"` is a SELECT but `"  select"` is not.
    pub fn from_sql(sql: &str) -> Self {
        let head: String = sql.chars().take(7).collect();

        match head.to_lowercase().trim() {
            "select" => StatementType::Select,
            "update" => StatementType::Update,
            "insert" => StatementType::Insert,
            _ => StatementType::Other,
        }
    }
}

/// Value returned by a successful `Database::query` call.
///
/// With `smart` enabled, UPDATE and INSERT collapse to a count or id when
/// one is available, and to [`QueryOutput::Success`] otherwise. Callers
/// that need to tell "0 rows changed" apart read the connection metadata.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    /// Result set of a row-returning statement
    Rows(ResultSet),
    /// Non-zero affected row count of a smart UPDATE
    Affected(u64),
    /// Non-zero generated id of a smart INSERT
    InsertId(i64),
    /// The statement succeeded and produced nothing else to report
    Success,
}

impl QueryOutput {
    /// Returns the result set, if the statement produced one.
    pub fn into_rows(self) -> Option<ResultSet> {
        match self {
            QueryOutput::Rows(set) => Some(set),
            _ => None,
        }
    }

    pub fn affected(&self) -> Option<u64> {
        match self {
            QueryOutput::Affected(n) => Some(*n),
            _ => None,
        }
    }

    pub fn insert_id(&self) -> Option<i64> {
        match self {
            QueryOutput::InsertId(id) => Some(*id),
            _ => None,
        }
    }
}
