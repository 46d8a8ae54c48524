/// Record Collector Module
///
/// A [`Collector`] gathers field values for one table and flushes them as a
/// single INSERT or UPDATE when saved. It is obtained from
/// `Database::add` or `Database::modify` and can be saved only once.

use crate::core::db::builder::Filter;
use crate::core::db::connection::Database;
use crate::core::db::driver::Driver;
use crate::core::db::query::QueryOutput;
use crate::core::db::value::{FieldMap, Value};
use crate::core::{DbError, Result};

/// Statement a collector issues on save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorKind {
    Insert,
    Update,
}

/// Single-use builder of one INSERT or UPDATE.
pub struct Collector<'db, D: Driver> {
    db: &'db mut Database<D>,
    table: String,
    kind: CollectorKind,
    valid: bool,
    fields: FieldMap,
}

impl<'db, D: Driver> Collector<'db, D> {
    pub(crate) fn new(db: &'db mut Database<D>, table: &str, kind: CollectorKind) -> Self {
        Collector {
            db,
            table: table.to_string(),
            kind,
            valid: true,
            fields: FieldMap::new(),
        }
    }

    /// Assigns a field. Assigning the same name again replaces the value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.set(name, value);
        self
    }

    /// Fields waiting to be saved.
    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn kind(&self) -> CollectorKind {
        self.kind
    }

    /// `false` once the collector has been saved.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Flushes the collected fields. `filter` selects the rows of an update
    /// and is ignored for inserts.
    ///
    /// The fields are moved out before the statement runs, so the collector
    /// is spent even when the statement fails. Later calls return
    /// [`DbError::AlreadySaved`] without touching the database.
    pub fn save(&mut self, filter: impl Into<Filter>) -> Result<QueryOutput> {
        if !self.valid {
            return Err(DbError::AlreadySaved);
        }

        let fields = std::mem::take(&mut self.fields);
        self.valid = false;

        match self.kind {
            CollectorKind::Insert => self.db.insert(&self.table, fields),
            CollectorKind::Update => self.db.update(&self.table, fields, filter),
        }
    }
}
