/// Statement Builder Module
///
/// String-level helpers that render the SELECT, INSERT and UPDATE statements
/// issued by the connection wrapper. Identifiers are wrapped in backticks,
/// integers are written as bare literals and every other value is escaped
/// and single-quoted.
///
/// ## WHERE maps
///
/// A condition key may carry its joiner as a prefix: `"OR status"` joins
/// with `OR`, `"AND status"` or a bare `"status"` joins with `AND`. The first
/// condition's joiner is dropped when rendering. A falsy key (`""` or `"0"`)
/// addresses the `id` column.

use crate::core::db::driver::Dialect;
use crate::core::db::value::{FieldMap, Value};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Write;

static JOINER_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^(OR|AND) (.*)$").expect("joiner prefix pattern is valid")
});

/// Logical operator placed in front of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Joiner {
    And,
    Or,
}

impl Joiner {
    pub fn as_sql(self) -> &'static str {
        match self {
            Joiner::And => "AND",
            Joiner::Or => "OR",
        }
    }

    /// Splits a `"OR col"` / `"AND col"` key into its joiner and column.
    pub fn parse_key(key: &str) -> (Joiner, &str) {
        match JOINER_PREFIX.captures(key) {
            Some(caps) => {
                let joiner = if caps[1].eq_ignore_ascii_case("or") {
                    Joiner::Or
                } else {
                    Joiner::And
                };
                let column = caps.get(2).map(|m| m.as_str()).unwrap_or("");
                (joiner, column)
            }
            None => (Joiner::And, key),
        }
    }
}

/// Keys that address nothing: empty strings and `"0"`.
pub fn is_falsy_key(key: &str) -> bool {
    key.is_empty() || key == "0"
}

/// A single `` `column`=value `` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub joiner: Joiner,
    pub column: String,
    pub value: Value,
}

/// Ordered list of equality conditions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereClause {
    conditions: Vec<Condition>,
}

impl WhereClause {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add(Joiner::And, column.into(), value.into());
        self
    }

    pub fn or(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add(Joiner::Or, column.into(), value.into());
        self
    }

    /// Adds a condition whose joiner is taken from the key prefix.
    pub fn push(&mut self, key: &str, value: impl Into<Value>) {
        let (joiner, column) = Joiner::parse_key(key);
        self.add(joiner, column.to_string(), value.into());
    }

    fn add(&mut self, joiner: Joiner, column: String, value: Value) {
        let column = if is_falsy_key(&column) {
            "id".to_string()
        } else {
            column
        };
        self.conditions.push(Condition {
            joiner,
            column,
            value,
        });
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Renders the conditions without the `WHERE` keyword.
    pub fn render<F: Fn(&str) -> String>(&self, escape: &F) -> String {
        let mut sql = String::new();
        for (i, condition) in self.conditions.iter().enumerate() {
            if i > 0 {
                sql.push(' ');
                sql.push_str(condition.joiner.as_sql());
                sql.push(' ');
            }
            sql.push_str(&assignment(&condition.column, &condition.value, escape));
        }
        sql
    }
}

impl<K: AsRef<str>, V: Into<Value>> FromIterator<(K, V)> for WhereClause {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut clause = WhereClause::new();
        for (k, v) in iter {
            clause.push(k.as_ref(), v);
        }
        clause
    }
}

/// Row filter accepted by the update and fetch helpers.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Filter {
    /// No WHERE clause: the statement applies to the whole table
    #[default]
    All,
    /// `` WHERE `id`=n ``
    Id(i64),
    /// Conditions joined with AND/OR
    Clause(WhereClause),
}

impl Filter {
    /// Renders the filter including a leading ` WHERE `, or nothing for [`Filter::All`].
    pub fn render<F: Fn(&str) -> String>(&self, escape: &F) -> String {
        match self {
            Filter::All => String::new(),
            Filter::Id(id) => format!(" WHERE `id`={}", id),
            Filter::Clause(clause) if clause.is_empty() => String::new(),
            Filter::Clause(clause) => format!(" WHERE {}", clause.render(escape)),
        }
    }
}

impl From<i64> for Filter {
    fn from(id: i64) -> Self {
        Filter::Id(id)
    }
}

impl From<i32> for Filter {
    fn from(id: i32) -> Self {
        Filter::Id(id as i64)
    }
}

/// Parses an id the way an integer cast reads a string: optional sign and
/// leading digits, anything after is ignored. The empty string means no filter.
impl From<&str> for Filter {
    fn from(id: &str) -> Self {
        if id.is_empty() {
            Filter::All
        } else {
            Filter::Id(parse_leading_int(id))
        }
    }
}

impl From<WhereClause> for Filter {
    fn from(clause: WhereClause) -> Self {
        Filter::Clause(clause)
    }
}

impl<T: Into<Filter>> From<Option<T>> for Filter {
    fn from(filter: Option<T>) -> Self {
        filter.map(Into::into).unwrap_or(Filter::All)
    }
}

fn parse_leading_int(input: &str) -> i64 {
    let trimmed = input.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let magnitude = digits[..end].parse::<i64>().unwrap_or(0);
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

/// Description of a `SELECT fields FROM table [WHERE ...] [LIMIT n]` query.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    fields: String,
    table: String,
    filter: Filter,
    limit: Option<u64>,
}

impl Select {
    /// `fields` is copied verbatim into the statement; `"all"` selects `*`.
    pub fn new(fields: impl Into<String>, table: impl Into<String>) -> Self {
        Select {
            fields: fields.into(),
            table: table.into(),
            filter: Filter::All,
            limit: None,
        }
    }

    pub fn filter(mut self, filter: impl Into<Filter>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn render<F: Fn(&str) -> String>(&self, escape: &F) -> String {
        let fields = if self.fields == "all" {
            "*"
        } else {
            self.fields.as_str()
        };

        let mut sql = format!("SELECT {} FROM `{}`", fields, escape(&self.table));
        sql.push_str(&self.filter.render(escape));

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        sql
    }
}

/// First argument of the fetch helpers: raw SQL or a [`Select`] to render.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Sql(String),
    Select(Select),
}

impl From<&str> for Source {
    fn from(sql: &str) -> Self {
        Source::Sql(sql.to_string())
    }
}

impl From<String> for Source {
    fn from(sql: String) -> Self {
        Source::Sql(sql)
    }
}

impl From<Select> for Source {
    fn from(select: Select) -> Self {
        Source::Select(select)
    }
}

/// Renders a value as a SQL literal: integers bare, bytes as a hex literal,
/// everything else quoted.
///
/// `X'..'` is understood by both MySQL and SQLite and carries bytes that are
/// not valid UTF-8 unchanged.
pub fn literal<F: Fn(&str) -> String>(value: &Value, escape: &F) -> String {
    match value {
        Value::Int(i) => i.to_string(),
        Value::Bytes(bytes) => {
            let mut out = String::with_capacity(bytes.len() * 2 + 3);
            out.push_str("X'");
            for byte in bytes {
                let _ = write!(out, "{:02X}", byte);
            }
            out.push('\'');
            out
        }
        other => format!("'{}'", escape(&other.to_text())),
    }
}

fn assignment<F: Fn(&str) -> String>(column: &str, value: &Value, escape: &F) -> String {
    format!("`{}`={}", escape(column), literal(value, escape))
}

/// Drops fields with falsy names. Returns `None` when nothing survives.
pub fn usable_fields(fields: FieldMap) -> Option<FieldMap> {
    let kept: FieldMap = fields
        .into_iter()
        .filter(|(name, _)| !is_falsy_key(name))
        .collect();
    if kept.is_empty() {
        None
    } else {
        Some(kept)
    }
}

/// Renders an UPDATE. `fields` must already be filtered by [`usable_fields`].
///
/// Table and column names are written inside backticks after going through
/// the value escape only, so they must come from trusted code.
pub fn render_update<F: Fn(&str) -> String>(
    table: &str,
    fields: &FieldMap,
    filter: &Filter,
    escape: &F,
) -> String {
    let assignments: Vec<String> = fields
        .iter()
        .map(|(name, value)| assignment(name, value, escape))
        .collect();

    format!(
        "UPDATE `{}` SET {}{}",
        escape(table),
        assignments.join(", "),
        filter.render(escape)
    )
}

/// Renders an INSERT in the session's dialect. `fields` must already be
/// filtered by [`usable_fields`].
///
/// As with [`render_update`], identifiers are not quoted as identifiers:
/// only trusted table and column names belong here.
pub fn render_insert<F: Fn(&str) -> String>(
    dialect: Dialect,
    table: &str,
    fields: &FieldMap,
    escape: &F,
) -> String {
    match dialect {
        Dialect::MySql => {
            let assignments: Vec<String> = fields
                .iter()
                .map(|(name, value)| assignment(name, value, escape))
                .collect();
            format!("INSERT INTO `{}` SET {}", escape(table), assignments.join(", "))
        }
        Dialect::Sqlite => {
            let (columns, values): (Vec<String>, Vec<String>) = fields
                .iter()
                .map(|(name, value)| (format!("`{}`", escape(name)), literal(value, escape)))
                .unzip();
            format!(
                "INSERT INTO `{}` ({}) VALUES ({})",
                escape(table),
                columns.join(", "),
                values.join(", ")
            )
        }
    }
}
