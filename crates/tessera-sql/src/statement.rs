//! Statement classification and structural parsing.
//!
//! Every function here is total: a pattern that does not match yields an
//! empty table and a lower `ParseConfidence`, never an error.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use tessera_contracts::{
    comment::StatementKind,
    value::{FieldMap, FieldValue},
};

use crate::{
    literal::{find_unquoted_keyword, parse_column_list, parse_set_clause, parse_values_list, placeholder_offsets},
    ParseConfidence,
};

lazy_static! {
    static ref UPDATE_SET: Regex = Regex::new(r"(?is)UPDATE\s+`?(\w+)`?\s+SET\s+(.+)").unwrap();
    static ref UPDATE_TABLE: Regex = Regex::new(r"(?i)UPDATE\s+`?(\w+)`?").unwrap();
    static ref FROM_TABLE: Regex = Regex::new(r"(?i)FROM\s+`?(\w+)`?").unwrap();
    static ref DELETE_TABLE: Regex = Regex::new(r"(?i)DELETE\s+FROM\s+`?(\w+)`?").unwrap();
    static ref INSERT_SET: Regex =
        Regex::new(r"(?is)(?:INSERT|REPLACE)\s+INTO\s+`?(\w+)`?\s+SET\s+(.*)$").unwrap();
    static ref INSERT_VALUES: Regex =
        Regex::new(r"(?is)(?:INSERT|REPLACE)\s+INTO\s+`?(\w+)`?\s*\((.*?)\)\s*VALUES\s*\((.*)\)").unwrap();
    static ref INSERT_TABLE: Regex = Regex::new(r"(?i)(?:INSERT|REPLACE)\s+INTO\s+`?(\w+)`?").unwrap();
}

/// Statement kind from the leading keyword of the trimmed statement.
///
/// Unrecognised statements count as `Select`.
pub fn statement_kind(sql: &str) -> StatementKind {
    let trimmed = sql.trim_start();
    StatementKind::ALL
        .into_iter()
        .find(|kind| starts_with_ignore_case(trimmed, kind.as_str()))
        .unwrap_or(StatementKind::Select)
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len()
        && s.is_char_boundary(prefix.len())
        && s[..prefix.len()].eq_ignore_ascii_case(prefix)
}

/// Kind and target table of a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: StatementKind,
    /// Empty when no table could be extracted.
    pub table: String,
    pub confidence: ParseConfidence,
}

/// Determine the statement kind and its target table.
pub fn classify(sql: &str) -> Classification {
    let kind = statement_kind(sql);
    let (table, confidence) = match kind {
        StatementKind::Select => table_only(&FROM_TABLE, sql),
        StatementKind::Delete => table_only(&DELETE_TABLE, sql),
        StatementKind::Update => match parse_update(sql) {
            Some(parts) if parts.changed_columns().is_empty() => (parts.table, ParseConfidence::Partial),
            Some(parts) => (parts.table, ParseConfidence::Full),
            None => table_only(&UPDATE_TABLE, sql),
        },
        StatementKind::Insert | StatementKind::Replace => {
            let image = parse_insert(sql);
            (image.table, image.confidence)
        }
    };
    if table.is_empty() {
        debug!(kind = %kind, "no table found in statement");
    }
    Classification { kind, table, confidence }
}

fn table_only(pattern: &Regex, sql: &str) -> (String, ParseConfidence) {
    match pattern.captures(sql) {
        Some(caps) => (caps[1].to_string(), ParseConfidence::TableOnly),
        None => (String::new(), ParseConfidence::Unparsed),
    }
}

// ── UPDATE ───────────────────────────────────────────────────────────────────

/// The pieces of `UPDATE <table> SET <set> WHERE <where>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateParts {
    pub table: String,
    pub set_clause: String,
    pub where_clause: String,
}

impl UpdateParts {
    /// Columns assigned by the SET clause, in statement order.
    pub fn changed_columns(&self) -> Vec<String> {
        parse_set_clause(&self.set_clause).into_keys().collect()
    }

    /// Number of `?` placeholders in the WHERE clause, ignoring any inside
    /// quoted literals. These are always the trailing binds of the statement.
    pub fn where_placeholder_count(&self) -> usize {
        placeholder_offsets(&self.where_clause).len()
    }
}

/// Split an UPDATE at its first unquoted `WHERE`. Returns `None` for anything
/// without a SET and a WHERE clause.
pub fn parse_update(sql: &str) -> Option<UpdateParts> {
    let caps = UPDATE_SET.captures(sql)?;
    let rest = caps.get(2)?.as_str();
    let at = find_unquoted_keyword(rest, "WHERE")?;
    let set_clause = rest[..at].trim();
    let where_clause = rest[at + "WHERE".len()..].trim();
    if set_clause.is_empty() || where_clause.is_empty() {
        return None;
    }
    Some(UpdateParts {
        table: caps[1].to_string(),
        set_clause: set_clause.to_string(),
        where_clause: where_clause.to_string(),
    })
}

// ── INSERT / REPLACE ─────────────────────────────────────────────────────────

/// Parsed INSERT or REPLACE.
///
/// `before` holds empty-string placeholders for every key of `after`. For a
/// REPLACE with an `id` column the recorder may swap in the existing row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertImage {
    pub table: String,
    pub is_replace: bool,
    pub before: FieldMap,
    pub after: FieldMap,
    pub confidence: ParseConfidence,
}

impl InsertImage {
    fn empty(table: String, is_replace: bool, confidence: ParseConfidence) -> Self {
        Self {
            table,
            is_replace,
            before: FieldMap::new(),
            after: FieldMap::new(),
            confidence,
        }
    }

    fn with_after(table: String, is_replace: bool, after: FieldMap) -> Self {
        let before = after
            .keys()
            .map(|k| (k.clone(), FieldValue::text("")))
            .collect();
        Self {
            table,
            is_replace,
            before,
            after,
            confidence: ParseConfidence::Full,
        }
    }

    /// The new row's `id` value, when the statement assigns one.
    pub fn primary_key(&self) -> Option<&FieldValue> {
        self.after.get("id").filter(|v| !matches!(v, FieldValue::Null))
    }
}

/// Parse `INSERT|REPLACE INTO t SET ...` or `INSERT|REPLACE INTO t (...) VALUES (...)`.
///
/// On a VALUES list whose length differs from the column list the result
/// keeps only the table, with empty images.
pub fn parse_insert(sql: &str) -> InsertImage {
    let is_replace = starts_with_ignore_case(sql.trim_start(), "REPLACE INTO");

    if let Some(caps) = INSERT_SET.captures(sql) {
        let body = caps[2].trim_end();
        let after = parse_set_clause(body.strip_suffix(';').unwrap_or(body));
        if !after.is_empty() {
            return InsertImage::with_after(caps[1].to_string(), is_replace, after);
        }
    }

    if let Some(caps) = INSERT_VALUES.captures(sql) {
        let table = caps[1].to_string();
        let columns = parse_column_list(&caps[2]);
        let values = parse_values_list(&caps[3]);
        if columns.len() == values.len() {
            let after: FieldMap = columns.into_iter().zip(values).collect();
            return InsertImage::with_after(table, is_replace, after);
        }
        debug!(
            table = %table,
            columns = columns.len(),
            values = values.len(),
            "insert column and value counts differ"
        );
        return InsertImage::empty(table, is_replace, ParseConfidence::TableOnly);
    }

    match INSERT_TABLE.captures(sql) {
        Some(caps) => InsertImage::empty(caps[1].to_string(), is_replace, ParseConfidence::TableOnly),
        None => InsertImage::empty(String::new(), is_replace, ParseConfidence::Unparsed),
    }
}
