//! Core data models shared by the analyzer, the access layer and the masker.
//!
//! All models are serializable so a report core can persist or render them
//! after masking. None of them carry credentials.

use serde::{Deserialize, Serialize};

/// How a column is used by a statement.
///
/// The declaration order is the composite-index priority order: equality
/// columns lead an index, range columns follow, then join and sort columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FieldUsage {
    /// `col = value`, `col <=> value`, `col IS NULL`
    Equality,
    /// `col > value`, `col BETWEEN a AND b`, `col IN (...)`, `col LIKE value`
    Range,
    /// Column compared with another table's column in `JOIN ... ON`
    Join,
    /// `ORDER BY col`
    OrderBy,
}

impl std::fmt::Display for FieldUsage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldUsage::Equality => write!(f, "equality"),
            FieldUsage::Range => write!(f, "range"),
            FieldUsage::Join => write!(f, "join"),
            FieldUsage::OrderBy => write!(f, "order-by"),
        }
    }
}

/// Sort direction for ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// A column referenced by a statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRef {
    /// Column name as written, without quotes
    pub column: String,
    /// Table the column belongs to, with aliases resolved to the table name.
    /// Unqualified columns only get one in single-table statements.
    pub table: Option<String>,
    pub usage: FieldUsage,
    /// Position of the column token in the statement, used for stable ordering
    pub position: usize,
    /// Only set for [`FieldUsage::OrderBy`]
    pub direction: Option<SortDirection>,
}

impl FieldRef {
    pub fn new(column: impl Into<String>, usage: FieldUsage, position: usize) -> Self {
        Self {
            column: column.into(),
            table: None,
            usage,
            position,
            direction: None,
        }
    }

    pub fn with_table(mut self, table: Option<String>) -> Self {
        self.table = table;
        self
    }

    pub fn with_direction(mut self, direction: SortDirection) -> Self {
        self.direction = Some(direction);
        self
    }

    /// Lowercased column name used for de-duplication and index matching.
    pub fn column_key(&self) -> String {
        self.column.to_lowercase()
    }
}

/// Structure extracted from one SQL statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementShape {
    pub sql: String,
    /// Primary table of the outermost FROM clause (or UPDATE/INSERT target)
    pub table: Option<String>,
    /// Database qualifier of the primary table, when written as `db.table`
    pub database: Option<String>,
    /// Where, join and order-by fields in appearance order
    pub fields: Vec<FieldRef>,
    /// Literal values found anywhere in the statement
    pub literals: Vec<String>,
}

impl StatementShape {
    /// Fields ranked for composite-index design.
    pub fn ranked_fields(&self) -> Vec<FieldRef> {
        crate::analyzer::sort_fields_by_priority(&self.fields, &self.sql.to_lowercase())
    }
}

/// Role of a database host in a replication pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HostRole {
    Master,
    Standby,
}

impl std::fmt::Display for HostRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostRole::Master => write!(f, "master"),
            HostRole::Standby => write!(f, "standby"),
        }
    }
}

/// Database index information.
///
/// Column order is the order of `SEQ_IN_INDEX` and is significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaIndex {
    pub name: String,
    pub table_name: String,
    pub schema: Option<String>,
    pub columns: Vec<IndexColumn>,
    pub is_unique: bool,
    pub is_primary: bool,
    pub index_type: Option<String>,
}

impl SchemaIndex {
    /// Column names in index order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Whether `columns` is a leftmost prefix of this index (case-insensitive).
    ///
    /// An empty slice is never covered.
    pub fn covers_prefix(&self, columns: &[&str]) -> bool {
        !columns.is_empty()
            && columns.len() <= self.columns.len()
            && columns
                .iter()
                .zip(&self.columns)
                .all(|(wanted, have)| wanted.eq_ignore_ascii_case(&have.name))
    }
}

/// Index column with ordering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexColumn {
    pub name: String,
    pub sort_order: Option<SortDirection>,
}

/// One row of MySQL `EXPLAIN` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainRow {
    pub id: Option<u64>,
    pub select_type: Option<String>,
    pub table: Option<String>,
    /// Join type (`type` column), e.g. `const`, `ref`, `range`, `ALL`
    pub access_type: Option<String>,
    pub possible_keys: Vec<String>,
    pub key: Option<String>,
    /// Estimated rows examined
    pub rows: Option<u64>,
    pub extra: Option<String>,
}

impl ExplainRow {
    fn extra_contains(&self, needle: &str) -> bool {
        self.extra.as_deref().is_some_and(|extra| extra.contains(needle))
    }
}

/// Execution plan of one statement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainPlan {
    pub rows: Vec<ExplainRow>,
}

impl ExplainPlan {
    /// Sum of the row estimates over every plan row.
    pub fn rows_examined(&self) -> u64 {
        self.rows.iter().filter_map(|r| r.rows).sum()
    }

    pub fn using_filesort(&self) -> bool {
        self.rows.iter().any(|r| r.extra_contains("Using filesort"))
    }

    pub fn using_temporary(&self) -> bool {
        self.rows.iter().any(|r| r.extra_contains("Using temporary"))
    }

    /// Whether any table is read with a full scan (`type` = `ALL`).
    pub fn has_full_scan(&self) -> bool {
        self.rows
            .iter()
            .any(|r| r.access_type.as_deref().is_some_and(|t| t.eq_ignore_ascii_case("ALL")))
    }

    /// Candidate keys of every row, in plan order.
    pub fn possible_keys(&self) -> Vec<&str> {
        self.rows
            .iter()
            .flat_map(|r| r.possible_keys.iter().map(String::as_str))
            .collect()
    }

    /// Key chosen for the last row that uses one.
    pub fn used_key(&self) -> Option<&str> {
        self.rows.iter().rev().find_map(|r| r.key.as_deref())
    }

    /// Join type of the last row that reports one.
    pub fn access_type(&self) -> Option<&str> {
        self.rows.iter().rev().find_map(|r| r.access_type.as_deref())
    }
}

/// One entry of the slow-query log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlowQueryRecord {
    pub checksum: Option<String>,
    pub sql: String,
    pub execute_count: u64,
    /// Worst observed execution time in seconds
    pub query_time_max: f64,
    /// Host the statement ran on
    pub host: Option<String>,
    pub database: Option<String>,
    pub table: Option<String>,
    /// `SHOW CREATE TABLE` output, when collected
    pub table_structure: Option<String>,
    /// Set once the record has passed through the masking pipeline
    #[serde(default)]
    pub masked: bool,
}

impl SlowQueryRecord {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            checksum: None,
            sql: sql.into(),
            execute_count: 0,
            query_time_max: 0.0,
            host: None,
            database: None,
            table: None,
            table_structure: None,
            masked: false,
        }
    }
}
