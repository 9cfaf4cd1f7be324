//! Masking pipeline.
//!
//! A [`MaskingSession`] is created per report run and replaces database,
//! table, column and host names with short sequential tokens (`db1`, `t1`,
//! `c1`, `h1`) and literal values with `***`. The mapping lives only in the
//! session, so the same name masks to the same token within a run and to
//! unrelated tokens across runs.
//!
//! # Module Structure
//! - `sql`: statement and DDL masking on top of the analyzer lexemes
//!
//! # Collisions
//!
//! Token allocation skips every token that equals a name already seen in the
//! run. A name seen *after* its spelling was issued as a token for something
//! else cannot be told apart in the output; it is rejected with
//! [`SlowscopeError::MaskingCollision`] and the record being masked is
//! redacted instead.
//!
//! # Empty names
//!
//! An empty name masks to an empty string and allocates no token, so a
//! record with an empty database or host keeps it empty.

mod sql;


pub use sql::REDACTED_STATEMENT;

use crate::error::{ErrorKind, SlowscopeError};
use crate::models::SlowQueryRecord;
use crate::Result;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Replacement for string literals.
pub const MASKED_STRING: &str = "'***'";
/// Replacement for numeric literals.
pub const MASKED_NUMBER: &str = "***";

/// Namespace of a masked name; each has its own token prefix and counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum NameKind {
    Database,
    Table,
    Column,
    Index,
    Host,
}

impl NameKind {
    fn prefix(self) -> &'static str {
        match self {
            Self::Database => "db",
            Self::Table => "t",
            Self::Column => "c",
            Self::Index => "idx",
            Self::Host => "h",
        }
    }
}

/// A record the batch could not mask.
#[derive(Debug)]
pub struct MaskingFailure {
    /// Position of the record in the batch
    pub index: usize,
    pub error: SlowscopeError,
}

/// Run-scoped masking state.
///
/// # Example
///
/// ```rust
/// use slowscope_core::masking::MaskingSession;
///
/// let mut session = MaskingSession::new();
/// let masked = session.mask_sql("SELECT * FROM users WHERE id=1")?;
/// assert_eq!(masked, "SELECT * FROM t1 WHERE c1=***");
/// assert_eq!(session.mask_table_name("users")?, "t1");
/// # Ok::<(), slowscope_core::SlowscopeError>(())
/// ```
#[derive(Debug)]
pub struct MaskingSession {
    run_id: Uuid,
    mask_columns: bool,
    forward: HashMap<(NameKind, String), String>,
    /// Issued token to the name it stands for
    reverse: HashMap<String, (NameKind, String)>,
    /// Every name seen so far, lowercased
    seen: HashSet<String>,
    counters: HashMap<NameKind, u32>,
}

impl Default for MaskingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MaskingSession {
    pub fn new() -> Self {
        let run_id = Uuid::new_v4();
        tracing::debug!("Masking run {}", run_id);
        Self {
            run_id,
            mask_columns: true,
            forward: HashMap::new(),
            reverse: HashMap::new(),
            seen: HashSet::new(),
            counters: HashMap::new(),
        }
    }

    /// Builder method to keep column names readable. Literals, tables and
    /// databases are still masked.
    pub fn with_column_masking(mut self, enabled: bool) -> Self {
        self.mask_columns = enabled;
        self
    }

    /// Identifier of this run, for correlating logs with a report.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Number of distinct names masked so far.
    pub fn mapping_len(&self) -> usize {
        self.forward.len()
    }

    /// Whether `token` was issued by this session.
    pub fn is_issued_token(&self, token: &str) -> bool {
        self.reverse.contains_key(&token.to_lowercase())
    }

    pub fn mask_db_name(&mut self, name: &str) -> Result<String> {
        self.mask_name(NameKind::Database, name)
    }

    pub fn mask_table_name(&mut self, name: &str) -> Result<String> {
        self.mask_name(NameKind::Table, name)
    }

    pub fn mask_column_name(&mut self, name: &str) -> Result<String> {
        self.mask_name(NameKind::Column, name)
    }

    /// Masks a host name or IP address.
    pub fn mask_host(&mut self, host: &str) -> Result<String> {
        self.mask_name(NameKind::Host, host)
    }

    /// Masks every record that is not masked yet, in place.
    ///
    /// Already-masked records are left untouched, so running a batch twice
    /// gives the same result as running it once. A record that cannot be
    /// masked is redacted and reported; the rest of the batch continues.
    pub fn mask_sensitive_data(&mut self, records: &mut [SlowQueryRecord]) -> Vec<MaskingFailure> {
        let mut failures = Vec::new();
        let mut masked = 0usize;

        for (index, record) in records.iter_mut().enumerate() {
            if record.masked {
                continue;
            }
            match self.mask_record(record) {
                Ok(clean) => {
                    *record = clean;
                    masked += 1;
                }
                Err(error) => {
                    tracing::warn!("Record {} redacted: {}", index, error);
                    redact(record);
                    failures.push(MaskingFailure { index, error });
                }
            }
        }

        tracing::debug!(
            "Masked {} records ({} redacted) in run {}",
            masked,
            failures.len(),
            self.run_id
        );
        failures
    }

    /// Masks one record into a copy; the original stays untouched on error.
    fn mask_record(&mut self, record: &SlowQueryRecord) -> Result<SlowQueryRecord> {
        let mut clean = record.clone();
        clean.sql = self.mask_sql(&record.sql)?;
        clean.database = record
            .database
            .as_deref()
            .map(|name| self.mask_db_name(name))
            .transpose()?;
        clean.table = record
            .table
            .as_deref()
            .map(|name| self.mask_table_name(name))
            .transpose()?;
        clean.host = record
            .host
            .as_deref()
            .map(|host| self.mask_host(host))
            .transpose()?;
        clean.table_structure = match record.table_structure.as_deref() {
            None => None,
            Some(ddl) => match self.mask_table_structure(ddl) {
                Ok(masked) => Some(masked),
                Err(error) if error.kind() == ErrorKind::ParseAmbiguous => {
                    tracing::warn!("Dropped table structure that could not be masked: {}", error);
                    None
                }
                Err(error) => return Err(error),
            },
        };
        clean.masked = true;
        Ok(clean)
    }

    /// Token for `name` in namespace `kind`, allocating one on first sight.
    ///
    /// Empty names pass through unchanged and never consume a counter.
    pub(crate) fn mask_name(&mut self, kind: NameKind, name: &str) -> Result<String> {
        let key = name.to_lowercase();
        if key.is_empty() {
            return Ok(String::new());
        }
        if let Some(token) = self.forward.get(&(kind, key.clone())) {
            return Ok(token.clone());
        }
        if self.reverse.contains_key(&key) {
            tracing::debug!("Input {} equals an issued token", key);
            return Err(SlowscopeError::masking_collision(key));
        }

        self.seen.insert(key.clone());
        let counter = self.counters.entry(kind).or_insert(0);
        let token = loop {
            *counter += 1;
            let candidate = format!("{}{}", kind.prefix(), counter);
            if !self.seen.contains(&candidate) && !self.reverse.contains_key(&candidate) {
                break candidate;
            }
        };

        self.reverse.insert(token.clone(), (kind, key.clone()));
        self.forward.insert((kind, key), token.clone());
        Ok(token)
    }
}

fn redact(record: &mut SlowQueryRecord) {
    record.sql = REDACTED_STATEMENT.to_string();
    record.database = None;
    record.table = None;
    record.host = None;
    record.table_structure = None;
    record.masked = true;
}
