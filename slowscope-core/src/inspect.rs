//! Workload inspection.
//!
//! Drives each slow-query record through the analyzer, the access layer and
//! the masker and produces one [`TableAnalysis`] per record. Failures are
//! reported on the item they belong to; one bad table never aborts a run.
//!
//! Once the indexes are known the statement is explained on the same host
//! scope. A failed `EXPLAIN` is kept apart from the analysis error, since
//! the index data is still usable.

use crate::access::{AccessLayer, HostScope};
use crate::analyzer;
use crate::error::{ErrorKind, SlowscopeError};
use crate::masking::MaskingSession;
use crate::models::{ExplainPlan, FieldRef, HostRole, SchemaIndex, SlowQueryRecord};
use crate::Result;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Classified failure attached to one analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&SlowscopeError> for AnalysisError {
    fn from(error: &SlowscopeError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Result for one inspected statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableAnalysis {
    pub table: Option<String>,
    pub database: Option<String>,
    /// Fields ranked for composite-index design
    pub ranked_fields: Vec<FieldRef>,
    /// Existing indexes of the table, PRIMARY first
    pub indexes: Vec<SchemaIndex>,
    pub masked_sql: String,
    /// Host that served the index lookup
    pub host: Option<String>,
    pub role: Option<HostRole>,
    pub error: Option<AnalysisError>,
    /// Plan of the sample statement; names in it are not masked
    pub explain: Option<ExplainPlan>,
    pub explain_error: Option<AnalysisError>,
}

impl TableAnalysis {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Ranked columns of the analyzed table, best tier first.
    ///
    /// Fields attributed to other tables of a join are left out.
    pub fn table_columns(&self) -> Vec<&str> {
        let Some(table) = self.table.as_deref() else {
            return Vec::new();
        };
        self.ranked_fields
            .iter()
            .filter(|f| f.table.as_deref().is_none_or(|t| t.eq_ignore_ascii_case(table)))
            .map(|f| f.column.as_str())
            .collect()
    }

    /// First existing index whose leftmost columns are [`Self::table_columns`]
    /// in ranked order.
    pub fn matching_index(&self) -> Option<&SchemaIndex> {
        let columns = self.table_columns();
        self.indexes.iter().find(|index| index.covers_prefix(&columns))
    }
}

/// Everything but the masked SQL, which is filled in sequentially.
struct Pending {
    table: Option<String>,
    database: Option<String>,
    ranked_fields: Vec<FieldRef>,
    indexes: Vec<SchemaIndex>,
    host: Option<String>,
    role: Option<HostRole>,
    error: Option<AnalysisError>,
    explain: Option<ExplainPlan>,
    explain_error: Option<AnalysisError>,
}

/// Runs inspections against one access layer.
#[derive(Debug)]
pub struct Inspector<'a> {
    layer: &'a AccessLayer,
    /// Lowercased table names never inspected
    excluded_tables: HashSet<String>,
    explain: bool,
}

impl<'a> Inspector<'a> {
    pub fn new(layer: &'a AccessLayer) -> Self {
        Self {
            layer,
            excluded_tables: HashSet::new(),
            explain: true,
        }
    }

    /// Builder method to skip `EXPLAIN`; on by default.
    pub fn with_explain(mut self, enabled: bool) -> Self {
        self.explain = enabled;
        self
    }

    /// Builder method to skip tables by name (case-insensitive).
    pub fn with_excluded_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.excluded_tables
            .extend(tables.into_iter().map(|t| t.as_ref().to_lowercase()));
        self
    }

    /// Records whose table is not excluded.
    ///
    /// The table comes from the record, or from the analyzer when the record
    /// has none. Records without a resolvable table are kept so they show up
    /// with an error.
    pub fn filter_excluded<'r>(&self, records: &'r [SlowQueryRecord]) -> Vec<&'r SlowQueryRecord> {
        records
            .iter()
            .filter(|record| {
                let table = record
                    .table
                    .clone()
                    .or_else(|| analyzer::extract_table(&record.sql));
                match table {
                    Some(table) if self.excluded_tables.contains(&table.to_lowercase()) => {
                        tracing::debug!("Skipping excluded table {}", table);
                        false
                    }
                    _ => true,
                }
            })
            .collect()
    }

    /// Inspects `records` one after another.
    pub async fn inspect_queries(
        &self,
        masking: &mut MaskingSession,
        records: &[SlowQueryRecord],
    ) -> Vec<TableAnalysis> {
        let selected = self.filter_excluded(records);
        tracing::info!("Inspecting {} statements", selected.len());

        let mut analyses = Vec::with_capacity(selected.len());
        for record in selected {
            let pending = self.analyze_record(record).await;
            analyses.push(finish(masking, record, pending));
        }
        log_summary(&analyses);
        analyses
    }

    /// Inspects `records` with up to `limit` lookups in flight.
    ///
    /// Each lookup owns its connection. Output order follows input order;
    /// masking runs afterwards, in that order, so tokens do not depend on
    /// which lookup finished first.
    pub async fn inspect_queries_concurrent(
        &self,
        masking: &mut MaskingSession,
        records: &[SlowQueryRecord],
        limit: usize,
    ) -> Vec<TableAnalysis> {
        let selected = self.filter_excluded(records);
        tracing::info!(
            "Inspecting {} statements, {} at a time",
            selected.len(),
            limit.max(1)
        );

        let mut pending: Vec<(usize, Pending)> = futures::stream::iter(selected.iter().enumerate())
            .map(|(i, record)| async move { (i, self.analyze_record(record).await) })
            .buffer_unordered(limit.max(1))
            .collect()
            .await;
        pending.sort_by_key(|(i, _)| *i);

        let analyses: Vec<TableAnalysis> = pending
            .into_iter()
            .map(|(i, pending)| finish(masking, selected[i], pending))
            .collect();
        log_summary(&analyses);
        analyses
    }

    async fn analyze_record(&self, record: &SlowQueryRecord) -> Pending {
        let mut pending = Pending {
            table: record.table.clone(),
            database: record.database.clone(),
            ranked_fields: Vec::new(),
            indexes: Vec::new(),
            host: None,
            role: None,
            error: None,
            explain: None,
            explain_error: None,
        };

        let Some(shape) = analyzer::analyze(&record.sql) else {
            pending.error = Some(AnalysisError::from(&SlowscopeError::parse_ambiguous(
                "no table could be resolved from statement",
            )));
            return pending;
        };
        pending.ranked_fields = shape.ranked_fields();
        pending.table = pending.table.or(shape.table);
        pending.database = pending.database.or(shape.database);

        let Some(table) = pending.table.clone() else {
            pending.error = Some(AnalysisError::from(&SlowscopeError::parse_ambiguous(
                "no table could be resolved from statement",
            )));
            return pending;
        };

        let scope = match &record.host {
            Some(host) => self.layer.on_host(host.clone()),
            None => self.layer.business_scope(),
        };
        match self.lookup_indexes(&scope, pending.database.clone(), &table).await {
            Ok((database, indexes, host, role)) => {
                pending.database = Some(database);
                pending.indexes = indexes;
                pending.host = Some(host);
                pending.role = Some(role);
            }
            Err(error) => {
                tracing::error!("Index lookup for {} failed: {}", table, error);
                pending.error = Some(AnalysisError::from(&error));
                return pending;
            }
        }

        if self.explain {
            match scope
                .explain_statement(&record.sql, pending.database.as_deref())
                .await
            {
                Ok(plan) => pending.explain = Some(plan),
                Err(error) => {
                    tracing::warn!("EXPLAIN for {} failed: {}", table, error);
                    pending.explain_error = Some(AnalysisError::from(&error));
                }
            }
        }
        pending
    }

    async fn lookup_indexes(
        &self,
        scope: &HostScope<'_>,
        database: Option<String>,
        table: &str,
    ) -> Result<(String, Vec<SchemaIndex>, String, HostRole)> {
        let database = match database {
            Some(database) => database,
            None => scope
                .find_database_for_table(table)
                .await?
                .ok_or_else(|| SlowscopeError::schema_not_found(table))?,
        };
        let (indexes, host, role) = scope.table_indexes_served(&database, table).await?;
        Ok((database, indexes, host, role))
    }
}

fn finish(masking: &mut MaskingSession, record: &SlowQueryRecord, pending: Pending) -> TableAnalysis {
    let mut error = pending.error;
    let masked_sql = match masking.mask_sql(&record.sql) {
        Ok(masked) => masked,
        Err(mask_error) => {
            tracing::warn!("Could not mask statement: {}", mask_error);
            error.get_or_insert_with(|| AnalysisError::from(&mask_error));
            crate::masking::REDACTED_STATEMENT.to_string()
        }
    };

    TableAnalysis {
        table: pending.table,
        database: pending.database,
        ranked_fields: pending.ranked_fields,
        indexes: pending.indexes,
        masked_sql,
        host: pending.host,
        role: pending.role,
        error,
        explain: pending.explain,
        explain_error: pending.explain_error,
    }
}

fn log_summary(analyses: &[TableAnalysis]) {
    let failed = analyses.iter().filter(|a| !a.is_ok()).count();
    let matched = analyses.iter().filter(|a| a.matching_index().is_some()).count();
    tracing::info!(
        "Inspected {} statements, {} with errors, {} already matched by an index",
        analyses.len(),
        failed,
        matched
    );
}
