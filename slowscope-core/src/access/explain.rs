//! Execution plans.
//!
//! Only statements the read-only guard accepts are explained, so the
//! `EXPLAIN` prefix never wraps a write.

use super::AccessLayer;
use super::connector::{Row, row_str, row_u64};
use super::query::HostScope;
use crate::analyzer;
use crate::error::SlowscopeError;
use crate::models::{ExplainPlan, ExplainRow};
use crate::Result;

impl HostScope<'_> {
    /// `EXPLAIN` of `sql` with `database` as the default schema.
    ///
    /// # Errors
    /// `Permission` for statements that could write, checked before any
    /// connection is opened; otherwise the classified server error (a
    /// sample truncated by the slow log fails here with `Syntax`).
    pub async fn explain_statement(&self, sql: &str, database: Option<&str>) -> Result<ExplainPlan> {
        if !analyzer::is_read_only(sql) {
            tracing::warn!("Refusing to explain a statement that is not read-only");
            return Err(SlowscopeError::permission(
                "only single read-only statements may be explained",
            ));
        }
        let statement = sql.trim().trim_end_matches(';').trim_end();
        let outcome = self
            .run_trusted(&format!("EXPLAIN {}", statement), database, &[])
            .await?;

        let plan = ExplainPlan {
            rows: outcome.rows.iter().map(explain_row).collect(),
        };
        tracing::debug!(
            "Plan on {} has {} rows, about {} rows examined",
            outcome.host,
            plan.rows.len(),
            plan.rows_examined()
        );
        Ok(plan)
    }
}

impl AccessLayer {
    /// [`HostScope::explain_statement`] on the business host.
    pub async fn explain_statement(&self, sql: &str, database: Option<&str>) -> Result<ExplainPlan> {
        self.business_scope().explain_statement(sql, database).await
    }
}

fn explain_row(row: &Row) -> ExplainRow {
    let possible_keys = row_str(row, "possible_keys")
        .map(|keys| {
            keys.split(',')
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    ExplainRow {
        id: row_u64(row, "id"),
        select_type: row_str(row, "select_type"),
        table: row_str(row, "table"),
        access_type: row_str(row, "type"),
        possible_keys,
        key: row_str(row, "key"),
        rows: row_u64(row, "rows"),
        extra: row_str(row, "Extra"),
    }
}
