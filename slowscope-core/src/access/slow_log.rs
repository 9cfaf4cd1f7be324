//! Slow-query log retrieval.
//!
//! The log table holds one row per query fingerprint (`checksum`) with a
//! sample statement, the execution count and the worst execution time, in
//! the layout written by `pt-query-digest --review`.
//!
//! [`AccessLayer::compare_slow_queries`] reads two consecutive months with
//! the same thresholds and summarizes how the workload moved.

use super::AccessLayer;
use super::connector::{ConnectionDescriptor, QueryParam, row_f64, row_str, row_u64};
use crate::analyzer;
use crate::error::SlowscopeError;
use crate::models::{HostRole, SlowQueryRecord};
use crate::Result;
use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Statements kept in each top list of a [`MonthSummary`].
pub const TOP_STATEMENTS: usize = 5;

/// Thresholds and window for [`AccessLayer::fetch_slow_queries`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlowQueryFilter {
    /// Only fingerprints executed more often than this
    pub min_execute_count: u64,
    /// Only fingerprints slower than this, in seconds
    pub min_query_time: f64,
    /// Calendar month to read: 0 is the current month, 1 the previous one
    pub month_offset: u32,
}

impl Default for SlowQueryFilter {
    fn default() -> Self {
        Self {
            min_execute_count: 0,
            min_query_time: 0.0,
            month_offset: 1,
        }
    }
}

/// First day of the month `offset` months before `today`, and the first
/// day of the following month (exclusive end).
///
/// # Example
/// ```rust
/// use chrono::NaiveDate;
/// use slowscope_core::access::month_window;
///
/// let today = NaiveDate::from_ymd_opt(2024, 1, 17).unwrap();
/// let (start, end) = month_window(today, 1)?;
/// assert_eq!(start, NaiveDate::from_ymd_opt(2023, 12, 1).unwrap());
/// assert_eq!(end, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
/// # Ok::<(), slowscope_core::SlowscopeError>(())
/// ```
pub fn month_window(today: NaiveDate, offset: u32) -> Result<(NaiveDate, NaiveDate)> {
    let out_of_range = || SlowscopeError::configuration(format!("month offset {} is out of range", offset));
    let first_of_month = today.with_day(1).ok_or_else(out_of_range)?;
    let start = first_of_month
        .checked_sub_months(Months::new(offset))
        .ok_or_else(out_of_range)?;
    let end = start
        .checked_add_months(Months::new(1))
        .ok_or_else(out_of_range)?;
    Ok((start, end))
}

/// Slow-query totals for one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthSummary {
    /// `YYYY-MM`
    pub month: String,
    pub start: NaiveDate,
    /// First day of the next month (exclusive)
    pub end: NaiveDate,
    pub total: usize,
    /// Mean of the worst execution times, in seconds
    pub avg_query_time: f64,
    pub avg_execute_count: f64,
    /// Slowest statements first
    pub top_by_time: Vec<SlowQueryRecord>,
    /// Most executed statements first
    pub top_by_count: Vec<SlowQueryRecord>,
}

impl MonthSummary {
    /// Summarizes the records read for the month starting at `start`.
    ///
    /// Ties in the top lists keep the input order. Averages of an empty
    /// month are zero.
    pub fn from_records(start: NaiveDate, end: NaiveDate, records: &[SlowQueryRecord]) -> Self {
        let total = records.len();
        let divisor = total.max(1) as f64;
        let avg_query_time = records.iter().map(|r| r.query_time_max).sum::<f64>() / divisor;
        let avg_execute_count = records.iter().map(|r| r.execute_count as f64).sum::<f64>() / divisor;

        let mut by_time = records.to_vec();
        by_time.sort_by(|a, b| b.query_time_max.total_cmp(&a.query_time_max));
        by_time.truncate(TOP_STATEMENTS);

        let mut by_count = records.to_vec();
        by_count.sort_by(|a, b| b.execute_count.cmp(&a.execute_count));
        by_count.truncate(TOP_STATEMENTS);

        Self {
            month: start.format("%Y-%m").to_string(),
            start,
            end,
            total,
            avg_query_time,
            avg_execute_count,
            top_by_time: by_time,
            top_by_count: by_count,
        }
    }
}

/// Two consecutive months of the slow-query log side by side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlowQueryComparison {
    pub current: MonthSummary,
    pub previous: MonthSummary,
    /// Percentage change of the statement count; 100 when the previous
    /// month had none and the current one has some
    pub growth_rate: f64,
    /// Statements only in the current month
    pub new_statements: usize,
    /// Statements only in the previous month
    pub resolved_statements: usize,
}

impl SlowQueryComparison {
    /// Compares two months of records.
    ///
    /// Statements are matched by checksum, or by their SQL text when the
    /// log has no checksum for them.
    pub fn new(
        current: MonthSummary,
        previous: MonthSummary,
        current_records: &[SlowQueryRecord],
        previous_records: &[SlowQueryRecord],
    ) -> Self {
        let growth_rate = if previous.total > 0 {
            (current.total as f64 - previous.total as f64) / previous.total as f64 * 100.0
        } else if current.total > 0 {
            100.0
        } else {
            0.0
        };

        let current_keys = statement_keys(current_records);
        let previous_keys = statement_keys(previous_records);

        Self {
            new_statements: current_keys.difference(&previous_keys).count(),
            resolved_statements: previous_keys.difference(&current_keys).count(),
            current,
            previous,
            growth_rate,
        }
    }
}

fn statement_keys(records: &[SlowQueryRecord]) -> HashSet<&str> {
    records
        .iter()
        .map(|r| r.checksum.as_deref().unwrap_or(r.sql.as_str()))
        .collect()
}

impl AccessLayer {
    /// Reads the filter's month and the month before it and compares them.
    ///
    /// The default filter compares last month with the month before.
    ///
    /// # Errors
    /// Same as [`AccessLayer::fetch_slow_queries`].
    pub async fn compare_slow_queries(&self, filter: &SlowQueryFilter) -> Result<SlowQueryComparison> {
        let today = chrono::Local::now().date_naive();
        self.compare_slow_queries_at(filter, today).await
    }

    pub(crate) async fn compare_slow_queries_at(
        &self,
        filter: &SlowQueryFilter,
        today: NaiveDate,
    ) -> Result<SlowQueryComparison> {
        let earlier = SlowQueryFilter {
            month_offset: filter.month_offset.saturating_add(1),
            ..filter.clone()
        };
        let (start, end) = month_window(today, filter.month_offset)?;
        let (earlier_start, earlier_end) = month_window(today, earlier.month_offset)?;

        let current_records = self.fetch_slow_queries_at(filter, today).await?;
        let previous_records = self.fetch_slow_queries_at(&earlier, today).await?;

        let comparison = SlowQueryComparison::new(
            MonthSummary::from_records(start, end, &current_records),
            MonthSummary::from_records(earlier_start, earlier_end, &previous_records),
            &current_records,
            &previous_records,
        );
        tracing::info!(
            "{}: {} slow statements, {}: {} ({:+.1}%), {} new, {} resolved",
            comparison.current.month,
            comparison.current.total,
            comparison.previous.month,
            comparison.previous.total,
            comparison.growth_rate,
            comparison.new_statements,
            comparison.resolved_statements
        );
        Ok(comparison)
    }
}

impl AccessLayer {
    /// Reads the slow-query log for the filter's month.
    ///
    /// Connects straight to the slow-log endpoint; there is no standby for
    /// it. A missing log table yields an empty list. The table and database
    /// of each sample are filled in from the analyzer when it can tell.
    ///
    /// # Errors
    /// `Configuration` when no slow-log endpoint is configured.
    pub async fn fetch_slow_queries(&self, filter: &SlowQueryFilter) -> Result<Vec<SlowQueryRecord>> {
        let today = chrono::Local::now().date_naive();
        self.fetch_slow_queries_at(filter, today).await
    }

    pub(crate) async fn fetch_slow_queries_at(
        &self,
        filter: &SlowQueryFilter,
        today: NaiveDate,
    ) -> Result<Vec<SlowQueryRecord>> {
        let Some(slow_log) = &self.config.slow_log else {
            return Err(SlowscopeError::configuration(
                "no slow-log endpoint configured",
            ));
        };
        let (start, end) = month_window(today, filter.month_offset)?;
        let endpoint = &slow_log.endpoint;

        let descriptor = ConnectionDescriptor::new(
            HostRole::Master,
            endpoint.host.clone(),
            endpoint.port,
            endpoint.credentials.clone(),
            endpoint.database.clone(),
        );
        let connection = self.open_descriptor(&descriptor).await?;

        let table_rows = self
            .run_released(
                connection,
                "SHOW TABLES LIKE ?",
                &[QueryParam::from(slow_log.table.as_str())],
            )
            .await?;
        if table_rows.is_empty() {
            tracing::warn!("Slow-log table {} does not exist, nothing to read", slow_log.table);
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT CAST(checksum AS CHAR) AS checksum, sample AS sql_content, \
             CAST(ts_cnt AS UNSIGNED) AS execute_cnt, \
             CAST(query_time_max AS CHAR) AS query_time, hostname_max \
             FROM {} WHERE ts_min >= ? AND ts_min < ? \
             HAVING execute_cnt > ? AND query_time > ? \
             ORDER BY execute_cnt, hostname_max",
            slow_log.table
        );
        let params = [
            QueryParam::from(start.format("%Y-%m-%d").to_string()),
            QueryParam::from(end.format("%Y-%m-%d").to_string()),
            QueryParam::from(filter.min_execute_count),
            QueryParam::from(filter.min_query_time),
        ];

        let connection = self.open_descriptor(&descriptor).await?;
        let rows = self.run_released(connection, &sql, &params).await?;

        let records: Vec<SlowQueryRecord> = rows
            .iter()
            .filter_map(|row| {
                let sql = row_str(row, "sql_content")?;
                let shape = analyzer::analyze(&sql);
                Some(SlowQueryRecord {
                    checksum: row_str(row, "checksum"),
                    execute_count: row_u64(row, "execute_cnt").unwrap_or(0),
                    query_time_max: row_f64(row, "query_time").unwrap_or(0.0),
                    host: row_str(row, "hostname_max"),
                    database: shape.as_ref().and_then(|s| s.database.clone()),
                    table: shape.and_then(|s| s.table),
                    ..SlowQueryRecord::new(sql)
                })
            })
            .collect();

        tracing::info!(
            "Read {} slow queries between {} and {}",
            records.len(),
            start,
            end
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_month_window_current_month() {
        let (start, end) = month_window(date(2024, 3, 31), 0).unwrap();
        assert_eq!(start, date(2024, 3, 1));
        assert_eq!(end, date(2024, 4, 1));
    }

    #[test]
    fn test_month_window_crosses_year_boundary() {
        let (start, end) = month_window(date(2024, 1, 5), 1).unwrap();
        assert_eq!(start, date(2023, 12, 1));
        assert_eq!(end, date(2024, 1, 1));

        let (start, end) = month_window(date(2024, 3, 15), 14).unwrap();
        assert_eq!(start, date(2023, 1, 1));
        assert_eq!(end, date(2023, 2, 1));
    }

    fn slow(checksum: &str, query_time: f64, execute_count: u64) -> SlowQueryRecord {
        SlowQueryRecord {
            checksum: Some(checksum.to_string()),
            query_time_max: query_time,
            execute_count,
            ..SlowQueryRecord::new(format!("SELECT * FROM t WHERE k = '{}'", checksum))
        }
    }

    #[test]
    fn test_month_summary_tops_and_averages() {
        let records: Vec<SlowQueryRecord> = (1..=7u32)
            .map(|i| slow(&format!("Q{}", i), f64::from(i), u64::from(8 - i) * 10))
            .collect();
        let summary = MonthSummary::from_records(date(2024, 2, 1), date(2024, 3, 1), &records);

        assert_eq!(summary.month, "2024-02");
        assert_eq!(summary.total, 7);
        assert!((summary.avg_query_time - 4.0).abs() < 1e-9);
        assert!((summary.avg_execute_count - 40.0).abs() < 1e-9);

        let slowest: Vec<_> = summary.top_by_time.iter().filter_map(|r| r.checksum.as_deref()).collect();
        assert_eq!(slowest, vec!["Q7", "Q6", "Q5", "Q4", "Q3"]);
        let busiest: Vec<_> = summary.top_by_count.iter().filter_map(|r| r.checksum.as_deref()).collect();
        assert_eq!(busiest, vec!["Q1", "Q2", "Q3", "Q4", "Q5"]);
    }

    #[test]
    fn test_empty_month_summary() {
        let summary = MonthSummary::from_records(date(2024, 1, 1), date(2024, 2, 1), &[]);
        assert_eq!(summary.total, 0);
        assert!(summary.avg_query_time.abs() < f64::EPSILON);
        assert!(summary.top_by_time.is_empty());
    }

    #[test]
    fn test_comparison_counts_new_and_resolved_statements() {
        let current = vec![slow("A", 2.0, 10), slow("B", 3.0, 10), slow("C", 4.0, 10)];
        let previous = vec![slow("A", 2.0, 10), slow("D", 5.0, 10)];
        let comparison = SlowQueryComparison::new(
            MonthSummary::from_records(date(2024, 2, 1), date(2024, 3, 1), &current),
            MonthSummary::from_records(date(2024, 1, 1), date(2024, 2, 1), &previous),
            &current,
            &previous,
        );

        assert!((comparison.growth_rate - 50.0).abs() < 1e-9);
        assert_eq!(comparison.new_statements, 2);
        assert_eq!(comparison.resolved_statements, 1);
    }

    #[test]
    fn test_comparison_matches_sql_without_checksum() {
        let current = vec![SlowQueryRecord::new("SELECT 1"), SlowQueryRecord::new("SELECT 2")];
        let previous = vec![SlowQueryRecord::new("SELECT 2")];
        let comparison = SlowQueryComparison::new(
            MonthSummary::from_records(date(2024, 2, 1), date(2024, 3, 1), &current),
            MonthSummary::from_records(date(2024, 1, 1), date(2024, 2, 1), &previous),
            &current,
            &previous,
        );
        assert_eq!(comparison.new_statements, 1);
        assert_eq!(comparison.resolved_statements, 0);
    }

    #[test]
    fn test_growth_rate_without_previous_month() {
        let empty = MonthSummary::from_records(date(2024, 1, 1), date(2024, 2, 1), &[]);
        let current = vec![slow("A", 2.0, 10)];
        let busy = MonthSummary::from_records(date(2024, 2, 1), date(2024, 3, 1), &current);

        let comparison = SlowQueryComparison::new(busy, empty.clone(), &current, &[]);
        assert!((comparison.growth_rate - 100.0).abs() < f64::EPSILON);

        let quiet = SlowQueryComparison::new(empty.clone(), empty, &[], &[]);
        assert!(quiet.growth_rate.abs() < f64::EPSILON);
    }

    #[test]
    fn test_filter_defaults_to_previous_month() {
        let filter = SlowQueryFilter::default();
        assert_eq!(filter.month_offset, 1);
        assert_eq!(filter.min_execute_count, 0);
    }
}
