//! Schema metadata from `INFORMATION_SCHEMA`.
//!
//! Names travel as bound parameters; `SHOW CREATE TABLE` is the only
//! statement that interpolates them, after [`is_safe_identifier`] accepted
//! both.

use super::AccessLayer;
use super::connector::{QueryParam, row_str, row_u64};
use super::query::HostScope;
use crate::error::SlowscopeError;
use crate::models::{HostRole, IndexColumn, SchemaIndex, SortDirection};
use crate::security::is_safe_identifier;
use crate::Result;
use std::collections::HashMap;

/// Schemas never searched when locating a table.
pub const SYSTEM_DATABASES: &[&str] = &["information_schema", "mysql", "performance_schema", "sys"];

// Cast to CHAR to avoid VARBINARY type issues in MySQL 8.0+
const TABLE_EXISTS_QUERY: &str = r#"
    SELECT COUNT(*) AS table_count
    FROM INFORMATION_SCHEMA.TABLES
    WHERE TABLE_SCHEMA = ?
    AND TABLE_NAME = ?
"#;

const INDEX_QUERY: &str = r#"
    SELECT
        CAST(INDEX_NAME AS CHAR) as INDEX_NAME,
        CAST(COLUMN_NAME AS CHAR) as COLUMN_NAME,
        NON_UNIQUE,
        SEQ_IN_INDEX,
        CAST(INDEX_TYPE AS CHAR) as INDEX_TYPE,
        CAST(COLLATION AS CHAR) as COLLATION
    FROM INFORMATION_SCHEMA.STATISTICS
    WHERE TABLE_SCHEMA = ?
    AND TABLE_NAME = ?
    ORDER BY INDEX_NAME, SEQ_IN_INDEX
"#;

const FIND_DATABASE_QUERY: &str = r#"
    SELECT CAST(TABLE_SCHEMA AS CHAR) as TABLE_SCHEMA
    FROM INFORMATION_SCHEMA.TABLES
    WHERE TABLE_NAME = ?
    ORDER BY TABLE_SCHEMA
"#;

const ROW_COUNT_QUERY: &str = r#"
    SELECT TABLE_ROWS
    FROM INFORMATION_SCHEMA.TABLES
    WHERE TABLE_SCHEMA = ?
    AND TABLE_NAME = ?
"#;

impl HostScope<'_> {
    /// Whether `database.table` exists.
    pub async fn check_table_exists(&self, database: &str, table: &str) -> Result<bool> {
        let outcome = self
            .run_trusted(TABLE_EXISTS_QUERY, None, &names(database, table))
            .await?;
        let count = outcome
            .rows
            .first()
            .and_then(|row| row_u64(row, "table_count"))
            .unwrap_or(0);
        tracing::debug!("{}.{} exists: {}", database, table, count > 0);
        Ok(count > 0)
    }

    /// Indexes of `database.table`, PRIMARY first then by name.
    ///
    /// Columns keep `SEQ_IN_INDEX` order.
    ///
    /// # Errors
    /// `SchemaNotFound` when the table does not exist.
    pub async fn get_table_indexes(&self, database: &str, table: &str) -> Result<Vec<SchemaIndex>> {
        self.table_indexes_served(database, table)
            .await
            .map(|(indexes, _, _)| indexes)
    }

    /// [`HostScope::get_table_indexes`] plus the host and role that answered.
    pub(crate) async fn table_indexes_served(
        &self,
        database: &str,
        table: &str,
    ) -> Result<(Vec<SchemaIndex>, String, HostRole)> {
        if !self.check_table_exists(database, table).await? {
            return Err(SlowscopeError::schema_not_found(format!(
                "{}.{}",
                database, table
            )));
        }

        let outcome = self
            .run_trusted(INDEX_QUERY, None, &names(database, table))
            .await?;

        // Group by index name
        let mut index_map: HashMap<String, SchemaIndex> = HashMap::new();
        for row in &outcome.rows {
            let index_name = row_str(row, "INDEX_NAME").unwrap_or_default();
            let Some(column_name) = row_str(row, "COLUMN_NAME") else {
                // functional index parts have no column name
                continue;
            };
            let is_unique = row_u64(row, "NON_UNIQUE") == Some(0);
            let index_type = row_str(row, "INDEX_TYPE");

            // Determine sort order from collation (A = ascending, D = descending)
            let sort_order = match row_str(row, "COLLATION").as_deref() {
                Some("A") => Some(SortDirection::Ascending),
                Some("D") => Some(SortDirection::Descending),
                _ => None,
            };

            let index = index_map
                .entry(index_name.clone())
                .or_insert_with(|| SchemaIndex {
                    is_primary: index_name == "PRIMARY",
                    name: index_name,
                    table_name: table.to_string(),
                    schema: Some(database.to_string()),
                    columns: Vec::new(),
                    is_unique,
                    index_type,
                });

            index.columns.push(IndexColumn {
                name: column_name,
                sort_order,
            });
        }

        let mut indexes: Vec<SchemaIndex> = index_map.into_values().collect();
        indexes.sort_by(|a, b| b.is_primary.cmp(&a.is_primary).then_with(|| a.name.cmp(&b.name)));
        tracing::debug!("{}.{} has {} indexes", database, table, indexes.len());
        for index in &indexes {
            tracing::trace!("{} ({})", index.name, index.column_names().join(", "));
        }
        Ok((indexes, outcome.host, outcome.role))
    }

    /// First non-system database (by name) that contains `table`.
    pub async fn find_database_for_table(&self, table: &str) -> Result<Option<String>> {
        let outcome = self
            .run_trusted(FIND_DATABASE_QUERY, None, &[QueryParam::from(table)])
            .await?;
        let excluded = &self.layer.config.excluded_databases;

        let found = outcome
            .rows
            .iter()
            .filter_map(|row| row_str(row, "TABLE_SCHEMA"))
            .find(|schema| {
                !SYSTEM_DATABASES
                    .iter()
                    .any(|system| system.eq_ignore_ascii_case(schema))
                    && !excluded.iter().any(|e| e.eq_ignore_ascii_case(schema))
            });
        if found.is_none() {
            tracing::debug!("No database on {} contains {}", self.host, table);
        }
        Ok(found)
    }

    /// `TABLE_ROWS` estimate for `database.table`; `None` when the engine
    /// reports none.
    ///
    /// # Errors
    /// `SchemaNotFound` when the table does not exist.
    pub async fn estimate_row_count(&self, database: &str, table: &str) -> Result<Option<u64>> {
        let outcome = self
            .run_trusted(ROW_COUNT_QUERY, None, &names(database, table))
            .await?;
        let Some(row) = outcome.rows.first() else {
            return Err(SlowscopeError::schema_not_found(format!(
                "{}.{}",
                database, table
            )));
        };
        Ok(row_u64(row, "TABLE_ROWS"))
    }

    /// `SHOW CREATE TABLE` output for `database.table`.
    pub async fn show_create_table(&self, database: &str, table: &str) -> Result<Option<String>> {
        if !is_safe_identifier(database) || !is_safe_identifier(table) {
            return Err(SlowscopeError::syntax(format!(
                "refusing to quote unsafe identifier {}.{}",
                database, table
            )));
        }
        let sql = format!("SHOW CREATE TABLE `{}`.`{}`", database, table);
        let outcome = self.run_trusted(&sql, Some(database), &[]).await?;
        Ok(outcome
            .rows
            .first()
            .and_then(|row| row_str(row, "Create Table")))
    }
}

impl AccessLayer {
    /// [`HostScope::check_table_exists`] on the business host.
    pub async fn check_table_exists(&self, database: &str, table: &str) -> Result<bool> {
        self.business_scope().check_table_exists(database, table).await
    }

    /// [`HostScope::get_table_indexes`] on the business host.
    pub async fn get_table_indexes(&self, database: &str, table: &str) -> Result<Vec<SchemaIndex>> {
        self.business_scope().get_table_indexes(database, table).await
    }

    /// [`HostScope::find_database_for_table`] on the business host.
    pub async fn find_database_for_table(&self, table: &str) -> Result<Option<String>> {
        self.business_scope().find_database_for_table(table).await
    }

    /// [`HostScope::estimate_row_count`] on the business host.
    pub async fn estimate_row_count(&self, database: &str, table: &str) -> Result<Option<u64>> {
        self.business_scope().estimate_row_count(database, table).await
    }

    /// [`HostScope::show_create_table`] on the business host.
    pub async fn show_create_table(&self, database: &str, table: &str) -> Result<Option<String>> {
        self.business_scope().show_create_table(database, table).await
    }
}

fn names(database: &str, table: &str) -> [QueryParam; 2] {
    [QueryParam::from(database), QueryParam::from(table)]
}
