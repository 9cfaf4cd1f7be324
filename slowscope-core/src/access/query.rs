//! Guarded query execution.
//!
//! Every call acquires its own connection, runs one statement under the
//! statement timeout and releases the connection before returning, whatever
//! the outcome.

use super::AccessLayer;
use super::connector::{QueryParam, Row};
use super::session::SafeConnection;
use crate::analyzer;
use crate::error::SlowscopeError;
use crate::models::HostRole;
use crate::Result;

/// Rows of one query and the host that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub rows: Vec<Row>,
    pub host: String,
    pub role: HostRole,
}

/// Access layer operations bound to one master host.
///
/// Obtained from [`AccessLayer::on_host`]; the methods on [`AccessLayer`]
/// itself use the business endpoint host.
#[derive(Debug, Clone)]
pub struct HostScope<'a> {
    pub(crate) layer: &'a AccessLayer,
    pub(crate) host: String,
}

impl AccessLayer {
    /// Binds operations to `host`, typically the host recorded in a
    /// slow-log entry. Standby fallback follows the configured topology.
    pub fn on_host(&self, host: impl Into<String>) -> HostScope<'_> {
        HostScope {
            layer: self,
            host: host.into(),
        }
    }

    pub(crate) fn business_scope(&self) -> HostScope<'_> {
        self.on_host(self.config.business.host.clone())
    }

    /// Runs a read-only statement on the business host.
    ///
    /// # Errors
    /// `Permission` for statements that could write (checked before any
    /// connection is opened), `Timeout` past the statement timeout, and the
    /// classified server or connection error otherwise.
    pub async fn execute_safe_query(
        &self,
        sql: &str,
        database: Option<&str>,
    ) -> Result<QueryOutcome> {
        self.business_scope().execute_safe_query(sql, database).await
    }

    /// Like [`AccessLayer::execute_safe_query`] with `?` placeholders bound
    /// to `params`.
    pub async fn execute_safe_query_with(
        &self,
        sql: &str,
        database: Option<&str>,
        params: &[QueryParam],
    ) -> Result<QueryOutcome> {
        self.business_scope()
            .execute_safe_query_with(sql, database, params)
            .await
    }

    /// Runs one statement on `connection` with the statement timeout and
    /// always releases it.
    pub(crate) async fn run_released(
        &self,
        connection: SafeConnection,
        sql: &str,
        params: &[QueryParam],
    ) -> Result<Vec<Row>> {
        let timeout = self.config.statement_timeout;
        let result = match tokio::time::timeout(timeout, connection.fetch_all(sql, params)).await
        {
            Ok(result) => result,
            Err(_) => Err(SlowscopeError::timeout(
                format!("query on {}", connection.host()),
                timeout,
            )),
        };

        if let Err(error) = connection.release().await {
            tracing::warn!("Releasing connection failed: {}", error);
        }
        result
    }
}

impl HostScope<'_> {
    /// Master host this scope is bound to.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// See [`AccessLayer::execute_safe_query`].
    pub async fn execute_safe_query(
        &self,
        sql: &str,
        database: Option<&str>,
    ) -> Result<QueryOutcome> {
        self.execute_safe_query_with(sql, database, &[]).await
    }

    /// See [`AccessLayer::execute_safe_query_with`].
    pub async fn execute_safe_query_with(
        &self,
        sql: &str,
        database: Option<&str>,
        params: &[QueryParam],
    ) -> Result<QueryOutcome> {
        if !analyzer::is_read_only(sql) {
            tracing::warn!("Rejected a statement that is not read-only");
            return Err(SlowscopeError::permission(
                "only single read-only statements may be executed",
            ));
        }
        self.run_trusted(sql, database, params).await
    }

    /// Runs internally built SQL with fallback, timeout and release.
    ///
    /// A connection lost mid-query on the master is retried once on the
    /// standby; a query that already ran on the standby is never retried.
    pub(crate) async fn run_trusted(
        &self,
        sql: &str,
        database: Option<&str>,
        params: &[QueryParam],
    ) -> Result<QueryOutcome> {
        let layer = self.layer;
        let connection = layer
            .get_safe_connection(&self.host, database)
            .await
            .into_result()?;
        let host = connection.host().to_string();
        let role = connection.role();

        let error = match layer.run_released(connection, sql, params).await {
            Ok(rows) => return Ok(QueryOutcome { rows, host, role }),
            Err(error) => error,
        };
        if role != HostRole::Master || !error.kind().is_connection() {
            return Err(error);
        }

        let Some(standby) = layer.resolve_standby(&host).await else {
            return Err(error);
        };
        tracing::warn!(
            "Connection to {} lost during query, retrying on standby {}",
            host,
            standby
        );
        let connection = layer
            .open_session(&standby, HostRole::Standby, database)
            .await?;
        let rows = layer.run_released(connection, sql, params).await?;
        Ok(QueryOutcome {
            rows,
            host: standby,
            role: HostRole::Standby,
        })
    }
}
