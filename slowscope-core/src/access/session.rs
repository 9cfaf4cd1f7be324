//! Safe connections: acquisition with standby fallback, session preparation,
//! exactly-once release.
//!
//! Per logical attempt the state moves `Connecting(master)` to `Connected` or
//! `Failed`; a connection-class failure with a known standby moves to
//! `Connecting(standby)` once, and a second failure is terminal. A connected
//! session is used, then released, and never reused for another query.

use super::AccessLayer;
use super::connector::{ConnectionDescriptor, DbSession, QueryParam, Row, row_u64};
use crate::error::{ErrorKind, SlowscopeError};
use crate::models::HostRole;
use crate::Result;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

pub(crate) type SessionSlot = tokio::sync::Mutex<Option<Box<dyn DbSession>>>;

/// An open, prepared, read-only session to one host.
///
/// Dropping it without calling [`SafeConnection::release`] leaves the session
/// for [`AccessLayer::close_safe_connection`] to close.
pub struct SafeConnection {
    host: String,
    role: HostRole,
    slot: Arc<SessionSlot>,
    close_timeout: Duration,
}

impl std::fmt::Debug for SafeConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafeConnection")
            .field("host", &self.host)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

impl SafeConnection {
    /// Host actually connected to.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Role of the host actually connected to.
    pub fn role(&self) -> HostRole {
        self.role
    }

    /// Runs a query on this session.
    ///
    /// The read-only guard is not applied here; use
    /// [`AccessLayer::execute_safe_query`] for caller-supplied SQL.
    pub async fn fetch_all(&self, sql: &str, params: &[QueryParam]) -> Result<Vec<Row>> {
        let mut guard = self.slot.lock().await;
        match guard.as_mut() {
            Some(session) => session.fetch_all(sql, params).await,
            None => Err(SlowscopeError::connection(
                &self.host,
                "connection already released",
            )),
        }
    }

    /// Closes the session. Consumes the handle, so a connection is released
    /// at most once.
    pub async fn release(self) -> Result<()> {
        let session = self.slot.lock().await.take();
        match session {
            Some(session) => close_session(&self.host, session, self.close_timeout).await,
            None => Ok(()),
        }
    }
}

pub(crate) async fn close_session(
    host: &str,
    session: Box<dyn DbSession>,
    timeout: Duration,
) -> Result<()> {
    match tokio::time::timeout(timeout, session.close()).await {
        Ok(result) => {
            tracing::debug!("Released connection to {}", host);
            result
        }
        Err(_) => {
            // the session is dropped with the timed-out future
            tracing::warn!("Closing connection to {} timed out, dropped it", host);
            Ok(())
        }
    }
}

/// One failed connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionAttempt {
    pub host: String,
    pub role: HostRole,
    pub kind: ErrorKind,
    pub message: String,
}

/// Outcome of [`AccessLayer::get_safe_connection`].
#[derive(Debug)]
pub enum ConnectionResult {
    /// `host` and `role` name the host actually used
    Connected {
        connection: SafeConnection,
        host: String,
        role: HostRole,
    },
    /// Every attempt failed; `error` is the last one
    Failed {
        error: SlowscopeError,
        attempts: Vec<ConnectionAttempt>,
    },
}

impl ConnectionResult {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    /// Classification of the failure, `None` when connected.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Connected { .. } => None,
            Self::Failed { error, .. } => Some(error.kind()),
        }
    }

    /// Host actually used, `None` when every attempt failed.
    pub fn host(&self) -> Option<&str> {
        match self {
            Self::Connected { host, .. } => Some(host),
            Self::Failed { .. } => None,
        }
    }

    pub fn role(&self) -> Option<HostRole> {
        match self {
            Self::Connected { role, .. } => Some(*role),
            Self::Failed { .. } => None,
        }
    }

    /// Converts into the connection or the last error.
    pub fn into_result(self) -> Result<SafeConnection> {
        match self {
            Self::Connected { connection, .. } => Ok(connection),
            Self::Failed { error, .. } => Err(error),
        }
    }
}

impl AccessLayer {
    /// Connects to `hostname`, falling back to its standby once.
    ///
    /// Only connection-class failures on the master trigger the standby
    /// attempt; permission, schema and other failures are returned as they
    /// are. The same host is never tried twice.
    pub async fn get_safe_connection(
        &self,
        hostname: &str,
        database: Option<&str>,
    ) -> ConnectionResult {
        let mut attempts = Vec::new();

        let error = match self.open_session(hostname, HostRole::Master, database).await {
            Ok(connection) => return connected(connection),
            Err(error) => error,
        };
        tracing::warn!("Connection to master {} failed: {}", hostname, error);
        attempts.push(attempt(hostname, HostRole::Master, &error));

        if !error.kind().is_connection() {
            return ConnectionResult::Failed { error, attempts };
        }

        let Some(standby) = self.resolve_standby(hostname).await else {
            tracing::warn!("No standby known for {}, giving up", hostname);
            return ConnectionResult::Failed { error, attempts };
        };

        tracing::info!("Falling back from {} to standby {}", hostname, standby);
        match self.open_session(&standby, HostRole::Standby, database).await {
            Ok(connection) => connected(connection),
            Err(error) => {
                tracing::error!("Connection to standby {} failed: {}", standby, error);
                attempts.push(attempt(&standby, HostRole::Standby, &error));
                ConnectionResult::Failed { error, attempts }
            }
        }
    }

    /// Opens and prepares one session without any fallback.
    pub(crate) async fn open_session(
        &self,
        host: &str,
        role: HostRole,
        database: Option<&str>,
    ) -> Result<SafeConnection> {
        let endpoint = &self.config.business;
        let descriptor = ConnectionDescriptor::new(
            role,
            host,
            endpoint.port,
            endpoint.credentials.clone(),
            database.map(str::to_string),
        );
        self.open_descriptor(&descriptor).await
    }

    /// Connects with the connect timeout, prepares the session and registers
    /// it for teardown.
    pub(crate) async fn open_descriptor(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<SafeConnection> {
        let host = descriptor.host();
        let connect_timeout = self.config.connect_timeout;

        // an unreachable host usually shows up as a connect timeout, so it
        // stays connection-class and can fall back
        let mut session =
            match tokio::time::timeout(connect_timeout, self.connector.connect(descriptor)).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(SlowscopeError::connection(
                        host,
                        format!("connect timed out after {} ms", connect_timeout.as_millis()),
                    ));
                }
            };

        if let Err(error) = self.prepare_session(host, session.as_mut()).await {
            if let Err(close_error) = close_session(host, session, connect_timeout).await {
                tracing::debug!("Closing rejected session failed: {}", close_error);
            }
            return Err(error);
        }

        let slot = Arc::new(tokio::sync::Mutex::new(Some(session)));
        {
            let mut open = self.open.lock().unwrap_or_else(PoisonError::into_inner);
            open.retain(|weak| weak.strong_count() > 0);
            open.push(Arc::downgrade(&slot));
        }

        tracing::debug!("Connected to {}", descriptor);
        Ok(SafeConnection {
            host: host.to_string(),
            role: descriptor.role(),
            slot,
            close_timeout: connect_timeout,
        })
    }

    /// Read-only session preparation and the optional load guard.
    async fn prepare_session(&self, host: &str, session: &mut dyn DbSession) -> Result<()> {
        let settings = &self.config.session;
        let timeout = self.config.connect_timeout;

        // must succeed: the session is only used if it cannot write
        run_setup(session, host, timeout, "SET SESSION TRANSACTION READ ONLY").await?;

        let mut optional = vec![
            format!(
                "SET SESSION max_execution_time = {}",
                self.config.statement_timeout.as_millis()
            ),
            format!("SET SESSION sql_select_limit = {}", settings.select_limit),
        ];
        if settings.safe_updates {
            optional.push("SET SESSION sql_safe_updates = 1".to_string());
        }
        if let Some(zone) = &settings.time_zone {
            optional.push(format!("SET time_zone = '{}'", zone.replace('\'', "")));
        }
        for sql in &optional {
            if let Err(error) = run_setup(session, host, timeout, sql).await {
                if error.kind().is_connection() {
                    return Err(error);
                }
                tracing::warn!("Session setting skipped on {} ({}): {}", host, sql, error);
            }
        }

        if let Some(ceiling) = settings.max_active_sessions {
            let rows = match tokio::time::timeout(
                timeout,
                session.fetch_all(
                    "SELECT COUNT(*) AS active_sessions FROM information_schema.processlist \
                     WHERE COMMAND <> 'Sleep'",
                    &[],
                ),
            )
            .await
            {
                Ok(result) => result?,
                Err(_) => {
                    return Err(SlowscopeError::connection(host, "load check timed out"));
                }
            };
            let active = rows
                .first()
                .and_then(|row| row_u64(row, "active_sessions"))
                .unwrap_or(0);
            if active > ceiling {
                return Err(SlowscopeError::connection(
                    host,
                    format!("{} active sessions exceed the limit of {}", active, ceiling),
                ));
            }
            tracing::debug!("{} has {} active sessions", host, active);
        }

        Ok(())
    }
}

async fn run_setup(
    session: &mut dyn DbSession,
    host: &str,
    timeout: Duration,
    sql: &str,
) -> Result<()> {
    match tokio::time::timeout(timeout, session.execute(sql)).await {
        Ok(result) => result,
        Err(_) => Err(SlowscopeError::connection(host, "session setup timed out")),
    }
}

fn connected(connection: SafeConnection) -> ConnectionResult {
    ConnectionResult::Connected {
        host: connection.host.clone(),
        role: connection.role,
        connection,
    }
}

fn attempt(host: &str, role: HostRole, error: &SlowscopeError) -> ConnectionAttempt {
    ConnectionAttempt {
        host: host.to_string(),
        role,
        kind: error.kind(),
        message: error.to_string(),
    }
}
