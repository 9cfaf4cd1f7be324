//! Network boundary of the access layer.
//!
//! [`Connector`] opens one session to one host; [`DbSession`] runs statements
//! on it. The access layer owns retry, fallback, timeout and release policy
//! and only talks to servers through these two traits, so it can be driven
//! by the `sqlx` MySQL implementation or by a scripted stand-in.

use crate::Result;
use crate::models::HostRole;
use crate::security::Credentials;
use async_trait::async_trait;
use serde_json::Value as JsonValue;

/// One result row, column name to value.
pub type Row = serde_json::Map<String, JsonValue>;

/// Value bound to a `?` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
}

impl From<&str> for QueryParam {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for QueryParam {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for QueryParam {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u64> for QueryParam {
    fn from(value: u64) -> Self {
        Self::UInt(value)
    }
}

impl From<f64> for QueryParam {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// Everything needed to open one connection. Immutable once built.
#[derive(Debug, Clone)]
pub struct ConnectionDescriptor {
    role: HostRole,
    host: String,
    port: u16,
    credentials: Credentials,
    database: Option<String>,
}

impl ConnectionDescriptor {
    pub fn new(
        role: HostRole,
        host: impl Into<String>,
        port: u16,
        credentials: Credentials,
        database: Option<String>,
    ) -> Self {
        Self {
            role,
            host: host.into(),
            port,
            credentials,
            database,
        }
    }

    pub fn role(&self) -> HostRole {
        self.role
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }
}

impl std::fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}:{}", self.role, self.host, self.port)?;
        if let Some(database) = &self.database {
            write!(f, "/{}", database)?;
        }
        Ok(())
    }
}

/// Opens sessions. Implementations must classify their failures.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a new session described by `descriptor`.
    ///
    /// Unreachable hosts and refused handshakes are reported as
    /// [`crate::error::ErrorKind::Connection`].
    async fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<Box<dyn DbSession>>;
}

/// One open session to one host.
#[async_trait]
pub trait DbSession: Send {
    /// Runs a statement that returns no rows (session settings).
    async fn execute(&mut self, sql: &str) -> Result<()>;

    /// Runs a query and returns every row.
    async fn fetch_all(&mut self, sql: &str, params: &[QueryParam]) -> Result<Vec<Row>>;

    /// Closes the session gracefully.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Reads a column as text; numbers are rendered.
pub(crate) fn row_str(row: &Row, column: &str) -> Option<String> {
    match row.get(column)? {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Reads a column as an unsigned integer; numeric text is parsed.
pub(crate) fn row_u64(row: &Row, column: &str) -> Option<u64> {
    match row.get(column)? {
        JsonValue::Number(n) => n
            .as_u64()
            .or_else(|| n.as_i64().and_then(|v| u64::try_from(v).ok())),
        JsonValue::String(s) => s.trim().parse().ok(),
        JsonValue::Bool(b) => Some(u64::from(*b)),
        _ => None,
    }
}

/// Reads a column as a float; numeric text is parsed.
pub(crate) fn row_f64(row: &Row, column: &str) -> Option<f64> {
    match row.get(column)? {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
