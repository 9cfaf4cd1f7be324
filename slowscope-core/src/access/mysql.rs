//! MySQL connector on `sqlx`.
//!
//! # Security Features
//! - Passwords go straight from [`Credentials`] into the handshake
//! - Driver errors are classified by MySQL error number and never carry
//!   credentials
//!
//! [`Credentials`]: crate::security::Credentials

use super::connector::{ConnectionDescriptor, Connector, DbSession, QueryParam, Row};
use crate::Result;
use crate::error::{ErrorKind, SlowscopeError};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlColumn, MySqlConnectOptions, MySqlConnection, MySqlDatabaseError, MySqlRow};
use sqlx::{ConnectOptions, Connection, Executor, TypeInfo};

/// Production [`Connector`] opening one `MySqlConnection` per session.
#[derive(Debug, Clone, Default)]
pub struct MySqlConnector;

impl MySqlConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    async fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<Box<dyn DbSession>> {
        let credentials = descriptor.credentials();
        let mut options = MySqlConnectOptions::new()
            .host(descriptor.host())
            .port(descriptor.port())
            .username(credentials.username())
            .charset("utf8mb4");
        if let Some(password) = credentials.password() {
            options = options.password(password);
        }
        if let Some(database) = descriptor.database() {
            options = options.database(database);
        }

        tracing::debug!("Connecting to {}", descriptor);
        let conn = options
            .connect()
            .await
            .map_err(|e| classify_sqlx_error(descriptor.host(), "connect", e))?;

        Ok(Box::new(MySqlSession {
            conn,
            host: descriptor.host().to_string(),
        }))
    }
}

struct MySqlSession {
    conn: MySqlConnection,
    host: String,
}

#[async_trait]
impl DbSession for MySqlSession {
    async fn execute(&mut self, sql: &str) -> Result<()> {
        self.conn
            .execute(sql)
            .await
            .map_err(|e| classify_sqlx_error(&self.host, "execute", e))?;
        Ok(())
    }

    async fn fetch_all(&mut self, sql: &str, params: &[QueryParam]) -> Result<Vec<Row>> {
        let result = if params.is_empty() {
            // text protocol, works for SHOW and EXPLAIN on every server version
            self.conn.fetch_all(sql).await
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = match param {
                    QueryParam::Null => query.bind(None::<String>),
                    QueryParam::Int(v) => query.bind(*v),
                    QueryParam::UInt(v) => query.bind(*v),
                    QueryParam::Float(v) => query.bind(*v),
                    QueryParam::Text(v) => query.bind(v.clone()),
                };
            }
            query.fetch_all(&mut self.conn).await
        };
        let rows = result.map_err(|e| classify_sqlx_error(&self.host, "query", e))?;

        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let host = self.host;
        self.conn
            .close()
            .await
            .map_err(|e| classify_sqlx_error(&host, "close", e))
    }
}

/// Maps a driver error onto the error taxonomy.
pub(crate) fn classify_sqlx_error(host: &str, context: &str, error: sqlx::Error) -> SlowscopeError {
    let kind = match &error {
        sqlx::Error::Database(db_err) => db_err
            .try_downcast_ref::<MySqlDatabaseError>()
            .map_or(ErrorKind::Syntax, |e| ErrorKind::from_mysql_code(e.number())),
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => ErrorKind::Connection,
        sqlx::Error::Configuration(_) => ErrorKind::Configuration,
        _ => ErrorKind::Syntax,
    };
    SlowscopeError::classified(kind, host, format!("{} on {}", context, host), error)
}

/// Convert a database row to a JSON object.
fn row_to_json(row: &MySqlRow) -> Row {
    use sqlx::{Column, Row as _};

    let mut map = Row::new();
    for column in row.columns() {
        let column_name = column.name();
        map.insert(column_name.to_string(), extract_column_value(row, column));
    }
    map
}

/// Whether a column type is decoded from its text form.
///
/// DECIMAL travels as text on both protocols and would lose precision as a
/// float.
fn is_decimal_type(type_name: &str) -> bool {
    type_name.eq_ignore_ascii_case("DECIMAL")
}

/// Extract a column value as a JSON value.
fn extract_column_value(row: &MySqlRow, column: &MySqlColumn) -> JsonValue {
    use sqlx::{Column, Row as _};

    let column_name = column.name();
    let type_name = column.type_info().name();
    if is_decimal_type(type_name) {
        return match row.try_get_unchecked::<Option<String>, _>(column_name) {
            Ok(v) => v.map(JsonValue::String).unwrap_or(JsonValue::Null),
            Err(e) => {
                tracing::debug!("Could not decode {} column {}: {}", type_name, column_name, e);
                JsonValue::Null
            }
        };
    }

    // Try different types in order of likelihood
    if let Ok(v) = row.try_get::<Option<String>, _>(column_name) {
        return v.map(JsonValue::String).unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(column_name) {
        return v
            .map(|n| JsonValue::Number(n.into()))
            .unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<u64>, _>(column_name) {
        return v
            .map(|n| JsonValue::Number(n.into()))
            .unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(column_name) {
        return v
            .and_then(serde_json::Number::from_f64)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(column_name) {
        return v
            .map(|ts| JsonValue::String(ts.to_string()))
            .unwrap_or(JsonValue::Null);
    }
    // INFORMATION_SCHEMA returns VARBINARY for some names on MySQL 8.0+
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(column_name) {
        return v
            .map(|bytes| JsonValue::String(String::from_utf8_lossy(&bytes).into_owned()))
            .unwrap_or(JsonValue::Null);
    }

    tracing::debug!(
        "Column {} has unsupported type {}, reading it as NULL",
        column_name,
        type_name
    );
    JsonValue::Null
}
