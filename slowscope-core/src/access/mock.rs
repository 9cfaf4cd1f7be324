//! Scripted connector for access layer tests.

use super::connector::{ConnectionDescriptor, Connector, DbSession, QueryParam, Row};
use crate::error::{ErrorKind, SlowscopeError};
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How a host answers a connect.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ConnectBehavior {
    Accept,
    Refuse,
    Deny,
    Hang,
}

/// How a session answers a statement.
#[derive(Debug, Clone)]
pub(crate) enum Response {
    Rows(Vec<Row>),
    Error(ErrorKind),
    Hang,
    DropConnection,
}

#[derive(Default)]
struct State {
    behaviors: HashMap<String, ConnectBehavior>,
    /// (host or `*`, SQL substring, response), first match wins
    responses: Vec<(String, String, Response)>,
    connect_attempts: Vec<String>,
    executed: Vec<(String, String, Vec<QueryParam>)>,
    opened: usize,
    closes: usize,
}

#[derive(Clone, Default)]
pub(crate) struct MockConnector {
    state: Arc<Mutex<State>>,
}

impl MockConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn host(self, host: &str, behavior: ConnectBehavior) -> Self {
        self.lock().behaviors.insert(host.to_string(), behavior);
        self
    }

    pub(crate) fn respond(self, host: &str, pattern: &str, response: Response) -> Self {
        self.lock()
            .responses
            .push((host.to_string(), pattern.to_string(), response));
        self
    }

    pub(crate) fn connect_attempts(&self) -> Vec<String> {
        self.lock().connect_attempts.clone()
    }

    /// Statements run on `host`, in order.
    pub(crate) fn executed_on(&self, host: &str) -> Vec<String> {
        self.lock()
            .executed
            .iter()
            .filter(|(h, _, _)| h == host)
            .map(|(_, sql, _)| sql.clone())
            .collect()
    }

    pub(crate) fn params_of(&self, pattern: &str) -> Option<Vec<QueryParam>> {
        self.lock()
            .executed
            .iter()
            .find(|(_, sql, _)| sql.contains(pattern))
            .map(|(_, _, params)| params.clone())
    }

    /// Parameters of every statement containing `pattern`, in run order.
    pub(crate) fn all_params_of(&self, pattern: &str) -> Vec<Vec<QueryParam>> {
        self.lock()
            .executed
            .iter()
            .filter(|(_, sql, _)| sql.contains(pattern))
            .map(|(_, _, params)| params.clone())
            .collect()
    }

    pub(crate) fn opened(&self) -> usize {
        self.lock().opened
    }

    pub(crate) fn closes(&self) -> usize {
        self.lock().closes
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<Box<dyn DbSession>> {
        let host = descriptor.host().to_string();
        let behavior = {
            let mut state = self.lock();
            state.connect_attempts.push(host.clone());
            state
                .behaviors
                .get(&host)
                .copied()
                .unwrap_or(ConnectBehavior::Accept)
        };

        match behavior {
            ConnectBehavior::Accept => {
                self.lock().opened += 1;
                Ok(Box::new(MockSession {
                    host,
                    state: Arc::clone(&self.state),
                }))
            }
            ConnectBehavior::Refuse => Err(SlowscopeError::connection(host, "connection refused")),
            ConnectBehavior::Deny => Err(SlowscopeError::permission(format!(
                "access denied for user 'report' on {}",
                host
            ))),
            ConnectBehavior::Hang => std::future::pending().await,
        }
    }
}

struct MockSession {
    host: String,
    state: Arc<Mutex<State>>,
}

impl MockSession {
    fn answer(&self, sql: &str, params: &[QueryParam]) -> Option<Response> {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        state
            .executed
            .push((self.host.clone(), sql.to_string(), params.to_vec()));
        state
            .responses
            .iter()
            .find(|(host, pattern, _)| (host == "*" || *host == self.host) && sql.contains(pattern))
            .map(|(_, _, response)| response.clone())
    }

    async fn run(&self, sql: &str, params: &[QueryParam]) -> Result<Vec<Row>> {
        match self.answer(sql, params) {
            None => Ok(Vec::new()),
            Some(Response::Rows(rows)) => Ok(rows),
            Some(Response::Error(kind)) => Err(error_of(kind, &self.host)),
            Some(Response::Hang) => std::future::pending().await,
            Some(Response::DropConnection) => Err(SlowscopeError::connection(
                &self.host,
                "Lost connection to MySQL server during query",
            )),
        }
    }
}

#[async_trait]
impl DbSession for MockSession {
    async fn execute(&mut self, sql: &str) -> Result<()> {
        self.run(sql, &[]).await.map(|_| ())
    }

    async fn fetch_all(&mut self, sql: &str, params: &[QueryParam]) -> Result<Vec<Row>> {
        self.run(sql, params).await
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .closes += 1;
        Ok(())
    }
}

fn error_of(kind: ErrorKind, host: &str) -> SlowscopeError {
    match kind {
        ErrorKind::ParseAmbiguous => SlowscopeError::parse_ambiguous("scripted"),
        ErrorKind::Connection => SlowscopeError::connection(host, "MySQL server has gone away"),
        ErrorKind::Timeout => SlowscopeError::timeout("scripted", Duration::from_secs(1)),
        ErrorKind::Permission => SlowscopeError::permission("SELECT command denied"),
        ErrorKind::Syntax => SlowscopeError::syntax("You have an error in your SQL syntax"),
        ErrorKind::SchemaNotFound => SlowscopeError::schema_not_found("scripted"),
        ErrorKind::MaskingCollision => SlowscopeError::masking_collision("scripted"),
        ErrorKind::Configuration => SlowscopeError::configuration("scripted"),
    }
}

/// Builds a row from a JSON object literal.
pub(crate) fn row(value: serde_json::Value) -> Row {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Row::new(),
    }
}
