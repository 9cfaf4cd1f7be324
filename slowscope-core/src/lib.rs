//! Core of slowscope, a slow-query workload inspector for MySQL.
//!
//! The crate turns raw SQL samples into the tables and columns they touch,
//! looks up the indexes those tables already have on a live server, and
//! masks every identifier and literal before anything leaves the process.
//!
//! # Safety Guarantees
//! - Every session is `READ ONLY` and every statement is checked before it
//!   is sent
//! - Passwords live in `Zeroizing` containers and never reach logs or errors
//! - Connections are released on success, error and timeout alike
//!
//! # Architecture
//! - [`analyzer`]: pure text analysis, no I/O
//! - [`access`]: connection lifecycle, standby fallback, introspection,
//!   plans and slow-log reads behind a `Connector` trait
//! - [`masking`]: run-scoped deterministic masking
//! - [`inspect`]: drives the three per statement and collects per-item
//!   results

pub mod access;
pub mod analyzer;
pub mod error;
pub mod inspect;
pub mod logging;
pub mod masking;
pub mod models;
pub mod security;

// Re-export commonly used types
pub use access::{
    AccessConfig, AccessLayer, ConnectionResult, DatabaseEndpoint, HostScope, MonthSummary,
    SafeConnection, SlowLogEndpoint, SlowQueryComparison, SlowQueryFilter, StandbyTopology,
};
pub use analyzer::analyze;
pub use error::{ErrorKind, Result, SlowscopeError};
pub use inspect::{AnalysisError, Inspector, TableAnalysis};
pub use masking::MaskingSession;
pub use models::{
    ExplainPlan, ExplainRow, FieldRef, FieldUsage, HostRole, IndexColumn, SchemaIndex,
    SlowQueryRecord, SortDirection, StatementShape,
};
