//! Queries and the query bus.
//!
//! Queries are the read-only counterpart of commands: they return a snapshot
//! and never mutate handler state. The SDK exposes two — the status snapshot
//! and a health probe.

use crate::config::{Protocol, SignalKind};
use crate::error::TelemetryError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A telemetry query, stamped at creation.
#[derive(Debug, Clone)]
pub struct Query {
    /// When the query was created.
    pub issued_at: DateTime<Utc>,
    /// The query payload.
    pub body: QueryBody,
}

/// The payload of a [`Query`].
#[non_exhaustive]
#[derive(Debug, Clone)]
pub enum QueryBody {
    /// Fetch the SDK status snapshot.
    SdkStatus,
    /// Probe the health of the telemetry pipelines.
    Health,
}

/// Discriminant of a [`Query`], used as the dispatch key.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    /// `SdkStatus`.
    SdkStatus,
    /// `Health`.
    Health,
}

impl QueryKind {
    /// Every query kind, for bulk handler registration.
    pub const ALL: [QueryKind; 2] = [QueryKind::SdkStatus, QueryKind::Health];

    /// Returns the query kind name.
    pub fn as_str(self) -> &'static str {
        match self {
            QueryKind::SdkStatus => "SdkStatus",
            QueryKind::Health => "Health",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Query {
    fn now(body: QueryBody) -> Self {
        Self {
            issued_at: Utc::now(),
            body,
        }
    }

    /// Creates an `SdkStatus` query.
    pub fn sdk_status() -> Self {
        Self::now(QueryBody::SdkStatus)
    }

    /// Creates a `Health` query.
    pub fn health() -> Self {
        Self::now(QueryBody::Health)
    }

    /// Returns the dispatch key for this query.
    pub fn kind(&self) -> QueryKind {
        match self.body {
            QueryBody::SdkStatus => QueryKind::SdkStatus,
            QueryBody::Health => QueryKind::Health,
        }
    }
}

/// Read-only snapshot of the SDK state.
///
/// The one structured output the core produces for external inspection;
/// valid in every lifecycle state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SdkStatus {
    /// Whether the SDK is currently initialized.
    pub initialized: bool,
    /// SDK version string.
    pub version: String,
    /// Configured service name.
    pub service_name: String,
    /// Configured collector endpoint.
    pub endpoint: String,
    /// Configured transport protocol.
    pub protocol: Protocol,
    /// The enabled signals.
    pub signals_enabled: Vec<SignalKind>,
    /// Time since initialization, when initialized.
    pub uptime: Option<Duration>,
    /// Number of metric measurements recorded.
    pub metrics_sent: u64,
    /// Number of log records emitted.
    pub logs_sent: u64,
    /// Number of spans completed.
    pub spans_sent: u64,
}

/// Health status of a component or the SDK as a whole.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Everything operational.
    Healthy,
    /// Partially operational (e.g. shutting down).
    Degraded,
    /// Not operational.
    Unhealthy,
}

/// Result of a health probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    /// Overall status.
    pub status: HealthStatus,
    /// Human-readable summary.
    pub message: String,
    /// Per-signal component status.
    pub components: HashMap<String, HealthStatus>,
    /// When the probe ran.
    pub checked_at: DateTime<Utc>,
}

/// The result a handler returns for a query.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    /// Status snapshot.
    Status(SdkStatus),
    /// Health report.
    Health(HealthReport),
}

impl QueryOutput {
    /// Extracts the status snapshot.
    pub fn into_status(self) -> Option<SdkStatus> {
        match self {
            QueryOutput::Status(status) => Some(status),
            _ => None,
        }
    }

    /// Extracts the health report.
    pub fn into_health(self) -> Option<HealthReport> {
        match self {
            QueryOutput::Health(report) => Some(report),
            _ => None,
        }
    }
}

/// A registered query handler.
pub trait HandleQuery: Send + Sync {
    /// Handles one query, returning its result.
    fn handle(&self, query: Query) -> Result<QueryOutput, TelemetryError>;
}

/// Routes queries to their registered handlers by [`QueryKind`].
pub struct QueryBus {
    handlers: HashMap<QueryKind, Arc<dyn HandleQuery>>,
}

impl QueryBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers a handler for one query kind, replacing any previous one.
    pub fn register(&mut self, kind: QueryKind, handler: Arc<dyn HandleQuery>) {
        self.handlers.insert(kind, handler);
    }

    /// Registers a handler for every query kind.
    pub fn register_all(&mut self, handler: Arc<dyn HandleQuery>) {
        for kind in QueryKind::ALL {
            self.register(kind, Arc::clone(&handler));
        }
    }

    /// Dispatches a query to its handler.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::UnhandledQuery`] for unregistered kinds.
    pub fn dispatch(&self, query: Query) -> Result<QueryOutput, TelemetryError> {
        let kind = query.kind();
        match self.handlers.get(&kind) {
            Some(handler) => handler.handle(query),
            None => Err(TelemetryError::UnhandledQuery { kind }),
        }
    }
}

impl Default for QueryBus {
    fn default() -> Self {
        Self::new()
    }
}
