//! Commands and the command bus.
//!
//! Every operation against the SDK is expressed as a [`Command`]: an
//! immutable, short-lived value naming an intent plus the minimal payload it
//! needs. Commands are routed by [`CommandBus::dispatch`] to exactly one
//! registered handler; dispatch is synchronous and returns only after the
//! handler has run. There is no queuing or reordering at this layer.

use crate::error::TelemetryError;
use chrono::{DateTime, Utc};
use opentelemetry::KeyValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Default timeout applied to shutdown and flush when none is given.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Log severity level.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Finest-grained diagnostic detail.
    Trace,
    /// Debugging information.
    Debug,
    /// Normal operational messages.
    #[default]
    Info,
    /// Something unexpected but recoverable.
    Warn,
    /// An operation failed.
    Error,
    /// The application cannot continue.
    Fatal,
}

impl Severity {
    /// Returns the uppercase severity text for log records.
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }

    /// Converts to the OpenTelemetry severity number.
    pub fn to_otel(self) -> opentelemetry::logs::Severity {
        match self {
            Severity::Trace => opentelemetry::logs::Severity::Trace,
            Severity::Debug => opentelemetry::logs::Severity::Debug,
            Severity::Info => opentelemetry::logs::Severity::Info,
            Severity::Warn => opentelemetry::logs::Severity::Warn,
            Severity::Error => opentelemetry::logs::Severity::Error,
            Severity::Fatal => opentelemetry::logs::Severity::Fatal,
        }
    }
}

/// Span kind for traces.
///
/// `Internal` is the default; the other kinds mark cross-process roles.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpanKind {
    /// Work internal to the service.
    #[default]
    Internal,
    /// Handling an incoming request.
    Server,
    /// Issuing an outgoing request.
    Client,
    /// Publishing a message.
    Producer,
    /// Consuming a message.
    Consumer,
}

impl SpanKind {
    /// Converts to the OpenTelemetry span kind.
    pub fn to_otel(self) -> opentelemetry::trace::SpanKind {
        match self {
            SpanKind::Internal => opentelemetry::trace::SpanKind::Internal,
            SpanKind::Server => opentelemetry::trace::SpanKind::Server,
            SpanKind::Client => opentelemetry::trace::SpanKind::Client,
            SpanKind::Producer => opentelemetry::trace::SpanKind::Producer,
            SpanKind::Consumer => opentelemetry::trace::SpanKind::Consumer,
        }
    }
}

/// Opaque identifier for an active span.
///
/// Returned by `StartSpan` and valid until the matching `EndSpan`. Using a
/// stale or unknown id fails with
/// [`TelemetryError::SpanNotFound`](crate::TelemetryError::SpanNotFound).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpanId(String);

impl SpanId {
    /// Generates a fresh unique span id.
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SpanId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Failure details attached to a span that ended in error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanError {
    /// The error kind, recorded as `exception.type`.
    pub kind: String,
    /// The error message, recorded as `exception.message`.
    pub message: String,
}

impl SpanError {
    /// Creates failure details from a kind and message.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Captures kind and message from a standard error value.
    pub fn from_error<E: std::error::Error + ?Sized>(error: &E) -> Self {
        Self {
            kind: std::any::type_name::<E>().to_owned(),
            message: error.to_string(),
        }
    }

    /// Failure details for a panic unwinding through a span scope.
    pub(crate) fn panicked() -> Self {
        Self {
            kind: "panic".to_owned(),
            message: "span scope exited via panic".to_owned(),
        }
    }
}

impl fmt::Display for SpanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// A telemetry command: an intent plus its payload, stamped at creation.
#[derive(Debug, Clone)]
pub struct Command {
    /// When the command was created.
    pub issued_at: DateTime<Utc>,
    /// The intent and payload.
    pub body: CommandBody,
}

/// The payload of a [`Command`].
#[non_exhaustive]
#[derive(Debug, Clone)]
pub enum CommandBody {
    /// Initialize the SDK, building providers through the exporter factory.
    Initialize,
    /// Shut down the SDK, flushing within the timeout.
    Shutdown {
        /// Maximum time to spend draining and flushing.
        timeout: Duration,
    },
    /// Force-flush all pending telemetry within the timeout.
    Flush {
        /// Maximum time to spend flushing.
        timeout: Duration,
    },
    /// Record a generic metric value (recorded as a gauge).
    RecordMetric {
        /// Metric name.
        name: String,
        /// Observed value.
        value: f64,
        /// Unit of measurement (may be empty).
        unit: String,
        /// Measurement attributes.
        attributes: Vec<KeyValue>,
    },
    /// Increment a counter.
    RecordCounter {
        /// Counter name.
        name: String,
        /// Increment amount.
        value: u64,
        /// Measurement attributes.
        attributes: Vec<KeyValue>,
    },
    /// Record a gauge value.
    RecordGauge {
        /// Gauge name.
        name: String,
        /// Current value.
        value: f64,
        /// Measurement attributes.
        attributes: Vec<KeyValue>,
    },
    /// Record a histogram observation.
    RecordHistogram {
        /// Histogram name.
        name: String,
        /// Observed value.
        value: f64,
        /// Unit of measurement (may be empty).
        unit: String,
        /// Measurement attributes.
        attributes: Vec<KeyValue>,
    },
    /// Emit a log record.
    EmitLog {
        /// Log message body.
        message: String,
        /// Severity level.
        severity: Severity,
        /// Log attributes.
        attributes: Vec<KeyValue>,
    },
    /// Emit multiple log records.
    EmitBatchLogs {
        /// The log entries, applied in order.
        logs: Vec<LogEntry>,
    },
    /// Start a span and register it in the active-span registry.
    StartSpan {
        /// Span name.
        name: String,
        /// Span kind.
        kind: SpanKind,
        /// Initial span attributes.
        attributes: Vec<KeyValue>,
    },
    /// End a registered span, optionally marking it failed.
    EndSpan {
        /// The id returned by `StartSpan`.
        span_id: SpanId,
        /// Failure details, when the spanned work errored.
        error: Option<SpanError>,
    },
    /// Attach a timestamped event to a registered span.
    AddSpanEvent {
        /// The id returned by `StartSpan`.
        span_id: SpanId,
        /// Event name.
        name: String,
        /// Event attributes.
        attributes: Vec<KeyValue>,
    },
}

/// One entry of an `EmitBatchLogs` command.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Log message body.
    pub message: String,
    /// Severity level.
    pub severity: Severity,
    /// Log attributes.
    pub attributes: Vec<KeyValue>,
}

/// Discriminant of a [`Command`], used as the dispatch key.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// `Initialize`.
    Initialize,
    /// `Shutdown`.
    Shutdown,
    /// `Flush`.
    Flush,
    /// `RecordMetric`.
    RecordMetric,
    /// `RecordCounter`.
    RecordCounter,
    /// `RecordGauge`.
    RecordGauge,
    /// `RecordHistogram`.
    RecordHistogram,
    /// `EmitLog`.
    EmitLog,
    /// `EmitBatchLogs`.
    EmitBatchLogs,
    /// `StartSpan`.
    StartSpan,
    /// `EndSpan`.
    EndSpan,
    /// `AddSpanEvent`.
    AddSpanEvent,
}

impl CommandKind {
    /// Every command kind, for bulk handler registration.
    pub const ALL: [CommandKind; 12] = [
        CommandKind::Initialize,
        CommandKind::Shutdown,
        CommandKind::Flush,
        CommandKind::RecordMetric,
        CommandKind::RecordCounter,
        CommandKind::RecordGauge,
        CommandKind::RecordHistogram,
        CommandKind::EmitLog,
        CommandKind::EmitBatchLogs,
        CommandKind::StartSpan,
        CommandKind::EndSpan,
        CommandKind::AddSpanEvent,
    ];

    /// Returns the command kind name.
    pub fn as_str(self) -> &'static str {
        match self {
            CommandKind::Initialize => "Initialize",
            CommandKind::Shutdown => "Shutdown",
            CommandKind::Flush => "Flush",
            CommandKind::RecordMetric => "RecordMetric",
            CommandKind::RecordCounter => "RecordCounter",
            CommandKind::RecordGauge => "RecordGauge",
            CommandKind::RecordHistogram => "RecordHistogram",
            CommandKind::EmitLog => "EmitLog",
            CommandKind::EmitBatchLogs => "EmitBatchLogs",
            CommandKind::StartSpan => "StartSpan",
            CommandKind::EndSpan => "EndSpan",
            CommandKind::AddSpanEvent => "AddSpanEvent",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Command {
    fn now(body: CommandBody) -> Self {
        Self {
            issued_at: Utc::now(),
            body,
        }
    }

    /// Creates an `Initialize` command.
    pub fn initialize() -> Self {
        Self::now(CommandBody::Initialize)
    }

    /// Creates a `Shutdown` command with the given drain timeout.
    pub fn shutdown(timeout: Duration) -> Self {
        Self::now(CommandBody::Shutdown { timeout })
    }

    /// Creates a `Flush` command with the given timeout.
    pub fn flush(timeout: Duration) -> Self {
        Self::now(CommandBody::Flush { timeout })
    }

    /// Creates a `RecordMetric` command.
    pub fn record_metric(
        name: impl Into<String>,
        value: f64,
        unit: impl Into<String>,
        attributes: Vec<KeyValue>,
    ) -> Self {
        Self::now(CommandBody::RecordMetric {
            name: name.into(),
            value,
            unit: unit.into(),
            attributes,
        })
    }

    /// Creates a `RecordCounter` command.
    pub fn record_counter(name: impl Into<String>, value: u64, attributes: Vec<KeyValue>) -> Self {
        Self::now(CommandBody::RecordCounter {
            name: name.into(),
            value,
            attributes,
        })
    }

    /// Creates a `RecordCounter` command with the default increment of 1.
    pub fn increment_counter(name: impl Into<String>) -> Self {
        Self::record_counter(name, 1, Vec::new())
    }

    /// Creates a `RecordGauge` command.
    pub fn record_gauge(name: impl Into<String>, value: f64, attributes: Vec<KeyValue>) -> Self {
        Self::now(CommandBody::RecordGauge {
            name: name.into(),
            value,
            attributes,
        })
    }

    /// Creates a `RecordHistogram` command.
    pub fn record_histogram(
        name: impl Into<String>,
        value: f64,
        unit: impl Into<String>,
        attributes: Vec<KeyValue>,
    ) -> Self {
        Self::now(CommandBody::RecordHistogram {
            name: name.into(),
            value,
            unit: unit.into(),
            attributes,
        })
    }

    /// Creates an `EmitLog` command.
    pub fn emit_log(
        message: impl Into<String>,
        severity: Severity,
        attributes: Vec<KeyValue>,
    ) -> Self {
        Self::now(CommandBody::EmitLog {
            message: message.into(),
            severity,
            attributes,
        })
    }

    /// Creates an `EmitBatchLogs` command.
    pub fn emit_batch_logs(logs: Vec<LogEntry>) -> Self {
        Self::now(CommandBody::EmitBatchLogs { logs })
    }

    /// Creates a `StartSpan` command.
    pub fn start_span(
        name: impl Into<String>,
        kind: SpanKind,
        attributes: Vec<KeyValue>,
    ) -> Self {
        Self::now(CommandBody::StartSpan {
            name: name.into(),
            kind,
            attributes,
        })
    }

    /// Creates an `EndSpan` command.
    pub fn end_span(span_id: SpanId, error: Option<SpanError>) -> Self {
        Self::now(CommandBody::EndSpan { span_id, error })
    }

    /// Creates an `AddSpanEvent` command.
    pub fn add_span_event(
        span_id: SpanId,
        name: impl Into<String>,
        attributes: Vec<KeyValue>,
    ) -> Self {
        Self::now(CommandBody::AddSpanEvent {
            span_id,
            name: name.into(),
            attributes,
        })
    }

    /// Returns the dispatch key for this command.
    pub fn kind(&self) -> CommandKind {
        match &self.body {
            CommandBody::Initialize => CommandKind::Initialize,
            CommandBody::Shutdown { .. } => CommandKind::Shutdown,
            CommandBody::Flush { .. } => CommandKind::Flush,
            CommandBody::RecordMetric { .. } => CommandKind::RecordMetric,
            CommandBody::RecordCounter { .. } => CommandKind::RecordCounter,
            CommandBody::RecordGauge { .. } => CommandKind::RecordGauge,
            CommandBody::RecordHistogram { .. } => CommandKind::RecordHistogram,
            CommandBody::EmitLog { .. } => CommandKind::EmitLog,
            CommandBody::EmitBatchLogs { .. } => CommandKind::EmitBatchLogs,
            CommandBody::StartSpan { .. } => CommandKind::StartSpan,
            CommandBody::EndSpan { .. } => CommandKind::EndSpan,
            CommandBody::AddSpanEvent { .. } => CommandKind::AddSpanEvent,
        }
    }
}

/// The result a handler returns for a command.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutput {
    /// The command completed with nothing to report.
    Ack,
    /// A span was started.
    SpanStarted(SpanId),
    /// A flush (or shutdown flush) completed, possibly partially.
    Flushed(crate::exporter::FlushSummary),
}

impl CommandOutput {
    /// Extracts the span id from a `SpanStarted` output.
    pub fn into_span_id(self) -> Option<SpanId> {
        match self {
            CommandOutput::SpanStarted(id) => Some(id),
            _ => None,
        }
    }

    /// Extracts the flush summary from a `Flushed` output.
    pub fn into_flush_summary(self) -> Option<crate::exporter::FlushSummary> {
        match self {
            CommandOutput::Flushed(summary) => Some(summary),
            _ => None,
        }
    }
}

/// A registered command handler.
pub trait HandleCommand: Send + Sync {
    /// Handles one command, returning its output or the error it surfaced.
    fn handle(&self, command: Command) -> Result<CommandOutput, TelemetryError>;
}

/// Routes commands to their registered handlers by [`CommandKind`].
///
/// Dispatching a kind with no registered handler is a programmer error and
/// fails with [`TelemetryError::UnhandledCommand`], never a silent no-op.
pub struct CommandBus {
    handlers: HashMap<CommandKind, Arc<dyn HandleCommand>>,
}

impl CommandBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers a handler for one command kind, replacing any previous one.
    pub fn register(&mut self, kind: CommandKind, handler: Arc<dyn HandleCommand>) {
        self.handlers.insert(kind, handler);
    }

    /// Registers a handler for every command kind.
    pub fn register_all(&mut self, handler: Arc<dyn HandleCommand>) {
        for kind in CommandKind::ALL {
            self.register(kind, Arc::clone(&handler));
        }
    }

    /// Dispatches a command to its handler.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::UnhandledCommand`] for unregistered kinds,
    /// or whatever error the handler reports.
    pub fn dispatch(&self, command: Command) -> Result<CommandOutput, TelemetryError> {
        let kind = command.kind();
        match self.handlers.get(&kind) {
            Some(handler) => handler.handle(command),
            None => Err(TelemetryError::UnhandledCommand { kind }),
        }
    }
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}
