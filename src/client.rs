//! The TelemetryFlow client façade.
//!
//! [`TelemetryClient`] is the public surface of the SDK: its convenience
//! methods build the corresponding [`Command`] and dispatch it through the
//! command bus to the handler. The client is the explicit context object to
//! pass to collaborators — there is no process-wide singleton.
//!
//! Every operation other than `initialize`, `is_initialized`, `status`, and
//! `health` requires the client to be initialized and surfaces
//! [`TelemetryError::NotInitialized`] otherwise.

use crate::command::{
    Command, CommandBus, DEFAULT_SHUTDOWN_TIMEOUT, HandleCommand, LogEntry, Severity, SpanError,
    SpanId, SpanKind,
};
use crate::config::TelemetryConfig;
use crate::error::TelemetryError;
use crate::exporter::{ExporterFactory, FlushSummary};
use crate::handler::TelemetryCommandHandler;
use crate::query::{HandleQuery, HealthReport, Query, QueryBus, SdkStatus};
use opentelemetry::KeyValue;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Main TelemetryFlow SDK client.
///
/// Wraps one [`TelemetryCommandHandler`] and exposes the recording surface.
/// Cheap to share: wrap it in an `Arc` and hand clones of the `Arc` to
/// whatever needs to record telemetry.
///
/// # Example
///
/// ```no_run
/// use telemetryflow::TelemetryBuilder;
///
/// let client = TelemetryBuilder::new()
///     .with_api_key("tfk_xxx", "tfs_xxx")
///     .with_endpoint("api.telemetryflow.id:4317")
///     .with_service("my-service", None)
///     .build_client()
///     .unwrap();
///
/// client.initialize().unwrap();
/// client.increment_counter("requests.total").unwrap();
/// client.shutdown().unwrap();
/// ```
pub struct TelemetryClient {
    config: TelemetryConfig,
    handler: Arc<TelemetryCommandHandler>,
    commands: CommandBus,
    queries: QueryBus,
}

impl TelemetryClient {
    /// Creates a client exporting over OTLP.
    pub fn new(config: TelemetryConfig) -> Self {
        Self::from_handler(
            config.clone(),
            Arc::new(TelemetryCommandHandler::new(config)),
        )
    }

    /// Creates a client with a custom exporter factory.
    ///
    /// Intended for tests and embedders that provide their own transport.
    pub fn with_factory(config: TelemetryConfig, factory: Box<dyn ExporterFactory>) -> Self {
        Self::from_handler(
            config.clone(),
            Arc::new(TelemetryCommandHandler::with_factory(config, factory)),
        )
    }

    fn from_handler(config: TelemetryConfig, handler: Arc<TelemetryCommandHandler>) -> Self {
        let mut commands = CommandBus::new();
        commands.register_all(Arc::clone(&handler) as Arc<dyn HandleCommand>);
        let mut queries = QueryBus::new();
        queries.register_all(Arc::clone(&handler) as Arc<dyn HandleQuery>);

        Self {
            config,
            handler,
            commands,
            queries,
        }
    }

    /// Returns the client's configuration.
    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    // Lifecycle.

    /// Initializes the SDK and connects the signal pipelines.
    ///
    /// Must be called before recording any telemetry.
    ///
    /// # Errors
    ///
    /// Fails with [`TelemetryError::AlreadyInitialized`] on a second call,
    /// or with the exporter construction error that aborted initialization
    /// (in which case the client stays uninitialized).
    pub fn initialize(&self) -> Result<(), TelemetryError> {
        self.commands.dispatch(Command::initialize()).map(|_| ())
    }

    /// Shuts down the SDK with the default timeout, flushing pending data.
    ///
    /// Idempotent: a second call is a safe no-op.
    ///
    /// # Errors
    ///
    /// Shutdown itself always completes; the returned summary reports any
    /// partial flush. Errors only surface for dispatch misconfiguration.
    pub fn shutdown(&self) -> Result<FlushSummary, TelemetryError> {
        self.shutdown_with_timeout(DEFAULT_SHUTDOWN_TIMEOUT)
    }

    /// Shuts down the SDK, bounding the drain/flush by `timeout`.
    ///
    /// # Errors
    ///
    /// Same as [`shutdown`](Self::shutdown).
    pub fn shutdown_with_timeout(&self, timeout: Duration) -> Result<FlushSummary, TelemetryError> {
        let output = self.commands.dispatch(Command::shutdown(timeout))?;
        Ok(output.into_flush_summary().unwrap_or(FlushSummary::complete()))
    }

    /// Force-flushes all pending telemetry with the default timeout.
    ///
    /// # Errors
    ///
    /// Fails with [`TelemetryError::NotInitialized`] outside the
    /// initialized state.
    pub fn flush(&self) -> Result<FlushSummary, TelemetryError> {
        self.flush_with_timeout(DEFAULT_SHUTDOWN_TIMEOUT)
    }

    /// Force-flushes all pending telemetry, bounded by `timeout`.
    ///
    /// On timeout the summary marks the pipelines that were skipped instead
    /// of blocking indefinitely.
    ///
    /// # Errors
    ///
    /// Fails with [`TelemetryError::NotInitialized`] outside the
    /// initialized state.
    pub fn flush_with_timeout(&self, timeout: Duration) -> Result<FlushSummary, TelemetryError> {
        let output = self.commands.dispatch(Command::flush(timeout))?;
        Ok(output.into_flush_summary().unwrap_or(FlushSummary::complete()))
    }

    /// Whether the client is currently initialized.
    pub fn is_initialized(&self) -> bool {
        self.handler.is_initialized()
    }

    /// Initializes the client and returns a guard that shuts it down when
    /// dropped, on any exit path.
    ///
    /// # Errors
    ///
    /// Same as [`initialize`](Self::initialize).
    pub fn into_guard(self) -> Result<TelemetryGuard, TelemetryError> {
        self.initialize()?;
        Ok(TelemetryGuard { client: self })
    }

    // Metrics API.

    /// Increments a counter by 1.
    ///
    /// # Errors
    ///
    /// Fails with [`TelemetryError::NotInitialized`] outside the
    /// initialized state.
    pub fn increment_counter(&self, name: impl Into<String>) -> Result<(), TelemetryError> {
        self.commands
            .dispatch(Command::increment_counter(name))
            .map(|_| ())
    }

    /// Adds `value` to a counter.
    ///
    /// # Errors
    ///
    /// Fails with [`TelemetryError::NotInitialized`] outside the
    /// initialized state.
    pub fn record_counter(
        &self,
        name: impl Into<String>,
        value: u64,
        attributes: Vec<KeyValue>,
    ) -> Result<(), TelemetryError> {
        self.commands
            .dispatch(Command::record_counter(name, value, attributes))
            .map(|_| ())
    }

    /// Records a gauge value.
    ///
    /// # Errors
    ///
    /// Fails with [`TelemetryError::NotInitialized`] outside the
    /// initialized state.
    pub fn record_gauge(
        &self,
        name: impl Into<String>,
        value: f64,
        attributes: Vec<KeyValue>,
    ) -> Result<(), TelemetryError> {
        self.commands
            .dispatch(Command::record_gauge(name, value, attributes))
            .map(|_| ())
    }

    /// Records a histogram observation. The unit may be empty.
    ///
    /// # Errors
    ///
    /// Fails with [`TelemetryError::NotInitialized`] outside the
    /// initialized state.
    pub fn record_histogram(
        &self,
        name: impl Into<String>,
        value: f64,
        unit: impl Into<String>,
        attributes: Vec<KeyValue>,
    ) -> Result<(), TelemetryError> {
        self.commands
            .dispatch(Command::record_histogram(name, value, unit, attributes))
            .map(|_| ())
    }

    /// Records a generic metric value (as a gauge).
    ///
    /// # Errors
    ///
    /// Fails with [`TelemetryError::NotInitialized`] outside the
    /// initialized state.
    pub fn record_metric(
        &self,
        name: impl Into<String>,
        value: f64,
        unit: impl Into<String>,
        attributes: Vec<KeyValue>,
    ) -> Result<(), TelemetryError> {
        self.commands
            .dispatch(Command::record_metric(name, value, unit, attributes))
            .map(|_| ())
    }

    // Logs API.

    /// Emits a log record.
    ///
    /// # Errors
    ///
    /// Fails with [`TelemetryError::NotInitialized`] outside the
    /// initialized state.
    pub fn log(
        &self,
        message: impl Into<String>,
        severity: Severity,
        attributes: Vec<KeyValue>,
    ) -> Result<(), TelemetryError> {
        self.commands
            .dispatch(Command::emit_log(message, severity, attributes))
            .map(|_| ())
    }

    /// Emits a debug-level log record.
    ///
    /// # Errors
    ///
    /// Fails with [`TelemetryError::NotInitialized`] outside the
    /// initialized state.
    pub fn log_debug(&self, message: impl Into<String>) -> Result<(), TelemetryError> {
        self.log(message, Severity::Debug, Vec::new())
    }

    /// Emits an info-level log record.
    ///
    /// # Errors
    ///
    /// Fails with [`TelemetryError::NotInitialized`] outside the
    /// initialized state.
    pub fn log_info(&self, message: impl Into<String>) -> Result<(), TelemetryError> {
        self.log(message, Severity::Info, Vec::new())
    }

    /// Emits a warning-level log record.
    ///
    /// # Errors
    ///
    /// Fails with [`TelemetryError::NotInitialized`] outside the
    /// initialized state.
    pub fn log_warn(&self, message: impl Into<String>) -> Result<(), TelemetryError> {
        self.log(message, Severity::Warn, Vec::new())
    }

    /// Emits an error-level log record.
    ///
    /// # Errors
    ///
    /// Fails with [`TelemetryError::NotInitialized`] outside the
    /// initialized state.
    pub fn log_error(&self, message: impl Into<String>) -> Result<(), TelemetryError> {
        self.log(message, Severity::Error, Vec::new())
    }

    /// Emits multiple log records in order.
    ///
    /// # Errors
    ///
    /// Fails with [`TelemetryError::NotInitialized`] outside the
    /// initialized state.
    pub fn log_batch(&self, logs: Vec<LogEntry>) -> Result<(), TelemetryError> {
        self.commands
            .dispatch(Command::emit_batch_logs(logs))
            .map(|_| ())
    }

    // Traces API.

    /// Starts a span and returns its id for use with
    /// [`end_span`](Self::end_span) and
    /// [`add_span_event`](Self::add_span_event).
    ///
    /// Prefer [`span`](Self::span) where the span covers a lexical scope.
    ///
    /// # Errors
    ///
    /// Fails with [`TelemetryError::NotInitialized`] outside the
    /// initialized state.
    pub fn start_span(
        &self,
        name: impl Into<String>,
        kind: SpanKind,
        attributes: Vec<KeyValue>,
    ) -> Result<SpanId, TelemetryError> {
        let output = self
            .commands
            .dispatch(Command::start_span(name, kind, attributes))?;
        match output.into_span_id() {
            Some(span_id) => Ok(span_id),
            None => Err(TelemetryError::UnhandledCommand {
                kind: crate::command::CommandKind::StartSpan,
            }),
        }
    }

    /// Ends a span successfully.
    ///
    /// # Errors
    ///
    /// Fails with [`TelemetryError::SpanNotFound`] for an unknown or
    /// already-ended id.
    pub fn end_span(&self, span_id: SpanId) -> Result<(), TelemetryError> {
        self.commands
            .dispatch(Command::end_span(span_id, None))
            .map(|_| ())
    }

    /// Ends a span marking it failed.
    ///
    /// # Errors
    ///
    /// Fails with [`TelemetryError::SpanNotFound`] for an unknown or
    /// already-ended id.
    pub fn end_span_with_error(
        &self,
        span_id: SpanId,
        error: SpanError,
    ) -> Result<(), TelemetryError> {
        self.commands
            .dispatch(Command::end_span(span_id, Some(error)))
            .map(|_| ())
    }

    /// Attaches a timestamped event to an active span.
    ///
    /// # Errors
    ///
    /// Fails with [`TelemetryError::SpanNotFound`] for an unknown or
    /// already-ended id.
    pub fn add_span_event(
        &self,
        span_id: SpanId,
        name: impl Into<String>,
        attributes: Vec<KeyValue>,
    ) -> Result<(), TelemetryError> {
        self.commands
            .dispatch(Command::add_span_event(span_id, name, attributes))
            .map(|_| ())
    }

    /// Starts a span scoped to the returned guard.
    ///
    /// The span ends when the guard drops, on every exit path. It ends in
    /// error state when a failure was recorded with
    /// [`SpanScope::record_error`] or when the scope unwinds from a panic;
    /// otherwise it ends successfully.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use telemetryflow::{SpanKind, TelemetryBuilder};
    /// # let client = TelemetryBuilder::new()
    /// #     .with_api_key("tfk_x", "tfs_x")
    /// #     .with_service("svc", None)
    /// #     .build_client().unwrap();
    /// # client.initialize().unwrap();
    /// {
    ///     let span = client.span("process_request", SpanKind::Server).unwrap();
    ///     span.add_event("checkpoint", Vec::new()).unwrap();
    /// } // span ends here
    /// ```
    ///
    /// # Errors
    ///
    /// Fails with [`TelemetryError::NotInitialized`] outside the
    /// initialized state.
    pub fn span(&self, name: impl Into<String>, kind: SpanKind) -> Result<SpanScope<'_>, TelemetryError> {
        self.span_with_attributes(name, kind, Vec::new())
    }

    /// Starts a scoped span with initial attributes.
    ///
    /// # Errors
    ///
    /// Fails with [`TelemetryError::NotInitialized`] outside the
    /// initialized state.
    pub fn span_with_attributes(
        &self,
        name: impl Into<String>,
        kind: SpanKind,
        attributes: Vec<KeyValue>,
    ) -> Result<SpanScope<'_>, TelemetryError> {
        let span_id = self.start_span(name, kind, attributes)?;
        Ok(SpanScope {
            client: self,
            span_id,
            error: None,
            ended: false,
        })
    }

    // Status API.

    /// Returns the read-only status snapshot. Valid in every state.
    pub fn status(&self) -> SdkStatus {
        self.queries
            .dispatch(Query::sdk_status())
            .ok()
            .and_then(|output| output.into_status())
            .unwrap_or_else(|| self.handler.status())
    }

    /// Probes the health of the telemetry pipelines. Valid in every state.
    pub fn health(&self) -> HealthReport {
        self.queries
            .dispatch(Query::health())
            .ok()
            .and_then(|output| output.into_health())
            .unwrap_or_else(|| self.handler.health())
    }

    /// Number of spans currently registered as active.
    pub fn active_span_count(&self) -> usize {
        self.handler.active_span_count()
    }
}

impl fmt::Debug for TelemetryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelemetryClient")
            .field("service_name", &self.config.service_name)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

/// RAII scope for a span started with [`TelemetryClient::span`].
///
/// Dropping the scope ends the span exactly once. The error status is
/// inferred from how the scope exits: a recorded failure or a panic unwind
/// marks the span failed, a plain drop marks it successful.
#[must_use = "the span ends when this scope is dropped"]
pub struct SpanScope<'a> {
    client: &'a TelemetryClient,
    span_id: SpanId,
    error: Option<SpanError>,
    ended: bool,
}

impl SpanScope<'_> {
    /// Returns the id of the scoped span.
    pub fn id(&self) -> &SpanId {
        &self.span_id
    }

    /// Attaches a timestamped event to the scoped span.
    ///
    /// # Errors
    ///
    /// Fails with [`TelemetryError::SpanNotFound`] if the span was ended
    /// out from under the scope.
    pub fn add_event(
        &self,
        name: impl Into<String>,
        attributes: Vec<KeyValue>,
    ) -> Result<(), TelemetryError> {
        self.client
            .add_span_event(self.span_id.clone(), name, attributes)
    }

    /// Records a failure; the span will end in error state.
    pub fn record_error(&mut self, error: SpanError) {
        self.error = Some(error);
    }

    /// Ends the span now instead of at drop.
    ///
    /// # Errors
    ///
    /// Fails with [`TelemetryError::SpanNotFound`] if the span was ended
    /// out from under the scope.
    pub fn end(mut self) -> Result<(), TelemetryError> {
        self.ended = true;
        match self.error.take() {
            Some(error) => self
                .client
                .end_span_with_error(self.span_id.clone(), error),
            None => self.client.end_span(self.span_id.clone()),
        }
    }
}

impl Drop for SpanScope<'_> {
    fn drop(&mut self) {
        if self.ended {
            return;
        }
        let error = self
            .error
            .take()
            .or_else(|| std::thread::panicking().then(SpanError::panicked));
        let result = self
            .client
            .commands
            .dispatch(Command::end_span(self.span_id.clone(), error));
        if let Err(e) = result {
            tracing::warn!(span_id = %self.span_id, error = %e, "Failed to end scoped span");
        }
    }
}

/// Guard tying the client lifecycle to a scope.
///
/// Created by [`TelemetryClient::into_guard`]: the client is initialized on
/// entry and shut down (with a best-effort flush) when the guard drops.
pub struct TelemetryGuard {
    client: TelemetryClient,
}

impl TelemetryGuard {
    /// Returns the guarded client.
    pub fn client(&self) -> &TelemetryClient {
        &self.client
    }
}

impl std::ops::Deref for TelemetryGuard {
    type Target = TelemetryClient;

    fn deref(&self) -> &TelemetryClient {
        &self.client
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Err(e) = self.client.shutdown() {
            tracing::warn!(error = %e, "Failed to shut down telemetry client");
        }
    }
}
