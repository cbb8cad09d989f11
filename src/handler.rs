//! The telemetry command handler.
//!
//! This is the concurrency-critical core of the SDK. The handler owns the
//! live OpenTelemetry providers, an instrument cache, and the active-span
//! registry, and translates dispatched commands into OTel SDK calls.
//!
//! # Lifecycle and locking
//!
//! The lifecycle state machine (`Uninitialized → Initialized → ShuttingDown
//! → Shutdown`) lives inside an `RwLock`. Recording operations hold a read
//! guard for their duration; initialize and shutdown take the write guard,
//! so a shutdown waits for in-flight recordings to drain before tearing the
//! providers down, and no recording can observe half-torn-down handles.
//! The span registry and instrument cache have their own mutexes covering
//! the insert/remove and lookup-or-create critical sections; the actual
//! instrument recording happens outside any lock, since resolved OTel
//! instruments are safe for concurrent use.
//!
//! Poisoned locks are recovered rather than propagated: telemetry must not
//! panic the host application.

use crate::command::{
    Command, CommandBody, CommandOutput, HandleCommand, LogEntry, Severity, SpanError, SpanId,
    SpanKind,
};
use crate::config::TelemetryConfig;
use crate::error::TelemetryError;
use crate::exporter::{ExporterFactory, FlushSummary, OtlpExporterFactory};
use crate::query::{
    HandleQuery, HealthReport, HealthStatus, Query, QueryBody, QueryOutput, SdkStatus,
};
use chrono::Utc;
use opentelemetry::logs::{AnyValue, LogRecord as _, Logger as _, LoggerProvider as _};
use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter, MeterProvider as _};
use opentelemetry::trace::{Span as _, Status, Tracer as _, TracerProvider as _};
use opentelemetry::{KeyValue, Value};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::logs::{SdkLogger, SdkLoggerProvider};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider, Span};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant, SystemTime};

/// Lifecycle state of the handler.
enum HandlerState {
    Uninitialized,
    Initialized(Providers),
    ShuttingDown,
    Shutdown,
}

/// Provider handles owned while the handler is initialized.
struct Providers {
    tracer_provider: Option<SdkTracerProvider>,
    meter_provider: Option<SdkMeterProvider>,
    logger_provider: Option<SdkLoggerProvider>,
    tracer: Option<SdkTracer>,
    meter: Option<Meter>,
    logger: Option<SdkLogger>,
    started_at: Instant,
}

/// One entry of the active-span registry.
///
/// `span` is `None` when the traces signal is disabled; the registry entry
/// still exists so span-lifecycle invariants hold either way.
struct ActiveSpan {
    span: Option<Span>,
    started_at: Instant,
}

/// Cache key for a metric instrument.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct InstrumentKey {
    kind: InstrumentKind,
    name: String,
    unit: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum InstrumentKind {
    Counter,
    Gauge,
    Histogram,
}

/// A cached metric instrument handle.
#[derive(Clone)]
enum Instrument {
    Counter(Counter<u64>),
    Gauge(Gauge<f64>),
    Histogram(Histogram<f64>),
}

#[derive(Default)]
struct SentCounters {
    metrics: AtomicU64,
    logs: AtomicU64,
    spans: AtomicU64,
}

/// Central command handler for all telemetry operations.
///
/// Safe to share across threads behind an `Arc`; every operation takes
/// `&self`. Constructed by the [`TelemetryClient`](crate::TelemetryClient)
/// and registered on its command and query buses.
pub struct TelemetryCommandHandler {
    config: TelemetryConfig,
    factory: Box<dyn ExporterFactory>,
    state: RwLock<HandlerState>,
    spans: Mutex<HashMap<SpanId, ActiveSpan>>,
    instruments: Mutex<HashMap<InstrumentKey, Instrument>>,
    sent: SentCounters,
}

impl TelemetryCommandHandler {
    /// Creates a handler exporting over OTLP.
    pub fn new(config: TelemetryConfig) -> Self {
        Self::with_factory(config, Box::new(OtlpExporterFactory::new()))
    }

    /// Creates a handler with a custom exporter factory.
    pub fn with_factory(config: TelemetryConfig, factory: Box<dyn ExporterFactory>) -> Self {
        Self {
            config,
            factory,
            state: RwLock::new(HandlerState::Uninitialized),
            spans: Mutex::new(HashMap::new()),
            instruments: Mutex::new(HashMap::new()),
            sent: SentCounters::default(),
        }
    }

    /// Returns the handler's configuration.
    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    /// Whether the handler is in the `Initialized` state.
    pub fn is_initialized(&self) -> bool {
        matches!(&*read_lock(&self.state), HandlerState::Initialized(_))
    }

    /// Number of spans currently registered as active.
    pub fn active_span_count(&self) -> usize {
        lock(&self.spans).len()
    }

    /// Number of distinct instruments created so far.
    pub fn instrument_count(&self) -> usize {
        lock(&self.instruments).len()
    }

    // Lifecycle.

    fn handle_initialize(&self) -> Result<CommandOutput, TelemetryError> {
        let mut state = write_lock(&self.state);
        match &*state {
            HandlerState::Uninitialized => {}
            HandlerState::Initialized(_) => return Err(TelemetryError::AlreadyInitialized),
            HandlerState::ShuttingDown | HandlerState::Shutdown => {
                return Err(TelemetryError::NotInitialized);
            }
        }

        // Any `?` below leaves the state Uninitialized: a failed initialize
        // must not produce a half-initialized handler.
        let resource = Resource::builder()
            .with_attributes(self.config.resource_attributes())
            .build();

        let mut providers = Providers {
            tracer_provider: None,
            meter_provider: None,
            logger_provider: None,
            tracer: None,
            meter: None,
            logger: None,
            started_at: Instant::now(),
        };

        if self.config.signals.traces {
            let provider = self.factory.tracer_provider(&self.config, &resource)?;
            providers.tracer = Some(provider.tracer("telemetryflow"));
            providers.tracer_provider = Some(provider);
        }
        if self.config.signals.metrics {
            let provider = self.factory.meter_provider(&self.config, &resource)?;
            providers.meter = Some(provider.meter("telemetryflow"));
            providers.meter_provider = Some(provider);
        }
        if self.config.signals.logs {
            let provider = self.factory.logger_provider(&self.config, &resource)?;
            providers.logger = Some(provider.logger("telemetryflow"));
            providers.logger_provider = Some(provider);
        }

        *state = HandlerState::Initialized(providers);
        tracing::info!(
            service_name = %self.config.service_name,
            endpoint = %self.config.endpoint,
            protocol = %self.config.protocol.as_str(),
            "TelemetryFlow SDK initialized"
        );
        Ok(CommandOutput::Ack)
    }

    fn handle_shutdown(&self, timeout: Duration) -> Result<CommandOutput, TelemetryError> {
        let providers = {
            let mut state = write_lock(&self.state);
            match std::mem::replace(&mut *state, HandlerState::ShuttingDown) {
                HandlerState::Initialized(providers) => providers,
                other => {
                    // Never initialized, or shutdown already ran: no-op.
                    *state = other;
                    return Ok(CommandOutput::Flushed(FlushSummary::complete()));
                }
            }
        };

        // The write guard above drained all in-flight recordings; from here
        // on every other call observes ShuttingDown and is rejected.
        let deadline = Instant::now() + timeout;
        let summary = flush_providers(&providers, deadline);
        shutdown_providers(providers);

        lock(&self.spans).clear();
        lock(&self.instruments).clear();

        *write_lock(&self.state) = HandlerState::Shutdown;
        tracing::info!("TelemetryFlow SDK shut down");
        Ok(CommandOutput::Flushed(summary))
    }

    fn handle_flush(&self, timeout: Duration) -> Result<CommandOutput, TelemetryError> {
        let state = read_lock(&self.state);
        let providers = require_initialized(&state)?;
        let summary = flush_providers(providers, Instant::now() + timeout);
        Ok(CommandOutput::Flushed(summary))
    }

    // Metrics.

    fn handle_record_counter(
        &self,
        name: String,
        value: u64,
        attributes: Vec<KeyValue>,
    ) -> Result<CommandOutput, TelemetryError> {
        let state = read_lock(&self.state);
        let providers = require_initialized(&state)?;
        let Some(meter) = &providers.meter else {
            return Ok(CommandOutput::Ack);
        };

        let counter = self.counter_instrument(meter, &name);
        counter.add(value, &attributes);
        self.sent.metrics.fetch_add(1, Ordering::Relaxed);
        Ok(CommandOutput::Ack)
    }

    fn handle_record_gauge(
        &self,
        name: String,
        value: f64,
        attributes: Vec<KeyValue>,
    ) -> Result<CommandOutput, TelemetryError> {
        let state = read_lock(&self.state);
        let providers = require_initialized(&state)?;
        let Some(meter) = &providers.meter else {
            return Ok(CommandOutput::Ack);
        };

        let gauge = self.gauge_instrument(meter, &name);
        gauge.record(value, &attributes);
        self.sent.metrics.fetch_add(1, Ordering::Relaxed);
        Ok(CommandOutput::Ack)
    }

    fn handle_record_histogram(
        &self,
        name: String,
        value: f64,
        unit: String,
        attributes: Vec<KeyValue>,
    ) -> Result<CommandOutput, TelemetryError> {
        let state = read_lock(&self.state);
        let providers = require_initialized(&state)?;
        let Some(meter) = &providers.meter else {
            return Ok(CommandOutput::Ack);
        };

        let histogram = self.histogram_instrument(meter, &name, &unit);
        histogram.record(value, &attributes);
        self.sent.metrics.fetch_add(1, Ordering::Relaxed);
        Ok(CommandOutput::Ack)
    }

    fn counter_instrument(&self, meter: &Meter, name: &str) -> Counter<u64> {
        let key = InstrumentKey {
            kind: InstrumentKind::Counter,
            name: name.to_owned(),
            unit: String::new(),
        };
        let mut cache = lock(&self.instruments);
        match cache.get(&key) {
            Some(Instrument::Counter(counter)) => counter.clone(),
            _ => {
                let counter = meter.u64_counter(name.to_owned()).build();
                cache.insert(key, Instrument::Counter(counter.clone()));
                counter
            }
        }
    }

    fn gauge_instrument(&self, meter: &Meter, name: &str) -> Gauge<f64> {
        let key = InstrumentKey {
            kind: InstrumentKind::Gauge,
            name: name.to_owned(),
            unit: String::new(),
        };
        let mut cache = lock(&self.instruments);
        match cache.get(&key) {
            Some(Instrument::Gauge(gauge)) => gauge.clone(),
            _ => {
                let gauge = meter.f64_gauge(name.to_owned()).build();
                cache.insert(key, Instrument::Gauge(gauge.clone()));
                gauge
            }
        }
    }

    fn histogram_instrument(&self, meter: &Meter, name: &str, unit: &str) -> Histogram<f64> {
        let key = InstrumentKey {
            kind: InstrumentKind::Histogram,
            name: name.to_owned(),
            unit: unit.to_owned(),
        };
        let mut cache = lock(&self.instruments);
        match cache.get(&key) {
            Some(Instrument::Histogram(histogram)) => histogram.clone(),
            _ => {
                let mut builder = meter.f64_histogram(name.to_owned());
                if !unit.is_empty() {
                    builder = builder.with_unit(unit.to_owned());
                }
                let histogram = builder.build();
                cache.insert(key, Instrument::Histogram(histogram.clone()));
                histogram
            }
        }
    }

    // Logs.

    fn handle_emit_log(
        &self,
        message: String,
        severity: Severity,
        attributes: Vec<KeyValue>,
    ) -> Result<CommandOutput, TelemetryError> {
        let state = read_lock(&self.state);
        let providers = require_initialized(&state)?;
        let Some(logger) = &providers.logger else {
            return Ok(CommandOutput::Ack);
        };

        let mut record = logger.create_log_record();
        record.set_timestamp(SystemTime::now());
        record.set_observed_timestamp(SystemTime::now());
        record.set_severity_number(severity.to_otel());
        record.set_severity_text(severity.as_str());
        record.set_body(AnyValue::from(message));
        for attribute in attributes {
            record.add_attribute(attribute.key, to_any_value(attribute.value));
        }
        logger.emit(record);

        self.sent.logs.fetch_add(1, Ordering::Relaxed);
        Ok(CommandOutput::Ack)
    }

    fn handle_emit_batch_logs(&self, logs: Vec<LogEntry>) -> Result<CommandOutput, TelemetryError> {
        for entry in logs {
            self.handle_emit_log(entry.message, entry.severity, entry.attributes)?;
        }
        Ok(CommandOutput::Ack)
    }

    // Traces.

    fn handle_start_span(
        &self,
        name: String,
        kind: SpanKind,
        attributes: Vec<KeyValue>,
    ) -> Result<CommandOutput, TelemetryError> {
        let state = read_lock(&self.state);
        let providers = require_initialized(&state)?;

        let span = providers.tracer.as_ref().map(|tracer| {
            let mut builder = tracer.span_builder(name).with_kind(kind.to_otel());
            if !attributes.is_empty() {
                builder = builder.with_attributes(attributes);
            }
            builder.start(tracer)
        });

        let span_id = SpanId::generate();
        lock(&self.spans).insert(
            span_id.clone(),
            ActiveSpan {
                span,
                started_at: Instant::now(),
            },
        );
        Ok(CommandOutput::SpanStarted(span_id))
    }

    fn handle_end_span(
        &self,
        span_id: SpanId,
        error: Option<SpanError>,
    ) -> Result<CommandOutput, TelemetryError> {
        let state = read_lock(&self.state);
        require_initialized(&state)?;

        let active = lock(&self.spans)
            .remove(&span_id)
            .ok_or_else(|| TelemetryError::SpanNotFound {
                span_id: span_id.clone(),
            })?;

        if let Some(mut span) = active.span {
            match &error {
                Some(failure) => {
                    span.set_status(Status::error(failure.message.clone()));
                    span.set_attribute(KeyValue::new("exception.type", failure.kind.clone()));
                    span.set_attribute(KeyValue::new(
                        "exception.message",
                        failure.message.clone(),
                    ));
                }
                None => span.set_status(Status::Ok),
            }
            span.end();
            self.sent.spans.fetch_add(1, Ordering::Relaxed);
        }

        tracing::trace!(
            span_id = %span_id,
            elapsed = ?active.started_at.elapsed(),
            failed = error.is_some(),
            "Span ended"
        );
        Ok(CommandOutput::Ack)
    }

    fn handle_add_span_event(
        &self,
        span_id: SpanId,
        name: String,
        attributes: Vec<KeyValue>,
    ) -> Result<CommandOutput, TelemetryError> {
        let state = read_lock(&self.state);
        require_initialized(&state)?;

        let mut spans = lock(&self.spans);
        let active = spans
            .get_mut(&span_id)
            .ok_or(TelemetryError::SpanNotFound { span_id })?;

        if let Some(span) = active.span.as_mut() {
            span.add_event(name, attributes);
        }
        Ok(CommandOutput::Ack)
    }

    // Queries.

    /// Builds the read-only status snapshot. Valid in every state.
    pub fn status(&self) -> SdkStatus {
        let uptime = match &*read_lock(&self.state) {
            HandlerState::Initialized(providers) => Some(providers.started_at.elapsed()),
            _ => None,
        };

        SdkStatus {
            initialized: uptime.is_some(),
            version: crate::VERSION.to_owned(),
            service_name: self.config.service_name.clone(),
            endpoint: self.config.endpoint.clone(),
            protocol: self.config.protocol,
            signals_enabled: self.config.enabled_signals(),
            uptime,
            metrics_sent: self.sent.metrics.load(Ordering::Relaxed),
            logs_sent: self.sent.logs.load(Ordering::Relaxed),
            spans_sent: self.sent.spans.load(Ordering::Relaxed),
        }
    }

    /// Probes the health of the telemetry pipelines.
    pub fn health(&self) -> HealthReport {
        let (status, message, components) = match &*read_lock(&self.state) {
            HandlerState::Initialized(providers) => {
                let mut components = HashMap::new();
                components.insert(
                    "traces".to_owned(),
                    component_health(providers.tracer_provider.is_some()),
                );
                components.insert(
                    "metrics".to_owned(),
                    component_health(providers.meter_provider.is_some()),
                );
                components.insert(
                    "logs".to_owned(),
                    component_health(providers.logger_provider.is_some()),
                );
                (
                    HealthStatus::Healthy,
                    "all pipelines operational".to_owned(),
                    components,
                )
            }
            HandlerState::ShuttingDown => (
                HealthStatus::Degraded,
                "shutdown in progress".to_owned(),
                HashMap::new(),
            ),
            HandlerState::Uninitialized | HandlerState::Shutdown => (
                HealthStatus::Unhealthy,
                "not initialized".to_owned(),
                HashMap::new(),
            ),
        };

        HealthReport {
            status,
            message,
            components,
            checked_at: Utc::now(),
        }
    }
}

impl HandleCommand for TelemetryCommandHandler {
    fn handle(&self, command: Command) -> Result<CommandOutput, TelemetryError> {
        match command.body {
            CommandBody::Initialize => self.handle_initialize(),
            CommandBody::Shutdown { timeout } => self.handle_shutdown(timeout),
            CommandBody::Flush { timeout } => self.handle_flush(timeout),
            CommandBody::RecordMetric {
                name,
                value,
                unit: _,
                attributes,
            } => self.handle_record_gauge(name, value, attributes),
            CommandBody::RecordCounter {
                name,
                value,
                attributes,
            } => self.handle_record_counter(name, value, attributes),
            CommandBody::RecordGauge {
                name,
                value,
                attributes,
            } => self.handle_record_gauge(name, value, attributes),
            CommandBody::RecordHistogram {
                name,
                value,
                unit,
                attributes,
            } => self.handle_record_histogram(name, value, unit, attributes),
            CommandBody::EmitLog {
                message,
                severity,
                attributes,
            } => self.handle_emit_log(message, severity, attributes),
            CommandBody::EmitBatchLogs { logs } => self.handle_emit_batch_logs(logs),
            CommandBody::StartSpan {
                name,
                kind,
                attributes,
            } => self.handle_start_span(name, kind, attributes),
            CommandBody::EndSpan { span_id, error } => self.handle_end_span(span_id, error),
            CommandBody::AddSpanEvent {
                span_id,
                name,
                attributes,
            } => self.handle_add_span_event(span_id, name, attributes),
        }
    }
}

impl HandleQuery for TelemetryCommandHandler {
    fn handle(&self, query: Query) -> Result<QueryOutput, TelemetryError> {
        match query.body {
            QueryBody::SdkStatus => Ok(QueryOutput::Status(self.status())),
            QueryBody::Health => Ok(QueryOutput::Health(self.health())),
        }
    }
}

fn require_initialized<'a>(
    state: &'a RwLockReadGuard<'_, HandlerState>,
) -> Result<&'a Providers, TelemetryError> {
    match &**state {
        HandlerState::Initialized(providers) => Ok(providers),
        _ => Err(TelemetryError::NotInitialized),
    }
}

fn component_health(present: bool) -> HealthStatus {
    if present {
        HealthStatus::Healthy
    } else {
        HealthStatus::Unhealthy
    }
}

/// Flushes every present provider, honouring the deadline between providers.
///
/// The OTel `force_flush` calls take no timeout themselves; each is bounded
/// by the exporter's own configured timeout, and the deadline decides
/// whether the next provider is attempted at all.
fn flush_providers(providers: &Providers, deadline: Instant) -> FlushSummary {
    let mut summary = FlushSummary::complete();

    if let Some(provider) = &providers.tracer_provider {
        if Instant::now() >= deadline {
            summary.traces_flushed = false;
            summary.timed_out = true;
        } else if let Err(e) = provider.force_flush() {
            tracing::warn!(error = %e, "Failed to flush tracer provider");
            summary.traces_flushed = false;
        }
    }

    if let Some(provider) = &providers.meter_provider {
        if Instant::now() >= deadline {
            summary.metrics_flushed = false;
            summary.timed_out = true;
        } else if let Err(e) = provider.force_flush() {
            tracing::warn!(error = %e, "Failed to flush meter provider");
            summary.metrics_flushed = false;
        }
    }

    if let Some(provider) = &providers.logger_provider {
        if Instant::now() >= deadline {
            summary.logs_flushed = false;
            summary.timed_out = true;
        } else if let Err(e) = provider.force_flush() {
            tracing::warn!(error = %e, "Failed to flush logger provider");
            summary.logs_flushed = false;
        }
    }

    summary
}

/// Shuts down every present provider, logging rather than propagating
/// errors so shutdown always completes.
fn shutdown_providers(providers: Providers) {
    if let Some(provider) = providers.tracer_provider
        && let Err(e) = provider.shutdown()
    {
        tracing::warn!(error = %e, "Failed to shut down tracer provider");
    }
    if let Some(provider) = providers.meter_provider
        && let Err(e) = provider.shutdown()
    {
        tracing::warn!(error = %e, "Failed to shut down meter provider");
    }
    if let Some(provider) = providers.logger_provider
        && let Err(e) = provider.shutdown()
    {
        tracing::warn!(error = %e, "Failed to shut down logger provider");
    }
}

/// Converts a metric attribute value into a log attribute value.
fn to_any_value(value: Value) -> AnyValue {
    match value {
        Value::Bool(v) => AnyValue::Boolean(v),
        Value::I64(v) => AnyValue::Int(v),
        Value::F64(v) => AnyValue::Double(v),
        Value::String(s) => AnyValue::from(s.as_str().to_owned()),
        other => AnyValue::from(other.to_string()),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read_lock<T>(rwlock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    rwlock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(rwlock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    rwlock.write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::Credentials;
    use opentelemetry_sdk::logs::InMemoryLogExporter;
    use opentelemetry_sdk::metrics::InMemoryMetricExporter;
    use opentelemetry_sdk::trace::InMemorySpanExporter;

    /// Factory building providers over in-memory exporters.
    struct InMemoryFactory;

    impl ExporterFactory for InMemoryFactory {
        fn tracer_provider(
            &self,
            _config: &TelemetryConfig,
            resource: &Resource,
        ) -> Result<SdkTracerProvider, crate::exporter::ExportError> {
            Ok(SdkTracerProvider::builder()
                .with_simple_exporter(InMemorySpanExporter::default())
                .with_resource(resource.clone())
                .build())
        }

        fn meter_provider(
            &self,
            _config: &TelemetryConfig,
            resource: &Resource,
        ) -> Result<SdkMeterProvider, crate::exporter::ExportError> {
            let reader = opentelemetry_sdk::metrics::PeriodicReader::builder(
                InMemoryMetricExporter::default(),
            )
            .build();
            Ok(SdkMeterProvider::builder()
                .with_reader(reader)
                .with_resource(resource.clone())
                .build())
        }

        fn logger_provider(
            &self,
            _config: &TelemetryConfig,
            resource: &Resource,
        ) -> Result<SdkLoggerProvider, crate::exporter::ExportError> {
            Ok(SdkLoggerProvider::builder()
                .with_simple_exporter(InMemoryLogExporter::default())
                .with_resource(resource.clone())
                .build())
        }
    }

    /// Factory whose constructions always fail.
    struct FailingFactory;

    impl ExporterFactory for FailingFactory {
        fn tracer_provider(
            &self,
            _config: &TelemetryConfig,
            _resource: &Resource,
        ) -> Result<SdkTracerProvider, crate::exporter::ExportError> {
            Err(crate::exporter::ExportError::InvalidHeader {
                name: "x-test-failure".to_owned(),
            })
        }

        fn meter_provider(
            &self,
            _config: &TelemetryConfig,
            _resource: &Resource,
        ) -> Result<SdkMeterProvider, crate::exporter::ExportError> {
            Err(crate::exporter::ExportError::InvalidHeader {
                name: "x-test-failure".to_owned(),
            })
        }

        fn logger_provider(
            &self,
            _config: &TelemetryConfig,
            _resource: &Resource,
        ) -> Result<SdkLoggerProvider, crate::exporter::ExportError> {
            Err(crate::exporter::ExportError::InvalidHeader {
                name: "x-test-failure".to_owned(),
            })
        }
    }

    fn config() -> TelemetryConfig {
        TelemetryConfig::new(
            Credentials::new("tfk_test", "tfs_test").unwrap(),
            "localhost:4317",
            "svc",
        )
        .unwrap()
    }

    fn initialized_handler() -> TelemetryCommandHandler {
        let handler = TelemetryCommandHandler::with_factory(config(), Box::new(InMemoryFactory));
        HandleCommand::handle(&handler, Command::initialize()).unwrap();
        handler
    }

    #[test]
    fn test_initialize_transitions_state() {
        let handler = TelemetryCommandHandler::with_factory(config(), Box::new(InMemoryFactory));
        assert!(!handler.is_initialized());

        HandleCommand::handle(&handler, Command::initialize()).unwrap();
        assert!(handler.is_initialized());
    }

    #[test]
    fn test_double_initialize_fails_loudly() {
        let handler = initialized_handler();
        let err = HandleCommand::handle(&handler, Command::initialize()).unwrap_err();
        assert!(matches!(err, TelemetryError::AlreadyInitialized));
    }

    #[test]
    fn test_failed_initialize_rolls_back() {
        let handler = TelemetryCommandHandler::with_factory(config(), Box::new(FailingFactory));
        let err = HandleCommand::handle(&handler, Command::initialize()).unwrap_err();
        assert!(matches!(err, TelemetryError::Export(_)));
        assert!(!handler.is_initialized());

        // Still rejecting recording, as an uninitialized handler must.
        let err = HandleCommand::handle(&handler, Command::increment_counter("x")).unwrap_err();
        assert!(matches!(err, TelemetryError::NotInitialized));
    }

    #[test]
    fn test_recording_before_initialize_fails() {
        let handler = TelemetryCommandHandler::with_factory(config(), Box::new(InMemoryFactory));
        let err = HandleCommand::handle(&handler, Command::increment_counter("x")).unwrap_err();
        assert!(matches!(err, TelemetryError::NotInitialized));
    }

    #[test]
    fn test_counter_bumps_metrics_sent() {
        let handler = initialized_handler();
        HandleCommand::handle(&handler, Command::increment_counter("requests")).unwrap();
        HandleCommand::handle(&handler, Command::record_counter("requests", 5, Vec::new()))
            .unwrap();

        assert_eq!(handler.status().metrics_sent, 2);
    }

    #[test]
    fn test_instrument_cache_deduplicates() {
        let handler = initialized_handler();
        HandleCommand::handle(&handler, Command::increment_counter("requests")).unwrap();
        HandleCommand::handle(&handler, Command::increment_counter("requests")).unwrap();
        assert_eq!(handler.instrument_count(), 1);

        // A histogram with the same name is a distinct instrument.
        HandleCommand::handle(&handler, Command::record_histogram("requests", 1.0, "ms", Vec::new()))
            .unwrap();
        assert_eq!(handler.instrument_count(), 2);

        // Same histogram name with a different unit is distinct again.
        HandleCommand::handle(&handler, Command::record_histogram("requests", 1.0, "s", Vec::new()))
            .unwrap();
        assert_eq!(handler.instrument_count(), 3);
    }

    #[test]
    fn test_span_lifecycle() {
        let handler = initialized_handler();
        let span_id = HandleCommand::handle(&handler, Command::start_span("op", SpanKind::Server, Vec::new()))
            .unwrap()
            .into_span_id()
            .unwrap();
        assert_eq!(handler.active_span_count(), 1);

        HandleCommand::handle(&handler, Command::add_span_event(
                span_id.clone(),
                "checkpoint",
                Vec::new(),
            ))
            .unwrap();

        HandleCommand::handle(&handler, Command::end_span(span_id.clone(), None))
            .unwrap();
        assert_eq!(handler.active_span_count(), 0);
        assert_eq!(handler.status().spans_sent, 1);

        // A second end on the same id fails explicitly.
        let err = HandleCommand::handle(&handler, Command::end_span(span_id.clone(), None))
            .unwrap_err();
        assert!(matches!(err, TelemetryError::SpanNotFound { .. }));

        // So does an event on the ended span.
        let err = HandleCommand::handle(&handler, Command::add_span_event(span_id, "late", Vec::new()))
            .unwrap_err();
        assert!(matches!(err, TelemetryError::SpanNotFound { .. }));
    }

    #[test]
    fn test_end_span_with_error() {
        let handler = initialized_handler();
        let span_id = HandleCommand::handle(&handler, Command::start_span("op", SpanKind::Internal, Vec::new()))
            .unwrap()
            .into_span_id()
            .unwrap();

        HandleCommand::handle(&handler, Command::end_span(
                span_id,
                Some(SpanError::new("io", "connection reset")),
            ))
            .unwrap();
        assert_eq!(handler.status().spans_sent, 1);
    }

    #[test]
    fn test_unknown_span_id_fails() {
        let handler = initialized_handler();
        let err = HandleCommand::handle(&handler, Command::end_span(SpanId::from("no-such-span"), None))
            .unwrap_err();
        assert!(matches!(err, TelemetryError::SpanNotFound { .. }));
    }

    #[test]
    fn test_disabled_traces_still_track_registry() {
        let mut config = config();
        config.signals.traces = false;
        let handler = TelemetryCommandHandler::with_factory(config, Box::new(InMemoryFactory));
        HandleCommand::handle(&handler, Command::initialize()).unwrap();

        let span_id = HandleCommand::handle(&handler, Command::start_span("op", SpanKind::Internal, Vec::new()))
            .unwrap()
            .into_span_id()
            .unwrap();
        assert_eq!(handler.active_span_count(), 1);

        HandleCommand::handle(&handler, Command::end_span(span_id.clone(), None))
            .unwrap();
        assert_eq!(handler.active_span_count(), 0);
        // No underlying span was exported.
        assert_eq!(handler.status().spans_sent, 0);

        let err = HandleCommand::handle(&handler, Command::end_span(span_id, None))
            .unwrap_err();
        assert!(matches!(err, TelemetryError::SpanNotFound { .. }));
    }

    #[test]
    fn test_disabled_metrics_drop_recordings() {
        let mut config = config();
        config.signals.metrics = false;
        let handler = TelemetryCommandHandler::with_factory(config, Box::new(InMemoryFactory));
        HandleCommand::handle(&handler, Command::initialize()).unwrap();

        HandleCommand::handle(&handler, Command::increment_counter("x")).unwrap();
        assert_eq!(handler.status().metrics_sent, 0);
        assert_eq!(handler.instrument_count(), 0);
    }

    #[test]
    fn test_logs_bump_logs_sent() {
        let handler = initialized_handler();
        HandleCommand::handle(&handler, Command::emit_log("hello", Severity::Info, Vec::new()))
            .unwrap();
        HandleCommand::handle(&handler, Command::emit_batch_logs(vec![
                LogEntry {
                    message: "a".to_owned(),
                    severity: Severity::Warn,
                    attributes: Vec::new(),
                },
                LogEntry {
                    message: "b".to_owned(),
                    severity: Severity::Error,
                    attributes: vec![KeyValue::new("code", 7_i64)],
                },
            ]))
            .unwrap();

        assert_eq!(handler.status().logs_sent, 3);
    }

    #[test]
    fn test_flush_reports_complete() {
        let handler = initialized_handler();
        let summary = HandleCommand::handle(&handler, Command::flush(Duration::from_secs(5)))
            .unwrap()
            .into_flush_summary()
            .unwrap();
        assert!(summary.is_complete());
    }

    #[test]
    fn test_flush_before_initialize_fails() {
        let handler = TelemetryCommandHandler::with_factory(config(), Box::new(InMemoryFactory));
        let err = HandleCommand::handle(&handler, Command::flush(Duration::from_secs(1)))
            .unwrap_err();
        assert!(matches!(err, TelemetryError::NotInitialized));
    }

    #[test]
    fn test_shutdown_is_idempotent_and_terminal() {
        let handler = initialized_handler();
        HandleCommand::handle(&handler, Command::shutdown(Duration::from_secs(5)))
            .unwrap();
        assert!(!handler.is_initialized());

        // Second shutdown is a safe no-op.
        HandleCommand::handle(&handler, Command::shutdown(Duration::from_secs(5)))
            .unwrap();

        // Recording after shutdown fails.
        let err = HandleCommand::handle(&handler, Command::increment_counter("x")).unwrap_err();
        assert!(matches!(err, TelemetryError::NotInitialized));

        // So does re-initializing: the lifecycle is linear.
        let err = HandleCommand::handle(&handler, Command::initialize()).unwrap_err();
        assert!(matches!(err, TelemetryError::NotInitialized));
    }

    #[test]
    fn test_shutdown_clears_registries() {
        let handler = initialized_handler();
        HandleCommand::handle(&handler, Command::start_span("op", SpanKind::Internal, Vec::new()))
            .unwrap();
        HandleCommand::handle(&handler, Command::increment_counter("x")).unwrap();

        HandleCommand::handle(&handler, Command::shutdown(Duration::from_secs(5)))
            .unwrap();
        assert_eq!(handler.active_span_count(), 0);
        assert_eq!(handler.instrument_count(), 0);
    }

    #[test]
    fn test_shutdown_before_initialize_is_noop() {
        let handler = TelemetryCommandHandler::with_factory(config(), Box::new(InMemoryFactory));
        HandleCommand::handle(&handler, Command::shutdown(Duration::from_secs(1)))
            .unwrap();
        // Never-initialized handlers stay usable.
        HandleCommand::handle(&handler, Command::initialize()).unwrap();
        assert!(handler.is_initialized());
    }

    #[test]
    fn test_status_snapshot() {
        let handler = initialized_handler();
        let status = handler.status();

        assert!(status.initialized);
        assert_eq!(status.version, crate::VERSION);
        assert_eq!(status.service_name, "svc");
        assert_eq!(status.endpoint, "localhost:4317");
        assert!(status.uptime.is_some());
        assert_eq!(status.metrics_sent, 0);
    }

    #[test]
    fn test_status_works_after_shutdown() {
        let handler = initialized_handler();
        HandleCommand::handle(&handler, Command::increment_counter("x")).unwrap();
        HandleCommand::handle(&handler, Command::shutdown(Duration::from_secs(5)))
            .unwrap();

        let status = handler.status();
        assert!(!status.initialized);
        assert!(status.uptime.is_none());
        assert_eq!(status.metrics_sent, 1);
    }

    #[test]
    fn test_health_state_mapping() {
        let handler = TelemetryCommandHandler::with_factory(config(), Box::new(InMemoryFactory));
        assert_eq!(handler.health().status, HealthStatus::Unhealthy);

        HandleCommand::handle(&handler, Command::initialize()).unwrap();
        let report = handler.health();
        assert_eq!(report.status, HealthStatus::Healthy);
        assert_eq!(report.components["traces"], HealthStatus::Healthy);

        HandleCommand::handle(&handler, Command::shutdown(Duration::from_secs(5)))
            .unwrap();
        assert_eq!(handler.health().status, HealthStatus::Unhealthy);
    }

    #[test]
    fn test_record_metric_records_as_gauge() {
        let handler = initialized_handler();
        HandleCommand::handle(&handler, Command::record_metric("load", 0.7, "", Vec::new()))
            .unwrap();
        assert_eq!(handler.status().metrics_sent, 1);
        assert_eq!(handler.instrument_count(), 1);
    }
}
