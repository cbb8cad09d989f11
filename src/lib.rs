//! TelemetryFlow SDK — OpenTelemetry-based observability for Rust services.
//!
//! This crate wires the OpenTelemetry SDK and OTLP exporters into a simple
//! recording surface: increment a counter, emit a log, start a span, and the
//! SDK shapes the signals, batches them, and exports them to a TelemetryFlow
//! collector.
//!
//! # Features
//!
//! - **Validated configuration** — credentials and config are checked once
//!   at build time through [`TelemetryBuilder`], with loaders for every
//!   `TELEMETRYFLOW_*` environment variable and an optional TOML config file
//! - **Command dispatch** — every operation is a typed [`Command`] routed
//!   through a [`CommandBus`] to the handler, keeping the public surface
//!   thin and the core testable
//! - **Concurrent by construction** — the handler serialises span
//!   registration and instrument creation, and shutdown drains in-flight
//!   recordings before tearing providers down
//! - **Failure isolation** — export errors are retried and logged inside
//!   the pipeline; recording telemetry can never crash the host application
//! - **Scoped lifecycles** — [`SpanScope`] ends spans on every exit path,
//!   and [`TelemetryGuard`] pairs initialize with shutdown-on-drop
//!
//! # Example
//!
//! ```no_run
//! use telemetryflow::{SpanKind, TelemetryBuilder};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = TelemetryBuilder::new()
//!         .with_api_key("tfk_xxx", "tfs_xxx")
//!         .with_endpoint("api.telemetryflow.id:4317")
//!         .with_service("my-service", Some("1.0.0"))
//!         .with_environment("production")
//!         .build_client()?;
//!
//!     client.initialize()?;
//!
//!     client.increment_counter("requests.total")?;
//!     client.log_info("request handled")?;
//!     {
//!         let span = client.span("process_request", SpanKind::Server)?;
//!         span.add_event("checkpoint", Vec::new())?;
//!     }
//!
//!     client.shutdown()?;
//!     Ok(())
//! }
//! ```
//!
//! The gRPC transport (the default) needs a tokio runtime in the host
//! application for background exports; the HTTP transport runs anywhere.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod builder;
pub mod client;
pub mod command;
pub mod config;
pub mod credentials;
pub mod error;
pub mod exporter;
pub mod handler;
pub mod query;

pub use builder::{BuilderError, TelemetryBuilder, new_from_env, new_simple};
pub use client::{SpanScope, TelemetryClient, TelemetryGuard};
pub use command::{
    Command, CommandBus, CommandKind, CommandOutput, HandleCommand, LogEntry, Severity, SpanError,
    SpanId, SpanKind,
};
pub use config::{
    BatchConfig, CollectorIdentity, ConfigError, Protocol, RetryConfig, SignalConfig, SignalKind,
    TelemetryConfig, V2ApiConfig,
};
pub use credentials::{Credentials, CredentialsError};
pub use error::{Result, TelemetryError};
pub use exporter::{ExportError, ExporterFactory, FlushSummary, OtlpExporterFactory};
pub use handler::TelemetryCommandHandler;
pub use query::{
    HandleQuery, HealthReport, HealthStatus, Query, QueryBus, QueryKind, QueryOutput, SdkStatus,
};

/// SDK version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
