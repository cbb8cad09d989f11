//! Runtime error types for the TelemetryFlow SDK.
//!
//! Construction-time errors live next to their types
//! ([`CredentialsError`](crate::CredentialsError),
//! [`ConfigError`](crate::ConfigError),
//! [`BuilderError`](crate::BuilderError)); this module covers everything
//! surfaced after a client exists.

use crate::command::{CommandKind, SpanId};
use crate::exporter::ExportError;
use crate::query::QueryKind;
use thiserror::Error;

/// A specialised Result type for SDK runtime operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors surfaced by the command handler and client façade.
///
/// State-machine violations (`NotInitialized`, `AlreadyInitialized`,
/// `SpanNotFound`) surface synchronously to the call site that misused the
/// API. Export failures during normal recording never appear here; they are
/// absorbed and logged so that telemetry cannot crash the host application.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// An operation other than initialize/status was attempted outside the
    /// `Initialized` state.
    #[error("client is not initialized; call initialize() first")]
    NotInitialized,

    /// `initialize()` was called on an already-initialized client.
    #[error("client is already initialized")]
    AlreadyInitialized,

    /// An operation referenced a span id that is not in the active-span
    /// registry (already ended, or never started).
    #[error("span not found: {span_id}")]
    SpanNotFound {
        /// The unknown or expired span id.
        span_id: SpanId,
    },

    /// Building an exporter or provider failed during initialization.
    #[error(transparent)]
    Export(#[from] ExportError),

    /// A command kind was dispatched with no registered handler.
    #[error("no handler registered for command {kind}")]
    UnhandledCommand {
        /// The unregistered command kind.
        kind: CommandKind,
    },

    /// A query kind was dispatched with no registered handler.
    #[error("no handler registered for query {kind}")]
    UnhandledQuery {
        /// The unregistered query kind.
        kind: QueryKind,
    },
}
