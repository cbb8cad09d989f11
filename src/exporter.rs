//! OTLP exporter factory and provider wiring.
//!
//! The [`ExporterFactory`] trait is the seam between the command handler and
//! the OpenTelemetry export machinery: given a validated config and a
//! resource, it produces fully wired signal providers. The handler treats it
//! as an opaque dependency, which keeps the concurrency core testable with
//! in-memory exporters.
//!
//! [`OtlpExporterFactory`] is the production implementation. It builds
//! `opentelemetry-otlp` exporters for the configured protocol — gRPC/tonic
//! or HTTP/protobuf — carrying the TelemetryFlow auth headers, and wires
//! them into batch processors and periodic readers using the configured
//! batch policy.

use crate::config::{Protocol, SignalKind, TelemetryConfig};
use opentelemetry_otlp::{
    Compression, ExporterBuildError, LogExporter, MetricExporter, SpanExporter, WithExportConfig,
    WithHttpConfig, WithTonicConfig,
};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::logs::{
    BatchConfigBuilder as LogBatchConfigBuilder, BatchLogProcessor, SdkLoggerProvider,
};
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::trace::{
    BatchConfigBuilder as TraceBatchConfigBuilder, BatchSpanProcessor, SdkTracerProvider,
};
use serde::Serialize;
use std::collections::HashMap;
use tonic::metadata::{MetadataKey, MetadataMap, MetadataValue};

/// Errors raised while building exporters or providers.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The trace exporter could not be built.
    #[error("failed to build trace exporter")]
    TraceExporter(#[source] ExporterBuildError),

    /// The metric exporter could not be built.
    #[error("failed to build metric exporter")]
    MetricExporter(#[source] ExporterBuildError),

    /// The log exporter could not be built.
    #[error("failed to build log exporter")]
    LogExporter(#[source] ExporterBuildError),

    /// A header could not be converted into gRPC metadata.
    #[error("invalid gRPC metadata header: {name}")]
    InvalidHeader {
        /// The offending header name.
        name: String,
    },
}

/// Outcome of a flush or shutdown flush.
///
/// Flushing is bounded by a timeout: once the deadline passes, remaining
/// providers are skipped and reported here instead of blocking the caller
/// indefinitely. Signals without a provider (disabled, or not initialized)
/// count as flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlushSummary {
    /// Whether the trace pipeline flushed.
    pub traces_flushed: bool,
    /// Whether the metrics pipeline flushed.
    pub metrics_flushed: bool,
    /// Whether the logs pipeline flushed.
    pub logs_flushed: bool,
    /// Whether the deadline expired before every pipeline was flushed.
    pub timed_out: bool,
}

impl FlushSummary {
    /// A summary with every pipeline flushed.
    pub fn complete() -> Self {
        Self {
            traces_flushed: true,
            metrics_flushed: true,
            logs_flushed: true,
            timed_out: false,
        }
    }

    /// Returns true when every pipeline flushed within the deadline.
    pub fn is_complete(&self) -> bool {
        self.traces_flushed && self.metrics_flushed && self.logs_flushed && !self.timed_out
    }
}

/// Builds signal providers for the command handler.
///
/// Implementations receive the validated config and the resource describing
/// the reporting process, and return a provider wired to whatever transport
/// they stand for. All methods are fallible; a failure during initialization
/// is fatal to that initialize call.
pub trait ExporterFactory: Send + Sync {
    /// Builds the tracer provider.
    fn tracer_provider(
        &self,
        config: &TelemetryConfig,
        resource: &Resource,
    ) -> Result<SdkTracerProvider, ExportError>;

    /// Builds the meter provider.
    fn meter_provider(
        &self,
        config: &TelemetryConfig,
        resource: &Resource,
    ) -> Result<SdkMeterProvider, ExportError>;

    /// Builds the logger provider.
    fn logger_provider(
        &self,
        config: &TelemetryConfig,
        resource: &Resource,
    ) -> Result<SdkLoggerProvider, ExportError>;
}

/// Production [`ExporterFactory`] backed by `opentelemetry-otlp`.
///
/// The gRPC transport needs a tokio runtime in the host application; the
/// HTTP transport uses a blocking client and runs anywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct OtlpExporterFactory;

impl OtlpExporterFactory {
    /// Creates the factory.
    pub fn new() -> Self {
        Self
    }

    /// Builds the OTLP trace exporter for the configured protocol,
    /// endpoint, auth headers, and TLS mode.
    ///
    /// # Errors
    ///
    /// Returns an [`ExportError`] when the exporter cannot be built or a
    /// header is not valid gRPC metadata.
    pub fn create_trace_exporter(
        &self,
        config: &TelemetryConfig,
    ) -> Result<SpanExporter, ExportError> {
        match config.protocol {
            Protocol::Grpc => {
                let mut builder = SpanExporter::builder()
                    .with_tonic()
                    .with_endpoint(config.endpoint_url())
                    .with_timeout(config.timeout)
                    .with_metadata(grpc_metadata(&config.auth_headers())?);
                if config.compression {
                    builder = builder.with_compression(Compression::Gzip);
                }
                builder.build().map_err(ExportError::TraceExporter)
            }
            Protocol::Http => SpanExporter::builder()
                .with_http()
                .with_endpoint(config.http_signal_endpoint(SignalKind::Traces))
                .with_timeout(config.timeout)
                .with_protocol(opentelemetry_otlp::Protocol::HttpBinary)
                .with_headers(config.auth_headers())
                .build()
                .map_err(ExportError::TraceExporter),
        }
    }

    /// Builds the OTLP metric exporter for the configured protocol.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`create_trace_exporter`](Self::create_trace_exporter).
    pub fn create_metric_exporter(
        &self,
        config: &TelemetryConfig,
    ) -> Result<MetricExporter, ExportError> {
        match config.protocol {
            Protocol::Grpc => {
                let mut builder = MetricExporter::builder()
                    .with_tonic()
                    .with_endpoint(config.endpoint_url())
                    .with_timeout(config.timeout)
                    .with_metadata(grpc_metadata(&config.auth_headers())?);
                if config.compression {
                    builder = builder.with_compression(Compression::Gzip);
                }
                builder.build().map_err(ExportError::MetricExporter)
            }
            Protocol::Http => MetricExporter::builder()
                .with_http()
                .with_endpoint(config.http_signal_endpoint(SignalKind::Metrics))
                .with_timeout(config.timeout)
                .with_protocol(opentelemetry_otlp::Protocol::HttpBinary)
                .with_headers(config.auth_headers())
                .build()
                .map_err(ExportError::MetricExporter),
        }
    }

    /// Builds the OTLP log exporter for the configured protocol.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`create_trace_exporter`](Self::create_trace_exporter).
    pub fn create_log_exporter(
        &self,
        config: &TelemetryConfig,
    ) -> Result<LogExporter, ExportError> {
        match config.protocol {
            Protocol::Grpc => {
                let mut builder = LogExporter::builder()
                    .with_tonic()
                    .with_endpoint(config.endpoint_url())
                    .with_timeout(config.timeout)
                    .with_metadata(grpc_metadata(&config.auth_headers())?);
                if config.compression {
                    builder = builder.with_compression(Compression::Gzip);
                }
                builder.build().map_err(ExportError::LogExporter)
            }
            Protocol::Http => LogExporter::builder()
                .with_http()
                .with_endpoint(config.http_signal_endpoint(SignalKind::Logs))
                .with_timeout(config.timeout)
                .with_protocol(opentelemetry_otlp::Protocol::HttpBinary)
                .with_headers(config.auth_headers())
                .build()
                .map_err(ExportError::LogExporter),
        }
    }
}

impl ExporterFactory for OtlpExporterFactory {
    fn tracer_provider(
        &self,
        config: &TelemetryConfig,
        resource: &Resource,
    ) -> Result<SdkTracerProvider, ExportError> {
        let exporter = self.create_trace_exporter(config)?;

        let batch_config = TraceBatchConfigBuilder::default()
            .with_max_export_batch_size(config.batch.max_size)
            .with_scheduled_delay(config.batch.timeout)
            .build();
        let span_processor = BatchSpanProcessor::builder(exporter)
            .with_batch_config(batch_config)
            .build();

        Ok(SdkTracerProvider::builder()
            .with_span_processor(span_processor)
            .with_resource(resource.clone())
            .build())
    }

    fn meter_provider(
        &self,
        config: &TelemetryConfig,
        resource: &Resource,
    ) -> Result<SdkMeterProvider, ExportError> {
        let exporter = self.create_metric_exporter(config)?;

        let reader = PeriodicReader::builder(exporter)
            .with_interval(config.batch.timeout)
            .build();

        Ok(SdkMeterProvider::builder()
            .with_reader(reader)
            .with_resource(resource.clone())
            .build())
    }

    fn logger_provider(
        &self,
        config: &TelemetryConfig,
        resource: &Resource,
    ) -> Result<SdkLoggerProvider, ExportError> {
        let exporter = self.create_log_exporter(config)?;

        let batch_config = LogBatchConfigBuilder::default()
            .with_max_export_batch_size(config.batch.max_size)
            .with_scheduled_delay(config.batch.timeout)
            .build();
        let log_processor = BatchLogProcessor::builder(exporter)
            .with_batch_config(batch_config)
            .build();

        Ok(SdkLoggerProvider::builder()
            .with_log_processor(log_processor)
            .with_resource(resource.clone())
            .build())
    }
}

/// Converts HTTP-cased headers into gRPC metadata.
///
/// gRPC metadata keys must be lowercase; tonic rejects anything else, so
/// keys are lower-cased here before parsing.
pub(crate) fn grpc_metadata(
    headers: &HashMap<String, String>,
) -> Result<MetadataMap, ExportError> {
    let mut metadata = MetadataMap::new();
    for (key, value) in headers {
        let name = key.to_ascii_lowercase();
        match (
            name.parse::<MetadataKey<_>>(),
            value.parse::<MetadataValue<_>>(),
        ) {
            (Ok(k), Ok(v)) => {
                metadata.insert(k, v);
            }
            _ => return Err(ExportError::InvalidHeader { name }),
        }
    }
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::Credentials;

    fn config() -> TelemetryConfig {
        TelemetryConfig::new(
            Credentials::new("tfk_test", "tfs_test").unwrap(),
            "localhost:4317",
            "svc",
        )
        .unwrap()
    }

    #[test]
    fn test_grpc_metadata_lowercases_keys() {
        let headers = HashMap::from([
            ("Authorization".to_owned(), "Bearer tfk_a:tfs_b".to_owned()),
            ("X-TelemetryFlow-Key-ID".to_owned(), "tfk_a".to_owned()),
        ]);

        let metadata = grpc_metadata(&headers).unwrap();

        assert_eq!(
            metadata.get("authorization").unwrap().to_str().unwrap(),
            "Bearer tfk_a:tfs_b"
        );
        assert_eq!(
            metadata
                .get("x-telemetryflow-key-id")
                .unwrap()
                .to_str()
                .unwrap(),
            "tfk_a"
        );
    }

    #[test]
    fn test_grpc_metadata_rejects_invalid_key() {
        let headers = HashMap::from([("bad header".to_owned(), "v".to_owned())]);
        let err = grpc_metadata(&headers).unwrap_err();
        assert!(matches!(err, ExportError::InvalidHeader { .. }));
    }

    #[test]
    fn test_http_exporters_build() {
        let mut config = config();
        config.protocol = Protocol::Http;
        config.insecure = true;

        let factory = OtlpExporterFactory::new();
        assert!(factory.create_trace_exporter(&config).is_ok());
        assert!(factory.create_metric_exporter(&config).is_ok());
        assert!(factory.create_log_exporter(&config).is_ok());
    }

    #[tokio::test]
    async fn test_grpc_exporters_build() {
        let mut config = config();
        config.insecure = true;

        let factory = OtlpExporterFactory::new();
        assert!(factory.create_trace_exporter(&config).is_ok());
        assert!(factory.create_metric_exporter(&config).is_ok());
        assert!(factory.create_log_exporter(&config).is_ok());
    }

    #[test]
    fn test_flush_summary_complete() {
        let summary = FlushSummary::complete();
        assert!(summary.is_complete());

        let partial = FlushSummary {
            metrics_flushed: false,
            timed_out: true,
            ..FlushSummary::complete()
        };
        assert!(!partial.is_complete());
    }
}
