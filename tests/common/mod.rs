//! Shared test fixtures: in-memory exporter factories and config helpers.

use opentelemetry_sdk::Resource;
use opentelemetry_sdk::logs::{InMemoryLogExporter, SdkLoggerProvider};
use opentelemetry_sdk::metrics::{InMemoryMetricExporter, PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider};
use telemetryflow::{
    Credentials, ExportError, ExporterFactory, TelemetryClient, TelemetryConfig,
};

/// Exporter factory backed by shared in-memory exporters.
///
/// Clones of the exporters stay connected to the providers, so tests can
/// inspect what the SDK exported.
#[derive(Clone, Default)]
pub struct RecordingFactory {
    pub span_exporter: InMemorySpanExporter,
    pub metric_exporter: InMemoryMetricExporter,
    pub log_exporter: InMemoryLogExporter,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExporterFactory for RecordingFactory {
    fn tracer_provider(
        &self,
        _config: &TelemetryConfig,
        resource: &Resource,
    ) -> Result<SdkTracerProvider, ExportError> {
        Ok(SdkTracerProvider::builder()
            .with_simple_exporter(self.span_exporter.clone())
            .with_resource(resource.clone())
            .build())
    }

    fn meter_provider(
        &self,
        _config: &TelemetryConfig,
        resource: &Resource,
    ) -> Result<SdkMeterProvider, ExportError> {
        let reader = PeriodicReader::builder(self.metric_exporter.clone()).build();
        Ok(SdkMeterProvider::builder()
            .with_reader(reader)
            .with_resource(resource.clone())
            .build())
    }

    fn logger_provider(
        &self,
        _config: &TelemetryConfig,
        resource: &Resource,
    ) -> Result<SdkLoggerProvider, ExportError> {
        Ok(SdkLoggerProvider::builder()
            .with_simple_exporter(self.log_exporter.clone())
            .with_resource(resource.clone())
            .build())
    }
}

/// A minimal valid config pointed at a local collector endpoint.
pub fn test_config() -> TelemetryConfig {
    TelemetryConfig::new(
        Credentials::new("tfk_test", "tfs_test").unwrap(),
        "localhost:4317",
        "test-service",
    )
    .unwrap()
}

/// A client wired to a fresh recording factory.
pub fn recording_client() -> (TelemetryClient, RecordingFactory) {
    let factory = RecordingFactory::new();
    let client = TelemetryClient::with_factory(test_config(), Box::new(factory.clone()));
    (client, factory)
}
