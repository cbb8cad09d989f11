//! SDK configuration aggregate.
//!
//! [`TelemetryConfig`] describes everything the SDK needs to reach a
//! collector: endpoint, protocol, service identity, enabled signals, and
//! batching/retry/compression policy. A config is validated when produced
//! (by [`TelemetryConfig::new`] or the builder) and read-only afterwards;
//! changing anything means building a new one.

use crate::credentials::Credentials;
use opentelemetry::KeyValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// OTLP transport protocol.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// gRPC protocol (port 4317).
    #[default]
    Grpc,
    /// HTTP/protobuf protocol (port 4318).
    Http,
}

impl Protocol {
    /// Returns the lowercase wire name of the protocol.
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Grpc => "grpc",
            Protocol::Http => "http",
        }
    }
}

/// Telemetry signal kind.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    /// Metric instruments (counters, gauges, histograms).
    Metrics,
    /// Log records.
    Logs,
    /// Trace spans.
    Traces,
}

impl SignalKind {
    /// Returns the lowercase name of the signal.
    pub fn as_str(self) -> &'static str {
        match self {
            SignalKind::Metrics => "metrics",
            SignalKind::Logs => "logs",
            SignalKind::Traces => "traces",
        }
    }
}

/// Configuration validation errors.
///
/// Validation checks run in a fixed order (credentials, endpoint, service
/// name, signals, numeric ranges) and the first violation is reported, so
/// the same input always yields the same error.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The endpoint was empty.
    #[error("endpoint is required")]
    MissingEndpoint,

    /// The service name was empty.
    #[error("service name is required")]
    MissingServiceName,

    /// Every signal was disabled.
    #[error("at least one signal (metrics, logs, traces) must be enabled")]
    NoSignalsEnabled,

    /// The connection timeout was zero.
    #[error("timeout must be positive")]
    ZeroTimeout,

    /// The batch max size was zero.
    #[error("batch max size must be positive")]
    ZeroBatchSize,

    /// The rate limit was zero.
    #[error("rate limit must be positive")]
    ZeroRateLimit,
}

/// Retry policy for the export layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Whether export retries are enabled.
    pub enabled: bool,
    /// Maximum retry attempts per export.
    pub max_attempts: u32,
    /// Backoff between attempts.
    #[serde(with = "duration_ms")]
    pub backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            backoff: Duration::from_secs(5),
        }
    }
}

/// Batch export policy applied to the signal processors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Delay between scheduled batch exports.
    #[serde(with = "duration_ms")]
    pub timeout: Duration,
    /// Maximum number of items per export batch.
    pub max_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_size: 512,
        }
    }
}

/// Per-signal enable flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Whether the metrics pipeline is enabled.
    pub metrics: bool,
    /// Whether the logs pipeline is enabled.
    pub logs: bool,
    /// Whether the traces pipeline is enabled.
    pub traces: bool,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            metrics: true,
            logs: true,
            traces: true,
        }
    }
}

/// Identity of the collector this SDK reports through.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorIdentity {
    /// Unique collector identifier, sent as `X-TelemetryFlow-Collector-ID`.
    pub id: Option<String>,
    /// Human-readable collector name.
    pub name: Option<String>,
    /// Datacenter or region the collector lives in.
    pub datacenter: Option<String>,
    /// Free-form collector tags.
    pub tags: HashMap<String, String>,
}

/// TelemetryFlow v2 API feature flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct V2ApiConfig {
    /// Whether to use the v2 ingestion paths.
    pub enabled: bool,
    /// Whether the collector accepts only v2 paths.
    pub only: bool,
    /// Override for the traces ingestion path.
    pub traces_path: Option<String>,
    /// Override for the metrics ingestion path.
    pub metrics_path: Option<String>,
    /// Override for the logs ingestion path.
    pub logs_path: Option<String>,
}

/// Aggregate root for TelemetryFlow SDK configuration.
///
/// Produced by [`TelemetryBuilder::build`](crate::TelemetryBuilder::build)
/// or [`TelemetryConfig::new`]; fully validated and immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// API credentials.
    pub credentials: Credentials,
    /// Collector endpoint as `host:port`.
    pub endpoint: String,
    /// Reporting service name.
    pub service_name: String,

    /// Transport protocol.
    pub protocol: Protocol,
    /// Disable TLS and use plaintext transport.
    pub insecure: bool,
    /// Connection/export timeout.
    #[serde(with = "duration_ms")]
    pub timeout: Duration,
    /// Whether to gzip-compress exports (gRPC transport).
    pub compression: bool,

    /// Export retry policy.
    pub retry: RetryConfig,
    /// Batch export policy.
    pub batch: BatchConfig,
    /// Per-signal enable flags.
    pub signals: SignalConfig,
    /// Whether exemplars are enabled for metrics-to-traces correlation.
    pub exemplars: bool,

    /// Reporting service version.
    pub service_version: String,
    /// Service namespace for multi-tenant setups.
    pub service_namespace: String,
    /// Deployment environment name.
    pub environment: String,
    /// Additional static resource attributes.
    pub custom_attributes: HashMap<String, String>,

    /// Collector identity.
    pub collector: CollectorIdentity,
    /// v2 API flags.
    pub v2: V2ApiConfig,
    /// Rate limit in requests per minute.
    pub rate_limit: u32,
}

/// Default collector endpoint.
pub const DEFAULT_ENDPOINT: &str = "localhost:4317";
/// Default service version.
pub const DEFAULT_SERVICE_VERSION: &str = "1.0.0";
/// Default service namespace.
pub const DEFAULT_SERVICE_NAMESPACE: &str = "telemetryflow";
/// Default deployment environment.
pub const DEFAULT_ENVIRONMENT: &str = "production";

impl TelemetryConfig {
    /// Creates a config with the required fields and defaults for the rest.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when validation fails.
    pub fn new(
        credentials: Credentials,
        endpoint: impl Into<String>,
        service_name: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            credentials,
            endpoint: endpoint.into(),
            service_name: service_name.into(),
            protocol: Protocol::default(),
            insecure: false,
            timeout: Duration::from_secs(30),
            compression: true,
            retry: RetryConfig::default(),
            batch: BatchConfig::default(),
            signals: SignalConfig::default(),
            exemplars: true,
            service_version: DEFAULT_SERVICE_VERSION.to_owned(),
            service_namespace: DEFAULT_SERVICE_NAMESPACE.to_owned(),
            environment: DEFAULT_ENVIRONMENT.to_owned(),
            custom_attributes: HashMap::new(),
            collector: CollectorIdentity::default(),
            v2: V2ApiConfig::default(),
            rate_limit: 1000,
        };
        config.validate()?;
        Ok(config)
    }

    /// Creates a builder for assembling a config field by field.
    pub fn builder() -> crate::builder::TelemetryBuilder {
        crate::builder::TelemetryBuilder::new()
    }

    /// Validates the aggregate, reporting the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }
        if self.service_name.is_empty() {
            return Err(ConfigError::MissingServiceName);
        }
        if !self.signals.metrics && !self.signals.logs && !self.signals.traces {
            return Err(ConfigError::NoSignalsEnabled);
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.batch.max_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.rate_limit == 0 {
            return Err(ConfigError::ZeroRateLimit);
        }
        Ok(())
    }

    /// Returns the endpoint as a full URL.
    ///
    /// The scheme follows the insecure flag for both transports; tonic and
    /// the HTTP exporter both want a scheme-qualified endpoint.
    pub fn endpoint_url(&self) -> String {
        let scheme = if self.insecure { "http" } else { "https" };
        format!("{}://{}", scheme, self.endpoint.trim_end_matches('/'))
    }

    /// Returns the ingestion path for a signal on the HTTP transport.
    ///
    /// With the v2 API enabled the per-signal override wins, falling back
    /// to `/v2/<signal>`; otherwise the standard OTLP `/v1/<signal>`.
    pub fn signal_path(&self, signal: SignalKind) -> String {
        if self.v2.enabled {
            let override_path = match signal {
                SignalKind::Traces => self.v2.traces_path.as_deref(),
                SignalKind::Metrics => self.v2.metrics_path.as_deref(),
                SignalKind::Logs => self.v2.logs_path.as_deref(),
            };
            match override_path {
                Some(path) => path.to_owned(),
                None => format!("/v2/{}", signal.as_str()),
            }
        } else {
            format!("/v1/{}", signal.as_str())
        }
    }

    /// Returns the full per-signal HTTP endpoint URL.
    pub fn http_signal_endpoint(&self, signal: SignalKind) -> String {
        format!("{}{}", self.endpoint_url(), self.signal_path(signal))
    }

    /// Returns the enabled signals in a fixed order.
    pub fn enabled_signals(&self) -> Vec<SignalKind> {
        let mut signals = Vec::new();
        if self.signals.metrics {
            signals.push(SignalKind::Metrics);
        }
        if self.signals.logs {
            signals.push(SignalKind::Logs);
        }
        if self.signals.traces {
            signals.push(SignalKind::Traces);
        }
        signals
    }

    /// Checks whether a specific signal is enabled.
    pub fn is_signal_enabled(&self, signal: SignalKind) -> bool {
        match signal {
            SignalKind::Metrics => self.signals.metrics,
            SignalKind::Logs => self.signals.logs,
            SignalKind::Traces => self.signals.traces,
        }
    }

    /// Returns authentication headers, including the collector ID when set.
    pub fn auth_headers(&self) -> HashMap<String, String> {
        let mut headers = self.credentials.auth_headers();
        if let Some(id) = &self.collector.id {
            headers.insert("X-TelemetryFlow-Collector-ID".to_owned(), id.clone());
        }
        headers
    }

    /// Returns the OpenTelemetry resource attributes for this service.
    pub fn resource_attributes(&self) -> Vec<KeyValue> {
        let mut attributes = vec![
            KeyValue::new("service.name", self.service_name.clone()),
            KeyValue::new("service.version", self.service_version.clone()),
            KeyValue::new("service.namespace", self.service_namespace.clone()),
            KeyValue::new("deployment.environment", self.environment.clone()),
        ];

        if let Some(id) = &self.collector.id {
            attributes.push(KeyValue::new("telemetryflow.collector.id", id.clone()));
        }
        if let Some(name) = &self.collector.name {
            attributes.push(KeyValue::new("telemetryflow.collector.name", name.clone()));
        }
        if let Some(dc) = &self.collector.datacenter {
            attributes.push(KeyValue::new(
                "telemetryflow.collector.datacenter",
                dc.clone(),
            ));
        }
        for (key, value) in &self.collector.tags {
            attributes.push(KeyValue::new(
                format!("telemetryflow.collector.tag.{key}"),
                value.clone(),
            ));
        }
        for (key, value) in &self.custom_attributes {
            attributes.push(KeyValue::new(key.clone(), value.clone()));
        }

        attributes
    }
}

/// Serde helper storing durations as integer milliseconds.
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials::new("tfk_test", "tfs_test").unwrap()
    }

    fn config() -> TelemetryConfig {
        TelemetryConfig::new(credentials(), "localhost:4317", "svc").unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = config();

        assert_eq!(config.protocol, Protocol::Grpc);
        assert!(!config.insecure);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.compression);
        assert_eq!(config.batch.max_size, 512);
        assert_eq!(config.batch.timeout, Duration::from_secs(10));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.service_version, "1.0.0");
        assert_eq!(config.service_namespace, "telemetryflow");
        assert_eq!(config.environment, "production");
        assert_eq!(config.rate_limit, 1000);
    }

    #[test]
    fn test_empty_endpoint_rejected() {
        let err = TelemetryConfig::new(credentials(), "", "svc").unwrap_err();
        assert_eq!(err, ConfigError::MissingEndpoint);
    }

    #[test]
    fn test_empty_service_name_rejected() {
        let err = TelemetryConfig::new(credentials(), "localhost:4317", "").unwrap_err();
        assert_eq!(err, ConfigError::MissingServiceName);
    }

    #[test]
    fn test_no_signals_rejected() {
        let mut config = config();
        config.signals = SignalConfig {
            metrics: false,
            logs: false,
            traces: false,
        };
        assert_eq!(config.validate().unwrap_err(), ConfigError::NoSignalsEnabled);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = config();
        config.timeout = Duration::ZERO;
        assert_eq!(config.validate().unwrap_err(), ConfigError::ZeroTimeout);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut config = config();
        config.batch.max_size = 0;
        assert_eq!(config.validate().unwrap_err(), ConfigError::ZeroBatchSize);
    }

    #[test]
    fn test_endpoint_url_scheme_follows_insecure_flag() {
        let mut config = config();
        assert_eq!(config.endpoint_url(), "https://localhost:4317");

        config.insecure = true;
        assert_eq!(config.endpoint_url(), "http://localhost:4317");
    }

    #[test]
    fn test_signal_paths_v1_by_default() {
        let config = config();
        assert_eq!(config.signal_path(SignalKind::Traces), "/v1/traces");
        assert_eq!(config.signal_path(SignalKind::Metrics), "/v1/metrics");
        assert_eq!(config.signal_path(SignalKind::Logs), "/v1/logs");
    }

    #[test]
    fn test_signal_paths_v2() {
        let mut config = config();
        config.v2.enabled = true;
        assert_eq!(config.signal_path(SignalKind::Traces), "/v2/traces");

        config.v2.traces_path = Some("/ingest/traces".to_owned());
        assert_eq!(config.signal_path(SignalKind::Traces), "/ingest/traces");
        assert_eq!(config.signal_path(SignalKind::Metrics), "/v2/metrics");
    }

    #[test]
    fn test_http_signal_endpoint() {
        let mut config = config();
        config.insecure = true;
        assert_eq!(
            config.http_signal_endpoint(SignalKind::Logs),
            "http://localhost:4317/v1/logs"
        );
    }

    #[test]
    fn test_enabled_signals_order() {
        let mut config = config();
        assert_eq!(
            config.enabled_signals(),
            vec![SignalKind::Metrics, SignalKind::Logs, SignalKind::Traces]
        );

        config.signals.logs = false;
        assert_eq!(
            config.enabled_signals(),
            vec![SignalKind::Metrics, SignalKind::Traces]
        );
    }

    #[test]
    fn test_auth_headers_include_collector_id() {
        let mut config = config();
        assert!(!config.auth_headers().contains_key("X-TelemetryFlow-Collector-ID"));

        config.collector.id = Some("col-7".to_owned());
        assert_eq!(
            config.auth_headers()["X-TelemetryFlow-Collector-ID"],
            "col-7"
        );
    }

    #[test]
    fn test_resource_attributes() {
        let mut config = config();
        config.custom_attributes.insert("team".to_owned(), "core".to_owned());
        config.collector.datacenter = Some("eu-1".to_owned());

        let attrs = config.resource_attributes();
        let find = |key: &str| {
            attrs
                .iter()
                .find(|kv| kv.key.as_str() == key)
                .map(|kv| kv.value.to_string())
        };

        assert_eq!(find("service.name").as_deref(), Some("svc"));
        assert_eq!(find("service.namespace").as_deref(), Some("telemetryflow"));
        assert_eq!(find("deployment.environment").as_deref(), Some("production"));
        assert_eq!(find("team").as_deref(), Some("core"));
        assert_eq!(find("telemetryflow.collector.datacenter").as_deref(), Some("eu-1"));
    }

    #[test]
    fn test_protocol_serialization() {
        assert_eq!(serde_json::to_string(&Protocol::Grpc).unwrap(), "\"grpc\"");
        assert_eq!(serde_json::to_string(&Protocol::Http).unwrap(), "\"http\"");
    }
}
