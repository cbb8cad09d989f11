//! Fluent builder for assembling a validated [`TelemetryConfig`].
//!
//! The builder is a mutable staging object used single-threaded during
//! startup: each field has an explicit setter plus a `*_from_env` loader,
//! and [`with_auto_configuration`](TelemetryBuilder::with_auto_configuration)
//! runs every loader at once. Layering an optional TOML config file on top
//! is supported through figment. `build()` consumes the builder, so it is
//! one-shot by construction.
//!
//! # Recognised environment variables
//!
//! | Variable | Default |
//! |----------|---------|
//! | `TELEMETRYFLOW_API_KEY_ID` | required |
//! | `TELEMETRYFLOW_API_KEY_SECRET` | required |
//! | `TELEMETRYFLOW_SERVICE_NAME` | required |
//! | `TELEMETRYFLOW_SERVICE_VERSION` | `1.0.0` |
//! | `TELEMETRYFLOW_SERVICE_NAMESPACE` | `telemetryflow` |
//! | `TELEMETRYFLOW_ENDPOINT` | `localhost:4317` |
//! | `TELEMETRYFLOW_PROTOCOL` | `grpc` |
//! | `TELEMETRYFLOW_ENVIRONMENT` | `ENV`, `ENVIRONMENT`, then `production` |
//! | `TELEMETRYFLOW_TIMEOUT` (seconds) | `10` |
//! | `TELEMETRYFLOW_INSECURE` | `false` |
//! | `TELEMETRYFLOW_COMPRESSION` | `false` |
//! | `TELEMETRYFLOW_COLLECTOR_ID` | unset |
//! | `TELEMETRYFLOW_COLLECTOR_NAME` | unset |
//! | `TELEMETRYFLOW_DATACENTER` | unset |
//! | `TELEMETRYFLOW_USE_V2_API` / `TELEMETRYFLOW_V2_ONLY` | `false` |
//! | `TELEMETRYFLOW_RETRY_ENABLED` | `true` |
//! | `TELEMETRYFLOW_MAX_RETRIES` | `3` |
//! | `TELEMETRYFLOW_RETRY_BACKOFF` (ms) | `500` |
//! | `TELEMETRYFLOW_BATCH_TIMEOUT` (ms) | `5000` |
//! | `TELEMETRYFLOW_BATCH_MAX_SIZE` | `512` |
//! | `TELEMETRYFLOW_ENABLE_METRICS` / `_LOGS` / `_TRACES` | `true` |
//! | `TELEMETRYFLOW_ENABLE_EXEMPLARS` | `true` |
//! | `TELEMETRYFLOW_RATE_LIMIT` | `0` (keep default) |
//!
//! Unparseable numeric or boolean values keep the current value rather than
//! failing; missing required values surface at `build()`.

use crate::client::TelemetryClient;
use crate::config::{
    BatchConfig, CollectorIdentity, ConfigError, DEFAULT_ENDPOINT, DEFAULT_ENVIRONMENT,
    DEFAULT_SERVICE_NAMESPACE, DEFAULT_SERVICE_VERSION, Protocol, RetryConfig, SignalConfig,
    TelemetryConfig, V2ApiConfig,
};
use crate::credentials::{Credentials, CredentialsError};
use figment::Figment;
use figment::providers::{Format, Toml};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

// Core settings.
/// Environment variable holding the API key ID.
pub const ENV_API_KEY_ID: &str = "TELEMETRYFLOW_API_KEY_ID";
/// Environment variable holding the API key secret.
pub const ENV_API_KEY_SECRET: &str = "TELEMETRYFLOW_API_KEY_SECRET";
/// Environment variable holding the collector endpoint.
pub const ENV_ENDPOINT: &str = "TELEMETRYFLOW_ENDPOINT";
/// Environment variable holding the service name.
pub const ENV_SERVICE_NAME: &str = "TELEMETRYFLOW_SERVICE_NAME";
/// Environment variable holding the service version.
pub const ENV_SERVICE_VERSION: &str = "TELEMETRYFLOW_SERVICE_VERSION";
/// Environment variable holding the service namespace.
pub const ENV_SERVICE_NAMESPACE: &str = "TELEMETRYFLOW_SERVICE_NAMESPACE";
/// Environment variable holding the deployment environment.
pub const ENV_ENVIRONMENT: &str = "TELEMETRYFLOW_ENVIRONMENT";
/// Environment variable toggling plaintext transport.
pub const ENV_INSECURE: &str = "TELEMETRYFLOW_INSECURE";

// v2 API settings.
/// Environment variable enabling the v2 ingestion API.
pub const ENV_USE_V2_API: &str = "TELEMETRYFLOW_USE_V2_API";
/// Environment variable marking the collector as v2-only.
pub const ENV_V2_ONLY: &str = "TELEMETRYFLOW_V2_ONLY";

// Collector identity.
/// Environment variable holding the collector ID.
pub const ENV_COLLECTOR_ID: &str = "TELEMETRYFLOW_COLLECTOR_ID";
/// Environment variable holding the collector name.
pub const ENV_COLLECTOR_NAME: &str = "TELEMETRYFLOW_COLLECTOR_NAME";
/// Environment variable holding the collector datacenter.
pub const ENV_DATACENTER: &str = "TELEMETRYFLOW_DATACENTER";

// Protocol settings.
/// Environment variable selecting the transport protocol.
pub const ENV_PROTOCOL: &str = "TELEMETRYFLOW_PROTOCOL";
/// Environment variable toggling export compression.
pub const ENV_COMPRESSION: &str = "TELEMETRYFLOW_COMPRESSION";
/// Environment variable holding the timeout in seconds.
pub const ENV_TIMEOUT: &str = "TELEMETRYFLOW_TIMEOUT";

// Retry settings.
/// Environment variable toggling export retries.
pub const ENV_RETRY_ENABLED: &str = "TELEMETRYFLOW_RETRY_ENABLED";
/// Environment variable holding the maximum retry attempts.
pub const ENV_MAX_RETRIES: &str = "TELEMETRYFLOW_MAX_RETRIES";
/// Environment variable holding the retry backoff in milliseconds.
pub const ENV_RETRY_BACKOFF: &str = "TELEMETRYFLOW_RETRY_BACKOFF";

// Batch settings.
/// Environment variable holding the batch timeout in milliseconds.
pub const ENV_BATCH_TIMEOUT: &str = "TELEMETRYFLOW_BATCH_TIMEOUT";
/// Environment variable holding the maximum batch size.
pub const ENV_BATCH_MAX_SIZE: &str = "TELEMETRYFLOW_BATCH_MAX_SIZE";

// Signals.
/// Environment variable toggling the traces pipeline.
pub const ENV_ENABLE_TRACES: &str = "TELEMETRYFLOW_ENABLE_TRACES";
/// Environment variable toggling the metrics pipeline.
pub const ENV_ENABLE_METRICS: &str = "TELEMETRYFLOW_ENABLE_METRICS";
/// Environment variable toggling the logs pipeline.
pub const ENV_ENABLE_LOGS: &str = "TELEMETRYFLOW_ENABLE_LOGS";
/// Environment variable toggling exemplar collection.
pub const ENV_ENABLE_EXEMPLARS: &str = "TELEMETRYFLOW_ENABLE_EXEMPLARS";

// Rate limiting.
/// Environment variable holding the rate limit in requests per minute.
pub const ENV_RATE_LIMIT: &str = "TELEMETRYFLOW_RATE_LIMIT";

/// Errors raised while building a configuration.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BuilderError {
    /// No API key pair was provided.
    #[error("API key ID and secret are required")]
    MissingApiKey,

    /// The provided key pair failed validation.
    #[error(transparent)]
    Credentials(#[from] CredentialsError),

    /// The assembled configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The config file could not be read or parsed.
    #[error("failed to load config file")]
    ConfigFile(#[source] Box<figment::Error>),
}

/// Overrides loaded from an optional TOML config file.
///
/// Every field is optional; present values overwrite the builder's staged
/// state at the point `with_config_file` is called.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileOverrides {
    api_key_id: Option<String>,
    api_key_secret: Option<String>,
    endpoint: Option<String>,
    service_name: Option<String>,
    service_version: Option<String>,
    service_namespace: Option<String>,
    environment: Option<String>,
    protocol: Option<Protocol>,
    insecure: Option<bool>,
    #[serde(default, with = "duration_ms_opt")]
    timeout: Option<Duration>,
    compression: Option<bool>,
    retry: Option<RetryConfig>,
    batch: Option<BatchConfig>,
    signals: Option<SignalConfig>,
    attributes: Option<HashMap<String, String>>,
}

/// Fluent builder for TelemetryFlow clients.
///
/// # Example
///
/// ```no_run
/// use telemetryflow::TelemetryBuilder;
///
/// let client = TelemetryBuilder::new()
///     .with_api_key("tfk_xxx", "tfs_xxx")
///     .with_endpoint("api.telemetryflow.id:4317")
///     .with_service("my-service", Some("1.0.0"))
///     .with_environment("production")
///     .with_grpc()
///     .build_client()
///     .unwrap();
/// ```
#[must_use = "builders do nothing unless .build() is called"]
#[derive(Debug, Clone)]
pub struct TelemetryBuilder {
    api_key_id: Option<String>,
    api_key_secret: Option<String>,
    endpoint: String,
    service_name: Option<String>,
    service_version: String,
    service_namespace: String,
    environment: String,
    protocol: Protocol,
    insecure: bool,
    timeout: Duration,
    compression: bool,
    retry: RetryConfig,
    batch: BatchConfig,
    signals: SignalConfig,
    exemplars: bool,
    collector: CollectorIdentity,
    v2: V2ApiConfig,
    custom_attributes: HashMap<String, String>,
    rate_limit: u32,
}

impl TelemetryBuilder {
    /// Creates a builder with default values.
    pub fn new() -> Self {
        Self {
            api_key_id: None,
            api_key_secret: None,
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            service_name: None,
            service_version: DEFAULT_SERVICE_VERSION.to_owned(),
            service_namespace: DEFAULT_SERVICE_NAMESPACE.to_owned(),
            environment: DEFAULT_ENVIRONMENT.to_owned(),
            protocol: Protocol::Grpc,
            insecure: false,
            timeout: Duration::from_secs(30),
            compression: true,
            retry: RetryConfig::default(),
            batch: BatchConfig::default(),
            signals: SignalConfig::default(),
            exemplars: true,
            collector: CollectorIdentity::default(),
            v2: V2ApiConfig::default(),
            custom_attributes: HashMap::new(),
            rate_limit: 1000,
        }
    }

    // API key configuration.

    /// Sets the API key pair.
    pub fn with_api_key(
        mut self,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Self {
        self.api_key_id = Some(key_id.into());
        self.api_key_secret = Some(key_secret.into());
        self
    }

    /// Loads the API key pair from `TELEMETRYFLOW_API_KEY_ID` and
    /// `TELEMETRYFLOW_API_KEY_SECRET`.
    pub fn with_api_key_from_env(mut self) -> Self {
        self.api_key_id = env::var(ENV_API_KEY_ID).ok();
        self.api_key_secret = env::var(ENV_API_KEY_SECRET).ok();
        self
    }

    // Endpoint configuration.

    /// Sets the collector endpoint (`host:port`).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Loads the endpoint from `TELEMETRYFLOW_ENDPOINT`, keeping the default
    /// when unset.
    pub fn with_endpoint_from_env(mut self) -> Self {
        if let Ok(endpoint) = env::var(ENV_ENDPOINT) {
            self.endpoint = endpoint;
        }
        self
    }

    // Service configuration.

    /// Sets the service name and optional version.
    pub fn with_service(mut self, name: impl Into<String>, version: Option<&str>) -> Self {
        self.service_name = Some(name.into());
        if let Some(version) = version {
            self.service_version = version.to_owned();
        }
        self
    }

    /// Loads the service name and version from the environment.
    pub fn with_service_from_env(mut self) -> Self {
        self.service_name = env::var(ENV_SERVICE_NAME).ok();
        self.service_version =
            env::var(ENV_SERVICE_VERSION).unwrap_or_else(|_| DEFAULT_SERVICE_VERSION.to_owned());
        self
    }

    /// Sets the service namespace.
    pub fn with_service_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.service_namespace = namespace.into();
        self
    }

    /// Loads the service namespace from `TELEMETRYFLOW_SERVICE_NAMESPACE`.
    pub fn with_service_namespace_from_env(mut self) -> Self {
        self.service_namespace = env::var(ENV_SERVICE_NAMESPACE)
            .unwrap_or_else(|_| DEFAULT_SERVICE_NAMESPACE.to_owned());
        self
    }

    // Environment configuration.

    /// Sets the deployment environment (`production`, `staging`, ...).
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Loads the deployment environment, checking `TELEMETRYFLOW_ENVIRONMENT`,
    /// `ENV`, and `ENVIRONMENT` in order.
    pub fn with_environment_from_env(mut self) -> Self {
        self.environment = env::var(ENV_ENVIRONMENT)
            .or_else(|_| env::var("ENV"))
            .or_else(|_| env::var("ENVIRONMENT"))
            .unwrap_or_else(|_| DEFAULT_ENVIRONMENT.to_owned());
        self
    }

    // Protocol configuration.

    /// Sets the OTLP transport protocol.
    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Uses the gRPC transport (the default).
    pub fn with_grpc(self) -> Self {
        self.with_protocol(Protocol::Grpc)
    }

    /// Uses the HTTP/protobuf transport.
    pub fn with_http(self) -> Self {
        self.with_protocol(Protocol::Http)
    }

    /// Enables or disables plaintext transport.
    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    // Signal configuration.

    /// Configures which signals to enable.
    pub fn with_signals(mut self, metrics: bool, logs: bool, traces: bool) -> Self {
        self.signals = SignalConfig {
            metrics,
            logs,
            traces,
        };
        self
    }

    /// Enables only the metrics signal.
    pub fn with_metrics_only(self) -> Self {
        self.with_signals(true, false, false)
    }

    /// Enables only the logs signal.
    pub fn with_logs_only(self) -> Self {
        self.with_signals(false, true, false)
    }

    /// Enables only the traces signal.
    pub fn with_traces_only(self) -> Self {
        self.with_signals(false, false, true)
    }

    /// Enables or disables exemplars for metrics-to-traces correlation.
    pub fn with_exemplars(mut self, enabled: bool) -> Self {
        self.exemplars = enabled;
        self
    }

    // Advanced configuration.

    /// Sets the connection timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the collector ID.
    pub fn with_collector_id(mut self, collector_id: impl Into<String>) -> Self {
        self.collector.id = Some(collector_id.into());
        self
    }

    /// Loads the collector ID from `TELEMETRYFLOW_COLLECTOR_ID`.
    pub fn with_collector_id_from_env(mut self) -> Self {
        self.collector.id = env::var(ENV_COLLECTOR_ID).ok();
        self
    }

    /// Sets the collector name.
    pub fn with_collector_name(mut self, name: impl Into<String>) -> Self {
        self.collector.name = Some(name.into());
        self
    }

    /// Sets the collector datacenter.
    pub fn with_datacenter(mut self, datacenter: impl Into<String>) -> Self {
        self.collector.datacenter = Some(datacenter.into());
        self
    }

    /// Adds a collector tag.
    pub fn with_collector_tag(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.collector.tags.insert(key.into(), value.into());
        self
    }

    /// Enables the v2 ingestion API.
    pub fn with_v2_api(mut self, enabled: bool) -> Self {
        self.v2.enabled = enabled;
        self
    }

    /// Marks the collector as accepting only v2 ingestion paths.
    pub fn with_v2_only(mut self, only: bool) -> Self {
        self.v2.only = only;
        if only {
            self.v2.enabled = true;
        }
        self
    }

    /// Overrides the per-signal v2 ingestion paths.
    pub fn with_v2_paths(
        mut self,
        traces: Option<String>,
        metrics: Option<String>,
        logs: Option<String>,
    ) -> Self {
        self.v2.traces_path = traces;
        self.v2.metrics_path = metrics;
        self.v2.logs_path = logs;
        self
    }

    /// Adds a custom resource attribute.
    pub fn with_custom_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.custom_attributes.insert(key.into(), value.into());
        self
    }

    /// Adds multiple custom resource attributes.
    pub fn with_custom_attributes(mut self, attributes: HashMap<String, String>) -> Self {
        self.custom_attributes.extend(attributes);
        self
    }

    /// Enables or disables export compression.
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    /// Configures the export retry policy.
    pub fn with_retry(
        mut self,
        enabled: bool,
        max_attempts: u32,
        backoff: Option<Duration>,
    ) -> Self {
        self.retry.enabled = enabled;
        self.retry.max_attempts = max_attempts;
        if let Some(backoff) = backoff {
            self.retry.backoff = backoff;
        }
        self
    }

    /// Configures the batch export policy.
    pub fn with_batch_settings(
        mut self,
        timeout: Option<Duration>,
        max_size: Option<usize>,
    ) -> Self {
        if let Some(timeout) = timeout {
            self.batch.timeout = timeout;
        }
        if let Some(max_size) = max_size {
            self.batch.max_size = max_size;
        }
        self
    }

    /// Sets the rate limit in requests per minute.
    pub fn with_rate_limit(mut self, rate_limit: u32) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    // Layered configuration.

    /// Applies overrides from a TOML config file.
    ///
    /// Values present in the file overwrite the currently staged values;
    /// setters called afterwards win over the file. A missing file is an
    /// error, since an explicitly requested config file that cannot be read
    /// should not be ignored silently.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::ConfigFile`] when the file cannot be read or
    /// parsed.
    pub fn with_config_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, BuilderError> {
        let overrides: FileOverrides = Figment::new()
            .merge(Toml::file_exact(path.as_ref()))
            .extract()
            .map_err(|e| BuilderError::ConfigFile(Box::new(e)))?;

        if overrides.api_key_id.is_some() {
            self.api_key_id = overrides.api_key_id;
        }
        if overrides.api_key_secret.is_some() {
            self.api_key_secret = overrides.api_key_secret;
        }
        if let Some(endpoint) = overrides.endpoint {
            self.endpoint = endpoint;
        }
        if overrides.service_name.is_some() {
            self.service_name = overrides.service_name;
        }
        if let Some(version) = overrides.service_version {
            self.service_version = version;
        }
        if let Some(namespace) = overrides.service_namespace {
            self.service_namespace = namespace;
        }
        if let Some(environment) = overrides.environment {
            self.environment = environment;
        }
        if let Some(protocol) = overrides.protocol {
            self.protocol = protocol;
        }
        if let Some(insecure) = overrides.insecure {
            self.insecure = insecure;
        }
        if let Some(timeout) = overrides.timeout {
            self.timeout = timeout;
        }
        if let Some(compression) = overrides.compression {
            self.compression = compression;
        }
        if let Some(retry) = overrides.retry {
            self.retry = retry;
        }
        if let Some(batch) = overrides.batch {
            self.batch = batch;
        }
        if let Some(signals) = overrides.signals {
            self.signals = signals;
        }
        if let Some(attributes) = overrides.attributes {
            self.custom_attributes.extend(attributes);
        }

        Ok(self)
    }

    /// Loads every supported `TELEMETRYFLOW_*` environment variable.
    ///
    /// Unparseable boolean or numeric values keep the current value.
    pub fn with_auto_configuration(mut self) -> Self {
        self = self
            .with_api_key_from_env()
            .with_endpoint_from_env()
            .with_service_from_env()
            .with_service_namespace_from_env()
            .with_environment_from_env()
            .with_collector_id_from_env();

        if let Some(name) = env::var(ENV_COLLECTOR_NAME).ok().filter(|s| !s.is_empty()) {
            self.collector.name = Some(name);
        }
        if let Some(dc) = env::var(ENV_DATACENTER).ok().filter(|s| !s.is_empty()) {
            self.collector.datacenter = Some(dc);
        }

        self.insecure = env_bool(ENV_INSECURE, false);
        self.v2.enabled = env_bool(ENV_USE_V2_API, false);
        self.v2.only = env_bool(ENV_V2_ONLY, false);
        if self.v2.only {
            self.v2.enabled = true;
        }

        self.protocol = match env::var(ENV_PROTOCOL).as_deref() {
            Ok(value) if value.eq_ignore_ascii_case("http") => Protocol::Http,
            _ => Protocol::Grpc,
        };

        self.compression = env_bool(ENV_COMPRESSION, false);

        if let Some(seconds) = env_parse::<u64>(ENV_TIMEOUT) {
            self.timeout = Duration::from_secs(seconds);
        } else {
            self.timeout = Duration::from_secs(10);
        }

        self.retry.enabled = env_bool(ENV_RETRY_ENABLED, true);
        if let Some(max) = env_parse::<u32>(ENV_MAX_RETRIES) {
            self.retry.max_attempts = max;
        }
        self.retry.backoff =
            Duration::from_millis(env_parse::<u64>(ENV_RETRY_BACKOFF).unwrap_or(500));

        self.batch.timeout =
            Duration::from_millis(env_parse::<u64>(ENV_BATCH_TIMEOUT).unwrap_or(5000));
        if let Some(size) = env_parse::<usize>(ENV_BATCH_MAX_SIZE) {
            self.batch.max_size = size;
        }

        self.signals.traces = env_bool(ENV_ENABLE_TRACES, true);
        self.signals.metrics = env_bool(ENV_ENABLE_METRICS, true);
        self.signals.logs = env_bool(ENV_ENABLE_LOGS, true);
        self.exemplars = env_bool(ENV_ENABLE_EXEMPLARS, true);

        // 0 means "keep the default", matching the collector contract.
        if let Some(limit) = env_parse::<u32>(ENV_RATE_LIMIT)
            && limit > 0
        {
            self.rate_limit = limit;
        }

        self
    }

    // Build methods.

    /// Builds the validated configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`BuilderError`] when the key pair is missing or invalid,
    /// or when the assembled aggregate fails validation.
    pub fn build(self) -> Result<TelemetryConfig, BuilderError> {
        let (Some(key_id), Some(key_secret)) = (self.api_key_id, self.api_key_secret) else {
            return Err(BuilderError::MissingApiKey);
        };
        let credentials = Credentials::new(key_id, key_secret)?;

        let config = TelemetryConfig {
            credentials,
            endpoint: self.endpoint,
            service_name: self.service_name.unwrap_or_default(),
            protocol: self.protocol,
            insecure: self.insecure,
            timeout: self.timeout,
            compression: self.compression,
            retry: self.retry,
            batch: self.batch,
            signals: self.signals,
            exemplars: self.exemplars,
            service_version: self.service_version,
            service_namespace: self.service_namespace,
            environment: self.environment,
            custom_attributes: self.custom_attributes,
            collector: self.collector,
            v2: self.v2,
            rate_limit: self.rate_limit,
        };
        config.validate()?;
        Ok(config)
    }

    /// Builds the configuration and wraps it in a [`TelemetryClient`].
    ///
    /// # Errors
    ///
    /// Same as [`build`](Self::build).
    pub fn build_client(self) -> Result<TelemetryClient, BuilderError> {
        Ok(TelemetryClient::new(self.build()?))
    }
}

impl Default for TelemetryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Creates a client entirely from environment variables.
///
/// # Errors
///
/// Returns a [`BuilderError`] when required variables are missing or invalid.
pub fn new_from_env() -> Result<TelemetryClient, BuilderError> {
    TelemetryBuilder::new().with_auto_configuration().build_client()
}

/// Creates a client with minimal configuration.
///
/// # Errors
///
/// Returns a [`BuilderError`] when the key pair or configuration is invalid.
pub fn new_simple(
    api_key_id: &str,
    api_key_secret: &str,
    endpoint: &str,
    service_name: &str,
) -> Result<TelemetryClient, BuilderError> {
    TelemetryBuilder::new()
        .with_api_key(api_key_id, api_key_secret)
        .with_endpoint(endpoint)
        .with_service(service_name, None)
        .build_client()
}

fn env_bool(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(value) => match value.to_ascii_lowercase().as_str() {
            "true" | "1" => true,
            "false" | "0" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|value| value.parse().ok())
}

mod duration_ms_opt {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = Option::<u64>::deserialize(deserializer)?;
        Ok(ms.map(Duration::from_millis))
    }
}
