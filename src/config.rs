use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::extract::NestedNaming;

/// File name looked up in the config directory.
pub const CONFIG_FILE_NAME: &str = "spark-harvester.yaml";

/// Env var naming the directory that holds [`CONFIG_FILE_NAME`].
pub const CONFIG_DIR_ENV: &str = "SPARK_HARVESTER_CONFIG";

/// Env var supplying the backend API key when the file leaves it empty.
pub const API_KEY_ENV: &str = "SPARK_HARVESTER_API_KEY";

/// Compression algorithms understood by the metric sink.
pub const COMPRESSIONS: &[&str] = &["none", "gzip", "zstd", "zlib", "snappy"];

/// Content encodings the New Relic Metric API accepts.
pub const NEW_RELIC_COMPRESSIONS: &[&str] = &["none", "gzip"];

const NEW_RELIC_DOMAIN: &str = "newrelic.com";

/// Top-level configuration for the harvester.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Logging verbosity (trace, debug, info, warn, error). Default: "info".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Time between two harvest cycles. Default: 15s.
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Spark cluster connection configuration.
    #[serde(default)]
    pub spark: SparkConfig,

    /// Metrics backend configuration.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Extraction behavior.
    #[serde(default)]
    pub extract: ExtractConfig,

    /// Prometheus health metrics server configuration.
    #[serde(default)]
    pub health: HealthConfig,
}

/// Spark stand-alone master connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SparkConfig {
    /// Master UI URL (e.g., "http://spark-master:8080").
    #[serde(default)]
    pub master_url: String,

    /// Attached to every sample as `spark.clusterName`.
    #[serde(default)]
    pub cluster_name: String,

    /// Request timeout. Default: 10s.
    #[serde(default = "default_spark_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

/// Metric API backend configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Ingest API key. Falls back to `SPARK_HARVESTER_API_KEY`.
    #[serde(default)]
    pub api_key: String,

    /// Metric API endpoint.
    #[serde(default = "default_backend_endpoint")]
    pub endpoint: String,

    /// Compression algorithm (none, gzip, zstd, zlib, snappy). Default: gzip.
    /// New Relic endpoints only accept none and gzip.
    #[serde(default = "default_compression")]
    pub compression: String,

    /// Maximum samples per request. Default: 2000.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum duration of one export request. Default: 30s.
    #[serde(default = "default_export_timeout", with = "humantime_serde")]
    pub export_timeout: Duration,

    /// Additional HTTP headers.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractConfig {
    /// Naming of metrics found in nested records. Default: flat.
    #[serde(default)]
    pub nested_names: NestedNaming,
}

/// Prometheus health metrics server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    /// Serve /metrics and /healthz. Default: true.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Listen address. Default: ":9090".
    #[serde(default = "default_health_addr")]
    pub addr: String,
}

// --- Default value functions ---

fn default_log_level() -> String {
    "info".to_string()
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(15)
}

fn default_spark_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_backend_endpoint() -> String {
    "https://metric-api.newrelic.com/metric/v1".to_string()
}

fn default_compression() -> String {
    "gzip".to_string()
}

fn default_batch_size() -> usize {
    2000
}

fn default_export_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_true() -> bool {
    true
}

fn default_health_addr() -> String {
    ":9090".to_string()
}

// --- Default trait impls ---

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            poll_interval: default_poll_interval(),
            spark: SparkConfig::default(),
            backend: BackendConfig::default(),
            extract: ExtractConfig::default(),
            health: HealthConfig::default(),
        }
    }
}

impl Default for SparkConfig {
    fn default() -> Self {
        Self {
            master_url: String::new(),
            cluster_name: String::new(),
            timeout: default_spark_timeout(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: default_backend_endpoint(),
            compression: default_compression(),
            batch_size: default_batch_size(),
            export_timeout: default_export_timeout(),
            headers: HashMap::new(),
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            addr: default_health_addr(),
        }
    }
}

// --- Validation and loading ---

impl Config {
    /// Load configuration from a YAML file, apply env fallbacks and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;

        let mut cfg = Self::parse(&data)
            .with_context(|| format!("parsing config file {}", path.display()))?;

        cfg.apply_env(std::env::var(API_KEY_ENV).ok());
        cfg.validate()?;

        Ok(cfg)
    }

    /// Parse YAML without validation.
    pub fn parse(data: &str) -> Result<Self> {
        serde_yaml::from_str(data).context("decoding YAML")
    }

    /// Fill the API key from the environment when the file leaves it empty.
    pub fn apply_env(&mut self, api_key: Option<String>) {
        if self.backend.api_key.is_empty() {
            if let Some(key) = api_key.filter(|k| !k.is_empty()) {
                self.backend.api_key = key;
            }
        }
    }

    /// Validate the configuration for required fields and consistency.
    pub fn validate(&self) -> Result<()> {
        if self.spark.master_url.is_empty() {
            bail!("spark.master_url is required");
        }

        if self.poll_interval.is_zero() {
            bail!("poll_interval must be positive");
        }

        if self.backend.api_key.is_empty() {
            bail!("backend.api_key is required (or set {API_KEY_ENV})");
        }

        if self.backend.endpoint.is_empty() {
            bail!("backend.endpoint must not be empty");
        }

        if self.backend.batch_size == 0 {
            bail!("backend.batch_size must be positive");
        }

        let endpoint = reqwest::Url::parse(&self.backend.endpoint)
            .with_context(|| format!("invalid backend.endpoint {:?}", self.backend.endpoint))?;

        let allowed = if is_new_relic_host(endpoint.host_str().unwrap_or_default()) {
            NEW_RELIC_COMPRESSIONS
        } else {
            COMPRESSIONS
        };
        if !allowed.contains(&self.backend.compression.as_str()) {
            bail!(
                "unsupported backend.compression {:?} for {} (expected one of {})",
                self.backend.compression,
                self.backend.endpoint,
                allowed.join(", ")
            );
        }

        if self.health.enabled && self.health.addr.is_empty() {
            bail!("health.addr is required when health is enabled");
        }

        Ok(())
    }
}

fn is_new_relic_host(host: &str) -> bool {
    host == NEW_RELIC_DOMAIN || host.ends_with(".newrelic.com")
}

/// Picks the config file: explicit path, then `$SPARK_HARVESTER_CONFIG/`, then
/// the working directory.
pub fn resolve_path(explicit: Option<&Path>, config_dir: Option<&str>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    match config_dir {
        Some(dir) if !dir.is_empty() => Path::new(dir).join(CONFIG_FILE_NAME),
        _ => PathBuf::from(CONFIG_FILE_NAME),
    }
}
