pub mod schema;

use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use bytes::Bytes;
use tracing::{debug, warn};

use crate::config::SparkConfig;
use crate::error::HarvestError;

pub use schema::{
    App, MasterState, MemoryMetrics, SparkExecutor, SparkJob, SparkStage, SparkStreamStats,
};

/// Callback type for recording cluster request metrics.
/// Receives (endpoint_name, status, duration).
pub type MetricsCallback = Box<dyn Fn(&str, &str, Duration) + Send + Sync>;

const UI_LINK_PREFIX: &str = "a href=\"";
const UI_LINK_SUFFIX: &str = "\">Application Detail UI";

/// A running application and the base URL of its own UI / REST API.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveApplication {
    pub base_url: String,
    pub app: App,
}

/// What the harvester needs from the cluster.
pub trait SparkApi: Send + Sync {
    /// Enumerate the applications currently running on the cluster.
    fn active_applications(
        &self,
    ) -> impl Future<Output = Result<Vec<ActiveApplication>, HarvestError>> + Send;

    /// GET `url` and return the raw response body.
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Bytes, HarvestError>> + Send;
}

/// HTTP client for a stand-alone master and the application UIs it links to.
pub struct Client {
    http: reqwest::Client,
    master_url: String,
    timeout: Duration,
    metrics: Option<MetricsCallback>,
}

impl Client {
    pub fn new(cfg: &SparkConfig) -> Result<Self> {
        let timeout = if cfg.timeout.is_zero() {
            Duration::from_secs(10)
        } else {
            cfg.timeout
        };

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;

        Ok(Self {
            http,
            master_url: cfg.master_url.trim_end_matches('/').to_string(),
            timeout,
            metrics: None,
        })
    }

    /// Per-request timeout in effect. A zero configured timeout means 10s.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Set a metrics callback for recording request stats.
    pub fn with_metrics(mut self, cb: MetricsCallback) -> Self {
        self.metrics = Some(cb);
        self
    }

    fn record_request(&self, endpoint: &str, status: &str, duration: Duration) {
        if let Some(ref cb) = self.metrics {
            cb(endpoint, status, duration);
        }
    }

    async fn get_bytes(&self, url: &str) -> Result<Bytes, HarvestError> {
        let start = Instant::now();
        let endpoint = endpoint_from_url(url);

        let response = match self.http.get(url).send().await {
            Ok(response) => response,
            Err(source) => {
                self.record_request(endpoint, "error", start.elapsed());
                return Err(HarvestError::Fetch {
                    url: url.to_string(),
                    source,
                });
            }
        };

        let status = response.status();
        if !status.is_success() {
            self.record_request(endpoint, "error", start.elapsed());
            return Err(HarvestError::Status {
                url: url.to_string(),
                status,
            });
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(source) => {
                self.record_request(endpoint, "error", start.elapsed());
                return Err(HarvestError::Fetch {
                    url: url.to_string(),
                    source,
                });
            }
        };

        self.record_request(endpoint, "success", start.elapsed());

        Ok(body)
    }

    /// Resolve the application UI URL from the master's application page.
    async fn application_base_url(&self, app_id: &str) -> Result<Option<String>, HarvestError> {
        let url = format!("{}/app/?appId={}", self.master_url, app_id);
        let page = self.get_bytes(&url).await?;

        Ok(application_ui_url(&String::from_utf8_lossy(&page)).map(str::to_string))
    }
}

impl SparkApi for Client {
    async fn active_applications(&self) -> Result<Vec<ActiveApplication>, HarvestError> {
        let url = format!("{}/json/", self.master_url);
        debug!(url = %url, "querying master state");

        let body = self.get_bytes(&url).await?;
        let state: MasterState =
            serde_json::from_slice(&body).map_err(|source| HarvestError::Deserialize {
                what: "master state",
                url: url.clone(),
                source,
            })?;

        debug!(count = state.activeapps.len(), "master reports active applications");

        let mut apps = Vec::with_capacity(state.activeapps.len());
        for app in state.activeapps {
            match self.application_base_url(&app.id).await {
                Ok(Some(base_url)) => {
                    debug!(app_id = %app.id, app_name = %app.name, base_url = %base_url, "resolved application UI");
                    apps.push(ActiveApplication { base_url, app });
                }
                Ok(None) => {
                    warn!(app_id = %app.id, "application detail UI link not found, skipping application");
                }
                Err(e) => {
                    warn!(app_id = %app.id, error = %e, "resolving application UI failed, skipping application");
                }
            }
        }

        Ok(apps)
    }

    async fn fetch(&self, url: &str) -> Result<Bytes, HarvestError> {
        self.get_bytes(url).await
    }
}

/// Extracts the `Application Detail UI` link target from a master application page.
pub fn application_ui_url(page: &str) -> Option<&str> {
    let end = page.find(UI_LINK_SUFFIX)?;
    let head = &page[..end];
    let start = head.rfind(UI_LINK_PREFIX)? + UI_LINK_PREFIX.len();

    let url = head[start..].trim().trim_end_matches('/');
    if url.is_empty() {
        None
    } else {
        Some(url)
    }
}

/// Extract a short endpoint name from a request URL.
fn endpoint_from_url(url: &str) -> &'static str {
    if url.ends_with("/json/") {
        "master"
    } else if url.contains("/app/?appId=") {
        "app_page"
    } else if url.ends_with("/jobs/") {
        "jobs"
    } else if url.ends_with("/stages") {
        "stages"
    } else if url.ends_with("/executors") {
        "executors"
    } else if url.ends_with("/streaming/statistics") {
        "streaming"
    } else {
        "other"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const APP_PAGE: &str = r#"<html><body>
<div class="row-fluid"><a href="/">Back to Master</a>
<ul class="unstyled">
  <li><strong>ID:</strong> app-20190605145937-0017</li>
  <li><strong><a href="http://10.0.0.12:4040">Application Detail UI</a></strong></li>
</ul></div></body></html>"#;

    #[test]
    fn test_application_ui_url_from_page() {
        assert_eq!(application_ui_url(APP_PAGE), Some("http://10.0.0.12:4040"));
    }

    #[test]
    fn test_application_ui_url_trims_trailing_slash() {
        let page = r#"<a href="http://driver:4041/">Application Detail UI</a>"#;
        assert_eq!(application_ui_url(page), Some("http://driver:4041"));
    }

    #[test]
    fn test_application_ui_url_missing_marker() {
        assert_eq!(application_ui_url(r#"<a href="/">Back to Master</a>"#), None);
        assert_eq!(application_ui_url(""), None);
    }

    #[test]
    fn test_application_ui_url_missing_href() {
        assert_eq!(application_ui_url("<b>\">Application Detail UI</b>"), None);
        assert_eq!(application_ui_url(r#"<a href="">Application Detail UI</a>"#), None);
    }

    #[test]
    fn test_endpoint_from_url() {
        let app = "http://d:4040/api/v1/applications/app-1";
        assert_eq!(endpoint_from_url("http://m:8080/json/"), "master");
        assert_eq!(endpoint_from_url("http://m:8080/app/?appId=app-1"), "app_page");
        assert_eq!(endpoint_from_url(&format!("{app}/jobs/")), "jobs");
        assert_eq!(endpoint_from_url(&format!("{app}/stages")), "stages");
        assert_eq!(endpoint_from_url(&format!("{app}/executors")), "executors");
        assert_eq!(endpoint_from_url(&format!("{app}/streaming/statistics")), "streaming");
        assert_eq!(endpoint_from_url("http://d:4040/environment"), "other");
    }

    #[test]
    fn test_client_trims_master_url() {
        let cfg = SparkConfig {
            master_url: "http://spark-master:8080/".to_string(),
            ..SparkConfig::default()
        };
        let client = Client::new(&cfg).expect("client");
        assert_eq!(client.master_url, "http://spark-master:8080");
    }

    #[test]
    fn test_client_zero_timeout_falls_back_to_default() {
        let cfg = SparkConfig {
            master_url: "http://spark-master:8080".to_string(),
            timeout: Duration::ZERO,
            ..SparkConfig::default()
        };
        let client = Client::new(&cfg).expect("client");
        assert_eq!(client.timeout(), Duration::from_secs(10));

        let cfg = SparkConfig {
            timeout: Duration::from_secs(3),
            ..cfg
        };
        let client = Client::new(&cfg).expect("client");
        assert_eq!(client.timeout(), Duration::from_secs(3));
    }
}
