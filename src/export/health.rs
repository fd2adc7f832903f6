use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

const NAMESPACE: &str = "spark_harvester";

/// Prometheus metrics describing the harvester's own health.
///
/// All metrics use the "spark_harvester" namespace.
pub struct HealthMetrics {
    registry: Registry,
    addr: String,
    shutdown: parking_lot::Mutex<Option<CancellationToken>>,

    /// Completed harvest cycles.
    pub cycles_total: Counter,
    /// Wall time of one harvest cycle, flush included.
    pub cycle_duration: Histogram,
    /// Applications discovered in the last cycle.
    pub active_applications: Gauge,
    /// Record instances walked by entity kind.
    pub records_walked: CounterVec,
    /// Samples handed to the sink by entity kind.
    pub samples_recorded: CounterVec,
    /// Entity walks aborted by kind and error_type.
    pub walk_failures: CounterVec,
    /// Cluster API requests by endpoint and status.
    pub spark_requests_total: CounterVec,
    /// Cluster API request duration by endpoint.
    pub spark_request_duration: HistogramVec,
    /// Batches accepted by the metric backend.
    pub export_batches: Counter,
    /// Failed flushes.
    pub export_errors: Counter,
    /// Duration of one flush.
    pub export_duration: Histogram,
}

impl HealthMetrics {
    /// Creates a new health metrics instance with all metrics registered.
    pub fn new(addr: &str) -> Result<Self> {
        let registry = Registry::new();

        let cycles_total = Counter::with_opts(
            Opts::new("cycles_total", "Total completed harvest cycles.").namespace(NAMESPACE),
        )?;
        let cycle_duration = Histogram::with_opts(
            HistogramOpts::new(
                "cycle_duration_seconds",
                "Duration of one harvest cycle including the flush.",
            )
            .namespace(NAMESPACE)
            .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        )?;
        let active_applications = Gauge::with_opts(
            Opts::new(
                "active_applications",
                "Applications discovered in the last harvest cycle.",
            )
            .namespace(NAMESPACE),
        )?;
        let records_walked = CounterVec::new(
            Opts::new(
                "records_walked_total",
                "Total record instances walked by entity kind.",
            )
            .namespace(NAMESPACE),
            &["kind"],
        )?;
        let samples_recorded = CounterVec::new(
            Opts::new(
                "samples_recorded_total",
                "Total metric samples recorded by entity kind.",
            )
            .namespace(NAMESPACE),
            &["kind"],
        )?;
        let walk_failures = CounterVec::new(
            Opts::new(
                "walk_failures_total",
                "Total aborted entity walks by kind and error type.",
            )
            .namespace(NAMESPACE),
            &["kind", "error_type"],
        )?;
        let spark_requests_total = CounterVec::new(
            Opts::new(
                "spark_requests_total",
                "Total Spark API requests by endpoint and status.",
            )
            .namespace(NAMESPACE),
            &["endpoint", "status"],
        )?;
        let spark_request_duration = HistogramVec::new(
            HistogramOpts::new(
                "spark_request_duration_seconds",
                "Spark API request duration by endpoint.",
            )
            .namespace(NAMESPACE)
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["endpoint"],
        )?;
        let export_batches = Counter::with_opts(
            Opts::new(
                "export_batches_total",
                "Total metric batches accepted by the backend.",
            )
            .namespace(NAMESPACE),
        )?;
        let export_errors = Counter::with_opts(
            Opts::new("export_errors_total", "Total failed backend flushes.").namespace(NAMESPACE),
        )?;
        let export_duration = Histogram::with_opts(
            HistogramOpts::new("export_duration_seconds", "Duration of one backend flush.")
                .namespace(NAMESPACE)
                .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
        )?;

        registry.register(Box::new(cycles_total.clone()))?;
        registry.register(Box::new(cycle_duration.clone()))?;
        registry.register(Box::new(active_applications.clone()))?;
        registry.register(Box::new(records_walked.clone()))?;
        registry.register(Box::new(samples_recorded.clone()))?;
        registry.register(Box::new(walk_failures.clone()))?;
        registry.register(Box::new(spark_requests_total.clone()))?;
        registry.register(Box::new(spark_request_duration.clone()))?;
        registry.register(Box::new(export_batches.clone()))?;
        registry.register(Box::new(export_errors.clone()))?;
        registry.register(Box::new(export_duration.clone()))?;

        Ok(Self {
            registry,
            addr: addr.to_string(),
            shutdown: parking_lot::Mutex::new(None),
            cycles_total,
            cycle_duration,
            active_applications,
            records_walked,
            samples_recorded,
            walk_failures,
            spark_requests_total,
            spark_request_duration,
            export_batches,
            export_errors,
            export_duration,
        })
    }

    /// Records one cluster API request; matches the Spark client's callback shape.
    pub fn observe_spark_request(&self, endpoint: &str, status: &str, duration: Duration) {
        self.spark_requests_total
            .with_label_values(&[endpoint, status])
            .inc();
        self.spark_request_duration
            .with_label_values(&[endpoint])
            .observe(duration.as_secs_f64());
    }

    /// Renders the registry in Prometheus text format.
    pub fn encode(&self) -> Result<String> {
        encode_registry(&self.registry)
    }

    /// Starts the HTTP server serving /metrics and /healthz.
    /// Returns the bound address.
    pub async fn start(&self) -> Result<SocketAddr> {
        let addr = if self.addr.is_empty() {
            ":9090"
        } else {
            &self.addr
        };

        // Parse address, handling ":port" shorthand.
        let bind_addr = if addr.starts_with(':') {
            format!("0.0.0.0{addr}")
        } else {
            addr.to_string()
        };

        let registry = self.registry.clone();
        let app_state = Arc::new(AppState { registry });

        let app = Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/healthz", get(healthz_handler))
            .with_state(app_state);

        let listener = TcpListener::bind(&bind_addr)
            .await
            .with_context(|| format!("listening on {bind_addr}"))?;

        let local_addr = listener.local_addr().context("getting local address")?;

        let cancel = CancellationToken::new();
        *self.shutdown.lock() = Some(cancel.clone());

        tokio::spawn(async move {
            tracing::info!(addr = %local_addr, "health metrics server started");

            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    cancel.cancelled().await;
                })
                .await;

            if let Err(e) = result {
                tracing::error!(error = %e, "health metrics server error");
            }
        });

        Ok(local_addr)
    }

    /// Gracefully shuts down the health metrics server.
    pub fn stop(&self) {
        if let Some(cancel) = self.shutdown.lock().take() {
            cancel.cancel();
        }
    }
}

/// Shared state for axum handlers.
struct AppState {
    registry: Registry,
}

fn encode_registry(registry: &Registry) -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&registry.gather(), &mut buffer)
        .context("encoding metrics")?;

    String::from_utf8(buffer).context("converting metrics to string")
}

/// GET /metrics - Prometheus text format.
async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match encode_registry(&state.registry) {
        Ok(text) => (StatusCode::OK, text),
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "rendering metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "encoding error".to_string(),
            )
        }
    }
}

/// GET /healthz - Simple health check.
async fn healthz_handler() -> &'static str {
    "ok"
}
