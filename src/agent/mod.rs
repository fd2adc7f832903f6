use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::export::health::HealthMetrics;
use crate::harvest::{CycleReport, Harvester};
use crate::sink::{HttpSink, MetricSink};
use crate::spark::{self, SparkApi};

/// Agent drives the harvester on a fixed interval and owns the health server.
pub struct Agent<C, S> {
    harvester: Harvester<C, S>,
    poll_interval: Duration,
    health: Option<Arc<HealthMetrics>>,
    cancel: CancellationToken,
}

impl Agent<spark::Client, HttpSink> {
    /// Builds the production agent from configuration.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let health = if cfg.health.enabled {
            Some(Arc::new(
                HealthMetrics::new(&cfg.health.addr).context("creating health metrics")?,
            ))
        } else {
            None
        };

        let mut client = spark::Client::new(&cfg.spark).context("creating Spark client")?;
        if let Some(health) = &health {
            let health = Arc::clone(health);
            client = client.with_metrics(Box::new(move |endpoint, status, duration| {
                health.observe_spark_request(endpoint, status, duration);
            }));
        }

        let sink = HttpSink::new(cfg.backend.clone()).context("creating metric sink")?;

        let mut harvester = Harvester::new(client, sink, cfg.spark.cluster_name.clone())
            .with_nested_naming(cfg.extract.nested_names);
        if let Some(health) = &health {
            harvester = harvester.with_health(Arc::clone(health));
        }

        Ok(Self::new(harvester, cfg.poll_interval).with_health_server(health))
    }
}

impl<C: SparkApi, S: MetricSink> Agent<C, S> {
    pub fn new(harvester: Harvester<C, S>, poll_interval: Duration) -> Self {
        Self {
            harvester,
            poll_interval,
            health: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Health server started by [`Agent::start`] and stopped by [`Agent::stop`].
    pub fn with_health_server(mut self, health: Option<Arc<HealthMetrics>>) -> Self {
        self.health = health;
        self
    }

    /// Token that ends [`Agent::run`] when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Starts the health metrics server, if configured.
    pub async fn start(&self) -> Result<()> {
        if let Some(health) = &self.health {
            health
                .start()
                .await
                .context("starting health metrics server")?;
        }

        info!(poll_interval = ?self.poll_interval, "agent started");

        Ok(())
    }

    /// Runs one harvest cycle immediately.
    pub async fn run_once(&mut self) -> CycleReport {
        self.harvester.run_cycle().await
    }

    /// Waits one interval, runs one cycle, and repeats until cancelled.
    /// Cycles never overlap; cancellation is observed between cycles.
    pub async fn run(&mut self) -> Result<()> {
        let mut ticker =
            tokio::time::interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("poll loop stopped");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    self.harvester.run_cycle().await;
                }
            }
        }
    }

    /// Signals the poll loop to exit and shuts down the health server.
    pub fn stop(&self) {
        self.cancel.cancel();

        if let Some(health) = &self.health {
            health.stop();
        }

        info!("agent stopped");
    }

    pub fn harvester(&self) -> &Harvester<C, S> {
        &self.harvester
    }
}
