pub mod entity;

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::error::HarvestError;
use crate::export::health::HealthMetrics;
use crate::extract::{NestedNaming, TagSet};
use crate::sink::{FlushReport, MetricSink};
use crate::spark::{ActiveApplication, SparkApi};

pub use entity::{base_tags, walk_entity, walk_records, EntityKind, WalkReport, CLUSTER_NAME_TAG};

/// Summary of one harvest cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Applications harvested this cycle.
    pub applications: usize,
    pub records: usize,
    pub samples: usize,
    /// Entity walks aborted by a fetch or decode failure.
    pub walk_failures: usize,
    /// `None` when the flush failed and the cycle's samples were dropped.
    pub flushed: Option<FlushReport>,
}

/// Owns the cluster client and the metrics sink and runs harvest cycles.
pub struct Harvester<C, S> {
    api: C,
    sink: S,
    cluster_name: String,
    naming: NestedNaming,
    health: Option<Arc<HealthMetrics>>,
}

impl<C: SparkApi, S: MetricSink> Harvester<C, S> {
    pub fn new(api: C, sink: S, cluster_name: impl Into<String>) -> Self {
        Self {
            api,
            sink,
            cluster_name: cluster_name.into(),
            naming: NestedNaming::default(),
            health: None,
        }
    }

    pub fn with_nested_naming(mut self, naming: NestedNaming) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_health(mut self, health: Arc<HealthMetrics>) -> Self {
        self.health = Some(health);
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Harvests every active application, then flushes the sink once.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let start = Instant::now();
        let mut report = CycleReport::default();

        let apps = match self.api.active_applications().await {
            Ok(apps) => apps,
            Err(e) => {
                warn!(error = %e, kind = e.kind(), "application discovery failed");
                Vec::new()
            }
        };

        debug!(count = apps.len(), "harvesting active applications");
        if let Some(health) = &self.health {
            health.active_applications.set(apps.len() as f64);
        }

        for app in &apps {
            let (walked, failures) = self.harvest_application(app).await;
            report.applications += 1;
            report.records += walked.records;
            report.samples += walked.samples;
            report.walk_failures += failures;
        }

        report.flushed = self.flush().await;

        if let Some(health) = &self.health {
            health.cycles_total.inc();
            health.cycle_duration.observe(start.elapsed().as_secs_f64());
        }

        info!(
            applications = report.applications,
            records = report.records,
            samples = report.samples,
            walk_failures = report.walk_failures,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "harvest cycle complete",
        );

        report
    }

    /// Runs the four entity walkers for one application. A failing kind is
    /// logged and skipped; the others still run.
    pub async fn harvest_application(&mut self, app: &ActiveApplication) -> (WalkReport, usize) {
        let base = base_tags(&app.app, &self.cluster_name);
        let mut total = WalkReport::default();
        let mut failures = 0;

        for kind in EntityKind::ALL {
            match self.walk(kind, app, &base).await {
                Ok(walked) => {
                    debug!(
                        app_id = %app.app.id,
                        kind = %kind,
                        records = walked.records,
                        samples = walked.samples,
                        "walked entity kind",
                    );
                    if let Some(health) = &self.health {
                        health
                            .records_walked
                            .with_label_values(&[kind.as_str()])
                            .inc_by(walked.records as f64);
                        health
                            .samples_recorded
                            .with_label_values(&[kind.as_str()])
                            .inc_by(walked.samples as f64);
                    }
                    total.add(walked);
                }
                Err(e) => {
                    warn!(app_id = %app.app.id, kind = %kind, error = %e, "entity walk failed");
                    if let Some(health) = &self.health {
                        health
                            .walk_failures
                            .with_label_values(&[kind.as_str(), e.kind()])
                            .inc();
                    }
                    failures += 1;
                }
            }
        }

        (total, failures)
    }

    async fn walk(
        &mut self,
        kind: EntityKind,
        app: &ActiveApplication,
        base: &TagSet,
    ) -> Result<WalkReport, HarvestError> {
        let url = kind.url(&app.base_url, &app.app.id);
        let body = self.api.fetch(&url).await?;

        walk_entity(kind, &url, &body, base, self.naming, &mut self.sink)
    }

    async fn flush(&mut self) -> Option<FlushReport> {
        let start = Instant::now();
        let pending = self.sink.pending();

        let result = self.sink.flush().await;

        if let Some(health) = &self.health {
            health.export_duration.observe(start.elapsed().as_secs_f64());
        }

        match result {
            Ok(flushed) => {
                debug!(
                    sink = self.sink.name(),
                    samples = flushed.samples,
                    batches = flushed.batches,
                    "flushed metrics",
                );
                if let Some(health) = &self.health {
                    health.export_batches.inc_by(flushed.batches as f64);
                }
                Some(flushed)
            }
            Err(e) => {
                warn!(
                    sink = self.sink.name(),
                    dropped = pending,
                    error = %e,
                    "flush failed, dropping cycle samples",
                );
                if let Some(health) = &self.health {
                    health.export_errors.inc();
                }
                None
            }
        }
    }
}
