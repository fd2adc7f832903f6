use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::HarvestError;
use crate::extract::{collect_metrics, collect_tags, MetricRecorder, NestedNaming, Record, TagSet};
use crate::spark::{App, SparkExecutor, SparkJob, SparkStage, SparkStreamStats};

/// Tag key carrying the configured cluster name.
pub const CLUSTER_NAME_TAG: &str = "spark.clusterName";

/// The per-application entity collections harvested each cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Job,
    Stage,
    Executor,
    Stream,
}

impl EntityKind {
    /// Walk order within one application.
    pub const ALL: [Self; 4] = [Self::Job, Self::Stage, Self::Executor, Self::Stream];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Job => "job",
            Self::Stage => "stage",
            Self::Executor => "executor",
            Self::Stream => "stream",
        }
    }

    /// Namespace of every tag and metric derived from this kind.
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Job => "spark.job.",
            Self::Stage => "spark.stage.",
            Self::Executor => "spark.executor.",
            Self::Stream => "spark.stream.",
        }
    }

    /// Path below `/api/v1/applications/{id}/`.
    pub const fn path(self) -> &'static str {
        match self {
            Self::Job => "jobs/",
            Self::Stage => "stages",
            Self::Executor => "executors",
            Self::Stream => "streaming/statistics",
        }
    }

    pub fn url(self, base_url: &str, app_id: &str) -> String {
        format!(
            "{}/api/v1/applications/{}/{}",
            base_url.trim_end_matches('/'),
            app_id,
            self.path()
        )
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Records and samples produced by one entity walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkReport {
    pub records: usize,
    pub samples: usize,
}

impl WalkReport {
    pub fn add(&mut self, other: WalkReport) {
        self.records += other.records;
        self.samples += other.samples;
    }
}

/// Tags shared by every record of one application.
pub fn base_tags(app: &App, cluster_name: &str) -> TagSet {
    let mut tags = TagSet::new();
    tags.insert("spark.app.name", app.name.as_str());
    tags.insert("spark.app.id", app.id.as_str());
    tags.insert("spark.app.cores", app.cores);
    tags.insert("spark.app.starttime", app.starttime);
    tags.insert("spark.app.state", app.state.as_str());
    tags.insert("spark.app.submitdate", app.submitdate.as_str());
    tags.insert("spark.app.user", app.user.as_str());
    tags.insert("spark.app.memoryperslave", app.memoryperslave);
    tags.insert(CLUSTER_NAME_TAG, cluster_name);
    tags
}

/// Decodes `body` as the collection (or singleton) behind `kind` and walks
/// every record. Nothing is recorded unless the whole body decodes.
pub fn walk_entity<M: MetricRecorder + ?Sized>(
    kind: EntityKind,
    url: &str,
    body: &[u8],
    base: &TagSet,
    naming: NestedNaming,
    recorder: &mut M,
) -> Result<WalkReport, HarvestError> {
    let report = match kind {
        EntityKind::Job => {
            let jobs: Vec<SparkJob> = decode(kind, url, body)?;
            walk_records(kind, &jobs, base, naming, recorder)
        }
        EntityKind::Stage => {
            let stages: Vec<SparkStage> = decode(kind, url, body)?;
            walk_records(kind, &stages, base, naming, recorder)
        }
        EntityKind::Executor => {
            let executors: Vec<SparkExecutor> = decode(kind, url, body)?;
            walk_records(kind, &executors, base, naming, recorder)
        }
        EntityKind::Stream => {
            let stats: SparkStreamStats = decode(kind, url, body)?;
            walk_records(kind, std::slice::from_ref(&stats), base, naming, recorder)
        }
    };

    Ok(report)
}

/// Runs the tag and metric collectors over each record with the kind's prefix.
pub fn walk_records<R: Record, M: MetricRecorder + ?Sized>(
    kind: EntityKind,
    records: &[R],
    base: &TagSet,
    naming: NestedNaming,
    recorder: &mut M,
) -> WalkReport {
    let prefix = kind.prefix();
    let mut report = WalkReport::default();

    for record in records {
        let tags = Arc::new(collect_tags(record, base, prefix));
        let samples = collect_metrics(record, prefix, &tags, naming, &mut *recorder);
        debug!(kind = %kind, tags = tags.len(), samples, "walked record");

        report.records += 1;
        report.samples += samples;
    }

    report
}

fn decode<T: DeserializeOwned>(kind: EntityKind, url: &str, body: &[u8]) -> Result<T, HarvestError> {
    serde_json::from_slice(body).map_err(|source| HarvestError::Deserialize {
        what: kind.path(),
        url: url.to_string(),
        source,
    })
}
