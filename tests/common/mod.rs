#![allow(dead_code)]

use std::collections::HashMap;

use bytes::Bytes;
use spark_harvester::error::HarvestError;
use spark_harvester::extract::{MetricRecorder, MetricSample};
use spark_harvester::harvest::EntityKind;
use spark_harvester::sink::{FlushReport, MetricSink};
use spark_harvester::spark::{ActiveApplication, App, SparkApi};

/// Master URL reported in discovery errors.
pub const MASTER_JSON_URL: &str = "http://spark-master:8080/json/";

/// In-memory cluster: a fixed application list and canned bodies keyed by URL.
/// Unknown URLs answer 503.
#[derive(Default)]
pub struct FakeApi {
    pub apps: Vec<ActiveApplication>,
    pub bodies: HashMap<String, Vec<u8>>,
    /// Discovery answers 503 instead of listing `apps`.
    pub master_down: bool,
}

impl FakeApi {
    pub fn with_app(mut self, app: ActiveApplication) -> Self {
        self.apps.push(app);
        self
    }

    pub fn with_master_down(mut self) -> Self {
        self.master_down = true;
        self
    }

    pub fn with_body(mut self, app: &ActiveApplication, kind: EntityKind, body: &str) -> Self {
        self.bodies
            .insert(kind.url(&app.base_url, &app.app.id), body.as_bytes().to_vec());
        self
    }
}

impl SparkApi for FakeApi {
    async fn active_applications(&self) -> Result<Vec<ActiveApplication>, HarvestError> {
        if self.master_down {
            return Err(HarvestError::Status {
                url: MASTER_JSON_URL.to_string(),
                status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
            });
        }
        Ok(self.apps.clone())
    }

    async fn fetch(&self, url: &str) -> Result<Bytes, HarvestError> {
        match self.bodies.get(url) {
            Some(body) => Ok(Bytes::from(body.clone())),
            None => Err(HarvestError::Status {
                url: url.to_string(),
                status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
            }),
        }
    }
}

/// Sink that keeps every flushed batch for inspection.
#[derive(Default)]
pub struct CaptureSink {
    pending: Vec<MetricSample>,
    pub flushes: Vec<Vec<MetricSample>>,
}

impl CaptureSink {
    pub fn last_flush(&self) -> &[MetricSample] {
        self.flushes.last().map(Vec::as_slice).unwrap_or_default()
    }
}

impl MetricRecorder for CaptureSink {
    fn record(&mut self, sample: MetricSample) {
        self.pending.push(sample);
    }
}

impl MetricSink for CaptureSink {
    fn name(&self) -> &str {
        "capture"
    }

    fn pending(&self) -> usize {
        self.pending.len()
    }

    async fn flush(&mut self) -> Result<FlushReport, HarvestError> {
        let samples = std::mem::take(&mut self.pending);
        let report = FlushReport {
            samples: samples.len(),
            batches: 1,
        };
        self.flushes.push(samples);
        Ok(report)
    }
}

pub fn application(id: &str, name: &str) -> ActiveApplication {
    ActiveApplication {
        base_url: format!("http://{id}.driver:4040"),
        app: App {
            id: id.to_string(),
            starttime: 1_559_746_777_000,
            name: name.to_string(),
            cores: 4,
            user: "spark".to_string(),
            memoryperslave: 1024,
            submitdate: "Wed Jun 05 14:59:37 UTC 2019".to_string(),
            state: "RUNNING".to_string(),
            duration: 5_000,
        },
    }
}

pub fn samples_named<'a>(samples: &'a [MetricSample], name: &str) -> Vec<&'a MetricSample> {
    samples.iter().filter(|s| s.name == name).collect()
}
