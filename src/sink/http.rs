use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use serde::Serialize;

use super::codec::Codec;
use super::{FlushReport, MetricSink};
use crate::config::BackendConfig;
use crate::error::HarvestError;
use crate::extract::{MetricRecorder, MetricSample, TagSet};

/// Attributes shared by every metric of a request. Always empty: each sample
/// carries its full tag set.
#[derive(Debug, Default, Serialize)]
struct CommonBlock {}

/// One gauge in the Metric API request body.
#[derive(Debug, Serialize)]
struct GaugeJson<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    metric_type: &'static str,
    value: f64,
    /// Milliseconds since the Unix epoch.
    timestamp: u64,
    attributes: &'a TagSet,
}

#[derive(Debug, Serialize)]
struct MetricPayload<'a> {
    common: CommonBlock,
    metrics: Vec<GaugeJson<'a>>,
}

/// Buffering Metric API sink.
///
/// Samples accumulate in memory between flushes. A flush POSTs them as JSON
/// in chunks of `batch_size`, encoded with the configured [`Codec`].
pub struct HttpSink {
    cfg: BackendConfig,
    codec: Codec,
    client: reqwest::Client,
    buffer: Vec<MetricSample>,
}

impl HttpSink {
    pub fn new(cfg: BackendConfig) -> Result<Self> {
        let codec: Codec = cfg.compression.parse()?;
        let client = reqwest::Client::builder()
            .timeout(cfg.export_timeout)
            .build()
            .context("building HTTP client")?;

        tracing::info!(
            endpoint = %cfg.endpoint,
            codec = %codec,
            batch_size = cfg.batch_size,
            "metric API sink configured",
        );

        Ok(Self {
            cfg,
            codec,
            client,
            buffer: Vec::new(),
        })
    }

    async fn post(&self, batch: &[MetricSample]) -> Result<()> {
        let json = encode_payload(batch)?;
        let json_len = json.len();
        let body = self.codec.encode(json)?;

        let mut request = self
            .client
            .post(&self.cfg.endpoint)
            .header("Content-Type", "application/json")
            .header("Api-Key", self.cfg.api_key.as_str());
        if let Some(encoding) = self.codec.content_encoding() {
            request = request.header("Content-Encoding", encoding);
        }
        for (name, value) in &self.cfg.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let resp = request
            .body(body)
            .send()
            .await
            .with_context(|| format!("posting to {}", self.cfg.endpoint))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            bail!("metric API answered {status}: {detail}");
        }

        tracing::debug!(samples = batch.len(), json_bytes = json_len, "posted metric batch");

        Ok(())
    }
}

impl MetricRecorder for HttpSink {
    fn record(&mut self, sample: MetricSample) {
        self.buffer.push(sample);
    }
}

impl MetricSink for HttpSink {
    fn name(&self) -> &str {
        "metric_api"
    }

    fn pending(&self) -> usize {
        self.buffer.len()
    }

    async fn flush(&mut self) -> Result<FlushReport, HarvestError> {
        let samples = std::mem::take(&mut self.buffer);
        let mut report = FlushReport::default();

        for batch in samples.chunks(self.cfg.batch_size.max(1)) {
            if let Err(e) = self.post(batch).await {
                tracing::warn!(
                    dropped = samples.len() - report.samples,
                    "metric API flush aborted, dropping remaining samples",
                );
                return Err(HarvestError::backend(format!("{e:#}")));
            }
            report.samples += batch.len();
            report.batches += 1;
        }

        Ok(report)
    }
}

/// Serializes samples into a Metric API request body.
fn encode_payload(samples: &[MetricSample]) -> Result<Vec<u8>> {
    let metrics = samples
        .iter()
        .map(|s| GaugeJson {
            name: &s.name,
            metric_type: "gauge",
            value: s.value,
            timestamp: epoch_millis(s.timestamp),
            attributes: &s.attributes,
        })
        .collect();

    let payload = [MetricPayload {
        common: CommonBlock::default(),
        metrics,
    }];

    serde_json::to_vec(&payload).context("serializing metrics to JSON")
}

fn epoch_millis(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
