use std::borrow::Cow;
use std::sync::Arc;
use std::time::SystemTime;

use serde::Deserialize;
use tracing::trace;

use super::field::gauge_value;
use super::tags::{qualified_name, TagSet};
use super::{FieldValue, Record};

/// One named, tagged, timestamped gauge observation.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    /// Lower-cased, dot-namespaced name (e.g. `spark.job.numtasks`).
    pub name: String,
    pub value: f64,
    /// Capture instant, shared by every sample of one record instance.
    pub timestamp: SystemTime,
    /// Tags of the record instance the sample came from.
    pub attributes: Arc<TagSet>,
}

/// Receives samples from the metric collector one at a time.
pub trait MetricRecorder {
    fn record(&mut self, sample: MetricSample);
}

impl MetricRecorder for Vec<MetricSample> {
    fn record(&mut self, sample: MetricSample) {
        self.push(sample);
    }
}

/// How metric names of fields inside nested records are built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NestedNaming {
    /// Nested fields share the parent's prefix (`spark.executor.usedonheapstoragememory`).
    /// Two nested records with a field of the same name produce the same metric name.
    #[default]
    Flat,
    /// Nested fields are qualified with the nested field's name
    /// (`spark.executor.memorymetrics.usedonheapstoragememory`).
    Qualified,
}

/// Emits one sample per numeric or boolean field of `record`, descending into
/// nested records. Returns the number of samples emitted.
///
/// The timestamp is captured once here and shared by every sample of this
/// instance, nested records included.
pub fn collect_metrics<R, M>(
    record: &R,
    prefix: &str,
    tags: &Arc<TagSet>,
    naming: NestedNaming,
    recorder: &mut M,
) -> usize
where
    R: Record,
    M: MetricRecorder + ?Sized,
{
    collect_metrics_at(record, prefix, tags, SystemTime::now(), naming, recorder)
}

/// Same as [`collect_metrics`] with an explicit capture timestamp.
pub fn collect_metrics_at<M>(
    record: &dyn Record,
    prefix: &str,
    tags: &Arc<TagSet>,
    timestamp: SystemTime,
    naming: NestedNaming,
    recorder: &mut M,
) -> usize
where
    M: MetricRecorder + ?Sized,
{
    let mut emitted = 0;

    record.visit_fields(&mut |field| {
        if let FieldValue::Nested(nested) = field.value {
            trace!(field = field.name, "descending into nested record");

            let nested_prefix = match naming {
                NestedNaming::Flat => Cow::Borrowed(prefix),
                NestedNaming::Qualified => Cow::Owned(format!("{prefix}{}.", field.name)),
            };
            emitted += collect_metrics_at(
                nested,
                &nested_prefix,
                tags,
                timestamp,
                naming,
                &mut *recorder,
            );
            return;
        }

        let Some(value) = gauge_value(&field.value) else {
            trace!(field = field.name, kind = %field.kind(), "no metric for field");
            return;
        };

        let name = qualified_name(prefix, field.name);
        trace!(metric = %name, value, "recording metric");

        recorder.record(MetricSample {
            name,
            value,
            timestamp,
            attributes: Arc::clone(tags),
        });
        emitted += 1;
    });

    emitted
}
