pub mod codec;
pub mod http;

use std::future::Future;

use crate::error::HarvestError;
use crate::extract::MetricRecorder;

pub use codec::Codec;
pub use http::HttpSink;

/// Outcome of one successful flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub samples: usize,
    pub batches: usize,
}

/// Metrics backend: buffers recorded samples and ships them on flush.
pub trait MetricSink: MetricRecorder + Send {
    /// Returns the sink's name for logging.
    fn name(&self) -> &str;

    /// Samples recorded since the last flush.
    fn pending(&self) -> usize;

    /// Sends every pending sample. The buffer is empty afterwards whether or
    /// not the backend accepted the data.
    fn flush(&mut self) -> impl Future<Output = Result<FlushReport, HarvestError>> + Send;
}
