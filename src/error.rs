use thiserror::Error;

/// Failures that can end one entity walk or one backend flush.
///
/// None of these are fatal to the harvester: the cycle logs them and moves on.
#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("requesting {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected status {status} from {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("decoding {what} from {url}: {source}")]
    Deserialize {
        what: &'static str,
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("metric backend: {reason}")]
    Backend { reason: String },
}

impl HarvestError {
    /// Short label used for logging and the `error_type` health label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fetch { .. } | Self::Status { .. } => "fetch",
            Self::Deserialize { .. } => "deserialize",
            Self::Backend { .. } => "backend",
        }
    }

    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend {
            reason: err.to_string(),
        }
    }
}
