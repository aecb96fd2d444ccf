use std::time::Duration;
use thiserror::Error;

/// Errors produced by the job client and pipeline plumbing.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Low-level HTTP transport failure (connection refused, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON parsing failed at the serde level.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// The provider rejected job creation.
    ///
    /// Returned by [`JobClient::submit`](crate::backend::JobClient::submit)
    /// when the provider answers with a non-success status code.
    #[error("HTTP {status}: {body}")]
    Submit {
        /// HTTP status code (e.g. 401, 422, 500).
        status: u16,
        /// Response body text.
        body: String,
    },

    /// Invalid configuration detected at build time.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for PipelineError {
    fn from(err: anyhow::Error) -> Self {
        PipelineError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Why a poll loop ended without a usable output.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    /// The provider reported the job as failed (or canceled).
    #[error("job failed: {0}")]
    Failed(String),

    /// The attempt budget ran out before a terminal status was observed.
    #[error("job did not finish after {attempts} attempts ({elapsed:?})")]
    Timeout {
        /// Number of status checks performed.
        attempts: u32,
        /// Wall-clock time spent polling.
        elapsed: Duration,
    },
}
