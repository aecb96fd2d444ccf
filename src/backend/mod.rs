//! Job client trait and normalized job types.
//!
//! The [`JobClient`] trait abstracts over asynchronous inference providers,
//! translating between the normalized [`JobSpec`]/[`JobHandle`]/[`JobStatus`]
//! types and the provider's HTTP API. Built-in implementations:
//! [`ReplicateBackend`] and [`MockJobClient`].
//!
//! ## Architecture
//!
//! ```text
//! Stage ──► JobSpec ──► JobClient::submit() ──► JobHandle
//!                                                  │
//!                       JobClient::poll() ◄────────┘ (repeated by the poller)
//!                              │
//!                          JobStatus
//!                   ┌──────────┴──────────┐
//!          ReplicateBackend          MockJobClient
//!          POST /predictions         scripted statuses
//!          GET urls.get
//! ```

pub mod mock;
pub mod replicate;

pub use mock::{MockJob, MockJobClient};
pub use replicate::ReplicateBackend;

use crate::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};

/// A normalized job submission: provider-agnostic.
///
/// Built once per stage by [`Stage::job_spec`](crate::stage::Stage::job_spec)
/// and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSpec {
    /// Provider model (version) identifier.
    pub provider_model_id: String,

    /// Model input parameters.
    pub input: Map<String, Value>,
}

impl JobSpec {
    pub fn new(provider_model_id: impl Into<String>, input: Map<String, Value>) -> Self {
        Self {
            provider_model_id: provider_model_id.into(),
            input,
        }
    }
}

/// Opaque reference to a submitted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    /// Provider job identifier.
    pub id: String,

    /// URL to fetch the job's current status from.
    pub status_url: String,
}

/// Observed state of a submitted job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    /// Queued or booting.
    Starting,
    /// Running, or the status fetch itself failed.
    Processing,
    /// Finished; carries the raw provider output.
    Succeeded(Value),
    /// Finished unsuccessfully; carries the provider's error text.
    Failed(String),
}

impl JobStatus {
    /// Whether polling should stop for this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded(_) | Self::Failed(_))
    }

    /// Short lowercase label for logs and events.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Processing => "processing",
            Self::Succeeded(_) => "succeeded",
            Self::Failed(_) => "failed",
        }
    }
}

/// Provider location and credential for one request.
#[derive(Debug, Clone, Copy)]
pub struct Endpoint<'a> {
    /// Base URL of the provider API (e.g. `https://api.replicate.com/v1`).
    pub base_url: &'a str,
    /// API token sent with every call.
    pub api_token: &'a str,
}

/// Reduce a provider output to its primary value.
///
/// Outputs come either as a single value or as an ordered sequence; the
/// primary value is the first element of a sequence, else the value itself.
/// Returns `None` for `null`, an empty sequence, or an empty string.
pub fn primary_output(output: &Value) -> Option<String> {
    let first = match output {
        Value::Array(items) => items.first()?,
        other => other,
    };
    match first {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Abstraction over asynchronous inference providers.
///
/// # Object Safety
///
/// This trait is object-safe and designed to be used as `Arc<dyn JobClient>`.
#[async_trait]
pub trait JobClient: Send + Sync {
    /// Create a job. Fails with [`PipelineError::Submit`](crate::PipelineError::Submit)
    /// when the provider answers with a non-success status.
    async fn submit(
        &self,
        client: &Client,
        endpoint: &Endpoint<'_>,
        spec: &JobSpec,
    ) -> Result<JobHandle>;

    /// Fetch the current status of a job.
    ///
    /// Transport or HTTP-level failures are reported as
    /// [`JobStatus::Processing`], so the caller simply keeps polling.
    async fn poll(&self, client: &Client, endpoint: &Endpoint<'_>, handle: &JobHandle)
        -> JobStatus;

    /// Human-readable name for logging and diagnostics.
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_primary_output_sequence_and_scalar_agree() {
        let seq = json!(["https://img/x.png"]);
        let scalar = json!("https://img/x.png");
        assert_eq!(primary_output(&seq).as_deref(), Some("https://img/x.png"));
        assert_eq!(primary_output(&seq), primary_output(&scalar));
    }

    #[test]
    fn test_primary_output_takes_first_of_many() {
        let seq = json!(["https://a", "https://b"]);
        assert_eq!(primary_output(&seq).as_deref(), Some("https://a"));
    }

    #[test]
    fn test_primary_output_empty_shapes() {
        assert_eq!(primary_output(&json!(null)), None);
        assert_eq!(primary_output(&json!([])), None);
        assert_eq!(primary_output(&json!("")), None);
        assert_eq!(primary_output(&json!([null])), None);
    }

    #[test]
    fn test_primary_output_non_string() {
        assert_eq!(primary_output(&json!(42)).as_deref(), Some("42"));
    }

    #[test]
    fn test_status_terminal() {
        assert!(!JobStatus::Starting.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Succeeded(json!("u")).is_terminal());
        assert!(JobStatus::Failed("boom".into()).is_terminal());
    }
}
