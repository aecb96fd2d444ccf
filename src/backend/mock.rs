//! Mock job client for testing without a live provider.
//!
//! [`MockJobClient`] plays back pre-configured jobs in submission order,
//! allowing deterministic tests of the poller and the pipeline.
//!
//! # Example
//!
//! ```
//! use video_pipeline::backend::{MockJob, MockJobClient};
//! use serde_json::json;
//!
//! let mock = MockJobClient::new(vec![
//!     MockJob::succeeds_after(2, json!(["https://img/x.png"])),
//!     MockJob::succeeds_after(0, json!("https://vid/y.mp4")),
//! ]);
//! assert_eq!(mock.submit_calls(), 0);
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::{Endpoint, JobClient, JobHandle, JobSpec, JobStatus};
use crate::error::Result;
use crate::PipelineError;

/// One scripted job: how submission responds and which statuses polling sees.
#[derive(Debug, Clone)]
pub struct MockJob {
    /// `Some((status, body))` makes submission fail with [`PipelineError::Submit`].
    pub reject: Option<(u16, String)>,
    /// Statuses returned by successive polls. The last one repeats once exhausted.
    pub statuses: Vec<JobStatus>,
}

impl MockJob {
    /// A job that reports `Processing` `pending` times, then succeeds with `output`.
    pub fn succeeds_after(pending: usize, output: Value) -> Self {
        let mut statuses = vec![JobStatus::Processing; pending];
        statuses.push(JobStatus::Succeeded(output));
        Self {
            reject: None,
            statuses,
        }
    }

    /// A job that reports `Processing` `pending` times, then fails with `message`.
    pub fn fails_after(pending: usize, message: impl Into<String>) -> Self {
        let mut statuses = vec![JobStatus::Processing; pending];
        statuses.push(JobStatus::Failed(message.into()));
        Self {
            reject: None,
            statuses,
        }
    }

    /// A job that never reaches a terminal status.
    pub fn never_finishes() -> Self {
        Self {
            reject: None,
            statuses: vec![JobStatus::Starting, JobStatus::Processing],
        }
    }

    /// A job whose submission is rejected by the provider.
    pub fn rejected(status: u16, body: impl Into<String>) -> Self {
        Self {
            reject: Some((status, body.into())),
            statuses: vec![JobStatus::Processing],
        }
    }

    /// Replace the poll script.
    pub fn with_statuses(mut self, statuses: Vec<JobStatus>) -> Self {
        self.statuses = statuses;
        self
    }
}

/// A test job client that plays back scripted jobs in order.
///
/// Each submission takes the next [`MockJob`], cycling back to the first
/// when all have been consumed. Every accepted submission gets a fresh
/// handle id, so repeated scenarios never share state.
#[derive(Debug)]
pub struct MockJobClient {
    jobs: Vec<MockJob>,
    submitted: AtomicUsize,
    polled: AtomicUsize,
    // handle id -> (script index, polls seen)
    live: Mutex<HashMap<String, (usize, usize)>>,
    specs: Mutex<Vec<JobSpec>>,
}

impl MockJobClient {
    /// Create a mock with the given scripted jobs.
    pub fn new(jobs: Vec<MockJob>) -> Self {
        assert!(!jobs.is_empty(), "MockJobClient requires at least one job");
        Self {
            jobs,
            submitted: AtomicUsize::new(0),
            polled: AtomicUsize::new(0),
            live: Mutex::new(HashMap::new()),
            specs: Mutex::new(Vec::new()),
        }
    }

    /// Total number of `submit` calls, accepted or rejected.
    pub fn submit_calls(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }

    /// Total number of `poll` calls across all handles.
    pub fn poll_calls(&self) -> usize {
        self.polled.load(Ordering::SeqCst)
    }

    /// Specs received by `submit`, in order.
    pub fn submitted_specs(&self) -> Vec<JobSpec> {
        self.specs.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl JobClient for MockJobClient {
    async fn submit(
        &self,
        _client: &Client,
        endpoint: &Endpoint<'_>,
        spec: &JobSpec,
    ) -> Result<JobHandle> {
        let n = self.submitted.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut specs) = self.specs.lock() {
            specs.push(spec.clone());
        }

        let script = n % self.jobs.len();
        if let Some((status, body)) = &self.jobs[script].reject {
            return Err(PipelineError::Submit {
                status: *status,
                body: body.clone(),
            });
        }

        let id = format!("mock-{}", n + 1);
        self.live
            .lock()
            .map_err(|_| PipelineError::Other("mock state poisoned".into()))?
            .insert(id.clone(), (script, 0));

        Ok(JobHandle {
            status_url: format!("{}/predictions/{}", endpoint.base_url, id),
            id,
        })
    }

    async fn poll(
        &self,
        _client: &Client,
        _endpoint: &Endpoint<'_>,
        handle: &JobHandle,
    ) -> JobStatus {
        self.polled.fetch_add(1, Ordering::SeqCst);

        let Ok(mut live) = self.live.lock() else {
            return JobStatus::Processing;
        };
        // Unknown handles behave like a failed status fetch.
        let Some((script, seen)) = live.get_mut(&handle.id) else {
            return JobStatus::Processing;
        };

        let statuses = &self.jobs[*script].statuses;
        let idx = (*seen).min(statuses.len().saturating_sub(1));
        *seen += 1;
        statuses.get(idx).cloned().unwrap_or(JobStatus::Processing)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn endpoint() -> Endpoint<'static> {
        Endpoint {
            base_url: "http://unused",
            api_token: "token",
        }
    }

    fn spec() -> JobSpec {
        JobSpec::new("model", Map::new())
    }

    #[tokio::test]
    async fn test_mock_plays_script_then_repeats_last() {
        let mock = MockJobClient::new(vec![MockJob::succeeds_after(1, json!("u"))]);
        let client = Client::new();
        let handle = mock.submit(&client, &endpoint(), &spec()).await.unwrap();

        assert_eq!(mock.poll(&client, &endpoint(), &handle).await, JobStatus::Processing);
        assert_eq!(
            mock.poll(&client, &endpoint(), &handle).await,
            JobStatus::Succeeded(json!("u"))
        );
        assert_eq!(
            mock.poll(&client, &endpoint(), &handle).await,
            JobStatus::Succeeded(json!("u"))
        );
        assert_eq!(mock.poll_calls(), 3);
    }

    #[tokio::test]
    async fn test_mock_cycles_jobs_with_fresh_handles() {
        let mock = MockJobClient::new(vec![
            MockJob::succeeds_after(0, json!("a")),
            MockJob::succeeds_after(0, json!("b")),
        ]);
        let client = Client::new();
        let h1 = mock.submit(&client, &endpoint(), &spec()).await.unwrap();
        let h2 = mock.submit(&client, &endpoint(), &spec()).await.unwrap();
        let h3 = mock.submit(&client, &endpoint(), &spec()).await.unwrap();

        assert_ne!(h1.id, h3.id);
        assert_eq!(mock.poll(&client, &endpoint(), &h2).await, JobStatus::Succeeded(json!("b")));
        assert_eq!(mock.poll(&client, &endpoint(), &h3).await, JobStatus::Succeeded(json!("a")));
        assert_eq!(mock.submit_calls(), 3);
    }

    #[tokio::test]
    async fn test_mock_rejected_submit() {
        let mock = MockJobClient::new(vec![MockJob::rejected(422, "invalid version")]);
        let err = mock
            .submit(&Client::new(), &endpoint(), &spec())
            .await
            .unwrap_err();
        match err {
            PipelineError::Submit { status, body } => {
                assert_eq!(status, 422);
                assert_eq!(body, "invalid version");
            }
            other => panic!("Expected Submit error, got {other:?}"),
        }
        assert_eq!(mock.submitted_specs().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_unknown_handle_is_processing() {
        let mock = MockJobClient::new(vec![MockJob::never_finishes()]);
        let handle = JobHandle {
            id: "nope".into(),
            status_url: "http://unused/nope".into(),
        };
        let status = mock.poll(&Client::new(), &endpoint(), &handle).await;
        assert_eq!(status, JobStatus::Processing);
    }
}
