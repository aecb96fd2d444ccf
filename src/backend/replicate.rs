//! Backend for Replicate-style prediction APIs.
//!
//! [`ReplicateBackend`] translates normalized [`JobSpec`]s into
//! `POST {base}/predictions` calls and reads job state back from the
//! returned `urls.get` status URL.

use super::{Endpoint, JobClient, JobHandle, JobSpec, JobStatus};
use crate::error::Result;
use crate::PipelineError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Backend for Replicate's predictions API.
///
/// Endpoints: `POST /predictions` (create), `GET urls.get` (status).
/// Authentication: `Authorization: Bearer {token}`.
///
/// # Status mapping
///
/// | provider status | [`JobStatus`]            |
/// |-----------------|--------------------------|
/// | `starting`      | `Starting`               |
/// | `processing`    | `Processing`             |
/// | `succeeded`     | `Succeeded(output)`      |
/// | `failed`        | `Failed(error)`          |
/// | `canceled`      | `Failed("... canceled")` |
/// | anything else   | `Processing`             |
#[derive(Debug, Clone, Default)]
pub struct ReplicateBackend;

/// Body returned by `POST /predictions`.
#[derive(Debug, Deserialize)]
struct PredictionCreated {
    id: String,
    #[serde(default)]
    urls: Option<PredictionUrls>,
}

#[derive(Debug, Deserialize)]
struct PredictionUrls {
    get: Option<String>,
}

/// Body returned by `GET urls.get`.
#[derive(Debug, Deserialize)]
struct PredictionState {
    status: String,
    #[serde(default)]
    output: Value,
    #[serde(default)]
    error: Value,
}

impl ReplicateBackend {
    /// Build the JSON body for `POST /predictions`.
    fn build_create_body(spec: &JobSpec) -> Value {
        json!({
            "version": spec.provider_model_id,
            "input": spec.input,
        })
    }

    /// Turn a creation response into a handle, falling back to the
    /// conventional status URL when `urls.get` is absent.
    fn handle_from(created: PredictionCreated, base_url: &str) -> JobHandle {
        let status_url = created
            .urls
            .and_then(|u| u.get)
            .unwrap_or_else(|| format!("{}/predictions/{}", base_url, created.id));
        JobHandle {
            id: created.id,
            status_url,
        }
    }

    /// Map a provider status document onto [`JobStatus`].
    fn parse_status(state: PredictionState) -> JobStatus {
        match state.status.as_str() {
            "starting" => JobStatus::Starting,
            "processing" => JobStatus::Processing,
            "succeeded" => JobStatus::Succeeded(state.output),
            "failed" => JobStatus::Failed(Self::error_text(&state.error)),
            "canceled" => JobStatus::Failed("prediction was canceled".to_string()),
            other => {
                debug!(status = other, "unknown prediction status, treating as processing");
                JobStatus::Processing
            }
        }
    }

    fn error_text(error: &Value) -> String {
        match error {
            Value::Null => "prediction failed without an error message".to_string(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Fetch and decode the status document, surfacing every failure mode.
    async fn fetch_state(client: &Client, token: &str, url: &str) -> Result<PredictionState> {
        let resp = client.get(url).bearer_auth(token).send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Other(format!(
                "status fetch returned HTTP {}: {}",
                status, body
            )));
        }
        let text = resp.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl JobClient for ReplicateBackend {
    async fn submit(
        &self,
        client: &Client,
        endpoint: &Endpoint<'_>,
        spec: &JobSpec,
    ) -> Result<JobHandle> {
        let base = endpoint.base_url.trim_end_matches('/');
        let url = format!("{}/predictions", base);
        let body = Self::build_create_body(spec);

        let resp = client
            .post(&url)
            .bearer_auth(endpoint.api_token)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Submit { status, body: text });
        }

        let text = resp.text().await?;
        let created: PredictionCreated = serde_json::from_str(&text)?;
        Ok(Self::handle_from(created, base))
    }

    async fn poll(
        &self,
        client: &Client,
        endpoint: &Endpoint<'_>,
        handle: &JobHandle,
    ) -> JobStatus {
        match Self::fetch_state(client, endpoint.api_token, &handle.status_url).await {
            Ok(state) => Self::parse_status(state),
            Err(e) => {
                warn!(job_id = %handle.id, error = %e, "status fetch failed, treating job as still processing");
                JobStatus::Processing
            }
        }
    }

    fn name(&self) -> &'static str {
        "replicate"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn state(doc: Value) -> PredictionState {
        serde_json::from_value(doc).unwrap()
    }

    #[test]
    fn test_create_body_shape() {
        let mut input = Map::new();
        input.insert("prompt".into(), json!("a cat"));
        let spec = JobSpec::new("abc123", input);

        let body = ReplicateBackend::build_create_body(&spec);
        assert_eq!(body["version"], "abc123");
        assert_eq!(body["input"]["prompt"], "a cat");
    }

    #[test]
    fn test_handle_uses_urls_get() {
        let created: PredictionCreated = serde_json::from_value(json!({
            "id": "p1",
            "status": "starting",
            "urls": {"get": "https://api.example/v1/predictions/p1", "cancel": "x"}
        }))
        .unwrap();
        let handle = ReplicateBackend::handle_from(created, "https://other");
        assert_eq!(handle.id, "p1");
        assert_eq!(handle.status_url, "https://api.example/v1/predictions/p1");
    }

    #[test]
    fn test_handle_falls_back_without_urls() {
        let created: PredictionCreated =
            serde_json::from_value(json!({"id": "p2", "status": "starting"})).unwrap();
        let handle = ReplicateBackend::handle_from(created, "https://api.example/v1");
        assert_eq!(handle.status_url, "https://api.example/v1/predictions/p2");
    }

    #[test]
    fn test_parse_status_in_progress() {
        assert_eq!(
            ReplicateBackend::parse_status(state(json!({"status": "starting"}))),
            JobStatus::Starting
        );
        assert_eq!(
            ReplicateBackend::parse_status(state(json!({"status": "processing"}))),
            JobStatus::Processing
        );
        assert_eq!(
            ReplicateBackend::parse_status(state(json!({"status": "queued_somewhere"}))),
            JobStatus::Processing
        );
    }

    #[test]
    fn test_parse_status_succeeded_keeps_raw_output() {
        let status = ReplicateBackend::parse_status(state(json!({
            "status": "succeeded",
            "output": ["https://img/x.png"]
        })));
        assert_eq!(status, JobStatus::Succeeded(json!(["https://img/x.png"])));
    }

    #[test]
    fn test_parse_status_failed_and_canceled() {
        let failed = ReplicateBackend::parse_status(state(json!({
            "status": "failed",
            "error": "NSFW content detected"
        })));
        assert_eq!(failed, JobStatus::Failed("NSFW content detected".into()));

        let no_text = ReplicateBackend::parse_status(state(json!({"status": "failed"})));
        assert!(matches!(no_text, JobStatus::Failed(msg) if msg.contains("without an error")));

        let canceled = ReplicateBackend::parse_status(state(json!({"status": "canceled"})));
        assert!(matches!(canceled, JobStatus::Failed(msg) if msg.contains("canceled")));
    }

    #[tokio::test]
    async fn test_poll_unreachable_is_processing() {
        let client = Client::new();
        let endpoint = Endpoint {
            base_url: "http://127.0.0.1:9",
            api_token: "t",
        };
        let handle = JobHandle {
            id: "p".into(),
            status_url: "http://127.0.0.1:9/predictions/p".into(),
        };
        let status = ReplicateBackend.poll(&client, &endpoint, &handle).await;
        assert_eq!(status, JobStatus::Processing);
    }
}
