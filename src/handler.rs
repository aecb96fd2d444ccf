//! Request boundary: validation and outcome → response mapping.
//!
//! [`RequestHandler`] checks the inbound request and the provider
//! credential before anything touches the network, runs the
//! [`StagePipeline`], and renders the [`PipelineOutcome`] as a status code
//! plus a JSON body.

use std::sync::Arc;

use axum::http::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    exec_ctx::ExecCtx,
    pipeline::StagePipeline,
    stage::StageKind,
    types::{PipelineOutcome, Priority, VideoRequest},
};

/// Body of a successful response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuccessBody {
    pub success: bool,
    pub task_id: String,
    pub status: &'static str,
    pub result: VideoUrls,
    pub message: String,
    pub priority: Priority,
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_duration: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoUrls {
    pub video_url: String,
    pub image_url: String,
}

/// Body of an error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<StageKind>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Success(SuccessBody),
    Error(ErrorBody),
}

/// Status code plus body, independent of the HTTP framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerResponse {
    pub status: StatusCode,
    pub body: ResponseBody,
}

impl HandlerResponse {
    fn error(status: StatusCode, error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ResponseBody::Error(ErrorBody {
                error: error.into(),
                message: message.into(),
                stage: None,
            }),
        }
    }

    fn stage_error(status: StatusCode, stage: StageKind, error: String, message: String) -> Self {
        Self {
            status,
            body: ResponseBody::Error(ErrorBody {
                error,
                message,
                stage: Some(stage),
            }),
        }
    }
}

/// Validates requests and runs the pipeline for each one.
///
/// Cheap to share: all per-request data lives on the stack of
/// [`handle`](Self::handle).
#[derive(Debug, Clone)]
pub struct RequestHandler {
    ctx: Arc<ExecCtx>,
    pipeline: StagePipeline,
}

impl RequestHandler {
    pub fn new(ctx: Arc<ExecCtx>) -> Self {
        Self {
            ctx,
            pipeline: StagePipeline::new(),
        }
    }

    /// Replace the pipeline (e.g. to shorten polling budgets).
    pub fn with_pipeline(mut self, pipeline: StagePipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Handle a raw JSON body.
    pub async fn handle(&self, body: Value) -> HandlerResponse {
        if !body.is_object() {
            return validation_error("request body must be a JSON object");
        }
        match serde_json::from_value::<VideoRequest>(body) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => validation_error(format!("invalid request: {}", e)),
        }
    }

    /// Handle an already-decoded request.
    pub async fn handle_request(&self, request: VideoRequest) -> HandlerResponse {
        let outcome = self.run(&request).await;
        match &outcome {
            PipelineOutcome::Success { .. } => {
                info!(priority = %request.priority, user_id = ?request.user_id, "video request completed")
            }
            other => warn!(outcome = ?other, "video request failed"),
        }
        respond(outcome, &request)
    }

    async fn run(&self, request: &VideoRequest) -> PipelineOutcome {
        let task = match request.task_description.as_deref().map(str::trim) {
            Some(task) if !task.is_empty() => task,
            _ => {
                return PipelineOutcome::ValidationError {
                    message: "task_description is required".to_string(),
                }
            }
        };

        let Some(token) = self.ctx.api_token() else {
            return PipelineOutcome::ConfigurationError {
                message: "provider API token is not configured".to_string(),
            };
        };

        info!(
            priority = %request.priority,
            user_id = ?request.user_id,
            task_chars = task.len(),
            "starting video request"
        );
        self.pipeline.run_with_token(&self.ctx, &token, task).await
    }
}

/// A 400 response with the standard `{error, message}` body.
pub(crate) fn validation_error(message: impl Into<String>) -> HandlerResponse {
    HandlerResponse::error(StatusCode::BAD_REQUEST, "Bad Request", message)
}

/// Map a pipeline outcome onto a response.
pub fn respond(outcome: PipelineOutcome, request: &VideoRequest) -> HandlerResponse {
    match outcome {
        PipelineOutcome::Success {
            image_url,
            video_url,
        } => HandlerResponse {
            status: StatusCode::OK,
            body: ResponseBody::Success(SuccessBody {
                success: true,
                task_id: Uuid::new_v4().to_string(),
                status: "completed",
                result: VideoUrls {
                    video_url,
                    image_url,
                },
                message: "Video generated successfully".to_string(),
                priority: request.priority,
                user_id: request.user_id.clone(),
                expected_duration: request.expected_duration.clone(),
            }),
        },
        PipelineOutcome::ValidationError { message } => validation_error(message),
        PipelineOutcome::ConfigurationError { message } => HandlerResponse::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Configuration Error",
            message,
        ),
        PipelineOutcome::UpstreamSubmitError { stage, detail } => HandlerResponse::stage_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            stage,
            format!("{} generation failed", stage.title()),
            format!("Failed to submit {} job: {}", stage, detail),
        ),
        PipelineOutcome::UpstreamTimeout { stage, elapsed } => HandlerResponse::stage_error(
            StatusCode::REQUEST_TIMEOUT,
            stage,
            "Request Timeout".to_string(),
            format!(
                "{} generation timed out after {}s",
                stage.title(),
                elapsed.as_secs()
            ),
        ),
        PipelineOutcome::UpstreamFailure { stage, detail } => HandlerResponse::stage_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            stage,
            format!("{} generation failed", stage.title()),
            detail,
        ),
        PipelineOutcome::UnexpectedError { detail } => HandlerResponse::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error",
            detail,
        ),
    }
}
