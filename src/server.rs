//! HTTP routes for the request handler.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::warn;

use crate::handler::{validation_error, HandlerResponse, RequestHandler};

impl IntoResponse for HandlerResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Build the router: `POST /api/generate-video` and `GET /health`.
pub fn router(handler: Arc<RequestHandler>) -> Router {
    Router::new()
        .route("/api/generate-video", post(generate_video))
        .route("/health", get(health))
        .with_state(handler)
}

async fn generate_video(
    State(handler): State<Arc<RequestHandler>>,
    body: Result<Json<Value>, JsonRejection>,
) -> HandlerResponse {
    match body {
        Ok(Json(body)) => handler.handle(body).await,
        Err(rejection) => {
            warn!(status = %rejection.status(), "rejected request body");
            validation_error(format!("invalid request body: {}", rejection.body_text()))
        }
    }
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockJob, MockJobClient};
    use crate::config::CredentialSource;
    use crate::exec_ctx::ExecCtx;
    use axum::{
        body::{to_bytes, Body},
        http::{header::CONTENT_TYPE, Request, StatusCode},
    };
    use tower::ServiceExt;

    fn app(mock: Arc<MockJobClient>) -> Router {
        let ctx = ExecCtx::builder("http://test/v1")
            .backend(mock)
            .credential(CredentialSource::fixed("tok"))
            .build();
        router(Arc::new(RequestHandler::new(Arc::new(ctx))))
    }

    fn post_json(payload: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/generate-video")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_string(&payload).unwrap()))
            .unwrap()
    }

    async fn body_json(resp: Response) -> Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let mock = Arc::new(MockJobClient::new(vec![MockJob::never_finishes()]));
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let resp = app(mock).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_missing_description_over_http() {
        let mock = Arc::new(MockJobClient::new(vec![MockJob::never_finishes()]));
        let resp = app(mock.clone())
            .oneshot(post_json(json!({"priority": "high"})))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["error"], "Bad Request");
        assert!(body["message"].as_str().unwrap().contains("task_description"));
        assert_eq!(mock.submit_calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_body_is_json_400() {
        let mock = Arc::new(MockJobClient::new(vec![MockJob::never_finishes()]));
        let req = Request::builder()
            .method("POST")
            .uri("/api/generate-video")
            .body(Body::empty())
            .unwrap();
        let resp = app(mock.clone()).oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["error"], "Bad Request");
        assert!(body["message"].is_string());
        assert_eq!(mock.submit_calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_json_is_json_400() {
        let mock = Arc::new(MockJobClient::new(vec![MockJob::never_finishes()]));
        let req = Request::builder()
            .method("POST")
            .uri("/api/generate-video")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let resp = app(mock.clone()).oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["error"], "Bad Request");
        assert!(body["message"]
            .as_str()
            .unwrap()
            .starts_with("invalid request body"));
        assert_eq!(mock.submit_calls(), 0);
    }

    #[tokio::test]
    async fn test_null_priority_over_http() {
        let mock = Arc::new(MockJobClient::new(vec![MockJob::never_finishes()]));
        let resp = app(mock)
            .oneshot(post_json(json!({"task_description": "", "priority": null})))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert!(body["message"].as_str().unwrap().contains("task_description"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_generate_video_over_http() {
        let mock = Arc::new(MockJobClient::new(vec![
            MockJob::succeeds_after(2, json!(["https://img/x.png"])),
            MockJob::succeeds_after(9, json!("https://vid/y.mp4")),
        ]));
        let resp = app(mock)
            .oneshot(post_json(json!({"task_description": "a dancing cat", "user_id": "u1"})))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["result"]["image_url"], "https://img/x.png");
        assert_eq!(body["result"]["video_url"], "https://vid/y.mp4");
        assert_eq!(body["priority"], "medium");
        assert_eq!(body["user_id"], "u1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_over_http_is_408() {
        let mock = Arc::new(MockJobClient::new(vec![MockJob::never_finishes()]));
        let resp = app(mock)
            .oneshot(post_json(json!({"task_description": "a cat"})))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::REQUEST_TIMEOUT);
        let body = body_json(resp).await;
        assert_eq!(body["error"], "Request Timeout");
        assert_eq!(body["stage"], "image");
    }
}
