use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::FormRejection;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use eyre::{Result, WrapErr};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::service::SummaryService;

const INDEX_HTML: &str = include_str!("../static/index.html");

#[derive(Debug, Deserialize)]
pub struct SummarizeForm {
    pub video_url: String,
}

/// `{"summary": ...}` or `{"error": ...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryResponse {
    Summary(String),
    Error(String),
}

pub fn router(service: Arc<SummaryService>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/summarize", post(summarize))
        .with_state(service)
}

pub async fn serve(service: Arc<SummaryService>, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("binding to {addr}"))?;
    info!("Listening on http://{addr}");

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .wrap_err("running HTTP server")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install Ctrl+C handler: {e}");
    }
    info!("Shutting down");
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn summarize(
    State(service): State<Arc<SummaryService>>,
    form: Result<Form<SummarizeForm>, FormRejection>,
) -> Response {
    let Form(form) = match form {
        Ok(form) => form,
        Err(rejection) => {
            warn!("Rejected /summarize request: {rejection}");
            return error_response(StatusCode::BAD_REQUEST, "Missing form field: video_url".to_string());
        }
    };

    info!("Summarize request for {}", form.video_url);
    match service.summarize(&form.video_url).await {
        Ok(summary) => (StatusCode::OK, Json(SummaryResponse::Summary(summary.summary))).into_response(),
        Err(e) => {
            warn!("Request for {} failed: {e}", form.video_url);
            error_response(status_for(&e), e.user_message())
        }
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(SummaryResponse::Error(message))).into_response()
}

fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::InvalidUrl(_) => StatusCode::BAD_REQUEST,
        Error::StrategyFailed(_) | Error::AllStrategiesExhausted { .. } | Error::SummarizationFailed(_) => {
            StatusCode::BAD_GATEWAY
        }
        Error::ConfigMissing(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, header};
    use tower::ServiceExt;

    use super::*;
    use crate::error::ALL_STRATEGIES_FAILED;
    use crate::service::testing::{RecordingSummarizer, service};

    fn form_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/summarize")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn call(app: Router, request: Request<Body>) -> (StatusCode, SummaryResponse) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn app(outcome: Result<Vec<&'static str>, &'static str>) -> Router {
        router(Arc::new(service(outcome, Arc::new(RecordingSummarizer::default()))))
    }

    #[test]
    fn test_response_shape() {
        let json = serde_json::to_value(SummaryResponse::Summary("ok".to_string())).unwrap();
        assert_eq!(json, serde_json::json!({"summary": "ok"}));
        let json = serde_json::to_value(SummaryResponse::Error("bad".to_string())).unwrap();
        assert_eq!(json, serde_json::json!({"error": "bad"}));
    }

    #[tokio::test]
    async fn test_summarize_ok() {
        let request = form_request("video_url=https%3A%2F%2Fyoutu.be%2FdQw4w9WgXcQ");
        let (status, body) = call(app(Ok(vec!["Hello", "world"])), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, SummaryResponse::Summary("summary of: Hello world".to_string()));
    }

    #[tokio::test]
    async fn test_transcript_mentioning_error_is_a_summary() {
        let request = form_request("video_url=https%3A%2F%2Fyoutu.be%2FdQw4w9WgXcQ");
        let (status, body) = call(app(Ok(vec!["Error", "404", "explained"])), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, SummaryResponse::Summary("summary of: Error 404 explained".to_string()));
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let request = form_request("video_url=https%3A%2F%2Fexample.com%2Fclip");
        let (status, body) = call(app(Ok(vec!["x"])), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            SummaryResponse::Error("Invalid YouTube URL: https://example.com/clip".to_string())
        );
    }

    #[tokio::test]
    async fn test_all_strategies_failed() {
        let request = form_request("video_url=https%3A%2F%2Fwww.youtube.com%2Fwatch%3Fv%3DdQw4w9WgXcQ");
        let (status, body) = call(app(Err("connection refused")), request).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body, SummaryResponse::Error(ALL_STRATEGIES_FAILED.to_string()));
    }

    #[tokio::test]
    async fn test_missing_field() {
        let (status, body) = call(app(Ok(vec!["x"])), form_request("url=nope")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(matches!(body, SummaryResponse::Error(_)));
    }

    #[tokio::test]
    async fn test_index_page() {
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app(Ok(vec![])).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains(r#"name="video_url""#));
    }
}
