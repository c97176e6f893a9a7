use anyhow::{Context, Result};
use axum::extract::{DefaultBodyLimit, Json, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::crawl::{validate_url, CrawlError, Crawler};
use crate::ocr::{OcrEngine, OcrError};
use crate::pipeline::{clamp_claim, validate_claim, Pipeline};
use crate::verdict::Verdict;

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Shared handles for the request handlers. Everything inside is read-only
/// once constructed; requests never mutate shared state.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub crawler: Arc<Crawler>,
    pub ocr: Arc<OcrEngine>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/verify", post(verify_handler))
        .route(
            "/api/ocr",
            post(ocr_handler).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + 64 * 1024)),
        )
        .route("/api/crawler", post(crawl_handler))
        .fallback(not_found)
        .with_state(state)
}

pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let app = router(state);
    let addr = format!("0.0.0.0:{}", port);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Server running on http://{}", addr);

    axum::serve(listener, app.into_make_service())
        .await
        .context("HTTP server terminated")?;

    Ok(())
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OcrResponse {
    extracted_text: String,
    fact_check: Verdict,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CrawlResponse {
    url: String,
    title: String,
    summary: String,
    extracted_claims: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    verified_claim: Option<String>,
    fact_check: Verdict,
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
            details: None,
        }),
    )
        .into_response()
}

fn internal_error(message: &str, details: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: message.to_string(),
            details: Some(details),
        }),
    )
        .into_response()
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "Not Found".to_string(),
            details: None,
        }),
    )
        .into_response()
}

/// Text entry point. The claim is validated here, before any pipeline stage
/// runs; an invalid claim never reaches an external service.
pub(crate) async fn verify_handler(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Response {
    let claim = match body.get("claim").and_then(Value::as_str) {
        Some(claim) => claim,
        None => return bad_request("Invalid claim provided."),
    };
    if let Err(message) = validate_claim(claim) {
        return bad_request(message);
    }

    let verdict = state.pipeline.verify_claim(claim).await;
    Json(verdict).into_response()
}

/// Image entry point: multipart upload, OCR, then the shared text pipeline.
pub(crate) async fn ocr_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Response {
    let mut image: Option<(Vec<u8>, String)> = None;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("image") {
                    continue;
                }
                let content_type = field.content_type().unwrap_or_default().to_string();
                match field.bytes().await {
                    Ok(data) => {
                        image = Some((data.to_vec(), content_type));
                        break;
                    }
                    Err(e) => {
                        warn!("Failed to read uploaded image: {}", e);
                        return bad_request("No image file provided");
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Malformed multipart payload: {}", e);
                return bad_request("No image file provided");
            }
        }
    }

    let (data, content_type) = match image {
        Some(image) => image,
        None => return bad_request("No image file provided"),
    };
    if !content_type.starts_with("image/") {
        return bad_request("Only image files are allowed");
    }
    if data.len() > MAX_IMAGE_BYTES {
        return bad_request("Image file exceeds the 5MB limit");
    }

    let text = match state.ocr.recognize(&data).await {
        Ok(text) => text,
        Err(OcrError::Empty) => {
            return bad_request("No text could be extracted from the image");
        }
        Err(OcrError::Engine(details)) => {
            return internal_error("Failed to process image", details);
        }
    };

    let fact_check = state.pipeline.verify_claim(clamp_claim(&text)).await;
    Json(OcrResponse {
        extracted_text: text,
        fact_check,
    })
    .into_response()
}

/// URL entry point: SSRF-validate, crawl, then verify the first extracted
/// claim. Zero extracted claims short-circuit into a terminal "No Claims"
/// result without invoking the verdict engine.
pub(crate) async fn crawl_handler(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Response {
    let raw_url = match body.get("url").and_then(Value::as_str) {
        Some(url) => url,
        None => return bad_request("URL is required"),
    };
    if let Err(CrawlError::InvalidUrl(details)) = validate_url(raw_url) {
        warn!("Rejected URL at boundary: {}", details);
        return bad_request("Invalid URL format");
    }

    let (url, content) = match state.crawler.crawl(raw_url).await {
        Ok(crawled) => crawled,
        Err(CrawlError::InvalidUrl(_)) => {
            return bad_request("Invalid URL format");
        }
        Err(error) => {
            return internal_error("Failed to crawl and verify URL", error.to_string());
        }
    };

    if content.claims.is_empty() {
        return Json(CrawlResponse {
            url: url.to_string(),
            title: content.title,
            summary: content.summary,
            extracted_claims: Vec::new(),
            verified_claim: None,
            fact_check: Verdict::no_claims(),
        })
        .into_response();
    }

    let claim = clamp_claim(&content.claims[0]).to_string();
    let fact_check = state.pipeline.verify_claim(&claim).await;

    Json(CrawlResponse {
        url: url.to_string(),
        title: content.title,
        summary: content.summary,
        extracted_claims: content.claims,
        verified_claim: Some(claim),
        fact_check,
    })
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SearchClient;
    use crate::verdict::VerdictEngine;
    use serde_json::json;
    use std::time::Duration;

    /// State with no credentials configured: search degrades to empty,
    /// verdicts degrade to the Error sentinel, and nothing touches the
    /// network.
    fn offline_state() -> AppState {
        let http = reqwest::Client::new();
        let search = SearchClient::new(
            http.clone(),
            None,
            "in".to_string(),
            "qdr:w".to_string(),
            Duration::from_secs(1),
        );
        AppState {
            pipeline: Arc::new(Pipeline::new(search, VerdictEngine::new(None))),
            crawler: Arc::new(Crawler::new(http, None, Duration::from_secs(1))),
            ocr: Arc::new(OcrEngine::new("tesseract".to_string(), Duration::from_secs(1))),
        }
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn overlong_claim_is_rejected_at_the_boundary() {
        let body = json!({ "claim": "x".repeat(501) });
        let response = verify_handler(State(offline_state()), Json(body)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let payload = body_json(response).await;
        assert_eq!(payload["error"], "Invalid claim provided.");
    }

    #[tokio::test]
    async fn non_string_claim_is_rejected() {
        let body = json!({ "claim": 42 });
        let response = verify_handler(State(offline_state()), Json(body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn credential_less_verify_still_returns_a_verdict_object() {
        let body = json!({ "claim": "The earth is flat" });
        let response = verify_handler(State(offline_state()), Json(body)).await;

        assert_eq!(response.status(), StatusCode::OK);
        let payload = body_json(response).await;
        assert_eq!(payload["verdict"], "Error");
        assert_eq!(payload["explanation"], "Server is missing AI API key.");
        assert_eq!(payload["sources"], json!([]));
    }

    #[tokio::test]
    async fn blocked_url_never_reaches_the_fetch_stage() {
        for url in ["http://localhost/page", "http://192.168.1.1/admin"] {
            let body = json!({ "url": url });
            let response = crawl_handler(State(offline_state()), Json(body)).await;

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let payload = body_json(response).await;
            assert_eq!(payload["error"], "Invalid URL format");
        }
    }

    #[tokio::test]
    async fn missing_url_field_is_rejected() {
        let response = crawl_handler(State(offline_state()), Json(json!({}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let payload = body_json(response).await;
        assert_eq!(payload["error"], "URL is required");
    }

    #[tokio::test]
    async fn health_reports_ok_with_timestamp() {
        let Json(payload) = health().await;
        assert_eq!(payload.status, "ok");
        assert!(!payload.timestamp.is_empty());
    }
}
