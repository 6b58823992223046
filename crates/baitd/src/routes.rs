//! API routes for baitd
//!
//! - `POST /analyze`: multipart form (text or file), plain-text verdict
//! - `POST /v1/analyze`: JSON text in, full verdict out
//! - `GET /v1/health`: liveness and version

use crate::ingest::Upload;
use crate::server::AppState;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bait_shared::{
    AnalysisError, AnalyzeRequest, ErrorResponse, HealthResponse, Message, Verdict,
    VerdictResponse, VERSION,
};
use std::sync::Arc;
use tracing::{error, info, warn};

type AppStateArc = Arc<AppState>;

const NO_INPUT: &str = "No text or file provided.";
const ANALYSIS_FAILED: &str = "Analysis failed.";
const TIMED_OUT: &str = "Analysis timed out.";

/// Why a request produced no verdict.
enum RouteError {
    BadRequest(String),
    Failed,
    TimedOut,
}

impl RouteError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Failed => StatusCode::INTERNAL_SERVER_ERROR,
            Self::TimedOut => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    fn message(&self) -> &str {
        match self {
            Self::BadRequest(message) => message,
            Self::Failed => ANALYSIS_FAILED,
            Self::TimedOut => TIMED_OUT,
        }
    }

    fn into_text(self) -> Response {
        (self.status(), self.message().to_string()).into_response()
    }

    fn into_json(self) -> Response {
        (self.status(), Json(ErrorResponse::new(self.message()))).into_response()
    }
}

/// Run one traversal under the request budget.
async fn run_analysis(state: &AppState, text: String) -> Result<Verdict, RouteError> {
    let message = Message::new(text).map_err(|_| RouteError::BadRequest(NO_INPUT.to_string()))?;

    match tokio::time::timeout(state.request_timeout, state.sequencer.analyze(message)).await {
        Ok(Ok(verdict)) => Ok(verdict),
        Ok(Err(AnalysisError::EmptyMessage)) => Err(RouteError::BadRequest(NO_INPUT.to_string())),
        Ok(Err(e)) => {
            error!("  Analysis failed: {}", e);
            Err(RouteError::Failed)
        }
        Err(_) => {
            error!(
                "  Analysis exceeded {}s request budget",
                state.request_timeout.as_secs()
            );
            Err(RouteError::TimedOut)
        }
    }
}

// ============================================================================
// Form Route
// ============================================================================

pub fn analyze_routes() -> Router<AppStateArc> {
    Router::new().route("/analyze", post(analyze_form))
}

async fn analyze_form(State(state): State<AppStateArc>, multipart: Multipart) -> Response {
    let text = match read_form(&state, multipart).await {
        Ok(text) => text,
        Err(e) => return e.into_text(),
    };

    match run_analysis(&state, text).await {
        Ok(verdict) => verdict.conclusion.text.into_response(),
        Err(e) => e.into_text(),
    }
}

/// Text to analyze from the form; a non-empty file wins over the text field.
async fn read_form(state: &AppState, mut multipart: Multipart) -> Result<String, RouteError> {
    let mut text: Option<String> = None;
    let mut upload: Option<Upload> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("  Malformed form: {}", e);
                return Err(RouteError::BadRequest(NO_INPUT.to_string()));
            }
        };

        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("text") => {
                let value = field
                    .text()
                    .await
                    .map_err(|_| RouteError::BadRequest(NO_INPUT.to_string()))?;
                text = Some(value).filter(|v| !v.trim().is_empty());
            }
            Some("file") => {
                let filename = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|_| RouteError::BadRequest(NO_INPUT.to_string()))?;
                if !bytes.is_empty() {
                    upload = Some(Upload {
                        bytes: bytes.to_vec(),
                        filename,
                        content_type,
                    });
                }
            }
            _ => {}
        }
    }

    if let Some(upload) = upload {
        return state.extractor.extract(upload).await.map_err(|e| {
            warn!("  Ingestion failed: {}", e);
            RouteError::BadRequest(capitalize(&e.to_string()))
        });
    }
    text.ok_or_else(|| RouteError::BadRequest(NO_INPUT.to_string()))
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    match chars.next() {
        Some(first) => format!("{}{}.", first.to_uppercase(), chars.as_str()),
        None => String::new(),
    }
}

// ============================================================================
// JSON Route
// ============================================================================

pub fn api_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/analyze", post(analyze_json))
}

async fn analyze_json(
    State(state): State<AppStateArc>,
    Json(req): Json<AnalyzeRequest>,
) -> Response {
    info!("  /v1/analyze ({} chars)", req.text.len());
    match run_analysis(&state, req.text).await {
        Ok(verdict) => Json(VerdictResponse::from(verdict)).into_response(),
        Err(e) => e.into_json(),
    }
}

// ============================================================================
// Health Route
// ============================================================================

pub fn health_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/health", get(health_check))
}

async fn health_check(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: VERSION.to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bait_shared::IngestError;

    #[test]
    fn test_ingest_errors_read_as_sentences() {
        assert_eq!(
            capitalize(&IngestError::UnsupportedEncoding.to_string()),
            "Unsupported file type or encoding."
        );
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_route_error_status() {
        assert_eq!(RouteError::Failed.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(RouteError::TimedOut.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            RouteError::BadRequest(NO_INPUT.to_string()).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
