//! HTTP route tests, in-process through `tower::ServiceExt::oneshot`.
//!
//! Fake stages behind the real router: status codes, bodies and the
//! multipart form handling are exercised without binding a socket.

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use bait_shared::{HealthResponse, Severity, Stage, StageError, VerdictResponse};
use baitd::config::IngestConfig;
use baitd::ingest::{Extractor, Transcriber};
use baitd::orchestrator::{
    FakeClassifier, FakeClassifiers, FakeConclusionWriter, SequencerSettings, StageSequencer,
};
use baitd::server::{router, AppState};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const BOUNDARY: &str = "bait-test-boundary";
const MAX_UPLOAD: usize = 1024 * 1024;

struct CannedTranscriber(&'static str);

#[async_trait]
impl Transcriber for CannedTranscriber {
    async fn transcribe(&self, _audio: Vec<u8>, _filename: &str) -> Result<String, StageError> {
        Ok(self.0.to_string())
    }
}

fn app_with(fakes: FakeClassifiers, timeout: Duration) -> Router {
    let writer = Arc::new(FakeConclusionWriter::new());
    let sequencer = StageSequencer::new(fakes.set(), writer, SequencerSettings::default());
    let extractor = Extractor::new(
        &IngestConfig::default(),
        Arc::new(CannedTranscriber("Hi, this is the bank. Call us back now.")),
    );
    let state = AppState::new(Arc::new(sequencer), Arc::new(extractor), timeout);
    router(Arc::new(state), MAX_UPLOAD)
}

fn app(fakes: FakeClassifiers) -> Router {
    app_with(fakes, Duration::from_secs(5))
}

/// One field of a multipart form.
enum Part<'a> {
    Text(&'a str),
    File(&'a str, &'a [u8]),
}

fn multipart(parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(text) => {
                body.extend_from_slice(b"Content-Disposition: form-data; name=\"text\"\r\n\r\n");
                body.extend_from_slice(text.as_bytes());
            }
            Part::File(filename, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        filename
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/analyze")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn json_request(text: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/analyze")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::json!({ "text": text }).to_string()))
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// ============================================================================
// POST /analyze
// ============================================================================

#[tokio::test]
async fn test_form_text_returns_narrative() {
    let app = app(FakeClassifiers::message("na", "high_risk", "high_risk"));
    let response = app
        .oneshot(multipart(&[Part::Text("Verify your account now at paypa1.top")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, Severity::High.advisory());
}

#[tokio::test]
async fn test_form_without_input_is_bad_request() {
    let app = app(FakeClassifiers::message("na", "no_risk", "na"));
    let response = app.oneshot(multipart(&[Part::Text("   ")])).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, "No text or file provided.");
}

#[tokio::test]
async fn test_form_file_wins_over_text() {
    // the file is a voicemail recording; the text field would be a message
    let app = app(FakeClassifiers::voicemail("high_risk", "high_risk"));
    let response = app
        .oneshot(multipart(&[
            Part::Text("ignored"),
            Part::File("call.mp3", b"ID3\x04\x00fake-audio"),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, Severity::High.advisory());
}

#[tokio::test]
async fn test_form_text_file_upload() {
    let app = app(FakeClassifiers::message("is_legitimate", "no_risk", "no_risk"));
    let response = app
        .oneshot(multipart(&[Part::File(
            "sms.txt",
            b"Your table for two is confirmed for 7pm.",
        )]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, Severity::None.advisory());
}

#[tokio::test]
async fn test_form_undecodable_file_is_bad_request() {
    let app = app(FakeClassifiers::message("na", "no_risk", "na"));
    let response = app
        .oneshot(multipart(&[Part::File("blob.bin", &[0xC3, 0x28, 0xA0, 0xFE])]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, "Unsupported file type or encoding.");
}

#[tokio::test]
async fn test_form_stage_failure_is_server_error() {
    let fakes = FakeClassifiers::message("na", "no_risk", "na").with(FakeClassifier::failing(
        Stage::Validity,
        StageError::Http("HTTP 500 from upstream".to_string()),
    ));
    let response = app(fakes)
        .oneshot(multipart(&[Part::Text("Claim your prize today!")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_text(response).await;
    assert_eq!(body, "Analysis failed.");
    assert!(!body.contains("upstream"));
}

#[tokio::test]
async fn test_form_timeout_is_gateway_timeout() {
    let fakes = FakeClassifiers::message("na", "no_risk", "na").with(
        FakeClassifier::answering(Stage::Category, "is_textoremail")
            .with_delay(Duration::from_millis(500)),
    );
    let response = app_with(fakes, Duration::from_millis(50))
        .oneshot(multipart(&[Part::Text("Claim your prize today!")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
}

// ============================================================================
// POST /v1/analyze
// ============================================================================

#[tokio::test]
async fn test_json_returns_full_verdict() {
    let app = app(FakeClassifiers::voicemail("na", "low_risk"));
    let response = app
        .oneshot(json_request("Hello, call me back about your car warranty."))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let verdict: VerdictResponse = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(verdict.score, 3);
    assert_eq!(verdict.severity, Severity::Low);
    assert_eq!(verdict.steps.len(), 3);
    assert_eq!(verdict.conclusion, Severity::Low.advisory());
}

#[tokio::test]
async fn test_json_empty_text_is_bad_request() {
    let app = app(FakeClassifiers::voicemail("na", "low_risk"));
    let response = app.oneshot(json_request("")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["error"], "No text or file provided.");
}

#[tokio::test]
async fn test_json_ambiguous_outcome_is_server_error() {
    let fakes = FakeClassifiers::voicemail("na", "low_risk").with(FakeClassifier::with_flags(
        Stage::PhoneNumber,
        bait_shared::FlagSet::new().with("high_risk", true).with("na", true),
    ));
    let response = app(fakes)
        .oneshot(json_request("This is your bank calling."))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["error"], "Analysis failed.");
}

// ============================================================================
// GET /v1/health
// ============================================================================

#[tokio::test]
async fn test_health() {
    let app = app(FakeClassifiers::none());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let health: HealthResponse = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, bait_shared::VERSION);
}
