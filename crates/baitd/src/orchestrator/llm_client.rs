//! HTTP client for the reasoning service, and the stages built on it.
//!
//! Two wire protocols:
//! - `openai`: Responses API with strict JSON-schema output and the web
//!   search tool; also serves audio transcription for ingestion
//! - `ollama`: local chat API, schema passed as `format`, no tools
//!
//! Robust output handling: flags may come back wrapped in prose, keyed by
//! `type`/`result`, or as a bare label; see `FlagSet::from_value`.

use super::classifier::{Classifier, ConclusionRequest, ConclusionWriter};
use super::prompts;
use crate::config::{Backend, LlmConfig, StageSettings};
use anyhow::{Context, Result};
use async_trait::async_trait;
use bait_shared::{ConversationContext, FlagSet, Stage, StageError, TraceMetadata};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

// ============================================================================
// Client
// ============================================================================

/// One call to the reasoning service.
#[derive(Debug, Clone, Copy)]
pub struct LlmRequest<'a> {
    pub settings: &'a StageSettings,
    pub instructions: &'a str,
    pub input: &'a str,
    /// (name, JSON schema) for structured output; `None` for free text
    pub schema: Option<(&'a str, &'a Value)>,
    pub trace: &'a TraceMetadata,
}

/// A failed attempt, and whether trying again could help.
struct Failure {
    error: StageError,
    retryable: bool,
}

impl Failure {
    fn fatal(error: StageError) -> Self {
        Self {
            error,
            retryable: false,
        }
    }

    fn transient(error: StageError) -> Self {
        Self {
            error,
            retryable: true,
        }
    }
}

pub struct LlmClient {
    http: reqwest::Client,
    enabled: bool,
    backend: Backend,
    endpoint: String,
    api_key: Option<String>,
    timeout_secs: u64,
    max_attempts: u32,
    retry_backoff: Duration,
    store: bool,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("building HTTP client")?;

        let api_key = config.api_key();
        if config.enabled && config.backend == Backend::Openai && api_key.is_none() {
            warn!(
                "{} is not set; requests to {} will be unauthenticated",
                config.api_key_env, config.endpoint
            );
        }

        Ok(Self {
            http,
            enabled: config.enabled,
            backend: config.backend,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key,
            timeout_secs: config.timeout_secs,
            max_attempts: config.max_attempts.max(1),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            store: config.store,
        })
    }

    /// Run one request, retrying transport failures up to `max_attempts`.
    pub async fn complete(&self, request: &LlmRequest<'_>) -> Result<String, StageError> {
        if !self.enabled {
            return Err(StageError::Disabled);
        }

        let mut attempt = 1;
        loop {
            match self.send_once(request).await {
                Ok(text) => return Ok(text),
                Err(failure) if failure.retryable && attempt < self.max_attempts => {
                    warn!(
                        "{} call failed (attempt {}/{}): {}, retrying",
                        request.settings.model, attempt, self.max_attempts, failure.error
                    );
                    tokio::time::sleep(self.retry_backoff).await;
                    attempt += 1;
                }
                Err(failure) => return Err(failure.error),
            }
        }
    }

    async fn send_once(&self, request: &LlmRequest<'_>) -> Result<String, Failure> {
        let (url, body) = match self.backend {
            Backend::Openai => (
                format!("{}/v1/responses", self.endpoint),
                openai_body(request, self.store),
            ),
            Backend::Ollama => (format!("{}/api/chat", self.endpoint), ollama_body(request)),
        };

        debug!(
            "[>] {} {} (instructions {} chars, input {} chars)",
            request.settings.model,
            url,
            request.instructions.len(),
            request.input.len()
        );

        let mut builder = self.http.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.transport_failure(e))?;

        let status = response.status();
        if !status.is_success() {
            let error = StageError::Http(format!("HTTP {} from {}", status, url));
            return Err(if status.is_server_error() || status.as_u16() == 429 {
                Failure::transient(error)
            } else {
                Failure::fatal(error)
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| Failure::fatal(StageError::InvalidJson(format!("response body: {}", e))))?;

        let text = match self.backend {
            Backend::Openai => openai_output_text(&payload),
            Backend::Ollama => ollama_output_text(&payload),
        }
        .ok_or_else(|| Failure::fatal(StageError::EmptyResponse))?;

        debug!("[<] {} answered ({} chars)", request.settings.model, text.len());
        Ok(text)
    }

    fn transport_failure(&self, e: reqwest::Error) -> Failure {
        if e.is_timeout() {
            Failure::transient(StageError::Timeout(self.timeout_secs))
        } else {
            Failure::transient(StageError::Http(format!("request failed: {}", e)))
        }
    }

    /// Speech to text through `/v1/audio/transcriptions`.
    pub async fn transcribe(
        &self,
        model: &str,
        audio: Vec<u8>,
        filename: &str,
    ) -> Result<String, StageError> {
        if !self.enabled {
            return Err(StageError::Disabled);
        }
        if self.backend != Backend::Openai {
            return Err(StageError::Unavailable(
                "transcription requires the openai backend".to_string(),
            ));
        }

        let url = format!("{}/v1/audio/transcriptions", self.endpoint);
        let part = reqwest::multipart::Part::bytes(audio).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new()
            .text("model", model.to_string())
            .part("file", part);

        let mut builder = self.http.post(&url).multipart(form);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| self.transport_failure(e).error)?;
        if !response.status().is_success() {
            return Err(StageError::Http(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| StageError::InvalidJson(format!("response body: {}", e)))?;
        payload
            .get("text")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or(StageError::EmptyResponse)
    }
}

// ============================================================================
// Wire Formats
// ============================================================================

/// Responses API request body.
fn openai_body(request: &LlmRequest<'_>, store: bool) -> Value {
    let settings = request.settings;
    let mut body = json!({
        "model": settings.model,
        "instructions": request.instructions,
        "input": request.input,
        "store": store,
        "metadata": request.trace.as_map(),
    });

    if let Some((name, schema)) = request.schema {
        body["text"] = json!({
            "format": {
                "type": "json_schema",
                "name": name,
                "schema": schema,
                "strict": true,
            }
        });
    }
    if settings.web_search {
        body["tools"] = json!([{
            "type": "web_search_preview",
            "search_context_size": "medium",
            "user_location": { "type": "approximate" },
        }]);
    }
    if let Some(effort) = &settings.reasoning_effort {
        body["reasoning"] = json!({ "effort": effort });
    }
    if let Some(temperature) = settings.temperature {
        body["temperature"] = json!(temperature);
    }
    if let Some(max) = settings.max_output_tokens {
        body["max_output_tokens"] = json!(max);
    }
    body
}

/// Ollama chat request body.
fn ollama_body(request: &LlmRequest<'_>) -> Value {
    let mut body = json!({
        "model": request.settings.model,
        "messages": [
            { "role": "system", "content": request.instructions },
            { "role": "user", "content": request.input },
        ],
        "stream": false,
    });

    if let Some((_, schema)) = request.schema {
        body["format"] = schema.clone();
    }
    let mut options = serde_json::Map::new();
    if let Some(temperature) = request.settings.temperature {
        options.insert("temperature".to_string(), json!(temperature));
    }
    if let Some(max) = request.settings.max_output_tokens {
        options.insert("num_predict".to_string(), json!(max));
    }
    if !options.is_empty() {
        body["options"] = Value::Object(options);
    }
    body
}

/// Concatenated `output_text` parts of a Responses API payload.
fn openai_output_text(payload: &Value) -> Option<String> {
    if let Some(text) = payload.get("output_text").and_then(|v| v.as_str()) {
        return non_empty(text);
    }

    let mut text = String::new();
    for item in payload.get("output")?.as_array()? {
        if item.get("type").and_then(|t| t.as_str()) != Some("message") {
            continue;
        }
        for part in item.get("content").and_then(|c| c.as_array()).into_iter().flatten() {
            if part.get("type").and_then(|t| t.as_str()) == Some("output_text") {
                if let Some(chunk) = part.get("text").and_then(|t| t.as_str()) {
                    text.push_str(chunk);
                }
            }
        }
    }
    non_empty(&text)
}

fn ollama_output_text(payload: &Value) -> Option<String> {
    payload
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .and_then(non_empty)
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Extract JSON from text that may have prose around it
fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Parse a stage answer into flags.
pub fn parse_flags(text: &str) -> Result<FlagSet, StageError> {
    let value = match serde_json::from_str::<Value>(text) {
        Ok(value) => value,
        Err(direct) => {
            let embedded = extract_json(text)
                .ok_or_else(|| StageError::InvalidJson(format!("no JSON object: {}", direct)))?;
            serde_json::from_str::<Value>(embedded)
                .map_err(|e| StageError::InvalidJson(e.to_string()))?
        }
    };
    FlagSet::from_value(&value).map_err(StageError::InvalidJson)
}

// ============================================================================
// Stages
// ============================================================================

/// A classification stage answered by the reasoning service.
pub struct LlmClassifier {
    stage: Stage,
    client: Arc<LlmClient>,
    settings: StageSettings,
    instructions: String,
    schema: Value,
    schema_name: String,
}

impl LlmClassifier {
    pub fn new(stage: Stage, client: Arc<LlmClient>, settings: StageSettings) -> Self {
        Self {
            stage,
            client,
            settings,
            instructions: prompts::instructions(stage),
            schema: prompts::flag_schema(stage),
            schema_name: prompts::schema_name(stage),
        }
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    fn stage(&self) -> Stage {
        self.stage
    }

    async fn classify(
        &self,
        context: &ConversationContext,
        trace: &TraceMetadata,
    ) -> Result<FlagSet, StageError> {
        let request = LlmRequest {
            settings: &self.settings,
            instructions: &self.instructions,
            input: context.message(),
            schema: Some((&self.schema_name, &self.schema)),
            trace,
        };
        let text = self.client.complete(&request).await?;
        parse_flags(&text)
    }
}

/// Conclusion stage answered by the reasoning service.
pub struct LlmConclusionWriter {
    client: Arc<LlmClient>,
    settings: StageSettings,
}

impl LlmConclusionWriter {
    pub fn new(client: Arc<LlmClient>, settings: StageSettings) -> Self {
        Self { client, settings }
    }
}

#[async_trait]
impl ConclusionWriter for LlmConclusionWriter {
    async fn conclude(&self, request: &ConclusionRequest<'_>) -> Result<String, StageError> {
        let instructions = prompts::conclusion_instructions(request.score, request.severity);
        let call = LlmRequest {
            settings: &self.settings,
            instructions: &instructions,
            input: request.context.message(),
            schema: None,
            trace: request.trace,
        };

        let text = self.client.complete(&call).await?;
        if text.trim().is_empty() {
            return Err(StageError::EmptyResponse);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StageSettingsTable;

    fn trace() -> TraceMetadata {
        TraceMetadata {
            source: "baitd".to_string(),
            workflow_id: Some("wf_test".to_string()),
        }
    }

    #[test]
    fn test_parse_flags_direct_and_embedded() {
        let direct = parse_flags(r#"{"high_risk": false, "na": true}"#).unwrap();
        assert_eq!(direct.true_flags(), vec!["na"]);

        let wrapped =
            parse_flags("Sure! Here is the result:\n{\"type\": \"is_voicemail\"}\nHope it helps.")
                .unwrap();
        assert!(wrapped.is_set("is_voicemail"));

        assert!(matches!(
            parse_flags("I could not decide."),
            Err(StageError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_openai_body_for_search_stage() {
        let stages = StageSettingsTable::default();
        let schema = prompts::flag_schema(Stage::Validity);
        let trace = trace();
        let request = LlmRequest {
            settings: stages.get(Stage::Validity),
            instructions: "check",
            input: "call 555-0100",
            schema: Some(("validity_flags", &schema)),
            trace: &trace,
        };

        let body = openai_body(&request, true);
        assert_eq!(body["model"], "gpt-4.1");
        assert_eq!(body["text"]["format"]["type"], "json_schema");
        assert_eq!(body["text"]["format"]["strict"], true);
        assert_eq!(body["tools"][0]["type"], "web_search_preview");
        assert_eq!(body["metadata"]["workflow_id"], "wf_test");
        assert_eq!(body["max_output_tokens"], 10_000);
        assert!(body.get("reasoning").is_none());
    }

    #[test]
    fn test_openai_body_for_reasoning_stage() {
        let stages = StageSettingsTable::default();
        let trace = trace();
        let request = LlmRequest {
            settings: stages.get(Stage::MessageContent),
            instructions: "count cues",
            input: "WIN A PRIZE",
            schema: None,
            trace: &trace,
        };

        let body = openai_body(&request, false);
        assert_eq!(body["reasoning"]["effort"], "high");
        assert_eq!(body["store"], false);
        assert!(body.get("tools").is_none());
        assert!(body.get("text").is_none());
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn test_ollama_body_uses_schema_as_format() {
        let stages = StageSettingsTable::default();
        let schema = prompts::flag_schema(Stage::Category);
        let trace = trace();
        let request = LlmRequest {
            settings: stages.get(Stage::Category),
            instructions: "classify",
            input: "Hey, call me back",
            schema: Some(("category_flags", &schema)),
            trace: &trace,
        };

        let body = ollama_body(&request);
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Hey, call me back");
        assert_eq!(body["format"], schema);
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_output_text_extraction() {
        let payload = json!({
            "output": [
                { "type": "web_search_call", "status": "completed" },
                { "type": "message", "content": [
                    { "type": "output_text", "text": "{\"na\": true," },
                    { "type": "output_text", "text": " \"high_risk\": false}" }
                ]}
            ]
        });
        assert_eq!(
            openai_output_text(&payload).as_deref(),
            Some("{\"na\": true, \"high_risk\": false}")
        );
        assert_eq!(openai_output_text(&json!({ "output": [] })), None);

        let chat = json!({ "message": { "role": "assistant", "content": "  {\"no_risk\": true} " } });
        assert_eq!(ollama_output_text(&chat).as_deref(), Some("{\"no_risk\": true}"));
    }

    #[tokio::test]
    async fn test_disabled_client_never_calls_out() {
        let config = LlmConfig {
            enabled: false,
            ..LlmConfig::default()
        };
        let client = Arc::new(LlmClient::new(&config).unwrap());
        let classifier = LlmClassifier::new(
            Stage::Category,
            client,
            config.stages.get(Stage::Category).clone(),
        );

        let message = bait_shared::Message::new("hello").unwrap();
        let context = ConversationContext::seed(&message);
        let err = classifier.classify(&context, &trace()).await.unwrap_err();
        assert_eq!(err, StageError::Disabled);
    }
}
