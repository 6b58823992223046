//! Configuration management for baitd.
//!
//! Loads settings from `$BAIT_CONFIG`, `/etc/bait/config.toml` or the user
//! config dir, in that order, or uses defaults. Every field has a default,
//! so a partial file is always valid.

use anyhow::{Context, Result};
use bait_shared::{AmbiguityPolicy, ScoreWeights, Stage, TraceMetadata, DEFAULT_LISTEN_ADDR};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// System config file path
pub const CONFIG_PATH: &str = "/etc/bait/config.toml";

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "BAIT_CONFIG";

// ============================================================================
// Daemon
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Budget for one whole traversal, every stage included
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

fn default_request_timeout() -> u64 {
    300 // web-search stages can take minutes
}

fn default_max_upload_bytes() -> usize {
    25 * 1024 * 1024 // transcription API upload cap
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            request_timeout_secs: default_request_timeout(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

// ============================================================================
// LLM
// ============================================================================

/// Wire protocol of the reasoning service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// OpenAI Responses API, supports the web search tool
    Openai,
    /// Ollama chat API, no tools
    Ollama,
}

/// Model settings for one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSettings {
    pub model: String,

    /// Reasoning effort for reasoning models ("low", "medium", "high")
    #[serde(default)]
    pub reasoning_effort: Option<String>,

    #[serde(default)]
    pub temperature: Option<f32>,

    #[serde(default)]
    pub max_output_tokens: Option<u32>,

    /// Attach the web search tool (openai backend only)
    #[serde(default)]
    pub web_search: bool,
}

impl StageSettings {
    fn reasoning(model: &str, effort: &str) -> Self {
        Self {
            model: model.to_string(),
            reasoning_effort: Some(effort.to_string()),
            temperature: None,
            max_output_tokens: None,
            web_search: false,
        }
    }

    fn sampling(model: &str, max_output_tokens: u32, web_search: bool) -> Self {
        Self {
            model: model.to_string(),
            reasoning_effort: None,
            temperature: Some(1.0),
            max_output_tokens: Some(max_output_tokens),
            web_search,
        }
    }
}

/// Per-stage model settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSettingsTable {
    #[serde(default = "default_category")]
    pub category: StageSettings,

    #[serde(default = "default_validity")]
    pub validity: StageSettings,

    #[serde(default = "default_message_content")]
    pub message_content: StageSettings,

    #[serde(default = "default_domain_reputation")]
    pub domain_reputation: StageSettings,

    #[serde(default = "default_phone_number")]
    pub phone_number: StageSettings,

    #[serde(default = "default_transcript_content")]
    pub transcript_content: StageSettings,

    #[serde(default = "default_conclusion")]
    pub conclusion: StageSettings,
}

fn default_category() -> StageSettings {
    StageSettings::reasoning("o4-mini", "medium")
}

fn default_validity() -> StageSettings {
    StageSettings::sampling("gpt-4.1", 10_000, true)
}

fn default_message_content() -> StageSettings {
    StageSettings::reasoning("o4-mini", "high")
}

fn default_domain_reputation() -> StageSettings {
    StageSettings::sampling("gpt-4.1", 2_048, true)
}

fn default_phone_number() -> StageSettings {
    StageSettings::sampling("gpt-4.1", 10_000, true)
}

fn default_transcript_content() -> StageSettings {
    StageSettings::reasoning("o4-mini", "high")
}

fn default_conclusion() -> StageSettings {
    StageSettings::sampling("gpt-4.1", 2_048, false)
}

impl Default for StageSettingsTable {
    fn default() -> Self {
        Self {
            category: default_category(),
            validity: default_validity(),
            message_content: default_message_content(),
            domain_reputation: default_domain_reputation(),
            phone_number: default_phone_number(),
            transcript_content: default_transcript_content(),
            conclusion: default_conclusion(),
        }
    }
}

impl StageSettingsTable {
    pub fn get(&self, stage: Stage) -> &StageSettings {
        match stage {
            Stage::Category => &self.category,
            Stage::Validity => &self.validity,
            Stage::MessageContent => &self.message_content,
            Stage::DomainReputation => &self.domain_reputation,
            Stage::PhoneNumber => &self.phone_number,
            Stage::TranscriptContent => &self.transcript_content,
            Stage::Conclusion => &self.conclusion,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_backend")]
    pub backend: Backend,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Per-call HTTP timeout
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Attempts per stage call on transport failure (1 = no retry)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Ask the service to keep responses for later inspection
    #[serde(default = "default_store")]
    pub store: bool,

    #[serde(default)]
    pub stages: StageSettingsTable,
}

fn default_enabled() -> bool {
    true
}

fn default_backend() -> Backend {
    Backend::Openai
}

fn default_endpoint() -> String {
    "https://api.openai.com".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_llm_timeout() -> u64 {
    120
}

fn default_max_attempts() -> u32 {
    2
}

fn default_retry_backoff() -> u64 {
    500
}

fn default_store() -> bool {
    true
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            backend: default_backend(),
            endpoint: default_endpoint(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_llm_timeout(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff(),
            store: default_store(),
            stages: StageSettingsTable::default(),
        }
    }
}

impl LlmConfig {
    /// API key from the configured environment variable, if set.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

// ============================================================================
// Sequencer / Conclusion / Ingest
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SequencerConfig {
    #[serde(default)]
    pub ambiguity: AmbiguityPolicy,

    /// Run the independent stages of a branch concurrently
    #[serde(default)]
    pub concurrent_evidence: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriterKind {
    /// Narrative written by the reasoning service
    #[default]
    Llm,
    /// Fixed advisory text per severity tier
    Template,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConclusionConfig {
    #[serde(default)]
    pub writer: WriterKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// OCR binary invoked for image uploads
    #[serde(default = "default_tesseract_bin")]
    pub tesseract_bin: String,

    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,
}

fn default_tesseract_bin() -> String {
    "tesseract".to_string()
}

fn default_transcription_model() -> String {
    "whisper-1".to_string()
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            tesseract_bin: default_tesseract_bin(),
            transcription_model: default_transcription_model(),
        }
    }
}

// ============================================================================
// Full Config
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub sequencer: SequencerConfig,

    /// Score delta per stage outcome
    #[serde(default)]
    pub weights: ScoreWeights,

    #[serde(default)]
    pub trace: TraceMetadata,

    #[serde(default)]
    pub conclusion: ConclusionConfig,

    #[serde(default)]
    pub ingest: IngestConfig,
}

impl Config {
    /// Load config from the first readable candidate path, or defaults.
    pub fn load() -> Self {
        for path in Self::candidate_paths() {
            if !path.exists() {
                continue;
            }
            match Self::load_from_path(&path) {
                Ok(config) => return config,
                Err(e) => warn!("Ignoring config {}: {:#}", path.display(), e),
            }
        }
        warn!("No config file found, using defaults");
        Config::default()
    }

    /// Load config from specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Lookup order: $BAIT_CONFIG, system path, user config dir.
    pub fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Ok(explicit) = std::env::var(CONFIG_ENV) {
            paths.push(PathBuf::from(explicit));
        }
        paths.push(PathBuf::from(CONFIG_PATH));
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("bait").join("config.toml"));
        }
        paths
    }

    /// Render as TOML (for `baitd --print-config`)
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.daemon.listen_addr, "127.0.0.1:8765");
        assert_eq!(config.llm.backend, Backend::Openai);
        assert_eq!(config.llm.max_attempts, 2);
        assert_eq!(config.sequencer.ambiguity, AmbiguityPolicy::Strict);
        assert!(!config.sequencer.concurrent_evidence);
        assert_eq!(config.conclusion.writer, WriterKind::Llm);
        assert_eq!(config.weights, ScoreWeights::default());
    }

    #[test]
    fn test_default_stage_table() {
        let stages = StageSettingsTable::default();
        assert!(stages.get(Stage::Validity).web_search);
        assert!(stages.get(Stage::PhoneNumber).web_search);
        assert!(!stages.get(Stage::Category).web_search);
        assert_eq!(stages.get(Stage::MessageContent).model, "o4-mini");
        assert_eq!(
            stages.get(Stage::TranscriptContent).reasoning_effort.as_deref(),
            Some("high")
        );
        assert_eq!(stages.get(Stage::Conclusion).temperature, Some(1.0));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[sequencer]
ambiguity = "precedence"
concurrent_evidence = true

[weights]
validity_unverified = 5

[llm]
backend = "ollama"
endpoint = "http://127.0.0.1:11434"

[llm.stages.category]
model = "qwen2.5:7b-instruct"

[trace]
workflow_id = "wf_local"
"#
        )
        .unwrap();

        let config = Config::load_from_path(file.path()).unwrap();
        assert_eq!(config.sequencer.ambiguity, AmbiguityPolicy::Precedence);
        assert!(config.sequencer.concurrent_evidence);
        assert_eq!(config.weights.validity_unverified, 5);
        assert_eq!(config.weights.transcript_high_risk, 6);
        assert_eq!(config.llm.backend, Backend::Ollama);
        assert_eq!(config.llm.stages.category.model, "qwen2.5:7b-instruct");
        assert_eq!(config.llm.stages.validity.model, "gpt-4.1");
        assert_eq!(config.trace.source, "baitd");
        assert_eq!(config.trace.workflow_id.as_deref(), Some("wf_local"));
        assert_eq!(config.daemon.request_timeout_secs, 300);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[sequencer]\nambiguity = \"coin_flip\"").unwrap();
        assert!(Config::load_from_path(file.path()).is_err());
    }

    #[test]
    fn test_round_trips_through_toml() {
        let rendered = Config::default().to_toml().unwrap();
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.llm.stages, StageSettingsTable::default());
    }
}
