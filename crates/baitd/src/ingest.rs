//! Media ingestion: turn an uploaded file into message text.
//!
//! Images go through the OCR binary, audio through the transcription
//! service, everything else must already be UTF-8 text.

use crate::config::IngestConfig;
use crate::orchestrator::LlmClient;
use async_trait::async_trait;
use bait_shared::{IngestError, StageError};
use std::io::Write;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "webp"];
const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "m4a", "webm", "flac"];

/// An uploaded file.
#[derive(Debug, Clone, Default)]
pub struct Upload {
    pub bytes: Vec<u8>,
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

impl Upload {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            ..Self::default()
        }
    }

    pub fn with_filename(mut self, filename: &str) -> Self {
        self.filename = Some(filename.to_string());
        self
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = Some(content_type.to_string());
        self
    }

    fn extension(&self) -> Option<String> {
        let name = self.filename.as_deref()?;
        let (_, ext) = name.rsplit_once('.')?;
        Some(ext.to_ascii_lowercase())
    }
}

// ============================================================================
// Media Kind
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Text,
    Image,
    Audio,
}

impl MediaKind {
    /// Extension first, then declared content type, then magic bytes.
    pub fn sniff(upload: &Upload) -> Self {
        if let Some(ext) = upload.extension() {
            if let Some(kind) = Self::from_extension(&ext) {
                return kind;
            }
        }

        if let Some(content_type) = upload.content_type.as_deref() {
            let content_type = content_type.to_ascii_lowercase();
            if content_type.starts_with("image/") {
                return MediaKind::Image;
            }
            if content_type.starts_with("audio/") {
                return MediaKind::Audio;
            }
        }

        magic_extension(&upload.bytes)
            .and_then(Self::from_extension)
            .unwrap_or(MediaKind::Text)
    }

    fn from_extension(ext: &str) -> Option<Self> {
        if IMAGE_EXTENSIONS.contains(&ext) {
            Some(MediaKind::Image)
        } else if AUDIO_EXTENSIONS.contains(&ext) {
            Some(MediaKind::Audio)
        } else {
            None
        }
    }
}

/// File extension implied by well-known file signatures.
fn magic_extension(bytes: &[u8]) -> Option<&'static str> {
    let riff_kind = || bytes.get(8..12);
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => Some("png"),
        [0xFF, 0xD8, 0xFF, ..] => Some("jpg"),
        [b'G', b'I', b'F', b'8', ..] => Some("gif"),
        // reserved header bytes are zero, so "BM..." text is not an image
        [b'B', b'M', _, _, _, _, 0, 0, 0, 0, ..] => Some("bmp"),
        [b'R', b'I', b'F', b'F', ..] => match riff_kind() {
            Some(b"WEBP") => Some("webp"),
            Some(b"WAVE") => Some("wav"),
            _ => None,
        },
        [b'I', b'D', b'3', ..] | [0xFF, 0xFB, ..] | [0xFF, 0xF3, ..] | [0xFF, 0xF2, ..] => {
            Some("mp3")
        }
        [b'f', b'L', b'a', b'C', ..] => Some("flac"),
        [0x1A, 0x45, 0xDF, 0xA3, ..] => Some("webm"),
        _ if bytes.get(4..11) == Some(&b"ftypM4A"[..]) => Some("m4a"),
        _ => None,
    }
}

// ============================================================================
// Transcription
// ============================================================================

/// Speech-to-text capability.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: Vec<u8>, filename: &str) -> Result<String, StageError>;
}

/// Transcription through the reasoning service's audio endpoint.
pub struct ServiceTranscriber {
    client: Arc<LlmClient>,
    model: String,
}

impl ServiceTranscriber {
    pub fn new(client: Arc<LlmClient>, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl Transcriber for ServiceTranscriber {
    async fn transcribe(&self, audio: Vec<u8>, filename: &str) -> Result<String, StageError> {
        self.client.transcribe(&self.model, audio, filename).await
    }
}

// ============================================================================
// Extractor
// ============================================================================

pub struct Extractor {
    tesseract_bin: String,
    transcriber: Arc<dyn Transcriber>,
}

impl Extractor {
    pub fn new(config: &IngestConfig, transcriber: Arc<dyn Transcriber>) -> Self {
        Self {
            tesseract_bin: config.tesseract_bin.clone(),
            transcriber,
        }
    }

    /// Extract the message text from an upload.
    pub async fn extract(&self, upload: Upload) -> Result<String, IngestError> {
        let kind = MediaKind::sniff(&upload);
        info!("Extracting {:?} upload ({} bytes)", kind, upload.bytes.len());

        let text = match kind {
            MediaKind::Text => {
                String::from_utf8(upload.bytes).map_err(|_| IngestError::UnsupportedEncoding)?
            }
            MediaKind::Image => self.ocr(&upload).await?,
            MediaKind::Audio => {
                let filename = audio_filename(&upload);
                self.transcriber
                    .transcribe(upload.bytes, &filename)
                    .await
                    .map_err(|e| IngestError::Transcription(e.to_string()))?
            }
        };

        let text = text.trim();
        if text.is_empty() {
            return Err(IngestError::NoText);
        }
        debug!("Extracted {} chars", text.len());
        Ok(text.to_string())
    }

    /// Run the OCR binary on a temporary copy of the image.
    async fn ocr(&self, upload: &Upload) -> Result<String, IngestError> {
        let suffix = upload
            .extension()
            .or_else(|| magic_extension(&upload.bytes).map(str::to_string))
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default();

        let mut file = tempfile::Builder::new()
            .prefix("bait-ocr-")
            .suffix(&suffix)
            .tempfile()
            .map_err(|e| IngestError::Ocr(format!("temp file: {}", e)))?;
        file.write_all(&upload.bytes)
            .and_then(|_| file.flush())
            .map_err(|e| IngestError::Ocr(format!("temp file: {}", e)))?;

        let output = Command::new(&self.tesseract_bin)
            .arg(file.path())
            .arg("stdout")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| IngestError::Ocr(format!("running {}: {}", self.tesseract_bin, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(IngestError::Ocr(stderr.trim().to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn audio_filename(upload: &Upload) -> String {
    if let Some(name) = upload.filename.as_deref().filter(|_| upload.extension().is_some()) {
        return name.to_string();
    }
    let ext = magic_extension(&upload.bytes).unwrap_or("wav");
    format!("upload.{}", ext)
}
