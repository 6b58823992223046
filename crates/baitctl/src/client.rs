//! HTTP client for baitd.

use anyhow::{anyhow, Context, Result};
use bait_shared::{AnalyzeRequest, ErrorResponse, HealthResponse, VerdictResponse};
use reqwest::multipart::{Form, Part};
use reqwest::Response;
use std::path::Path;

/// Client for communicating with baitd
pub struct BaitClient {
    http: reqwest::Client,
    base: String,
}

impl BaitClient {
    pub fn new(server: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            http,
            base: server.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Plain narrative for a text message.
    pub async fn analyze_text(&self, text: &str) -> Result<String> {
        let form = Form::new().text("text", text.to_string());
        self.post_form(form).await
    }

    /// Plain narrative for a file; the daemon decides how to read it.
    pub async fn analyze_file(&self, path: &Path, bytes: Vec<u8>) -> Result<String> {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let form = Form::new().part("file", Part::bytes(bytes).file_name(filename));
        self.post_form(form).await
    }

    async fn post_form(&self, form: Form) -> Result<String> {
        let response = self
            .http
            .post(self.url("/analyze"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;

        let status = response.status();
        let body = response.text().await.context("reading response")?;
        if !status.is_success() {
            return Err(anyhow!("{} ({})", body.trim(), status));
        }
        Ok(body.trim().to_string())
    }

    /// Full verdict through the JSON route.
    pub async fn analyze_json(&self, text: &str) -> Result<VerdictResponse> {
        let response = self
            .http
            .post(self.url("/v1/analyze"))
            .json(&AnalyzeRequest {
                text: text.to_string(),
            })
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        Self::json_body(response).await
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        let response = self
            .http
            .get(self.url("/v1/health"))
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        Self::json_body(response).await
    }

    async fn json_body<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        let body = response.text().await.context("reading response")?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(anyhow!("{} ({})", message.trim(), status));
        }
        serde_json::from_str(&body).context("decoding response")
    }

    fn unreachable(&self, e: reqwest::Error) -> anyhow::Error {
        anyhow!(
            "Cannot reach bait daemon at {}: {}\n\
             Start it with `baitd` or point --server / BAIT_SERVER at a running instance.",
            self.base,
            e
        )
    }
}
