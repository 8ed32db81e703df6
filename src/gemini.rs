use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const GEMINI_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-flash-latest:generateContent";

/// Single-call generative-text seam. One prompt in, one block of generated
/// text out; no retry, no streaming.
#[async_trait]
pub trait GenerativeApi: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl GeminiClient {
    pub fn new(api_key: &str) -> Result<Self> {
        let user_agent = format!("cineverse/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(60))
            .user_agent(user_agent)
            .build()
            .context("Failed to build Gemini HTTP client")?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            endpoint: GEMINI_ENDPOINT.to_string(),
        })
    }
}

#[async_trait]
impl GenerativeApi for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "contents": [{
                "parts": [{ "text": prompt }]
            }]
        });

        let res = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("Generative request failed")?;

        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .context("Failed to read generative response body")?;
        if !status.is_success() {
            return Err(anyhow!(
                "Generative provider HTTP error (status {}): {}",
                status.as_u16(),
                String::from_utf8_lossy(&bytes)
            ));
        }

        extract_text(&bytes)
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Option<Vec<Part>>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

/// Walks candidates/content/parts down to the first text block. Any missing
/// link in that chain is a malformed response, not a panic.
fn extract_text(bytes: &[u8]) -> Result<String> {
    let parsed: GenerateResponse =
        serde_json::from_slice(bytes).context("Failed to parse generative response JSON")?;
    parsed
        .candidates
        .and_then(|mut c| if c.is_empty() { None } else { Some(c.remove(0)) })
        .and_then(|c| c.content)
        .and_then(|c| c.parts)
        .and_then(|mut p| if p.is_empty() { None } else { Some(p.remove(0)) })
        .and_then(|p| p.text)
        .ok_or_else(|| anyhow!("Generative response carried no text content"))
}
