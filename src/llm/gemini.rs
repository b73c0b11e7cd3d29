//! Google Gemini generateContent backend.
//!
//! Free tier limits are tight (15 requests per minute, 1,500 per day), so
//! every call goes through the quota manager before it reaches this client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{error_for_status, LlmConfig, ScoringError, ScoringReply, ScoringService};

pub struct GeminiClient {
    config: LlmConfig,
    client: Client,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: &'static str,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiUsage {
    #[serde(rename = "totalTokenCount")]
    total_token_count: Option<u64>,
}

impl GeminiClient {
    pub fn new(config: LlmConfig) -> Result<Self, ScoringError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ScoringError::Connection(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    fn extract_reply(resp: GeminiResponse) -> Result<ScoringReply, ScoringError> {
        let text: String = resp
            .candidates
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ScoringError::Parse("Empty response from Gemini".to_string()));
        }

        Ok(ScoringReply {
            text,
            tokens_used: resp.usage_metadata.and_then(|u| u.total_token_count),
        })
    }
}

#[async_trait]
impl ScoringService for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    fn max_output_tokens(&self) -> u32 {
        self.config.max_tokens
    }

    async fn score(&self, prompt: &str) -> Result<ScoringReply, ScoringError> {
        let api_key = self.config.api_key.as_deref().ok_or_else(|| {
            ScoringError::NotConfigured(
                "GEMINI_API_KEY not set. Get an API key from https://ai.google.dev/".to_string(),
            )
        })?;

        let request = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user",
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_tokens,
                response_mime_type: "application/json",
            },
        };

        let url = format!(
            "{}/models/{}:generateContent",
            self.config.effective_endpoint(),
            self.config.effective_model()
        );
        debug!("Gemini request to {}", url);

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ScoringError::Connection(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());
            let body = resp.text().await.unwrap_or_default();
            return Err(error_for_status(status, retry_after.as_deref(), body));
        }

        let parsed: GeminiResponse = resp
            .json()
            .await
            .map_err(|e| ScoringError::Parse(e.to_string()))?;
        Self::extract_reply(parsed)
    }
}
