//! OpenAI-compatible chat completions backend (OpenAI, Groq, Together.ai).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{error_for_status, LlmConfig, ScoringError, ScoringReply, ScoringService};

const SYSTEM_PROMPT: &str = "You score job fit and answer with a single JSON object.";

pub struct OpenAiCompatClient {
    config: LlmConfig,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    total_tokens: Option<u64>,
}

impl OpenAiCompatClient {
    pub fn new(config: LlmConfig) -> Result<Self, ScoringError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ScoringError::Connection(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl ScoringService for OpenAiCompatClient {
    fn name(&self) -> &str {
        "openai"
    }

    fn max_output_tokens(&self) -> u32 {
        self.config.max_tokens
    }

    async fn score(&self, prompt: &str) -> Result<ScoringReply, ScoringError> {
        let api_key = self.config.api_key.as_deref().ok_or_else(|| {
            ScoringError::NotConfigured("OPENAI_API_KEY / LLM_API_KEY not set".to_string())
        })?;

        let request = ChatRequest {
            model: self.config.effective_model(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let url = format!("{}/chat/completions", self.config.effective_endpoint());
        debug!("Chat completion request to {}", url);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(api_key)
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

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| ScoringError::Parse(e.to_string()))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ScoringError::Parse("Empty completion".to_string()))?;

        Ok(ScoringReply {
            text,
            tokens_used: parsed.usage.and_then(|u| u.total_tokens),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmProvider;
    use crate::quota::{QuotaConfig, QuotaManager, QuotaSignal};
    use std::time::Duration;

    fn client_for(server: &mockito::Server) -> OpenAiCompatClient {
        OpenAiCompatClient::new(LlmConfig {
            provider: LlmProvider::OpenAI,
            endpoint: Some(format!("{}/v1/", server.url())),
            api_key: Some("sk-test".to_string()),
            ..LlmConfig::base_default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_score_reads_first_choice() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"choices":[{"message":{"role":"assistant","content":"{\"qualification_score\":55}"}}],
                    "usage":{"total_tokens":900}}"#,
            )
            .create_async()
            .await;

        let reply = client_for(&server).score("prompt").await.unwrap();
        assert_eq!(reply.text, "{\"qualification_score\":55}");
        assert_eq!(reply.tokens_used, Some(900));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_retry_after_header_sets_cool_down() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(429)
            .with_header("retry-after", "12")
            .with_body(r#"{"error":{"message":"Rate limit reached for requests","type":"requests"}}"#)
            .create_async()
            .await;

        let payload = match client_for(&server).score("prompt").await {
            Err(ScoringError::Quota(payload)) => payload,
            other => panic!("expected quota error, got {:?}", other),
        };
        assert!(payload.contains("retry after 12 seconds"));

        let quota = QuotaManager::new(QuotaConfig {
            safety_buffer_secs: 0,
            ..QuotaConfig::base_default()
        });
        assert_eq!(
            quota.record_quota_error(&payload).await,
            QuotaSignal::Transient {
                wait: Duration::from_secs(12)
            }
        );
        let snapshot = quota.snapshot().await;
        assert_eq!(snapshot.quota_errors, 1);
        assert!(snapshot.blocked_for.unwrap() > Duration::from_secs(11));
    }

    #[tokio::test]
    async fn test_empty_completion_is_parse_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"content":"  "}}]}"#)
            .create_async()
            .await;

        assert!(matches!(
            client_for(&server).score("prompt").await,
            Err(ScoringError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_bad_request_is_terminal() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(400)
            .with_body("invalid model")
            .create_async()
            .await;

        let err = client_for(&server).score("prompt").await.unwrap_err();
        assert!(matches!(err, ScoringError::Api { status: 400, .. }));
        assert_eq!(err.kind(), crate::error::ErrorKind::Terminal);
    }
}
