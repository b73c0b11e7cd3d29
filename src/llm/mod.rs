//! External scoring service clients.
//!
//! The qualification analyzer talks to the service only through the
//! [`ScoringService`] trait; Gemini and OpenAI-compatible backends are provided.

mod config;
mod gemini;
mod openai;
pub mod prompts;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::ErrorKind;

pub use config::{LlmConfig, LlmProvider};
pub use gemini::GeminiClient;
pub use openai::OpenAiCompatClient;

/// Raw reply from the scoring service.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringReply {
    /// Model output, expected to hold a JSON object.
    pub text: String,
    /// Tokens billed for the call, when the service reports it.
    pub tokens_used: Option<u64>,
}

/// Errors from the scoring service.
#[derive(Debug, Clone, Error)]
pub enum ScoringError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },
    /// Rate or quota limit hit; carries the raw error payload.
    #[error("Quota exceeded: {0}")]
    Quota(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Scoring service not configured: {0}")]
    NotConfigured(String),
}

impl ScoringError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection(_) | Self::Quota(_) | Self::Parse(_) => ErrorKind::Retryable,
            Self::Api { status, .. } if *status >= 500 => ErrorKind::Retryable,
            Self::Api { .. } | Self::NotConfigured(_) => ErrorKind::Terminal,
        }
    }
}

/// A language-model endpoint that turns a prompt into a JSON reply.
#[async_trait]
pub trait ScoringService: Send + Sync {
    /// Name for logs.
    fn name(&self) -> &str;

    /// Output tokens reserved per call; part of the quota estimate.
    fn max_output_tokens(&self) -> u32;

    async fn score(&self, prompt: &str) -> Result<ScoringReply, ScoringError>;
}

/// Rough token estimate for quota accounting: prompt chars / 4 plus the
/// reserved output.
pub fn estimate_tokens(prompt: &str, max_output_tokens: u32) -> u64 {
    (prompt.chars().count() as u64).div_ceil(4) + max_output_tokens as u64
}

/// Build the configured scoring service.
pub fn build_scoring_service(config: &LlmConfig) -> Result<Arc<dyn ScoringService>, ScoringError> {
    match config.provider {
        LlmProvider::Gemini => Ok(Arc::new(GeminiClient::new(config.clone())?)),
        LlmProvider::OpenAI => Ok(Arc::new(OpenAiCompatClient::new(config.clone())?)),
    }
}

/// Build the error for a non-success response, folding a `Retry-After`
/// header into quota payloads so the delay parser can see it.
pub(crate) fn error_for_status(
    status: reqwest::StatusCode,
    retry_after: Option<&str>,
    body: String,
) -> ScoringError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || body.contains("RESOURCE_EXHAUSTED") {
        match retry_after {
            Some(secs) => ScoringError::Quota(format!("{} (retry after {} seconds)", body, secs)),
            None => ScoringError::Quota(body),
        }
    } else {
        ScoringError::Api {
            status: status.as_u16(),
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens("abcdefgh", 100), 102);
        assert_eq!(estimate_tokens("abcde", 0), 2);
    }

    #[test]
    fn test_error_for_status() {
        let err = error_for_status(StatusCode::TOO_MANY_REQUESTS, Some("20"), "slow down".into());
        match err {
            ScoringError::Quota(payload) => {
                assert_eq!(
                    crate::quota::parse_retry_delay(&payload),
                    Some(std::time::Duration::from_secs(20))
                );
            }
            other => panic!("expected quota error, got {:?}", other),
        }

        let err = error_for_status(StatusCode::BAD_REQUEST, None, "bad".into());
        assert_eq!(err.kind(), ErrorKind::Terminal);
        let err = error_for_status(StatusCode::BAD_GATEWAY, None, "oops".into());
        assert_eq!(err.kind(), ErrorKind::Retryable);
    }
}
