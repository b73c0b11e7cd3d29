//! Qualification analysis: quota-gated scoring with validated results.

pub mod validation;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::ErrorKind;
use crate::llm::prompts::build_qualification_prompt;
use crate::llm::{estimate_tokens, ScoringError, ScoringService};
use crate::models::{AnalysisRequest, AnalysisResponse};
use crate::quota::{QuotaError, QuotaManager, QuotaSignal};

pub use validation::{validate_response, ValidationError};

/// Attempts per analysis (call failures and invalid payloads both count).
pub const MAX_ATTEMPTS: u32 = 2;

/// Scores one job at a time against the external service.
///
/// `analyze` returns `Ok(None)` when both attempts fail: the job stays
/// unscored. Daily quota exhaustion is the only error it returns.
pub struct QualificationAnalyzer {
    service: Arc<dyn ScoringService>,
    quota: Arc<QuotaManager>,
    max_content_chars: usize,
    attempt_timeout: Duration,
}

impl QualificationAnalyzer {
    pub fn new(service: Arc<dyn ScoringService>, quota: Arc<QuotaManager>) -> Self {
        Self {
            service,
            quota,
            max_content_chars: 12_000,
            attempt_timeout: Duration::from_secs(150),
        }
    }

    pub fn with_max_content_chars(mut self, max_content_chars: usize) -> Self {
        self.max_content_chars = max_content_chars;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn quota(&self) -> &Arc<QuotaManager> {
        &self.quota
    }

    pub async fn analyze(
        &self,
        request: &AnalysisRequest,
    ) -> Result<Option<AnalysisResponse>, QuotaError> {
        let label = request.job().display_name();
        let method = request.scoring_method();
        let prompt = build_qualification_prompt(request, self.max_content_chars);
        let estimate = estimate_tokens(&prompt, self.service.max_output_tokens());
        let max_quota_retries = self.quota.config().max_quota_retries;

        let mut attempts = 0u32;
        let mut quota_retries = 0u32;

        while attempts < MAX_ATTEMPTS {
            self.quota.wait_for_slot(estimate).await?;

            let outcome = tokio::time::timeout(self.attempt_timeout, self.service.score(&prompt))
                .await
                .unwrap_or_else(|_| {
                    Err(ScoringError::Connection(format!(
                        "no reply within {:?}",
                        self.attempt_timeout
                    )))
                });

            match outcome {
                Ok(reply) => {
                    attempts += 1;
                    self.quota
                        .record_success(reply.tokens_used.unwrap_or(estimate))
                        .await;
                    match validate_response(&reply.text, method) {
                        Ok(response) => {
                            debug!(
                                "Scored {}: {} ({})",
                                label,
                                response.qualification_score(),
                                response.status().as_str()
                            );
                            return Ok(Some(response));
                        }
                        Err(e) => warn!(
                            "Invalid scoring response for {} (attempt {}/{}): {}",
                            label, attempts, MAX_ATTEMPTS, e
                        ),
                    }
                }
                Err(ScoringError::Quota(payload)) => {
                    match self.quota.record_quota_error(&payload).await {
                        QuotaSignal::Daily { until } => {
                            info!("Stopping analysis of {}: daily quota exhausted", label);
                            return Err(QuotaError::DailyExhausted { until });
                        }
                        QuotaSignal::Transient { wait } => {
                            quota_retries += 1;
                            if quota_retries > max_quota_retries {
                                attempts += 1;
                                warn!(
                                    "Quota errors persist for {} after {} retries (attempt {}/{})",
                                    label, max_quota_retries, attempts, MAX_ATTEMPTS
                                );
                            } else {
                                debug!(
                                    "Per-minute quota hit for {}, retrying after {:?}",
                                    label, wait
                                );
                            }
                        }
                    }
                }
                Err(e) => {
                    attempts += 1;
                    warn!(
                        "Scoring call failed for {} (attempt {}/{}): {}",
                        label, attempts, MAX_ATTEMPTS, e
                    );
                    if e.kind() == ErrorKind::Terminal {
                        break;
                    }
                }
            }
        }

        warn!("No qualification result for {}; leaving it unscored", label);
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScoringReply;
    use crate::models::{CandidateProfile, JobListing, ScoringMethod};
    use crate::quota::QuotaConfig;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct ScriptedService {
        replies: Mutex<VecDeque<Result<ScoringReply, ScoringError>>>,
        calls: AtomicU32,
    }

    impl ScriptedService {
        fn new(replies: Vec<Result<&str, ScoringError>>) -> Self {
            Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .map(|r| {
                            r.map(|text| ScoringReply {
                                text: text.to_string(),
                                tokens_used: Some(100),
                            })
                        })
                        .collect(),
                ),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ScoringService for ScriptedService {
        fn name(&self) -> &str {
            "scripted"
        }

        fn max_output_tokens(&self) -> u32 {
            256
        }

        async fn score(&self, _prompt: &str) -> Result<ScoringReply, ScoringError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ScoringError::Connection("script exhausted".into())))
        }
    }

    const GOOD: &str = r#"{"qualification_score": 72, "confidence": 70, "ai_reasoning": "Solid overlap on core skills."}"#;
    const BAD: &str = r#"{"qualification_score": 72, "confidence": 70, "ai_reasoning": "ok"}"#;

    fn quota() -> Arc<QuotaManager> {
        Arc::new(QuotaManager::new(QuotaConfig {
            requests_per_minute: 1000,
            tokens_per_minute: 10_000_000,
            requests_per_day: 10_000,
            safety_buffer_secs: 0,
            fallback_wait_secs: 0,
            ..QuotaConfig::base_default()
        }))
    }

    fn request() -> AnalysisRequest {
        AnalysisRequest::new(
            JobListing::new("Engineer", "Acme").unwrap(),
            CandidateProfile::default(),
            None,
        )
    }

    #[tokio::test]
    async fn test_retry_after_invalid_payload() {
        let service = Arc::new(ScriptedService::new(vec![Ok(BAD), Ok(GOOD)]));
        let analyzer = QualificationAnalyzer::new(service.clone(), quota());
        let resp = analyzer.analyze(&request()).await.unwrap().unwrap();
        assert_eq!(resp.qualification_score(), 72);
        assert_eq!(resp.scoring_method(), ScoringMethod::ProfileOnly);
        assert_eq!(service.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_two_invalid_payloads_yield_none() {
        let service = Arc::new(ScriptedService::new(vec![Ok(BAD), Ok(BAD), Ok(GOOD)]));
        let analyzer = QualificationAnalyzer::new(service.clone(), quota());
        assert!(analyzer.analyze(&request()).await.unwrap().is_none());
        assert_eq!(service.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_transient_quota_does_not_consume_attempts() {
        let service = Arc::new(ScriptedService::new(vec![
            Err(ScoringError::Quota("429 Too Many Requests".into())),
            Ok(BAD),
            Ok(GOOD),
        ]));
        let analyzer = QualificationAnalyzer::new(service.clone(), quota());
        assert!(analyzer.analyze(&request()).await.unwrap().is_some());
        assert_eq!(service.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_daily_quota_is_a_hard_stop() {
        let service = Arc::new(ScriptedService::new(vec![
            Err(ScoringError::Quota(
                "Quota exceeded: GenerateRequestsPerDayPerProjectPerModel".into(),
            )),
            Ok(GOOD),
        ]));
        let analyzer = QualificationAnalyzer::new(service.clone(), quota());
        let err = analyzer.analyze(&request()).await.unwrap_err();
        assert!(matches!(err, QuotaError::DailyExhausted { .. }));
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);

        // The shared gate now refuses further calls for the day.
        assert!(analyzer.analyze(&request()).await.is_err());
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_terminal_error_stops_early() {
        let service = Arc::new(ScriptedService::new(vec![
            Err(ScoringError::NotConfigured("no key".into())),
            Ok(GOOD),
        ]));
        let analyzer = QualificationAnalyzer::new(service.clone(), quota());
        assert!(analyzer.analyze(&request()).await.unwrap().is_none());
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }
}
