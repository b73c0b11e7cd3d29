//! Quota configuration for the scoring service.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Budgets and cool-down policy for the external scoring service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Requests allowed in any rolling 60s window.
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    /// Estimated tokens allowed in any rolling 60s window.
    #[serde(default = "default_tokens_per_minute")]
    pub tokens_per_minute: u64,
    /// Requests allowed per local calendar day.
    #[serde(default = "default_requests_per_day")]
    pub requests_per_day: u32,
    /// Added to any retry delay parsed from an error payload.
    #[serde(default = "default_safety_buffer_secs")]
    pub safety_buffer_secs: u64,
    /// Wait applied when an error payload carries no parseable delay.
    #[serde(default = "default_fallback_wait_secs")]
    pub fallback_wait_secs: u64,
    /// Per-minute quota errors tolerated within one analysis.
    #[serde(default = "default_max_quota_retries")]
    pub max_quota_retries: u32,
    /// Case-insensitive substrings marking an error as daily exhaustion.
    #[serde(default = "default_daily_signatures")]
    pub daily_signatures: Vec<String>,
}

fn default_requests_per_minute() -> u32 {
    15
}

fn default_tokens_per_minute() -> u64 {
    250_000
}

fn default_requests_per_day() -> u32 {
    1_500
}

fn default_safety_buffer_secs() -> u64 {
    10
}

fn default_fallback_wait_secs() -> u64 {
    5
}

fn default_max_quota_retries() -> u32 {
    3
}

fn default_daily_signatures() -> Vec<String> {
    ["perday", "per_day", "per day", "daily"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self::base_default().with_env_overrides()
    }
}

impl QuotaConfig {
    /// Base default without env overrides.
    pub fn base_default() -> Self {
        Self {
            requests_per_minute: default_requests_per_minute(),
            tokens_per_minute: default_tokens_per_minute(),
            requests_per_day: default_requests_per_day(),
            safety_buffer_secs: default_safety_buffer_secs(),
            fallback_wait_secs: default_fallback_wait_secs(),
            max_quota_retries: default_max_quota_retries(),
            daily_signatures: default_daily_signatures(),
        }
    }

    /// Check if the config equals the default (for skip_serializing_if).
    pub fn is_default(&self) -> bool {
        *self == Self::base_default()
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `JOBSCOUT_QUOTA_RPM`
    /// - `JOBSCOUT_QUOTA_TPM`
    /// - `JOBSCOUT_QUOTA_RPD`
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(val) = env_parse("JOBSCOUT_QUOTA_RPM") {
            self.requests_per_minute = val;
        }
        if let Some(val) = env_parse("JOBSCOUT_QUOTA_TPM") {
            self.tokens_per_minute = val;
        }
        if let Some(val) = env_parse("JOBSCOUT_QUOTA_RPD") {
            self.requests_per_day = val;
        }
        self
    }

    pub fn safety_buffer(&self) -> Duration {
        Duration::from_secs(self.safety_buffer_secs)
    }

    pub fn fallback_wait(&self) -> Duration {
        Duration::from_secs(self.fallback_wait_secs)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
