//! Scraping configuration types.
//!
//! Each struct follows the same shape: serde defaults for every field, a
//! `base_default()` without environment input, and `Default` applying
//! `with_env_overrides()` on top.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Search navigation and pacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Site root, e.g. `https://www.linkedin.com`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Result pages to walk per search.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Cards per results page (guest API offset step).
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Upper bound for any single element wait, in seconds.
    #[serde(default = "default_element_wait_secs")]
    pub element_wait_secs: u64,
    /// Poll interval for element waits, in milliseconds.
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
    /// Attempts for a navigation or HTTP fetch before giving up.
    #[serde(default = "default_navigation_retries")]
    pub navigation_retries: u32,
    /// Pause between opening result cards, in milliseconds.
    #[serde(default = "default_card_delay_ms")]
    pub card_delay_ms: u64,
    /// Open each card's detail view for the full description.
    #[serde(default = "default_fetch_details")]
    pub fetch_details: bool,
}

fn default_base_url() -> String {
    "https://www.linkedin.com".to_string()
}

fn default_max_pages() -> u32 {
    3
}

fn default_page_size() -> u32 {
    25
}

fn default_element_wait_secs() -> u64 {
    15
}

fn default_poll_ms() -> u64 {
    250
}

fn default_navigation_retries() -> u32 {
    3
}

fn default_card_delay_ms() -> u64 {
    1_500
}

fn default_fetch_details() -> bool {
    true
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self::base_default().with_env_overrides()
    }
}

impl ScrapeConfig {
    pub fn base_default() -> Self {
        Self {
            base_url: default_base_url(),
            max_pages: default_max_pages(),
            page_size: default_page_size(),
            element_wait_secs: default_element_wait_secs(),
            poll_ms: default_poll_ms(),
            navigation_retries: default_navigation_retries(),
            card_delay_ms: default_card_delay_ms(),
            fetch_details: default_fetch_details(),
        }
    }

    pub fn is_default(&self) -> bool {
        *self == Self::base_default()
    }

    /// - `JOBSCOUT_BASE_URL`
    /// - `JOBSCOUT_MAX_PAGES`
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("JOBSCOUT_BASE_URL") {
            self.base_url = url;
        }
        if let Some(pages) = std::env::var("JOBSCOUT_MAX_PAGES")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.max_pages = pages;
        }
        self
    }

    /// Site root without a trailing slash.
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn element_wait(&self) -> Duration {
        Duration::from_secs(self.element_wait_secs)
    }

    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms.max(1))
    }

    pub fn card_delay(&self) -> Duration {
        Duration::from_millis(self.card_delay_ms)
    }
}

/// Human-resolution wait for anti-automation challenges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptchaConfig {
    #[serde(default = "default_captcha_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_captcha_poll_secs")]
    pub poll_secs: u64,
}

fn default_captcha_timeout_secs() -> u64 {
    300
}

fn default_captcha_poll_secs() -> u64 {
    5
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self::base_default().with_env_overrides()
    }
}

impl CaptchaConfig {
    pub fn base_default() -> Self {
        Self {
            timeout_secs: default_captcha_timeout_secs(),
            poll_secs: default_captcha_poll_secs(),
        }
    }

    pub fn is_default(&self) -> bool {
        *self == Self::base_default()
    }

    /// - `JOBSCOUT_CAPTCHA_TIMEOUT` (seconds)
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(secs) = std::env::var("JOBSCOUT_CAPTCHA_TIMEOUT")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.timeout_secs = secs;
        }
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll(&self) -> Duration {
        Duration::from_secs(self.poll_secs.max(1))
    }
}

/// Session persistence and expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Sessions idle for longer than this are not loadable.
    #[serde(default = "default_idle_expiry_days")]
    pub idle_expiry_days: u32,
    /// Session store directory. Defaults to `<data_dir>/sessions`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

fn default_idle_expiry_days() -> u32 {
    7
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::base_default().with_env_overrides()
    }
}

impl SessionConfig {
    pub fn base_default() -> Self {
        Self {
            idle_expiry_days: default_idle_expiry_days(),
            dir: None,
        }
    }

    pub fn is_default(&self) -> bool {
        *self == Self::base_default()
    }

    /// - `JOBSCOUT_SESSION_DIR`
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(dir) = std::env::var("JOBSCOUT_SESSION_DIR") {
            self.dir = Some(PathBuf::from(dir));
        }
        self
    }

    pub fn idle_expiry(&self) -> chrono::Duration {
        chrono::Duration::days(self.idle_expiry_days as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrape_config_toml_defaults() {
        let config: ScrapeConfig = toml::from_str("max_pages = 5").unwrap();
        assert_eq!(config.max_pages, 5);
        assert_eq!(config.page_size, 25);
        assert!(config.fetch_details);
        assert_eq!(config.element_wait(), Duration::from_secs(15));
    }

    #[test]
    fn test_base_trims_slash() {
        let config = ScrapeConfig {
            base_url: "https://example.com/".to_string(),
            ..ScrapeConfig::base_default()
        };
        assert_eq!(config.base(), "https://example.com");
    }

    #[test]
    fn test_captcha_defaults() {
        let config = CaptchaConfig::base_default();
        assert_eq!(config.timeout(), Duration::from_secs(300));
        assert_eq!(config.poll(), Duration::from_secs(5));
        assert!(config.is_default());
    }

    #[test]
    fn test_session_expiry() {
        let config: SessionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.idle_expiry(), chrono::Duration::days(7));
        assert!(config.dir.is_none());
    }
}
