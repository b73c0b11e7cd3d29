//! Browser engine configuration types.

use serde::{Deserialize, Serialize};

/// Browser engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserEngineConfig {
    /// Browser engine type.
    #[serde(default)]
    pub engine: BrowserEngineType,

    /// Run in headless mode.
    /// Challenges can only be solved by a human in a headed window.
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Proxy server URL (e.g., "socks5://127.0.0.1:1080").
    #[serde(default)]
    pub proxy: Option<String>,

    /// Page load timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,

    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, connects to existing browser instead of launching one.
    #[serde(default)]
    pub remote_url: Option<String>,

    /// User agent override. None or "rotate" picks a browser agent.
    #[serde(default)]
    pub user_agent: Option<String>,
}

pub fn default_headless() -> bool {
    false
}

pub fn default_timeout() -> u64 {
    30
}

impl Default for BrowserEngineConfig {
    fn default() -> Self {
        Self::base_default().with_env_overrides()
    }
}

impl BrowserEngineConfig {
    pub fn base_default() -> Self {
        Self {
            engine: BrowserEngineType::default(),
            headless: default_headless(),
            proxy: None,
            timeout: default_timeout(),
            chrome_args: Vec::new(),
            remote_url: None,
            user_agent: None,
        }
    }

    pub fn is_default(&self) -> bool {
        *self == Self::base_default()
    }

    /// `BROWSER_URL` points at a running browser, `BROWSER_HEADLESS` forces
    /// headless mode on or off.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("BROWSER_URL") {
            if !url.trim().is_empty() {
                self.remote_url = Some(url);
            }
        }
        if let Ok(value) = std::env::var("BROWSER_HEADLESS") {
            match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => self.headless = true,
                "0" | "false" | "no" => self.headless = false,
                _ => {}
            }
        }
        self
    }
}

/// Browser engine types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BrowserEngineType {
    /// Fingerprint patches applied to every new document (default).
    #[default]
    Stealth,

    /// No patches (for debugging).
    Standard,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_partial() {
        let config: BrowserEngineConfig =
            serde_json::from_str(r#"{"engine": "standard", "headless": true}"#).unwrap();
        assert_eq!(config.engine, BrowserEngineType::Standard);
        assert!(config.headless);
        assert_eq!(config.timeout, 30);
        assert!(config.remote_url.is_none());
    }

    #[test]
    fn test_base_default_is_headed() {
        let config = BrowserEngineConfig::base_default();
        assert!(!config.headless);
        assert!(config.is_default());
    }
}
