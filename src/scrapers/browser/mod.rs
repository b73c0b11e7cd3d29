//! Chrome over the DevTools protocol.
//!
//! Launches a local Chrome (or connects to a running one) and hands out a
//! [`CdpPage`] for the full-automation path. Without the `browser` feature
//! the launcher reports [`PageError::Unsupported`].

mod config;
mod cookies;
#[cfg(feature = "browser")]
mod page;
#[cfg(feature = "browser")]
mod stealth;

pub use config::{BrowserEngineConfig, BrowserEngineType};
pub use cookies::{BrowserCookie, BrowserState};
#[cfg(feature = "browser")]
pub use page::CdpPage;

#[cfg(feature = "browser")]
use std::path::PathBuf;
#[cfg(feature = "browser")]
use std::time::Duration;

#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig};
#[cfg(feature = "browser")]
use futures::StreamExt;
#[cfg(feature = "browser")]
use tracing::info;

use super::page::{PageDriver, PageError};
#[cfg(feature = "browser")]
use super::user_agent::resolve_user_agent;

/// Starts browsers per the engine configuration.
pub struct BrowserLauncher {
    config: BrowserEngineConfig,
}

impl BrowserLauncher {
    pub fn new(config: BrowserEngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BrowserEngineConfig {
        &self.config
    }
}

#[cfg(feature = "browser")]
impl BrowserLauncher {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
    ];

    const CHROME_COMMANDS: &'static [&'static str] = &[
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
    ];

    fn find_chrome() -> Result<PathBuf, PageError> {
        if let Some(path) = Self::CHROME_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
        {
            info!("Found Chrome at: {}", path.display());
            return Ok(path);
        }
        if let Some(path) = Self::CHROME_COMMANDS
            .iter()
            .find_map(|cmd| which::which(cmd).ok())
        {
            info!("Found Chrome in PATH: {}", path.display());
            return Ok(path);
        }
        Err(PageError::Browser(
            "Chrome/Chromium not found. Install it or set BROWSER_URL to a running instance"
                .to_string(),
        ))
    }

    /// Launch or connect, then open one page.
    pub async fn open_page(&self) -> Result<Box<dyn PageDriver>, PageError> {
        let (browser, mut handler) = match self.config.remote_url.as_deref() {
            Some(url) => self.connect_remote(url).await?,
            None => self.launch().await?,
        };
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        let user_agent = resolve_user_agent(self.config.user_agent.as_deref());
        let page = CdpPage::open(browser, handler, &self.config, user_agent).await?;
        Ok(Box::new(page))
    }

    async fn launch(&self) -> Result<(Browser, chromiumoxide::handler::Handler), PageError> {
        info!("Launching browser (headless={})", self.config.headless);
        let mut builder = BrowserConfig::builder().chrome_executable(Self::find_chrome()?);

        // with_head means NOT headless
        if !self.config.headless {
            builder = builder.with_head();
        }
        if let Some(ref proxy) = self.config.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }
        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox")
            .arg("--window-size=1366,900");
        for arg in &self.config.chrome_args {
            builder = builder.arg(arg);
        }
        let config = builder
            .build()
            .map_err(|e| PageError::Browser(format!("Failed to build browser config: {e}")))?;

        Browser::launch(config)
            .await
            .map_err(|e| PageError::Browser(format!("Failed to launch browser: {e}")))
    }

    async fn connect_remote(
        &self,
        url: &str,
    ) -> Result<(Browser, chromiumoxide::handler::Handler), PageError> {
        info!(
            "Connecting to remote browser at {} (timeout: {}s)",
            url, self.config.timeout
        );
        let http_url = url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let resp: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .send()
            .await
            .map_err(|e| PageError::Browser(format!("Failed to reach remote browser: {e}")))?
            .json()
            .await
            .map_err(|e| PageError::Browser(format!("Bad browser version info: {e}")))?;
        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| PageError::Browser("No webSocketDebuggerUrl in response".into()))?;

        let handler_config = chromiumoxide::handler::HandlerConfig {
            request_timeout: Duration::from_secs(self.config.timeout),
            ..Default::default()
        };
        Browser::connect_with_config(ws_url, handler_config)
            .await
            .map_err(|e| PageError::Browser(format!("Failed to connect to remote browser: {e}")))
    }
}

#[cfg(not(feature = "browser"))]
impl BrowserLauncher {
    pub async fn open_page(&self) -> Result<Box<dyn PageDriver>, PageError> {
        Err(PageError::Unsupported)
    }
}
