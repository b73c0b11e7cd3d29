//! [`PageDriver`] over a live Chrome tab.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::{Browser, Page};
use scraper::{Html, Selector};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::config::{BrowserEngineConfig, BrowserEngineType};
use super::cookies::{cookie_params, BrowserCookie, BrowserState};
use super::stealth::STEALTH_SCRIPTS;
use crate::scrapers::page::{Locator, PageDriver, PageError};

const READY_SCRIPT: &str = r#"
    new Promise((resolve) => {
        if (document.readyState !== 'loading') {
            resolve(document.readyState);
        } else {
            document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
            setTimeout(() => resolve('timeout'), 10000);
        }
    })
"#;

const SCROLL_STEPS: u32 = 4;

fn browser_err(e: impl std::fmt::Display) -> PageError {
    PageError::Browser(e.to_string())
}

/// JS string literal for `s`.
fn js_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

/// Position of the locator's first match among all `css` matches.
///
/// Both scraper and `querySelectorAll` return document order, so the index
/// addresses the same element in the live DOM.
fn locate(content: &str, locator: &Locator) -> Option<usize> {
    let selector = Selector::parse(&locator.css).ok()?;
    let doc = Html::parse_document(content);
    let found = doc
        .select(&selector)
        .enumerate()
        .find(|(_, el)| locator.accepts(el))
        .map(|(idx, _)| idx);
    found
}

/// One tab in a launched or connected browser.
pub struct CdpPage {
    page: Page,
    timeout: Duration,
    user_agent: String,
    // Keeps the CDP connection alive for as long as the page is used.
    _browser: Browser,
    handler: JoinHandle<()>,
}

impl CdpPage {
    pub(crate) async fn open(
        browser: Browser,
        handler: JoinHandle<()>,
        config: &BrowserEngineConfig,
        user_agent: String,
    ) -> Result<Self, PageError> {
        let page = browser.new_page("about:blank").await.map_err(browser_err)?;
        page.execute(SetUserAgentOverrideParams::new(user_agent.clone()))
            .await
            .map_err(browser_err)?;
        if config.engine == BrowserEngineType::Stealth {
            for script in STEALTH_SCRIPTS {
                if let Err(e) = page
                    .execute(AddScriptToEvaluateOnNewDocumentParams::new(script.to_string()))
                    .await
                {
                    debug!("Stealth script registration skipped: {}", e);
                }
            }
        }
        Ok(Self {
            page,
            timeout: Duration::from_secs(config.timeout),
            user_agent,
            _browser: browser,
            handler,
        })
    }

    async fn eval<T: serde::de::DeserializeOwned>(&self, script: String) -> Result<T, PageError> {
        self.page
            .evaluate(script)
            .await
            .map_err(browser_err)?
            .into_value::<T>()
            .map_err(browser_err)
    }

    /// Run `action` against the locator's element; `action` sees it as `el`.
    async fn with_element(&self, locator: &Locator, action: &str) -> Result<bool, PageError> {
        let content = self.content().await?;
        let Some(idx) = locate(&content, locator) else {
            return Ok(false);
        };
        let script = format!(
            "(() => {{ const el = document.querySelectorAll({css})[{idx}]; \
             if (!el) return false; {action} return true; }})()",
            css = js_str(&locator.css),
        );
        self.eval::<bool>(script).await
    }

    async fn wait_until_ready(&self) {
        match tokio::time::timeout(self.timeout, self.page.evaluate(READY_SCRIPT)).await {
            Ok(Ok(result)) => {
                let state: String = result.into_value().unwrap_or_else(|_| "unknown".into());
                debug!("Page ready state: {}", state);
            }
            Ok(Err(e)) => debug!("Could not check ready state: {}", e),
            Err(_) => warn!("Timeout waiting for page ready state"),
        }
    }
}

impl Drop for CdpPage {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

#[async_trait]
impl PageDriver for CdpPage {
    async fn navigate(&self, url: &str) -> Result<(), PageError> {
        debug!("Navigating to {}", url);
        match tokio::time::timeout(self.timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                return Err(PageError::Navigation {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(PageError::Timeout {
                    after: self.timeout,
                    what: format!("navigation to {url}"),
                })
            }
        }
        self.wait_until_ready().await;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, PageError> {
        Ok(self.page.url().await.map_err(browser_err)?.unwrap_or_default())
    }

    async fn content(&self) -> Result<String, PageError> {
        self.page.content().await.map_err(browser_err)
    }

    async fn visible_text(&self) -> Result<String, PageError> {
        self.eval("document.body ? document.body.innerText : ''".to_string())
            .await
    }

    async fn count(&self, locator: &Locator) -> Result<usize, PageError> {
        let content = self.content().await?;
        let doc = Html::parse_document(&content);
        Ok(locator.select(&doc).len())
    }

    async fn click(&self, locator: &Locator) -> Result<bool, PageError> {
        self.with_element(locator, "el.scrollIntoView({block: 'center'}); el.click();")
            .await
    }

    async fn fill(&self, locator: &Locator, value: &str) -> Result<bool, PageError> {
        let action = format!(
            "el.focus(); el.value = {}; \
             el.dispatchEvent(new Event('input', {{bubbles: true}})); \
             el.dispatchEvent(new Event('change', {{bubbles: true}}));",
            js_str(value)
        );
        self.with_element(locator, &action).await
    }

    async fn submit(&self, locator: &Locator) -> Result<bool, PageError> {
        self.with_element(
            locator,
            "if (el.form && el.form.requestSubmit) { el.form.requestSubmit(); } else { el.click(); }",
        )
        .await
    }

    async fn scroll_to_bottom(&self) -> Result<(), PageError> {
        // Lazy result lists only render cards scrolled into view.
        for _ in 0..SCROLL_STEPS {
            self.eval::<bool>(
                "(() => { \
                   const lists = document.querySelectorAll('.jobs-search-results-list, .scaffold-layout__list, [data-view-name=\"job-search-results\"]'); \
                   lists.forEach(l => l.scrollTop = l.scrollHeight); \
                   window.scrollTo(0, document.body.scrollHeight); \
                   return true; })()"
                    .to_string(),
            )
            .await?;
            tokio::time::sleep(Duration::from_millis(400)).await;
        }
        Ok(())
    }

    async fn export_state(&self) -> Result<Option<serde_json::Value>, PageError> {
        let cookies = self.page.get_cookies().await.map_err(browser_err)?;
        debug!("Exporting {} cookies", cookies.len());
        let state = BrowserState {
            cookies: cookies.iter().map(BrowserCookie::from).collect(),
            user_agent: Some(self.user_agent.clone()),
        };
        Ok(state.to_blob())
    }

    async fn import_state(&self, state: &serde_json::Value) -> Result<(), PageError> {
        let state = BrowserState::from_blob(state);
        if let Some(ua) = state.user_agent.as_ref().filter(|ua| **ua != self.user_agent) {
            self.page
                .execute(SetUserAgentOverrideParams::new(ua.clone()))
                .await
                .map_err(browser_err)?;
        }
        let params = cookie_params(&state);
        debug!("Restoring {} cookies", params.len());
        if !params.is_empty() {
            self.page.set_cookies(params).await.map_err(browser_err)?;
        }
        Ok(())
    }
}
