//! The browser surface the scraping components drive.
//!
//! Everything that touches a page goes through [`PageDriver`]. The live
//! implementation is `CdpPage` (browser feature); [`SnapshotPage`] serves a
//! saved HTML document for offline inspection.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

use crate::error::ErrorKind;
use crate::utils::normalize_whitespace;

/// Errors from the browser surface.
#[derive(Debug, Clone, Error)]
pub enum PageError {
    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("Timed out after {after:?} waiting for {what}")]
    Timeout { after: Duration, what: String },
    #[error("Browser error: {0}")]
    Browser(String),
    #[error("Browser support not compiled. Rebuild with: cargo build --features browser")]
    Unsupported,
}

impl PageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Navigation { .. } | Self::Timeout { .. } | Self::Browser(_) => {
                ErrorKind::Retryable
            }
            Self::Unsupported => ErrorKind::Terminal,
        }
    }
}

/// How an element's text must relate to the expected label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextRule {
    Any,
    /// Visible text equals the label (case-insensitive, whitespace-normalized).
    Exact(String),
    /// Visible text contains the label (case-insensitive).
    Contains(String),
    /// `aria-label` contains the label (case-insensitive).
    AriaContains(String),
}

/// A CSS selector plus a text constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub css: String,
    pub text: TextRule,
}

impl Locator {
    pub fn css(css: impl Into<String>) -> Self {
        Self {
            css: css.into(),
            text: TextRule::Any,
        }
    }

    pub fn with_exact_text(mut self, label: impl Into<String>) -> Self {
        self.text = TextRule::Exact(label.into());
        self
    }

    pub fn with_text_containing(mut self, label: impl Into<String>) -> Self {
        self.text = TextRule::Contains(label.into());
        self
    }

    pub fn with_aria_containing(mut self, label: impl Into<String>) -> Self {
        self.text = TextRule::AriaContains(label.into());
        self
    }

    /// Whether a parsed element satisfies the text rule.
    pub fn accepts(&self, element: &ElementRef<'_>) -> bool {
        match &self.text {
            TextRule::Any => true,
            TextRule::Exact(label) => {
                normalize_whitespace(&element.text().collect::<String>())
                    .eq_ignore_ascii_case(label.trim())
            }
            TextRule::Contains(label) => element
                .text()
                .collect::<String>()
                .to_lowercase()
                .contains(&label.to_lowercase()),
            TextRule::AriaContains(label) => element
                .value()
                .attr("aria-label")
                .is_some_and(|a| a.to_lowercase().contains(&label.to_lowercase())),
        }
    }

    /// Matching elements inside a parsed document. Invalid CSS matches nothing.
    pub fn select<'a>(&self, html: &'a Html) -> Vec<ElementRef<'a>> {
        match Selector::parse(&self.css) {
            Ok(sel) => html.select(&sel).filter(|e| self.accepts(e)).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Matching elements below `root`.
    pub fn select_in<'a>(&self, root: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        match Selector::parse(&self.css) {
            Ok(sel) => root.select(&sel).filter(|e| self.accepts(e)).collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.text {
            TextRule::Any => write!(f, "{}", self.css),
            TextRule::Exact(t) => write!(f, "{} [text={:?}]", self.css, t),
            TextRule::Contains(t) => write!(f, "{} [text~={:?}]", self.css, t),
            TextRule::AriaContains(t) => write!(f, "{} [aria~={:?}]", self.css, t),
        }
    }
}

/// One browser tab, driven by one actor at a time.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), PageError>;

    async fn current_url(&self) -> Result<String, PageError>;

    /// Full HTML snapshot of the current document.
    async fn content(&self) -> Result<String, PageError>;

    /// Rendered text of the document body.
    async fn visible_text(&self) -> Result<String, PageError>;

    /// Number of elements matching the locator.
    async fn count(&self, locator: &Locator) -> Result<usize, PageError>;

    /// Click the first element matching the locator. `false` when none matched.
    async fn click(&self, locator: &Locator) -> Result<bool, PageError>;

    /// Replace the value of the first matching input. `false` when none matched.
    async fn fill(&self, locator: &Locator, value: &str) -> Result<bool, PageError>;

    /// Submit the form of the first matching element. `false` when none matched.
    async fn submit(&self, locator: &Locator) -> Result<bool, PageError>;

    async fn scroll_to_bottom(&self) -> Result<(), PageError>;

    /// Export cookies and fingerprint into an opaque blob.
    async fn export_state(&self) -> Result<Option<serde_json::Value>, PageError> {
        Ok(None)
    }

    /// Restore a blob produced by `export_state`.
    async fn import_state(&self, _state: &serde_json::Value) -> Result<(), PageError> {
        Ok(())
    }
}

/// Poll until any locator matches, returning the index of the first that did.
///
/// `Ok(None)` on timeout; the wait is always bounded.
pub async fn wait_for_any(
    page: &dyn PageDriver,
    locators: &[Locator],
    timeout: Duration,
    poll: Duration,
) -> Result<Option<usize>, PageError> {
    let start = Instant::now();
    loop {
        for (idx, locator) in locators.iter().enumerate() {
            if page.count(locator).await? > 0 {
                return Ok(Some(idx));
            }
        }
        if start.elapsed() >= timeout {
            return Ok(None);
        }
        tokio::time::sleep(poll).await;
    }
}

/// A static HTML document behind the page interface.
///
/// Navigation only changes the reported URL; clicks report whether something
/// matched but do not change the document.
pub struct SnapshotPage {
    html: String,
    url: Mutex<String>,
}

impl SnapshotPage {
    pub fn new(html: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            url: Mutex::new(url.into()),
        }
    }

    fn matches(&self, locator: &Locator) -> usize {
        let doc = Html::parse_document(&self.html);
        locator.select(&doc).len()
    }
}

#[async_trait]
impl PageDriver for SnapshotPage {
    async fn navigate(&self, url: &str) -> Result<(), PageError> {
        if let Ok(mut current) = self.url.lock() {
            *current = url.to_string();
        }
        Ok(())
    }

    async fn current_url(&self) -> Result<String, PageError> {
        self.url
            .lock()
            .map(|u| u.clone())
            .map_err(|e| PageError::Browser(e.to_string()))
    }

    async fn content(&self) -> Result<String, PageError> {
        Ok(self.html.clone())
    }

    async fn visible_text(&self) -> Result<String, PageError> {
        let doc = Html::parse_document(&self.html);
        let body = Selector::parse("body").map_err(|e| PageError::Browser(e.to_string()))?;
        let text = match doc.select(&body).next() {
            Some(b) => b.text().collect::<Vec<_>>().join(" "),
            None => doc.root_element().text().collect::<Vec<_>>().join(" "),
        };
        Ok(normalize_whitespace(&text))
    }

    async fn count(&self, locator: &Locator) -> Result<usize, PageError> {
        Ok(self.matches(locator))
    }

    async fn click(&self, locator: &Locator) -> Result<bool, PageError> {
        Ok(self.matches(locator) > 0)
    }

    async fn fill(&self, locator: &Locator, _value: &str) -> Result<bool, PageError> {
        Ok(self.matches(locator) > 0)
    }

    async fn submit(&self, locator: &Locator) -> Result<bool, PageError> {
        Ok(self.matches(locator) > 0)
    }

    async fn scroll_to_bottom(&self) -> Result<(), PageError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HTML: &str = r#"<html><body>
        <button class="pill">Date posted</button>
        <button class="pill" aria-label="Experience level filter. Clicking opens options">Experience</button>
        <button class="pill">Remote options</button>
    </body></html>"#;

    #[tokio::test]
    async fn test_text_rules() {
        let page = SnapshotPage::new(HTML, "https://example.com/jobs");
        assert_eq!(page.count(&Locator::css("button.pill")).await.unwrap(), 3);
        assert_eq!(
            page.count(&Locator::css("button").with_exact_text("date POSTED"))
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            page.count(&Locator::css("button").with_exact_text("Remote"))
                .await
                .unwrap(),
            0
        );
        assert_eq!(
            page.count(&Locator::css("button").with_text_containing("remote"))
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            page.count(&Locator::css("button").with_aria_containing("experience level"))
                .await
                .unwrap(),
            1
        );
        assert_eq!(page.count(&Locator::css("<<bad")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_wait_for_any_times_out() {
        let page = SnapshotPage::new(HTML, "https://example.com/jobs");
        let found = wait_for_any(
            &page,
            &[Locator::css(".missing"), Locator::css("button.pill")],
            Duration::from_millis(10),
            Duration::from_millis(1),
        )
        .await
        .unwrap();
        assert_eq!(found, Some(1));

        let found = wait_for_any(
            &page,
            &[Locator::css(".missing")],
            Duration::from_millis(10),
            Duration::from_millis(1),
        )
        .await
        .unwrap();
        assert_eq!(found, None);
    }
}
