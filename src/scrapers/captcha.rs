//! Anti-automation challenge detection and human-resolution waits.
//!
//! Three independent heuristics run against a page: indicator phrases in the
//! visible text, known challenge elements in the DOM and checkpoint paths in
//! the URL. A hit from any one of them is a detection. Phrases are only
//! looked for on pages without job content, since listings can mention
//! CAPTCHA work in their titles or descriptions. Solving is left to a human;
//! the gate only polls, with a bounded deadline, for evidence that the
//! challenge is gone.

use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use scraper::Html;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::config::CaptchaConfig;
use super::page::{Locator, PageDriver, PageError};
use super::selectors::{Field, InterfaceGeneration, SelectorStrategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeType {
    SecurityPuzzle,
    IdentityCheck,
    RobotCheck,
    Generic,
}

impl ChallengeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SecurityPuzzle => "security_puzzle",
            Self::IdentityCheck => "identity_check",
            Self::RobotCheck => "robot_check",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for ChallengeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionSource {
    Text,
    Element,
    Url,
}

impl DetectionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Element => "element",
            Self::Url => "url",
        }
    }
}

/// A detected challenge. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct CaptchaInfo {
    pub challenge_type: ChallengeType,
    pub source: DetectionSource,
    /// The phrase, selector or path fragment that matched.
    pub indicator: String,
    pub detected_at: DateTime<Utc>,
}

impl CaptchaInfo {
    fn new(challenge_type: ChallengeType, source: DetectionSource, indicator: &str) -> Self {
        Self {
            challenge_type,
            source,
            indicator: indicator.to_string(),
            detected_at: Utc::now(),
        }
    }
}

/// Outcome of a human-resolution wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Resolved,
    TimedOut,
}

/// Lowercase phrases, most specific first.
const TEXT_INDICATORS: &[(&str, ChallengeType)] = &[
    ("let's do a quick security check", ChallengeType::SecurityPuzzle),
    ("solve this puzzle", ChallengeType::SecurityPuzzle),
    ("complete the puzzle", ChallengeType::SecurityPuzzle),
    ("quick security check", ChallengeType::SecurityPuzzle),
    ("verify your identity", ChallengeType::IdentityCheck),
    ("confirm your identity", ChallengeType::IdentityCheck),
    ("enter the code we sent", ChallengeType::IdentityCheck),
    ("enter the verification code", ChallengeType::IdentityCheck),
    ("please verify you're human", ChallengeType::RobotCheck),
    ("verify you're human", ChallengeType::RobotCheck),
    ("verify you are human", ChallengeType::RobotCheck),
    ("are you a robot", ChallengeType::RobotCheck),
    ("i'm not a robot", ChallengeType::RobotCheck),
    ("checking your browser", ChallengeType::RobotCheck),
    ("press and hold", ChallengeType::RobotCheck),
    ("press & hold", ChallengeType::RobotCheck),
    ("captcha", ChallengeType::Generic),
    ("unusual activity from your", ChallengeType::Generic),
];

const ELEMENT_INDICATORS: &[(&str, ChallengeType)] = &[
    ("#captcha-internal", ChallengeType::SecurityPuzzle),
    ("iframe[src*='arkoselabs']", ChallengeType::SecurityPuzzle),
    ("iframe[src*='funcaptcha']", ChallengeType::SecurityPuzzle),
    ("form#email-pin-challenge", ChallengeType::IdentityCheck),
    ("input[name='pin']", ChallengeType::IdentityCheck),
    (".g-recaptcha", ChallengeType::RobotCheck),
    ("iframe[src*='recaptcha']", ChallengeType::RobotCheck),
    ("iframe[src*='hcaptcha']", ChallengeType::RobotCheck),
    ("iframe[src*='captcha']", ChallengeType::Generic),
    ("iframe[src*='challenge']", ChallengeType::Generic),
    ("#challenge-form", ChallengeType::Generic),
];

/// Path prefixes.
const URL_INDICATORS: &[(&str, ChallengeType)] = &[
    ("/checkpoint/challenge", ChallengeType::SecurityPuzzle),
    ("/checkpoint/lg/", ChallengeType::IdentityCheck),
    ("/uas/consumer-email-challenge", ChallengeType::IdentityCheck),
    ("/checkpoint/", ChallengeType::Generic),
    ("/captcha", ChallengeType::Generic),
    ("/challenge", ChallengeType::Generic),
];

/// Match page text against the indicator phrases.
pub fn detect_text(text: &str) -> Option<CaptchaInfo> {
    let normalized = text.replace(['\u{2019}', '\u{2018}'], "'").to_lowercase();
    TEXT_INDICATORS
        .iter()
        .find(|(phrase, _)| normalized.contains(phrase))
        .map(|(phrase, kind)| CaptchaInfo::new(*kind, DetectionSource::Text, phrase))
}

/// Match the URL path against checkpoint prefixes. The query is ignored:
/// search keywords end up there.
pub fn detect_url(url: &str) -> Option<CaptchaInfo> {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_lowercase(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_lowercase(),
    };
    URL_INDICATORS
        .iter()
        .find(|(prefix, _)| path.starts_with(prefix))
        .map(|(pattern, kind)| CaptchaInfo::new(*kind, DetectionSource::Url, pattern))
}

/// Match a parsed document against challenge element signatures.
pub fn detect_elements(html: &Html) -> Option<CaptchaInfo> {
    ELEMENT_INDICATORS
        .iter()
        .find(|(css, _)| !Locator::css(*css).select(html).is_empty())
        .map(|(css, kind)| CaptchaInfo::new(*kind, DetectionSource::Element, css))
}

/// Challenge detection plus the human-resolution wait.
#[derive(Debug, Clone)]
pub struct CaptchaGate {
    timeout: Duration,
    poll: Duration,
    landing: Vec<Locator>,
    job_markers: Vec<Locator>,
}

impl Default for CaptchaGate {
    fn default() -> Self {
        Self::new(&CaptchaConfig::default(), &SelectorStrategy::default())
    }
}

impl CaptchaGate {
    pub fn new(config: &CaptchaConfig, selectors: &SelectorStrategy) -> Self {
        Self {
            timeout: config.timeout(),
            poll: config.poll(),
            landing: selectors.chain(InterfaceGeneration::Semantic, Field::AuthenticatedMarker),
            job_markers: selectors.job_structure(),
        }
    }

    pub fn with_timing(mut self, timeout: Duration, poll: Duration) -> Self {
        self.timeout = timeout;
        self.poll = poll;
        self
    }

    fn has_job_content(&self, html: &Html) -> bool {
        self.job_markers.iter().any(|l| !l.select(html).is_empty())
    }

    /// Element signatures, and whether the document shows job content.
    fn scan(&self, content: &str) -> (Option<CaptchaInfo>, bool) {
        let html = Html::parse_document(content);
        (detect_elements(&html), self.has_job_content(&html))
    }

    /// Detect on a raw HTML body fetched without a browser.
    pub fn detect_document(&self, body: &str, url: &str) -> Option<CaptchaInfo> {
        let html = Html::parse_document(body);
        let text = if self.has_job_content(&html) {
            None
        } else {
            detect_text(&html.root_element().text().collect::<Vec<_>>().join(" "))
        };
        text.or_else(|| detect_elements(&html))
            .or_else(|| detect_url(url))
    }

    /// Detect on the page's current state.
    pub async fn check(&self, page: &dyn PageDriver) -> Result<Option<CaptchaInfo>, PageError> {
        let url = page.current_url().await?;
        let (element, has_jobs) = self.scan(&page.content().await?);
        if !has_jobs {
            if let Some(info) = detect_text(&page.visible_text().await?) {
                return Ok(Some(info));
            }
        }
        Ok(element.or_else(|| detect_url(&url)))
    }

    /// Leave the page to a human until the challenge disappears.
    ///
    /// The page is never closed or navigated here. Resolution is either the
    /// authenticated landing marker appearing or every heuristic going
    /// quiet. Errors while polling count as "still challenged".
    pub async fn await_resolution(
        &self,
        page: &dyn PageDriver,
        info: &CaptchaInfo,
    ) -> Resolution {
        warn!(
            "Challenge detected ({} via {}: {:?}). Solve it in the browser window; waiting up to {}s",
            info.challenge_type,
            info.source.as_str(),
            info.indicator,
            self.timeout.as_secs()
        );
        let start = Instant::now();
        loop {
            match self.is_cleared(page).await {
                Ok(true) => {
                    info!("Challenge resolved after {:?}", start.elapsed());
                    return Resolution::Resolved;
                }
                Ok(false) => {}
                Err(e) => debug!("Page not readable during challenge wait: {}", e),
            }
            if start.elapsed() >= self.timeout {
                warn!("Challenge not resolved within {}s", self.timeout.as_secs());
                return Resolution::TimedOut;
            }
            tokio::time::sleep(self.poll).await;
        }
    }

    async fn is_cleared(&self, page: &dyn PageDriver) -> Result<bool, PageError> {
        for marker in &self.landing {
            if page.count(marker).await? > 0 {
                return Ok(true);
            }
        }
        Ok(self.check(page).await?.is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::page::SnapshotPage;

    #[test]
    fn test_robot_check_phrase() {
        let info = detect_text("Please verify you’re human to continue").unwrap();
        assert_eq!(info.challenge_type, ChallengeType::RobotCheck);
        assert_eq!(info.source, DetectionSource::Text);
    }

    #[test]
    fn test_unrelated_error_text() {
        assert!(detect_text("Something went wrong. Please try again later.").is_none());
        assert!(detect_text("No matching jobs found.").is_none());
    }

    #[test]
    fn test_security_puzzle_phrase() {
        let info = detect_text("Let's do a quick security check").unwrap();
        assert_eq!(info.challenge_type, ChallengeType::SecurityPuzzle);
    }

    #[test]
    fn test_url_patterns() {
        let info = detect_url("https://www.linkedin.com/checkpoint/challenge/AgF123?ut=abc").unwrap();
        assert_eq!(info.challenge_type, ChallengeType::SecurityPuzzle);
        assert_eq!(info.source, DetectionSource::Url);
        assert!(detect_url("https://www.linkedin.com/jobs/search/?keywords=rust").is_none());
    }

    #[test]
    fn test_search_terms_in_url_are_not_challenges() {
        assert!(detect_url("https://www.linkedin.com/jobs/search/?keywords=captcha").is_none());
        assert!(detect_url("https://www.linkedin.com/jobs/search/?keywords=challenge%20lead").is_none());
        assert!(detect_url("https://www.linkedin.com/jobs/view/captcha-engineer-at-acme-4100000009").is_none());
    }

    #[test]
    fn test_job_content_mentioning_captcha_is_not_a_challenge() {
        let gate = CaptchaGate::default();
        let fragment = r#"<li><div class="base-card base-search-card" data-entity-urn="urn:li:jobPosting:4100000009">
            <h3 class="base-search-card__title">reCAPTCHA Engineer</h3>
            <h4 class="base-search-card__subtitle">Acme</h4>
        </div></li>"#;
        assert!(gate
            .detect_document(
                fragment,
                "https://www.linkedin.com/jobs-guest/jobs/api/seeMoreJobPostings/search?keywords=captcha"
            )
            .is_none());

        // The same words without any job content are still a challenge.
        let info = gate
            .detect_document("<p>Please complete the CAPTCHA</p>", "https://www.linkedin.com/x")
            .unwrap();
        assert_eq!(info.challenge_type, ChallengeType::Generic);
    }

    #[tokio::test]
    async fn test_detail_pane_mentioning_captcha_is_not_a_challenge() {
        let page = SnapshotPage::new(
            r#"<html><body>
                <li class="jobs-search-results__list-item" data-occludable-job-id="4100000001">Anti-bot Engineer</li>
                <div class="jobs-search__job-details--container">
                  <div class="jobs-description__container">You will build our CAPTCHA and bot-detection stack.</div>
                </div>
            </body></html>"#,
            "https://www.linkedin.com/jobs/search/?keywords=captcha",
        );
        assert!(CaptchaGate::default().check(&page).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_challenge_widget_on_job_page_is_detected() {
        let page = SnapshotPage::new(
            r#"<html><body>
                <li class="jobs-search-results__list-item">Engineer</li>
                <iframe src="https://client-api.arkoselabs.com/fc/gc"></iframe>
            </body></html>"#,
            "https://www.linkedin.com/jobs/search/",
        );
        let info = CaptchaGate::default().check(&page).await.unwrap().unwrap();
        assert_eq!(info.source, DetectionSource::Element);
        assert_eq!(info.challenge_type, ChallengeType::SecurityPuzzle);
    }

    #[test]
    fn test_element_signature() {
        let html = Html::parse_document(r#"<iframe src="https://client-api.arkoselabs.com/fc"></iframe>"#);
        let info = detect_elements(&html).unwrap();
        assert_eq!(info.challenge_type, ChallengeType::SecurityPuzzle);
        assert_eq!(info.source, DetectionSource::Element);
    }

    #[test]
    fn test_detect_document_on_clean_page() {
        let gate = CaptchaGate::default();
        let body = "<html><body><ul class='jobs-search__results-list'></ul></body></html>";
        assert!(gate
            .detect_document(body, "https://www.linkedin.com/jobs-guest/jobs/api/x")
            .is_none());
    }

    #[tokio::test]
    async fn test_await_resolution_times_out() {
        let page = SnapshotPage::new(
            "<html><body><div class='g-recaptcha'></div></body></html>",
            "https://www.linkedin.com/jobs/search/",
        );
        let gate = CaptchaGate::default()
            .with_timing(Duration::from_millis(20), Duration::from_millis(5));
        let info = gate.check(&page).await.unwrap().unwrap();
        assert_eq!(info.challenge_type, ChallengeType::RobotCheck);
        assert_eq!(gate.await_resolution(&page, &info).await, Resolution::TimedOut);
    }

    #[tokio::test]
    async fn test_await_resolution_sees_landing_marker() {
        let page = SnapshotPage::new(
            "<html><body><nav id='global-nav'></nav><p>captcha</p></body></html>",
            "https://www.linkedin.com/feed/",
        );
        let gate = CaptchaGate::default()
            .with_timing(Duration::from_millis(20), Duration::from_millis(5));
        let info = detect_text("captcha").unwrap();
        assert_eq!(gate.await_resolution(&page, &info).await, Resolution::Resolved);
    }
}
