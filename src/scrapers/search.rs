//! End-to-end execution of one search.

use std::collections::HashSet;
use std::sync::Arc;

use scraper::Html;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::captcha::{CaptchaGate, CaptchaInfo, ChallengeType, Resolution};
use super::config::ScrapeConfig;
use super::extractor::{Extracted, JobExtractor};
use super::filters::{AppliedFilterReport, FilterEngine, FilterError, ResultsState};
use super::guest::GuestSearchClient;
use super::interface::InterfaceDetector;
use super::page::{wait_for_any, Locator, PageDriver, PageError};
use super::planner::{plan, SearchStrategy};
use super::selectors::{Field, InterfaceGeneration, SelectorStrategy};
use crate::error::ErrorKind;
use crate::models::{AuthState, JobListing, ScrapingSession, SearchParameters};
use crate::utils::backoff_delay;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
    #[error(transparent)]
    Page(#[from] PageError),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error("Challenge ({0}) on a path without a human surface")]
    Challenge(ChallengeType),
    #[error("Challenge ({0}) was not resolved in time")]
    ChallengeUnresolved(ChallengeType),
    #[error("Results did not load")]
    ResultsNotLoaded,
    #[error("Full automation needs a browser page")]
    NoBrowser,
    #[error("Listing consumer went away")]
    Cancelled,
}

impl ScrapeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Http(_) | Self::ResultsNotLoaded => ErrorKind::Retryable,
            Self::Status { status, .. } if *status == 429 || *status >= 500 => {
                ErrorKind::Retryable
            }
            Self::Status { .. } | Self::Challenge(_) | Self::NoBrowser | Self::Cancelled => {
                ErrorKind::Terminal
            }
            Self::Page(e) => e.kind(),
            Self::Filter(e) => e.kind(),
            Self::ChallengeUnresolved(_) => ErrorKind::RequiresHuman,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunFailure {
    pub kind: ErrorKind,
    pub message: String,
}

/// What one search run did.
#[derive(Debug, Clone, Serialize)]
pub struct SearchRunReport {
    pub strategy: SearchStrategy,
    pub reason: String,
    pub generation: Option<InterfaceGeneration>,
    pub filters: Option<AppliedFilterReport>,
    pub results: Option<ResultsState>,
    pub pages_visited: u32,
    pub emitted: usize,
    pub duplicates: usize,
    /// Cards without title or company.
    pub discarded: usize,
    pub drift_events: usize,
    /// Cards whose detail view failed; they are emitted with card data only.
    pub detail_errors: usize,
    pub challenges: Vec<CaptchaInfo>,
    pub failure: Option<RunFailure>,
}

impl SearchRunReport {
    pub fn new(strategy: SearchStrategy, reason: impl Into<String>) -> Self {
        Self {
            strategy,
            reason: reason.into(),
            generation: None,
            filters: None,
            results: None,
            pages_visited: 0,
            emitted: 0,
            duplicates: 0,
            discarded: 0,
            drift_events: 0,
            detail_errors: 0,
            challenges: Vec::new(),
            failure: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }

    /// Whether the run stopped on a challenge nobody solved.
    pub fn unresolved_challenge(&self) -> bool {
        self.failure
            .as_ref()
            .is_some_and(|f| f.kind == ErrorKind::RequiresHuman)
    }

    /// A per-card failure: logged and counted, never fatal.
    pub(crate) fn record_detail_error(&mut self, listing: &JobListing, error: &ScrapeError) {
        warn!(
            "Detail for {} failed, keeping card data: {}",
            listing.display_name(),
            error
        );
        self.detail_errors += 1;
    }

    pub(crate) fn record_extraction(&mut self, extracted: &Extracted) {
        self.drift_events += extracted.drifted.len();
        if extracted.listing.is_none() {
            self.discarded += 1;
        }
    }
}

/// Sends listings downstream, once per listing.
pub(crate) struct Emitter {
    tx: mpsc::Sender<JobListing>,
    seen: HashSet<String>,
}

impl Emitter {
    pub(crate) fn new(tx: mpsc::Sender<JobListing>) -> Self {
        Self {
            tx,
            seen: HashSet::new(),
        }
    }

    pub(crate) async fn emit(
        &mut self,
        listing: JobListing,
        report: &mut SearchRunReport,
    ) -> Result<(), ScrapeError> {
        let key = listing
            .listing_id
            .clone()
            .or_else(|| listing.listing_url.clone())
            .unwrap_or_else(|| format!("{}|{}", listing.title, listing.company).to_lowercase());
        if !self.seen.insert(key) {
            debug!("Duplicate listing {}", listing.display_name());
            report.duplicates += 1;
            return Ok(());
        }
        self.tx
            .send(listing)
            .await
            .map_err(|_| ScrapeError::Cancelled)?;
        report.emitted += 1;
        Ok(())
    }
}

/// Runs searches, choosing the path per search.
pub struct JobSearchRunner {
    config: ScrapeConfig,
    selectors: SelectorStrategy,
    detector: InterfaceDetector,
    gate: CaptchaGate,
    guest: Arc<GuestSearchClient>,
}

impl JobSearchRunner {
    pub fn new(
        config: ScrapeConfig,
        selectors: SelectorStrategy,
        gate: CaptchaGate,
        guest: Arc<GuestSearchClient>,
    ) -> Self {
        Self {
            config,
            selectors,
            detector: InterfaceDetector::default(),
            gate,
            guest,
        }
    }

    /// `{base}/jobs/search/?keywords=..&location=..`
    pub fn search_url(&self, params: &SearchParameters) -> String {
        let mut url = format!(
            "{}/jobs/search/?keywords={}",
            self.config.base(),
            urlencoding::encode(&params.query())
        );
        if let Some(location) = params.location.as_deref().filter(|l| !l.trim().is_empty()) {
            url.push_str("&location=");
            url.push_str(&urlencoding::encode(location.trim()));
        }
        url
    }

    /// Run one search and stream listings into `tx`.
    ///
    /// Never fails outright: failures end the run and are recorded in the
    /// report next to whatever was emitted before them.
    pub async fn run(
        &self,
        params: &SearchParameters,
        session: Option<&ScrapingSession>,
        page: Option<&dyn PageDriver>,
        tx: mpsc::Sender<JobListing>,
    ) -> SearchRunReport {
        let decision = plan(params);
        info!(
            "Searching {:?} via {} ({})",
            params.query(),
            decision.strategy,
            decision.reason
        );
        let mut report = SearchRunReport::new(decision.strategy, decision.reason);
        let mut emitter = Emitter::new(tx);

        let outcome = match (decision.strategy, page) {
            (SearchStrategy::Lightweight, _) => {
                report.generation = Some(InterfaceGeneration::Guest);
                self.guest.search(params, &mut emitter, &mut report).await
            }
            (SearchStrategy::FullAutomation, None) => Err(ScrapeError::NoBrowser),
            (SearchStrategy::FullAutomation, Some(page)) => {
                if let Some(session) = session {
                    if session.auth_state != AuthState::Authenticated {
                        warn!(
                            "Session {} is {}; results may be limited",
                            session.id,
                            session.auth_state.as_str()
                        );
                    }
                }
                self.run_browser(params, page, &mut emitter, &mut report).await
            }
        };

        if let Err(e) = outcome {
            warn!("Search ended early: {}", e);
            report.failure = Some(RunFailure {
                kind: e.kind(),
                message: e.to_string(),
            });
        }
        info!(
            "Search finished: {} emitted, {} discarded, {} duplicates, {} pages",
            report.emitted, report.discarded, report.duplicates, report.pages_visited
        );
        report
    }

    async fn run_browser(
        &self,
        params: &SearchParameters,
        page: &dyn PageDriver,
        emitter: &mut Emitter,
        report: &mut SearchRunReport,
    ) -> Result<(), ScrapeError> {
        let engine = FilterEngine::new(self.selectors.clone(), self.gate.clone(), &self.config);
        let extractor = JobExtractor::new(self.selectors.clone(), self.config.base());

        self.navigate(page, &self.search_url(params)).await?;
        self.pass_challenge(page, report).await?;

        let mut generation = self.detector.detect(page).await?;
        report.generation = Some(generation);

        if !params.active_filters().is_empty() {
            let filters = engine.apply_filters(page, generation, params).await?;
            report.challenges.extend(filters.challenges.iter().cloned());
            report.filters = Some(filters);
            generation = self.detector.detect(page).await?;
            report.generation = Some(generation);
        }

        for page_no in 0..self.config.max_pages {
            let state = engine.wait_for_results(page, generation).await?;
            report.results = Some(state);
            match state {
                ResultsState::Empty => {
                    info!("No results on page {}", page_no + 1);
                    break;
                }
                ResultsState::NotLoaded => return Err(ScrapeError::ResultsNotLoaded),
                ResultsState::Loaded => {}
            }
            page.scroll_to_bottom().await?;
            report.pages_visited += 1;

            let cards = self.parse_cards(&page.content().await?, &extractor, generation);
            debug!("Page {}: {} cards", page_no + 1, cards.len());

            for extracted in cards {
                report.record_extraction(&extracted);
                let Some(mut listing) = extracted.listing else {
                    continue;
                };
                if self.config.fetch_details {
                    if let Err(e) = self
                        .open_detail(page, &extractor, generation, &mut listing, report)
                        .await
                    {
                        if e.kind() == ErrorKind::RequiresHuman {
                            return Err(e);
                        }
                        report.record_detail_error(&listing, &e);
                    }
                }
                emitter.emit(listing, report).await?;
            }

            if page_no + 1 >= self.config.max_pages || !self.next_page(page, generation).await? {
                break;
            }
            self.pass_challenge(page, report).await?;
            generation = self.detector.detect(page).await?;
            report.generation = Some(generation);
        }
        Ok(())
    }

    fn parse_cards(
        &self,
        content: &str,
        extractor: &JobExtractor,
        generation: InterfaceGeneration,
    ) -> Vec<Extracted> {
        let html = Html::parse_document(content);
        extractor
            .cards(&html, generation)
            .into_iter()
            .map(|card| extractor.extract(card, generation))
            .collect()
    }

    /// Click the card open and merge its detail pane into `listing`.
    async fn open_detail(
        &self,
        page: &dyn PageDriver,
        extractor: &JobExtractor,
        generation: InterfaceGeneration,
        listing: &mut JobListing,
        report: &mut SearchRunReport,
    ) -> Result<(), ScrapeError> {
        let Some(id) = listing.listing_id.clone() else {
            return Ok(());
        };
        let card = Locator::css(format!(
            "[data-occludable-job-id='{id}'], [data-job-id='{id}'], [data-entity-urn$=':{id}']"
        ));
        if !page.click(&card).await? {
            debug!("Card {} not clickable", id);
            return Ok(());
        }
        tokio::time::sleep(self.config.card_delay()).await;
        self.pass_challenge(page, report).await?;

        let panes = self.selectors.chain(generation, Field::DetailPane);
        if wait_for_any(page, &panes, self.config.element_wait(), self.config.poll())
            .await?
            .is_none()
        {
            debug!("Detail pane for {} did not appear", id);
            return Ok(());
        }
        let content = page.content().await?;
        report.drift_events += self.enrich_from(&content, extractor, generation, &panes, listing);
        Ok(())
    }

    fn enrich_from(
        &self,
        content: &str,
        extractor: &JobExtractor,
        generation: InterfaceGeneration,
        panes: &[Locator],
        listing: &mut JobListing,
    ) -> usize {
        let html = Html::parse_document(content);
        let pane = panes
            .iter()
            .find_map(|l| l.select(&html).into_iter().next())
            .unwrap_or_else(|| html.root_element());
        extractor.enrich(listing, pane, generation).len()
    }

    async fn next_page(
        &self,
        page: &dyn PageDriver,
        generation: InterfaceGeneration,
    ) -> Result<bool, PageError> {
        for locator in self.selectors.chain(generation, Field::NextPage) {
            if page.click(&locator).await? {
                return Ok(true);
            }
        }
        debug!("No next page control");
        Ok(false)
    }

    async fn navigate(&self, page: &dyn PageDriver, url: &str) -> Result<(), ScrapeError> {
        let attempts = self.config.navigation_retries.max(1);
        let mut attempt = 0;
        loop {
            match page.navigate(url).await {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == ErrorKind::Retryable && attempt + 1 < attempts => {
                    let delay = backoff_delay(attempt, 1_000);
                    warn!(
                        "Navigation to {} failed ({}), retrying in {:?}",
                        url, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn pass_challenge(
        &self,
        page: &dyn PageDriver,
        report: &mut SearchRunReport,
    ) -> Result<(), ScrapeError> {
        let Some(info) = self.gate.check(page).await? else {
            return Ok(());
        };
        let challenge_type = info.challenge_type;
        let resolution = self.gate.await_resolution(page, &info).await;
        report.challenges.push(info);
        match resolution {
            Resolution::Resolved => Ok(()),
            Resolution::TimedOut => Err(ScrapeError::ChallengeUnresolved(challenge_type)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DateWindow;

    fn runner() -> JobSearchRunner {
        let config = ScrapeConfig::base_default();
        let selectors = SelectorStrategy::default();
        let guest = Arc::new(GuestSearchClient::new(config.clone(), selectors.clone(), None).unwrap());
        JobSearchRunner::new(config, selectors, CaptchaGate::default(), guest)
    }

    #[test]
    fn test_search_url_encoding() {
        let params = SearchParameters::new(["rust", "c++"]).with_location("São Paulo");
        assert_eq!(
            runner().search_url(&params),
            "https://www.linkedin.com/jobs/search/?keywords=rust%20c%2B%2B&location=S%C3%A3o%20Paulo"
        );
    }

    #[tokio::test]
    async fn test_full_automation_without_page_fails_cleanly() {
        let (tx, _rx) = mpsc::channel(4);
        let params = SearchParameters::new(["rust"]).with_date_window(DateWindow::PastDay);
        let report = runner().run(&params, None, None, tx).await;
        assert_eq!(report.strategy, SearchStrategy::FullAutomation);
        let failure = report.failure.unwrap();
        assert_eq!(failure.kind, ErrorKind::Terminal);
        assert_eq!(report.emitted, 0);
    }

    #[tokio::test]
    async fn test_emitter_dedupes() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut emitter = Emitter::new(tx);
        let mut report = SearchRunReport::new(SearchStrategy::Lightweight, "test");
        let mut a = JobListing::new("Engineer", "Acme").unwrap();
        a.listing_id = Some("123456".into());
        emitter.emit(a.clone(), &mut report).await.unwrap();
        emitter.emit(a, &mut report).await.unwrap();
        assert_eq!(report.emitted, 1);
        assert_eq!(report.duplicates, 1);
        assert!(rx.recv().await.is_some());
    }
}
