//! Applying search filters through the site's UI.
//!
//! Each filter is applied and verified independently. A filter that cannot
//! be verified is recorded as failed and the engine moves on; only a broken
//! browser or an unresolved challenge aborts the run.

use std::time::{Duration, Instant};

use scraper::Html;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::captcha::{CaptchaGate, CaptchaInfo, ChallengeType, Resolution};
use super::config::ScrapeConfig;
use super::page::{wait_for_any, Locator, PageDriver, PageError};
use super::selectors::{log_drift, Field, InterfaceGeneration, SelectorStrategy};
use crate::error::ErrorKind;
use crate::models::{FilterKind, SearchParameters};
use crate::utils::normalize_whitespace;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error(transparent)]
    Page(#[from] PageError),
    #[error("Challenge ({0}) during filter application was not resolved")]
    ChallengeUnresolved(ChallengeType),
}

impl FilterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Page(e) => e.kind(),
            Self::ChallengeUnresolved(_) => ErrorKind::RequiresHuman,
        }
    }
}

/// State of the results surface after an explicit wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultsState {
    Loaded,
    /// The site reported zero matches.
    Empty,
    /// Neither cards nor a no-results marker appeared in time.
    NotLoaded,
}

/// What happened to one filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterOutcome {
    pub filter: FilterKind,
    pub found: bool,
    pub clicked: bool,
    pub verified: bool,
    /// Option labels that were selected.
    pub selected: Vec<String>,
    pub error: Option<String>,
}

impl FilterOutcome {
    fn new(filter: FilterKind) -> Self {
        Self {
            filter,
            found: false,
            clicked: false,
            verified: false,
            selected: Vec::new(),
            error: None,
        }
    }

    fn fail(&mut self, reason: impl Into<String>) {
        self.verified = false;
        self.error = Some(reason.into());
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AppliedFilterReport {
    pub outcomes: Vec<FilterOutcome>,
    pub challenges: Vec<CaptchaInfo>,
}

impl AppliedFilterReport {
    pub fn all_verified(&self) -> bool {
        self.outcomes.iter().all(|o| o.verified)
    }

    pub fn failed(&self) -> Vec<FilterKind> {
        self.outcomes
            .iter()
            .filter(|o| !o.verified)
            .map(|o| o.filter)
            .collect()
    }

    pub fn is_partial(&self) -> bool {
        let verified = self.outcomes.iter().filter(|o| o.verified).count();
        verified > 0 && verified < self.outcomes.len()
    }
}

/// Drives the filter pills, panels and options of the search page.
pub struct FilterEngine {
    selectors: SelectorStrategy,
    gate: CaptchaGate,
    wait: Duration,
    poll: Duration,
}

impl FilterEngine {
    pub fn new(selectors: SelectorStrategy, gate: CaptchaGate, config: &ScrapeConfig) -> Self {
        Self {
            selectors,
            gate,
            wait: config.element_wait(),
            poll: config.poll(),
        }
    }

    /// Apply every filter `params` asks for, in order.
    ///
    /// Page errors are recorded on the filter they hit; only an unresolved
    /// challenge ends the pass.
    pub async fn apply_filters(
        &self,
        page: &dyn PageDriver,
        generation: InterfaceGeneration,
        params: &SearchParameters,
    ) -> Result<AppliedFilterReport, FilterError> {
        let mut report = AppliedFilterReport::default();
        for kind in params.active_filters() {
            let labels = params.option_labels(kind);
            let mut outcome = FilterOutcome::new(kind);
            match self
                .apply_one(page, generation, &labels, &mut outcome, &mut report)
                .await
            {
                Ok(()) => {}
                Err(FilterError::Page(e)) => outcome.fail(format!("page error: {}", e)),
                Err(e) => return Err(e),
            }
            if outcome.verified {
                info!("Filter {} applied: {}", kind, outcome.selected.join(", "));
            } else {
                warn!(
                    "Filter {} not applied: {}",
                    kind,
                    outcome.error.as_deref().unwrap_or("unverified")
                );
            }
            report.outcomes.push(outcome);
        }
        Ok(report)
    }

    /// Wait for result cards or the no-results marker, whichever shows first.
    pub async fn wait_for_results(
        &self,
        page: &dyn PageDriver,
        generation: InterfaceGeneration,
    ) -> Result<ResultsState, PageError> {
        let mut locators = self.selectors.chain(generation, Field::NoResults);
        let empty_markers = locators.len();
        locators.extend(self.selectors.chain(generation, Field::ResultCard));
        Ok(
            match wait_for_any(page, &locators, self.wait, self.poll).await? {
                Some(idx) if idx < empty_markers => ResultsState::Empty,
                Some(_) => ResultsState::Loaded,
                None => ResultsState::NotLoaded,
            },
        )
    }

    async fn apply_one(
        &self,
        page: &dyn PageDriver,
        generation: InterfaceGeneration,
        labels: &[String],
        outcome: &mut FilterOutcome,
        report: &mut AppliedFilterReport,
    ) -> Result<(), FilterError> {
        let kind = outcome.filter;
        if labels.is_empty() {
            outcome.fail("no option label for the requested value");
            return Ok(());
        }

        if self.wait_for_results(page, generation).await? == ResultsState::NotLoaded {
            outcome.fail("results surface not loaded");
            return Ok(());
        }

        let trigger_field = Field::FilterTrigger(kind);
        let triggers = self.selectors.chain(generation, trigger_field);
        let Some(trigger) = first_present(page, &triggers).await? else {
            log_drift(generation, trigger_field, &triggers);
            outcome.fail("trigger not found");
            return Ok(());
        };
        outcome.found = true;

        let before_url = page.current_url().await?;
        let before_count = self.results_count(page, generation).await?;

        outcome.clicked = page.click(&trigger).await?;
        if !outcome.clicked {
            outcome.fail("trigger click had no target");
            return Ok(());
        }
        self.pass_challenge(page, report).await?;

        let panels = self.selectors.chain(generation, Field::FilterPanel);
        if wait_for_any(page, &panels, self.wait, self.poll)
            .await?
            .is_none()
        {
            log_drift(generation, Field::FilterPanel, &panels);
            outcome.fail("filter panel did not open");
            return Ok(());
        }

        for label in labels {
            match self.pick_option(page, generation, label).await? {
                true => outcome.selected.push(label.clone()),
                false => debug!("Option {:?} not found for filter {}", label, kind),
            }
        }
        if outcome.selected.is_empty() {
            outcome.fail(format!("no option matched {}", labels.join(", ")));
            return Ok(());
        }

        let apply = self.selectors.chain(generation, Field::FilterApply);
        if let Some(button) = first_present(page, &apply).await? {
            page.click(&button).await?;
        }
        self.pass_challenge(page, report).await?;

        outcome.verified = self
            .verify(page, generation, &panels, &before_url, before_count.as_deref())
            .await?;
        if !outcome.verified {
            outcome.fail("no URL, result count or panel change after applying");
        }
        Ok(())
    }

    /// Exact text, then partial text, then role-based elements.
    async fn pick_option(
        &self,
        page: &dyn PageDriver,
        generation: InterfaceGeneration,
        label: &str,
    ) -> Result<bool, PageError> {
        let containers = self.selectors.chain(generation, Field::FilterOption);
        let roles = self.selectors.chain(generation, Field::FilterOptionRole);

        let mut candidates: Vec<Locator> = Vec::new();
        for base in &containers {
            candidates.push(base.clone().with_exact_text(label));
        }
        for base in &containers {
            candidates.push(base.clone().with_text_containing(label));
        }
        for base in &roles {
            candidates.push(base.clone().with_text_containing(label));
            candidates.push(base.clone().with_aria_containing(label));
        }

        for candidate in &candidates {
            if page.click(candidate).await? {
                debug!("Selected option {:?} via {}", label, candidate);
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn verify(
        &self,
        page: &dyn PageDriver,
        generation: InterfaceGeneration,
        panels: &[Locator],
        before_url: &str,
        before_count: Option<&str>,
    ) -> Result<bool, PageError> {
        let start = Instant::now();
        loop {
            if page.current_url().await? != before_url {
                return Ok(true);
            }
            let count = self.results_count(page, generation).await?;
            if count.is_some() && count.as_deref() != before_count {
                return Ok(true);
            }
            if first_present(page, panels).await?.is_none() {
                return Ok(true);
            }
            if start.elapsed() >= self.wait {
                return Ok(false);
            }
            tokio::time::sleep(self.poll).await;
        }
    }

    async fn results_count(
        &self,
        page: &dyn PageDriver,
        generation: InterfaceGeneration,
    ) -> Result<Option<String>, PageError> {
        let content = page.content().await?;
        let chain = self.selectors.chain(generation, Field::ResultsCount);
        Ok(first_text(&content, &chain))
    }

    async fn pass_challenge(
        &self,
        page: &dyn PageDriver,
        report: &mut AppliedFilterReport,
    ) -> Result<(), FilterError> {
        let Some(info) = self.gate.check(page).await? else {
            return Ok(());
        };
        let challenge_type = info.challenge_type;
        let resolution = self.gate.await_resolution(page, &info).await;
        report.challenges.push(info);
        match resolution {
            Resolution::Resolved => Ok(()),
            Resolution::TimedOut => Err(FilterError::ChallengeUnresolved(challenge_type)),
        }
    }
}

async fn first_present(
    page: &dyn PageDriver,
    chain: &[Locator],
) -> Result<Option<Locator>, PageError> {
    for locator in chain {
        if page.count(locator).await? > 0 {
            return Ok(Some(locator.clone()));
        }
    }
    Ok(None)
}

fn first_text(content: &str, chain: &[Locator]) -> Option<String> {
    let html = Html::parse_document(content);
    chain.iter().find_map(|locator| {
        locator
            .select(&html)
            .first()
            .map(|e| normalize_whitespace(&e.text().collect::<String>()))
            .filter(|t| !t.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DateWindow, ExperienceLevel, JobType};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// A page whose documents switch when an element carrying
    /// `data-next="<state>"` is clicked.
    struct ScriptedPage {
        states: HashMap<&'static str, (&'static str, &'static str)>,
        current: Mutex<&'static str>,
        /// Clicks on selectors containing this fragment time out.
        stuck: Option<&'static str>,
    }

    impl ScriptedPage {
        fn new(states: &[(&'static str, &'static str, &'static str)], start: &'static str) -> Self {
            Self {
                states: states.iter().map(|(k, url, html)| (*k, (*url, *html))).collect(),
                current: Mutex::new(start),
                stuck: None,
            }
        }

        fn with_stuck_click(mut self, fragment: &'static str) -> Self {
            self.stuck = Some(fragment);
            self
        }

        fn doc(&self) -> (&'static str, &'static str) {
            self.states[*self.current.lock().unwrap()]
        }
    }

    #[async_trait]
    impl PageDriver for ScriptedPage {
        async fn navigate(&self, _url: &str) -> Result<(), PageError> {
            Ok(())
        }
        async fn current_url(&self) -> Result<String, PageError> {
            Ok(self.doc().0.to_string())
        }
        async fn content(&self) -> Result<String, PageError> {
            Ok(self.doc().1.to_string())
        }
        async fn visible_text(&self) -> Result<String, PageError> {
            let html = Html::parse_document(self.doc().1);
            Ok(normalize_whitespace(&html.root_element().text().collect::<String>()))
        }
        async fn count(&self, locator: &Locator) -> Result<usize, PageError> {
            Ok(locator.select(&Html::parse_document(self.doc().1)).len())
        }
        async fn click(&self, locator: &Locator) -> Result<bool, PageError> {
            if self.stuck.is_some_and(|f| locator.css.contains(f)) {
                return Err(PageError::Timeout {
                    after: Duration::from_secs(1),
                    what: "click".to_string(),
                });
            }
            let next = {
                let html = Html::parse_document(self.doc().1);
                let hits = locator.select(&html);
                match hits.first() {
                    None => return Ok(false),
                    Some(el) => el.value().attr("data-next").map(|s| s.to_string()),
                }
            };
            if let Some(next) = next {
                let key = *self
                    .states
                    .keys()
                    .find(|k| **k == next)
                    .expect("unknown state");
                *self.current.lock().unwrap() = key;
            }
            Ok(true)
        }
        async fn fill(&self, _l: &Locator, _v: &str) -> Result<bool, PageError> {
            Ok(false)
        }
        async fn submit(&self, _l: &Locator) -> Result<bool, PageError> {
            Ok(false)
        }
        async fn scroll_to_bottom(&self) -> Result<(), PageError> {
            Ok(())
        }
    }

    const RESULTS: &str = r#"<html><body>
        <div class="jobs-search-results-list__subtitle">1,204 results</div>
        <button id="searchFilter_timePostedRange" data-next="date_panel">Date posted</button>
        <button class="search-reusables__filter-pill-button" data-next="exp_panel">Experience level</button>
        <ul><li class="jobs-search-results__list-item">card</li></ul>
    </body></html>"#;

    const DATE_PANEL: &str = r#"<html><body>
        <div class="jobs-search-results-list__subtitle">1,204 results</div>
        <div class="artdeco-hoverable-content--visible">
            <label class="search-reusables__value-label">Any time</label>
            <label class="search-reusables__value-label">Past week</label>
            <button class="artdeco-button--primary" data-next="filtered">Show 310 results</button>
        </div>
        <ul><li class="jobs-search-results__list-item">card</li></ul>
    </body></html>"#;

    const EXP_PANEL: &str = r#"<html><body>
        <div class="artdeco-hoverable-content--visible">
            <div role="checkbox" aria-label="Filter by Mid-Senior level">Mid-Senior</div>
        </div>
        <ul><li class="jobs-search-results__list-item">card</li></ul>
    </body></html>"#;

    const FILTERED: &str = r#"<html><body>
        <div class="jobs-search-results-list__subtitle">310 results</div>
        <button class="search-reusables__filter-pill-button" data-next="exp_panel">Experience level</button>
        <ul><li class="jobs-search-results__list-item">card</li></ul>
    </body></html>"#;

    fn engine() -> FilterEngine {
        let config = ScrapeConfig {
            element_wait_secs: 0,
            poll_ms: 1,
            ..ScrapeConfig::base_default()
        };
        FilterEngine::new(
            SelectorStrategy::default(),
            CaptchaGate::default().with_timing(Duration::from_millis(10), Duration::from_millis(2)),
            &config,
        )
    }

    fn page() -> ScriptedPage {
        ScriptedPage::new(
            &[
                ("results", "https://www.linkedin.com/jobs/search/?keywords=rust", RESULTS),
                ("date_panel", "https://www.linkedin.com/jobs/search/?keywords=rust", DATE_PANEL),
                ("exp_panel", "https://www.linkedin.com/jobs/search/?keywords=rust&f_TPR=r604800", EXP_PANEL),
                ("filtered", "https://www.linkedin.com/jobs/search/?keywords=rust&f_TPR=r604800", FILTERED),
            ],
            "results",
        )
    }

    #[tokio::test]
    async fn test_partial_application_is_reported() {
        let params = SearchParameters::new(["rust"])
            .with_date_window(DateWindow::PastWeek)
            .with_experience_level(ExperienceLevel::MidSenior)
            .with_job_type(JobType::Contract);
        let report = engine()
            .apply_filters(&page(), InterfaceGeneration::Legacy, &params)
            .await
            .unwrap();

        assert_eq!(report.outcomes.len(), 3);

        let date = &report.outcomes[0];
        assert!(date.found && date.clicked && date.verified);
        assert_eq!(date.selected, vec!["Past week".to_string()]);

        // Role fallback selects the option, but the panel never closes and
        // neither URL nor count changes.
        let exp = &report.outcomes[1];
        assert!(exp.found && exp.clicked);
        assert_eq!(exp.selected, vec!["Mid-Senior level".to_string()]);
        assert!(!exp.verified);

        // No job type trigger anywhere on the page.
        let job_type = &report.outcomes[2];
        assert!(!job_type.found);
        assert_eq!(job_type.error.as_deref(), Some("trigger not found"));

        assert!(report.is_partial());
        assert_eq!(
            report.failed(),
            vec![FilterKind::ExperienceLevel, FilterKind::JobType]
        );
    }

    #[tokio::test]
    async fn test_page_error_is_recorded_and_next_filter_runs() {
        let params = SearchParameters::new(["rust"])
            .with_date_window(DateWindow::PastWeek)
            .with_experience_level(ExperienceLevel::MidSenior);
        let page = page().with_stuck_click("timePostedRange");
        let report = engine()
            .apply_filters(&page, InterfaceGeneration::Legacy, &params)
            .await
            .unwrap();

        assert_eq!(report.outcomes.len(), 2);
        let date = &report.outcomes[0];
        assert!(date.found);
        assert!(!date.clicked && !date.verified);
        assert!(date.error.as_deref().unwrap().contains("Timed out"));

        let exp = &report.outcomes[1];
        assert!(exp.found && exp.clicked);
        assert_eq!(exp.selected, vec!["Mid-Senior level".to_string()]);
        assert_eq!(report.failed()[0], FilterKind::DatePosted);
    }

    #[tokio::test]
    async fn test_results_state() {
        let engine = engine();
        let empty = ScriptedPage::new(
            &[(
                "empty",
                "https://www.linkedin.com/jobs/search/",
                r#"<div class="jobs-search-no-results-banner">No matching jobs found</div>"#,
            )],
            "empty",
        );
        assert_eq!(
            engine
                .wait_for_results(&empty, InterfaceGeneration::Legacy)
                .await
                .unwrap(),
            ResultsState::Empty
        );

        let blank = ScriptedPage::new(&[("blank", "https://x", "<p>loading</p>")], "blank");
        assert_eq!(
            engine
                .wait_for_results(&blank, InterfaceGeneration::Legacy)
                .await
                .unwrap(),
            ResultsState::NotLoaded
        );
    }
}
