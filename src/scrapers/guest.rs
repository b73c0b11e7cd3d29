//! Browserless search over the public guest listing endpoints.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use scraper::Html;
use tracing::{debug, info, warn};

use super::captcha::CaptchaGate;
use super::config::ScrapeConfig;
use super::extractor::{Extracted, JobExtractor};
use super::search::{Emitter, ScrapeError, SearchRunReport};
use super::selectors::{Field, InterfaceGeneration, SelectorStrategy};
use super::user_agent::resolve_user_agent;
use crate::models::{JobListing, SearchParameters};
use crate::utils::backoff_delay;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct GuestSearchClient {
    client: Client,
    config: ScrapeConfig,
    selectors: SelectorStrategy,
    extractor: JobExtractor,
    gate: CaptchaGate,
}

impl GuestSearchClient {
    /// `user_agent`: None or "rotate" picks a browser agent, anything else
    /// is sent verbatim.
    pub fn new(
        config: ScrapeConfig,
        selectors: SelectorStrategy,
        user_agent: Option<&str>,
    ) -> Result<Self, ScrapeError> {
        let client = Client::builder()
            .user_agent(resolve_user_agent(user_agent))
            .timeout(REQUEST_TIMEOUT)
            .gzip(true)
            .brotli(true)
            .build()?;
        let extractor = JobExtractor::new(selectors.clone(), config.base());
        Ok(Self {
            client,
            config,
            selectors,
            extractor,
            gate: CaptchaGate::default(),
        })
    }

    pub fn search_url(&self, params: &SearchParameters, start: u32) -> String {
        let mut url = format!(
            "{}/jobs-guest/jobs/api/seeMoreJobPostings/search?keywords={}",
            self.config.base(),
            urlencoding::encode(&params.query())
        );
        if let Some(location) = params.location.as_deref().filter(|l| !l.trim().is_empty()) {
            url.push_str("&location=");
            url.push_str(&urlencoding::encode(location.trim()));
        }
        url.push_str(&format!("&start={start}"));
        url
    }

    pub fn detail_url(&self, listing_id: &str) -> String {
        format!(
            "{}/jobs-guest/jobs/api/jobPosting/{}",
            self.config.base(),
            listing_id
        )
    }

    pub(crate) async fn search(
        &self,
        params: &SearchParameters,
        emitter: &mut Emitter,
        report: &mut SearchRunReport,
    ) -> Result<(), ScrapeError> {
        for page_no in 0..self.config.max_pages {
            let url = self.search_url(params, page_no * self.config.page_size);
            let body = self.fetch(&url).await?;
            report.pages_visited += 1;

            let cards = self.parse_page(&body);
            if cards.is_empty() {
                info!("Guest results exhausted after {} pages", page_no);
                break;
            }
            debug!("Guest page {}: {} cards", page_no + 1, cards.len());

            for extracted in cards {
                report.record_extraction(&extracted);
                let Some(mut listing) = extracted.listing else {
                    continue;
                };
                if self.config.fetch_details {
                    match self.fetch_detail(&mut listing).await {
                        Ok(drift) => report.drift_events += drift,
                        Err(e @ ScrapeError::Challenge(_)) => return Err(e),
                        Err(e) => report.record_detail_error(&listing, &e),
                    }
                    tokio::time::sleep(self.config.card_delay()).await;
                }
                emitter.emit(listing, report).await?;
            }
        }
        Ok(())
    }

    /// Extract every card in one results fragment.
    pub fn parse_page(&self, body: &str) -> Vec<Extracted> {
        let html = Html::parse_document(body);
        self.extractor
            .cards(&html, InterfaceGeneration::Guest)
            .into_iter()
            .map(|card| self.extractor.extract(card, InterfaceGeneration::Guest))
            .collect()
    }

    /// Merge a detail document into `listing`, returning the drift count.
    pub fn merge_detail(&self, body: &str, listing: &mut JobListing) -> usize {
        let html = Html::parse_document(body);
        let pane = self
            .selectors
            .chain(InterfaceGeneration::Guest, Field::DetailPane)
            .iter()
            .find_map(|l| l.select(&html).into_iter().next())
            .unwrap_or_else(|| html.root_element());
        self.extractor
            .enrich(listing, pane, InterfaceGeneration::Guest)
            .len()
    }

    async fn fetch_detail(&self, listing: &mut JobListing) -> Result<usize, ScrapeError> {
        let Some(id) = listing.listing_id.clone() else {
            return Ok(0);
        };
        match self.fetch(&self.detail_url(&id)).await {
            Ok(body) => Ok(self.merge_detail(&body, listing)),
            // A missing detail page leaves the card data as it is.
            Err(ScrapeError::Status { status, .. }) if status == 404 || status == 410 => {
                debug!("No detail page for {}", id);
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }

    /// GET with backoff on network errors, 429 and 5xx.
    async fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
        let attempts = self.config.navigation_retries.max(1);
        let mut attempt = 0;
        loop {
            let result = self.fetch_once(url).await;
            match result {
                Err(e)
                    if e.kind() == crate::error::ErrorKind::Retryable
                        && attempt + 1 < attempts =>
                {
                    let delay = backoff_delay(attempt, 1_000);
                    warn!("Fetching {} failed ({}), retrying in {:?}", url, e, delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<String, ScrapeError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let final_url = response.url().to_string();
        if status == StatusCode::TOO_MANY_REQUESTS || !status.is_success() {
            return Err(ScrapeError::Status {
                status: status.as_u16(),
                url: final_url,
            });
        }
        let body = response.text().await?;
        // No human surface here, so a challenge ends the run.
        if let Some(info) = self.gate.detect_document(&body, &final_url) {
            warn!(
                "Challenge on guest endpoint ({}: {:?})",
                info.challenge_type, info.indicator
            );
            return Err(ScrapeError::Challenge(info.challenge_type));
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ApplyKind;

    fn client() -> GuestSearchClient {
        GuestSearchClient::new(
            ScrapeConfig::base_default(),
            SelectorStrategy::default(),
            Some("jobscout-test"),
        )
        .unwrap()
    }

    const FRAGMENT: &str = r#"
        <li>
          <div class="base-card base-search-card job-search-card" data-entity-urn="urn:li:jobPosting:3901234567">
            <a class="base-card__full-link" href="https://www.linkedin.com/jobs/view/backend-engineer-at-acme-3901234567?position=1&amp;pageNum=0">
              <span class="sr-only">Backend Engineer</span>
            </a>
            <div class="base-search-card__info">
              <h3 class="base-search-card__title">Backend Engineer</h3>
              <h4 class="base-search-card__subtitle"><a>Acme Corp</a></h4>
              <div class="base-search-card__metadata">
                <span class="job-search-card__location">Berlin, Germany</span>
                <time class="job-search-card__listdate" datetime="2026-10-10">1 week ago</time>
              </div>
            </div>
          </div>
        </li>
        <li>
          <div class="base-card base-search-card job-search-card" data-entity-urn="urn:li:jobPosting:3907654321">
            <div class="base-search-card__info">
              <h3 class="base-search-card__title">Platform Engineer</h3>
            </div>
          </div>
        </li>
    "#;

    #[test]
    fn test_urls() {
        let c = client();
        let params = SearchParameters::new(["rust"]).with_location("Berlin");
        assert_eq!(
            c.search_url(&params, 25),
            "https://www.linkedin.com/jobs-guest/jobs/api/seeMoreJobPostings/search?keywords=rust&location=Berlin&start=25"
        );
        assert_eq!(
            c.detail_url("3901234567"),
            "https://www.linkedin.com/jobs-guest/jobs/api/jobPosting/3901234567"
        );
    }

    #[test]
    fn test_parse_page_keeps_complete_cards() {
        let cards = client().parse_page(FRAGMENT);
        assert_eq!(cards.len(), 2);
        let first = cards[0].listing.as_ref().unwrap();
        assert_eq!(first.title, "Backend Engineer");
        assert_eq!(first.company, "Acme Corp");
        assert_eq!(first.listing_id.as_deref(), Some("3901234567"));
        assert!(cards[1].listing.is_none());
    }

    #[test]
    fn test_empty_fragment() {
        assert!(client().parse_page("").is_empty());
    }

    fn card(id: &str, title: &str) -> String {
        format!(
            r#"<li><div class="base-card base-search-card job-search-card" data-entity-urn="urn:li:jobPosting:{id}">
                 <div class="base-search-card__info">
                   <h3 class="base-search-card__title">{title}</h3>
                   <h4 class="base-search-card__subtitle"><a>Acme Corp</a></h4>
                   <span class="job-search-card__location">Remote</span>
                 </div>
               </div></li>"#
        )
    }

    const DETAIL: &str = r#"
        <section class="top-card-layout">
          <div class="show-more-less-html__markup">Own the ingestion pipeline end to end.</div>
        </section>
    "#;

    fn mock_config(server: &mockito::Server, retries: u32) -> ScrapeConfig {
        ScrapeConfig {
            base_url: server.url(),
            max_pages: 3,
            page_size: 25,
            navigation_retries: retries,
            card_delay_ms: 0,
            fetch_details: true,
            ..ScrapeConfig::base_default()
        }
    }

    async fn run_guest(config: ScrapeConfig) -> (SearchRunReport, Vec<JobListing>) {
        let client =
            GuestSearchClient::new(config, SelectorStrategy::default(), Some("jobscout-test"))
                .unwrap();
        let (tx, mut rx) = tokio::sync::mpsc::channel(32);
        let mut emitter = Emitter::new(tx);
        let mut report =
            SearchRunReport::new(crate::scrapers::SearchStrategy::Lightweight, "test");
        let params = SearchParameters::new(["data engineer"]);
        client
            .search(&params, &mut emitter, &mut report)
            .await
            .unwrap();
        drop(emitter);
        let mut listings = Vec::new();
        while let Some(listing) = rx.recv().await {
            listings.push(listing);
        }
        (report, listings)
    }

    fn search_page(server: &mut mockito::Server, start: &str) -> mockito::Mock {
        server
            .mock(
                "GET",
                mockito::Matcher::Regex(r"^/jobs-guest/jobs/api/seeMoreJobPostings/search".into()),
            )
            .match_query(mockito::Matcher::UrlEncoded("start".into(), start.into()))
    }

    #[tokio::test]
    async fn test_paging_skips_missing_details_and_retries_unavailable() {
        let mut server = mockito::Server::new_async().await;
        let first = format!(
            "{}{}{}",
            card("4200000001", "Data Engineer"),
            card("4200000002", "Analytics Engineer"),
            card("4200000003", "ML Engineer")
        );
        let _page = search_page(&mut server, "0")
            .with_status(200)
            .with_body(first)
            .create_async()
            .await;
        let _page = search_page(&mut server, "25")
            .with_status(200)
            .with_body(card("4200000004", "Platform Engineer"))
            .create_async()
            .await;
        let last = search_page(&mut server, "50")
            .with_status(200)
            .with_body("")
            .create_async()
            .await;

        let gone = server
            .mock("GET", "/jobs-guest/jobs/api/jobPosting/4200000001")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;
        let busy = server
            .mock("GET", "/jobs-guest/jobs/api/jobPosting/4200000002")
            .with_status(503)
            .expect(1)
            .create_async()
            .await;
        let recovered = server
            .mock("GET", "/jobs-guest/jobs/api/jobPosting/4200000002")
            .with_status(200)
            .with_body(DETAIL)
            .expect(1)
            .create_async()
            .await;
        let _mock = server
            .mock("GET", "/jobs-guest/jobs/api/jobPosting/4200000003")
            .with_status(410)
            .create_async()
            .await;
        let _mock = server
            .mock("GET", "/jobs-guest/jobs/api/jobPosting/4200000004")
            .with_status(200)
            .with_body(DETAIL)
            .create_async()
            .await;

        let (report, listings) = run_guest(mock_config(&server, 2)).await;

        assert_eq!(report.pages_visited, 3);
        assert_eq!(report.emitted, 4);
        assert_eq!(report.detail_errors, 0);
        let ids: Vec<_> = listings
            .iter()
            .map(|l| l.listing_id.as_deref().unwrap())
            .collect();
        assert_eq!(ids, ["4200000001", "4200000002", "4200000003", "4200000004"]);
        assert!(listings[0].description.is_none());
        assert!(listings[1]
            .description
            .as_deref()
            .unwrap()
            .contains("ingestion pipeline"));
        assert!(listings[2].description.is_none());

        gone.assert_async().await;
        busy.assert_async().await;
        recovered.assert_async().await;
        last.assert_async().await;
    }

    #[tokio::test]
    async fn test_failing_detail_keeps_card_and_run_continues() {
        let mut server = mockito::Server::new_async().await;
        let _page = search_page(&mut server, "0")
            .with_status(200)
            .with_body(format!(
                "{}{}",
                card("4300000001", "Data Engineer"),
                card("4300000002", "Analytics Engineer")
            ))
            .create_async()
            .await;
        let _page = search_page(&mut server, "25")
            .with_status(200)
            .with_body("")
            .create_async()
            .await;
        let _mock = server
            .mock("GET", "/jobs-guest/jobs/api/jobPosting/4300000001")
            .with_status(500)
            .create_async()
            .await;
        let _mock = server
            .mock("GET", "/jobs-guest/jobs/api/jobPosting/4300000002")
            .with_status(200)
            .with_body(DETAIL)
            .create_async()
            .await;

        let (report, listings) = run_guest(mock_config(&server, 1)).await;

        assert_eq!(report.emitted, 2);
        assert_eq!(report.detail_errors, 1);
        assert_eq!(listings[0].title, "Data Engineer");
        assert!(listings[0].description.is_none());
        assert!(listings[1].description.is_some());
    }

    #[tokio::test]
    async fn test_results_page_error_ends_search() {
        let mut server = mockito::Server::new_async().await;
        let _page = search_page(&mut server, "0")
            .with_status(403)
            .create_async()
            .await;

        let client = GuestSearchClient::new(
            mock_config(&server, 1),
            SelectorStrategy::default(),
            Some("jobscout-test"),
        )
        .unwrap();
        let (tx, _rx) = tokio::sync::mpsc::channel(4);
        let mut emitter = Emitter::new(tx);
        let mut report =
            SearchRunReport::new(crate::scrapers::SearchStrategy::Lightweight, "test");
        let err = client
            .search(&SearchParameters::new(["rust"]), &mut emitter, &mut report)
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Status { status: 403, .. }));
        assert_eq!(report.pages_visited, 0);
    }

    #[test]
    fn test_merge_detail() {
        let c = client();
        let mut listing = c.parse_page(FRAGMENT)[0].listing.clone().unwrap();
        let detail = r#"
            <section class="top-card-layout">
              <h2 class="top-card-layout__title">Backend Engineer</h2>
              <a class="topcard__org-name-link">Acme Corp</a>
              <div class="show-more-less-html__markup">We build <b>distributed</b> systems.</div>
              <code id="applyUrl"><!--"https://www.linkedin.com/jobs/view/externalApply/3901234567?url=https%3A%2F%2Fcareers.acme.com%2Fjobs%2F42&urlhash=abc"--></code>
            </section>
        "#;
        c.merge_detail(detail, &mut listing);
        assert!(listing
            .description
            .as_deref()
            .unwrap()
            .contains("distributed"));
        assert_ne!(listing.apply_kind, ApplyKind::QuickApply);
    }
}
