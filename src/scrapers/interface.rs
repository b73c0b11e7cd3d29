//! Interface generation detection.

use scraper::Html;
use tracing::debug;

use super::page::{Locator, PageDriver, PageError};
use super::selectors::InterfaceGeneration;

/// Decides which selector generation the current page is rendered with.
///
/// Signatures are checked in priority order and the first hit wins. Pages
/// matching nothing are treated as [`InterfaceGeneration::Legacy`]. Results
/// are never cached; call `detect` again after every navigation.
#[derive(Debug, Clone)]
pub struct InterfaceDetector {
    signatures: Vec<(InterfaceGeneration, Vec<Locator>)>,
}

impl Default for InterfaceDetector {
    fn default() -> Self {
        let sig = |list: &[&str]| list.iter().map(|s| Locator::css(*s)).collect::<Vec<_>>();
        Self {
            signatures: vec![
                (
                    InterfaceGeneration::Semantic,
                    sig(&[
                        "[data-view-name='job-search-job-list']",
                        "[data-view-name='job-card']",
                        "[data-view-name='job-details']",
                    ]),
                ),
                (
                    InterfaceGeneration::Unified,
                    sig(&[
                        ".job-details-jobs-unified-top-card__container--two-pane",
                        "div.job-card-job-posting-card-wrapper",
                        ".job-details-jobs-unified-top-card__job-title",
                    ]),
                ),
                (
                    InterfaceGeneration::Guest,
                    sig(&[
                        "ul.jobs-search__results-list",
                        "section.top-card-layout",
                        "div.base-search-card",
                        "div.base-card",
                    ]),
                ),
            ],
        }
    }
}

impl InterfaceDetector {
    /// Detect against a live page.
    pub async fn detect(&self, page: &dyn PageDriver) -> Result<InterfaceGeneration, PageError> {
        for (generation, locators) in &self.signatures {
            for locator in locators {
                if page.count(locator).await? > 0 {
                    debug!("Interface generation {} (matched {})", generation, locator);
                    return Ok(*generation);
                }
            }
        }
        debug!("No interface signature matched, assuming legacy");
        Ok(InterfaceGeneration::Legacy)
    }

    /// Detect against an already parsed document.
    pub fn detect_html(&self, html: &Html) -> InterfaceGeneration {
        self.signatures
            .iter()
            .find(|(_, locators)| locators.iter().any(|l| !l.select(html).is_empty()))
            .map(|(generation, _)| *generation)
            .unwrap_or(InterfaceGeneration::Legacy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::page::SnapshotPage;

    #[tokio::test]
    async fn test_semantic_wins_over_guest() {
        let html = r#"<div data-view-name="job-card"></div><div class="base-card"></div>"#;
        let page = SnapshotPage::new(html, "https://www.linkedin.com/jobs/search/");
        let generation = InterfaceDetector::default().detect(&page).await.unwrap();
        assert_eq!(generation, InterfaceGeneration::Semantic);
    }

    #[tokio::test]
    async fn test_unknown_page_is_legacy() {
        let page = SnapshotPage::new("<p>hello</p>", "https://www.linkedin.com/jobs/");
        let generation = InterfaceDetector::default().detect(&page).await.unwrap();
        assert_eq!(generation, InterfaceGeneration::Legacy);
    }

    #[test]
    fn test_detect_html_guest() {
        let html = Html::parse_document(r#"<ul class="jobs-search__results-list"><li></li></ul>"#);
        assert_eq!(
            InterfaceDetector::default().detect_html(&html),
            InterfaceGeneration::Guest
        );
    }
}
