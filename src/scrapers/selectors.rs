//! Versioned selector fallback chains.
//!
//! The site ships several DOM layouts at once. Each logical field has an
//! ordered chain of locators per interface generation; lookups walk the chain
//! and stop at the first match. Chains for a non-legacy generation continue
//! into the legacy chain once their own entries are exhausted.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::page::Locator;
use crate::models::FilterKind;

/// A DOM layout version of the target site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceGeneration {
    /// 2025 redesign keyed on `data-view-name` attributes.
    Semantic,
    /// Unified top-card layout.
    Unified,
    /// Logged-out public pages and guest API fragments.
    Guest,
    /// Classic layout; the conservative default.
    Legacy,
}

impl InterfaceGeneration {
    pub const ALL: [Self; 4] = [Self::Semantic, Self::Unified, Self::Guest, Self::Legacy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Semantic => "semantic",
            Self::Unified => "unified",
            Self::Guest => "guest",
            Self::Legacy => "legacy",
        }
    }
}

impl fmt::Display for InterfaceGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical page elements looked up through selector chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    ResultsContainer,
    ResultCard,
    CardLink,
    NoResults,
    DetailPane,
    Title,
    Company,
    Location,
    DescriptionRich,
    DescriptionSummary,
    Salary,
    Insights,
    PostedDate,
    ApplyButton,
    ExternalApplyLink,
    ListingId,
    FilterTrigger(FilterKind),
    FilterPanel,
    FilterOption,
    FilterOptionRole,
    FilterApply,
    ResultsCount,
    NextPage,
    LoginUsername,
    LoginPassword,
    LoginSubmit,
    LoginError,
    AuthenticatedMarker,
}

impl Field {
    pub fn name(&self) -> String {
        match self {
            Self::FilterTrigger(kind) => format!("filter_trigger:{}", kind.as_str()),
            other => format!("{:?}", other),
        }
    }
}

/// Selector chains for every generation and field.
#[derive(Debug, Clone)]
pub struct SelectorStrategy {
    chains: HashMap<(InterfaceGeneration, Field), Vec<Locator>>,
}

impl Default for SelectorStrategy {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SelectorStrategy {
    /// Locators to try for `field` under `generation`, in order.
    pub fn chain(&self, generation: InterfaceGeneration, field: Field) -> Vec<Locator> {
        let mut out: Vec<Locator> = self
            .chains
            .get(&(generation, field))
            .cloned()
            .unwrap_or_default();
        if generation != InterfaceGeneration::Legacy {
            if let Some(legacy) = self.chains.get(&(InterfaceGeneration::Legacy, field)) {
                for locator in legacy {
                    if !out.contains(locator) {
                        out.push(locator.clone());
                    }
                }
            }
        }
        out
    }

    /// Locators whose presence means the page shows job content: result
    /// lists, cards and detail panes of every generation.
    pub fn job_structure(&self) -> Vec<Locator> {
        let mut out: Vec<Locator> = Vec::new();
        for generation in InterfaceGeneration::ALL {
            for field in [
                Field::ResultsContainer,
                Field::ResultCard,
                Field::DetailPane,
                Field::DescriptionRich,
            ] {
                for locator in self.chains.get(&(generation, field)).into_iter().flatten() {
                    if !out.contains(locator) {
                        out.push(locator.clone());
                    }
                }
            }
        }
        out
    }

    /// Replace the chain for one generation and field.
    pub fn with_chain(
        mut self,
        generation: InterfaceGeneration,
        field: Field,
        locators: Vec<Locator>,
    ) -> Self {
        self.chains.insert((generation, field), locators);
        self
    }

    fn builtin() -> Self {
        use InterfaceGeneration::*;

        let mut s = Self {
            chains: HashMap::new(),
        };

        // Legacy
        s.css(Legacy, Field::ResultsContainer, &[
            ".jobs-search-results-list",
            ".scaffold-layout__list",
            "ul.scaffold-layout__list-container",
        ]);
        s.css(Legacy, Field::ResultCard, &[
            "li.jobs-search-results__list-item",
            "li[data-occludable-job-id]",
            "div.job-card-container",
        ]);
        s.css(Legacy, Field::CardLink, &[
            "a.job-card-list__title",
            "a.job-card-container__link",
            "a[href*='/jobs/view/']",
        ]);
        s.put(Legacy, Field::NoResults, vec![
            Locator::css(".jobs-search-no-results-banner"),
            Locator::css(".jobs-search-two-pane__no-results-banner--expand"),
            Locator::css("h1, h2").with_text_containing("No matching jobs found"),
        ]);
        s.css(Legacy, Field::DetailPane, &[
            ".jobs-search__job-details--container",
            ".jobs-details",
            ".job-view-layout",
        ]);
        s.css(Legacy, Field::Title, &[
            ".job-details-jobs-unified-top-card__job-title",
            ".jobs-unified-top-card__job-title",
            ".job-card-list__title",
            ".job-card-container__link strong",
            "h1",
        ]);
        s.css(Legacy, Field::Company, &[
            ".job-details-jobs-unified-top-card__company-name",
            ".jobs-unified-top-card__company-name",
            ".job-card-container__primary-description",
            ".job-card-container__company-name",
            ".artdeco-entity-lockup__subtitle",
        ]);
        s.css(Legacy, Field::Location, &[
            ".jobs-unified-top-card__bullet",
            ".job-details-jobs-unified-top-card__bullet",
            ".job-card-container__metadata-item",
            ".artdeco-entity-lockup__caption",
        ]);
        s.css(Legacy, Field::DescriptionRich, &[
            ".jobs-description__container",
            ".jobs-box__html-content",
            ".jobs-description-content__text",
            "#job-details",
        ]);
        s.css(Legacy, Field::DescriptionSummary, &[
            ".job-card-container__snippet",
            ".jobs-description__snippet",
            "[class*='description']",
        ]);
        s.css(Legacy, Field::Salary, &[
            ".job-details-jobs-unified-top-card__job-insight--highlight",
            ".job-card-container__salary-info",
            ".compensation__salary",
            ".salary",
        ]);
        s.css(Legacy, Field::Insights, &[
            ".jobs-unified-top-card__job-insight",
            ".job-details-jobs-unified-top-card__job-insight",
            ".job-details-preferences-and-skills__pill",
            ".job-card-container__metadata-item--workplace-type",
            ".jobs-unified-top-card__workplace-type",
        ]);
        s.css(Legacy, Field::PostedDate, &[
            ".jobs-unified-top-card__posted-date",
            "time",
        ]);
        s.put(Legacy, Field::ApplyButton, vec![
            Locator::css("button.jobs-apply-button"),
            Locator::css(".jobs-apply-button--top-card button"),
            Locator::css("button").with_aria_containing("apply"),
        ]);
        s.css(Legacy, Field::ExternalApplyLink, &[
            "a.jobs-apply-button",
            "a[href*='externalApply']",
            "a[data-tracking-control-name*='apply']",
        ]);
        s.css(Legacy, Field::ListingId, &[
            "[data-job-id]",
            "[data-occludable-job-id]",
            "[data-entity-urn]",
        ]);
        for kind in ALL_FILTERS {
            s.put(Legacy, Field::FilterTrigger(kind), legacy_trigger(kind));
        }
        s.css(Legacy, Field::FilterPanel, &[
            ".artdeco-hoverable-content--visible",
            ".reusable-search-filters-trigger-dropdown__container",
            "[role='dialog'] fieldset",
        ]);
        s.css(Legacy, Field::FilterOption, &[
            ".artdeco-hoverable-content--visible label.search-reusables__value-label",
            "label.search-reusables__value-label",
            "[role='dialog'] label",
        ]);
        s.css(Legacy, Field::FilterOptionRole, &[
            "[role='checkbox']",
            "[role='radio']",
            "[role='option']",
            "[role='menuitemcheckbox']",
        ]);
        s.put(Legacy, Field::FilterApply, vec![
            Locator::css(".artdeco-hoverable-content--visible button.artdeco-button--primary"),
            Locator::css(".reusable-search-filters-buttons button.artdeco-button--primary"),
            Locator::css("button").with_text_containing("Show results"),
            Locator::css("button").with_aria_containing("apply current filter"),
        ]);
        s.css(Legacy, Field::ResultsCount, &[
            ".jobs-search-results-list__subtitle",
            ".jobs-search-results-list__text",
        ]);
        s.put(Legacy, Field::NextPage, vec![
            Locator::css("button[aria-label='View next page']"),
            Locator::css("button.jobs-search-pagination__button--next"),
            Locator::css("button").with_aria_containing("next"),
        ]);
        s.css(Legacy, Field::LoginUsername, &[
            "#username",
            "input[name='session_key']",
            "input[autocomplete='username']",
        ]);
        s.css(Legacy, Field::LoginPassword, &[
            "#password",
            "input[name='session_password']",
            "input[type='password']",
        ]);
        s.put(Legacy, Field::LoginSubmit, vec![
            Locator::css("button[data-litms-control-urn='login-submit']"),
            Locator::css("button.sign-in-form__submit-button"),
            Locator::css("button[type='submit']").with_text_containing("Sign in"),
            Locator::css("button[type='submit']"),
        ]);
        s.css(Legacy, Field::LoginError, &[
            "#error-for-password",
            "#error-for-username",
            ".form__label--error",
            ".alert-content",
        ]);
        s.css(Legacy, Field::AuthenticatedMarker, &[
            "#global-nav",
            ".global-nav__me",
            "img.global-nav__me-photo",
        ]);

        // Unified top card
        s.css(Unified, Field::ResultCard, &[
            "li.scaffold-layout__list-item",
            "div.job-card-job-posting-card-wrapper",
        ]);
        s.css(Unified, Field::Title, &[
            ".job-details-jobs-unified-top-card__job-title h1",
            ".job-details-jobs-unified-top-card__job-title",
            ".job-card-job-posting-card-wrapper__title",
        ]);
        s.css(Unified, Field::Company, &[
            ".job-details-jobs-unified-top-card__company-name a",
            ".job-details-jobs-unified-top-card__company-name",
            ".artdeco-entity-lockup__subtitle",
        ]);
        s.css(Unified, Field::Location, &[
            ".job-details-jobs-unified-top-card__primary-description-container .tvm__text",
            ".job-details-jobs-unified-top-card__tertiary-description-container span",
        ]);
        s.css(Unified, Field::DescriptionRich, &[
            ".jobs-description__content .jobs-box__html-content",
            "#job-details",
        ]);
        s.css(Unified, Field::Insights, &[
            ".job-details-fit-level-preferences button",
            ".job-details-jobs-unified-top-card__job-insight",
        ]);

        // Semantic (data-view-name)
        s.css(Semantic, Field::ResultsContainer, &["[data-view-name='job-search-job-list']"]);
        s.css(Semantic, Field::ResultCard, &["[data-view-name='job-card']"]);
        s.css(Semantic, Field::CardLink, &["a[data-view-name='job-card-link']"]);
        s.css(Semantic, Field::NoResults, &["[data-view-name='job-search-no-results']"]);
        s.css(Semantic, Field::DetailPane, &["[data-view-name='job-details']"]);
        s.css(Semantic, Field::Title, &[
            "[data-view-name='job-details-title']",
            "[data-view-name='job-card-title']",
        ]);
        s.css(Semantic, Field::Company, &[
            "[data-view-name='job-details-company-name']",
            "a[data-view-name='job-details-about-company-name-link']",
            "[data-view-name='job-card-company-name']",
        ]);
        s.css(Semantic, Field::Location, &[
            "[data-view-name='job-details-location']",
            "[data-view-name='job-card-location']",
        ]);
        s.css(Semantic, Field::DescriptionRich, &[
            "[data-view-name='job-details-about-the-job']",
            "[data-testid='expandable-text-box']",
        ]);
        s.css(Semantic, Field::Salary, &["[data-view-name='job-details-salary']"]);
        s.css(Semantic, Field::Insights, &["[data-view-name='job-details-job-insight']"]);
        s.css(Semantic, Field::ApplyButton, &["button[data-view-name='job-apply-button']"]);
        s.css(Semantic, Field::ExternalApplyLink, &["a[data-view-name='job-apply-button']"]);
        for kind in ALL_FILTERS {
            s.put(Semantic, Field::FilterTrigger(kind), vec![
                Locator::css("button[data-view-name='search-filter-top-bar-select']")
                    .with_exact_text(kind.trigger_label()),
            ]);
        }
        s.css(Semantic, Field::FilterPanel, &["[data-view-name='search-filter-panel']"]);
        s.css(Semantic, Field::FilterOption, &["[data-view-name='search-filter-option'] label"]);
        s.css(Semantic, Field::AuthenticatedMarker, &[
            "[data-view-name='navigation-homepage']",
            "[data-view-name='navigation-settings']",
        ]);

        // Guest (public pages, guest API fragments)
        s.css(Guest, Field::ResultsContainer, &[
            "ul.jobs-search__results-list",
            "section.two-pane-serp-page__results-list",
        ]);
        s.css(Guest, Field::ResultCard, &["div.base-card", "div.job-search-card"]);
        s.css(Guest, Field::CardLink, &[
            "a.base-card__full-link",
            "a.base-search-card__full-link",
        ]);
        s.css(Guest, Field::NoResults, &["section.no-results", ".no-results"]);
        s.css(Guest, Field::Title, &[
            "h1.top-card-layout__title",
            "h2.top-card-layout__title",
            ".topcard__title",
            "h3.base-search-card__title",
        ]);
        s.css(Guest, Field::Company, &[
            "a.topcard__org-name-link",
            ".top-card-layout__second-subline .topcard__flavor",
            "h4.base-search-card__subtitle",
        ]);
        s.css(Guest, Field::Location, &[
            ".topcard__flavor--bullet",
            "span.job-search-card__location",
        ]);
        s.css(Guest, Field::DescriptionRich, &[
            ".show-more-less-html__markup",
            ".description__text",
        ]);
        s.css(Guest, Field::DescriptionSummary, &[
            ".base-search-card__snippet",
            ".job-search-card__snippet",
        ]);
        s.css(Guest, Field::Salary, &[
            ".compensation__salary-range",
            ".salary.compensation__salary",
            "span.job-search-card__salary-info",
        ]);
        s.css(Guest, Field::Insights, &[
            ".description__job-criteria-item",
            ".job-search-card__benefits",
        ]);
        s.css(Guest, Field::PostedDate, &[
            "time.job-search-card__listdate",
            "time.job-search-card__listdate--new",
            "span.posted-time-ago__text",
        ]);
        s.css(Guest, Field::ApplyButton, &[
            "button.sign-up-modal__outlet",
            ".top-card-layout__cta-container button",
        ]);
        s.css(Guest, Field::ExternalApplyLink, &[
            "a[data-tracking-control-name='public_jobs_apply-link-offsite']",
            "a.apply-button",
            "code#applyUrl",
        ]);
        s.css(Guest, Field::ListingId, &["[data-entity-urn]", "[data-job-id]"]);

        s
    }

    fn css(&mut self, generation: InterfaceGeneration, field: Field, selectors: &[&str]) {
        self.put(
            generation,
            field,
            selectors.iter().map(|s| Locator::css(*s)).collect(),
        );
    }

    fn put(&mut self, generation: InterfaceGeneration, field: Field, locators: Vec<Locator>) {
        self.chains.insert((generation, field), locators);
    }
}

/// Log a field none of whose selectors matched.
pub fn log_drift(generation: InterfaceGeneration, field: Field, chain: &[Locator]) {
    let tried: Vec<String> = chain.iter().map(|l| l.to_string()).collect();
    warn!(
        "Interface drift: no selector matched {} (generation {}); tried [{}]",
        field.name(),
        generation,
        tried.join(", ")
    );
}

const ALL_FILTERS: [FilterKind; 7] = [
    FilterKind::DatePosted,
    FilterKind::WorkArrangement,
    FilterKind::ExperienceLevel,
    FilterKind::JobType,
    FilterKind::Salary,
    FilterKind::Company,
    FilterKind::Industry,
];

fn filter_dom_id(kind: FilterKind) -> &'static str {
    match kind {
        FilterKind::DatePosted => "timePostedRange",
        FilterKind::WorkArrangement => "workplaceType",
        FilterKind::ExperienceLevel => "experience",
        FilterKind::JobType => "jobType",
        FilterKind::Salary => "salaryBucketV2",
        FilterKind::Company => "company",
        FilterKind::Industry => "industry",
    }
}

fn legacy_trigger(kind: FilterKind) -> Vec<Locator> {
    let label = kind.trigger_label();
    vec![
        Locator::css(format!("button#searchFilter_{}", filter_dom_id(kind))),
        Locator::css("button.search-reusables__filter-pill-button").with_exact_text(label),
        Locator::css("button").with_aria_containing(format!("{} filter", label)),
        Locator::css("button").with_text_containing(label),
    ]
}
