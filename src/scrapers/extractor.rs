//! Structured listing extraction from result cards and detail views.
//!
//! Every field is read through its selector chain; the first non-empty,
//! cleaned match wins. Extraction works on parsed documents only and never
//! awaits, so `scraper::Html` stays on one thread.

use std::sync::LazyLock;

use chrono::{Duration, NaiveDate, Utc};
use regex::Regex;
use scraper::{ElementRef, Html};
use tracing::debug;

use super::selectors::{log_drift, Field, InterfaceGeneration, SelectorStrategy};
use crate::models::{
    ApplyKind, ExperienceLevel, JobListing, JobType, SalaryPeriod, SalaryRange, WorkArrangement,
};
use crate::utils::{clean_text, normalize_whitespace};

static SALARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)([$€£])\s?(\d[\d,]*(?:\.\d+)?)\s*(k)?(?:\s*/\s*(yr|year|hr|hour|mo|month))?(?:\s*[-–]\s*[$€£]?\s?(\d[\d,]*(?:\.\d+)?)\s*(k)?)?(?:\s*/\s*(yr|year|hr|hour|mo|month))?",
    )
    .expect("valid salary regex")
});

static RELATIVE_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s+(minute|hour|day|week|month|year)s?\s+ago")
        .expect("valid relative date regex")
});

static WINDOW_OPEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"window\.open\(\s*['"]([^'"]+)['"]"#).expect("valid window.open regex")
});

static JOB_VIEW_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/jobs/view/(?:[^/?#]*-)?(\d{6,})|currentJobId=(\d{6,})")
        .expect("valid job id regex")
});

/// Fields pulled from one scope (a card or a detail view).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFields {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub description_rich: Option<String>,
    pub description_summary: Option<String>,
    pub salary_text: Option<String>,
    pub insights: Vec<String>,
    pub posted_date: Option<NaiveDate>,
    pub apply: Option<(ApplyKind, Option<String>)>,
    pub listing_id: Option<String>,
    pub listing_url: Option<String>,
}

/// Result of one extraction, with the fields no selector found.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub listing: Option<JobListing>,
    pub drifted: Vec<Field>,
}

pub struct JobExtractor {
    selectors: SelectorStrategy,
    base_url: String,
}

impl JobExtractor {
    pub fn new(selectors: SelectorStrategy, base_url: impl Into<String>) -> Self {
        Self {
            selectors,
            base_url: base_url.into(),
        }
    }

    /// Result cards in a parsed results page, via the first card selector
    /// that matches anything.
    pub fn cards<'a>(&self, html: &'a Html, generation: InterfaceGeneration) -> Vec<ElementRef<'a>> {
        let chain = self.selectors.chain(generation, Field::ResultCard);
        for locator in &chain {
            let found = locator.select(html);
            if !found.is_empty() {
                return found;
            }
        }
        debug!("No result cards under generation {}", generation);
        Vec::new()
    }

    /// Build a listing from one card. `None` when title or company is missing.
    pub fn extract_from_card(
        &self,
        card: ElementRef<'_>,
        generation: InterfaceGeneration,
    ) -> Option<JobListing> {
        self.extract(card, generation).listing
    }

    pub fn extract(&self, scope: ElementRef<'_>, generation: InterfaceGeneration) -> Extracted {
        let (raw, drifted) = self.read_fields(scope, generation);
        let listing = build_listing(raw, Utc::now().date_naive());
        Extracted { listing, drifted }
    }

    /// Fill gaps in `listing` from its detail view.
    ///
    /// The rich description replaces a card summary. Other fields only fill
    /// what the card left empty.
    pub fn enrich(
        &self,
        listing: &mut JobListing,
        detail: ElementRef<'_>,
        generation: InterfaceGeneration,
    ) -> Vec<Field> {
        let (raw, drifted) = self.read_fields(detail, generation);
        if let Some(rich) = raw.description_rich.clone() {
            listing.description = Some(rich);
        } else if listing.description.is_none() {
            listing.description = raw.description_summary.clone();
        }
        if listing.location.is_none() {
            listing.location = raw.location.as_deref().map(primary_location);
        }
        if listing.salary.is_none() {
            listing.salary = raw
                .salary_text
                .as_deref()
                .or_else(|| raw.insights.iter().find(|i| SALARY.is_match(i)).map(|s| s.as_str()))
                .and_then(parse_salary);
        }
        let facets = classify(&raw);
        listing.work_arrangement = listing.work_arrangement.or(facets.0);
        listing.job_type = listing.job_type.or(facets.1);
        listing.experience_level = listing.experience_level.or(facets.2);
        if listing.posted_date.is_none() {
            listing.posted_date = raw.posted_date;
        }
        if let Some((kind, url)) = raw.apply {
            if listing.apply_kind == ApplyKind::Unknown || url.is_some() {
                listing.apply_kind = kind;
                listing.application_url = url;
            }
        }
        if listing.listing_id.is_none() {
            listing.listing_id = raw.listing_id;
        }
        drifted
    }

    fn read_fields(
        &self,
        scope: ElementRef<'_>,
        generation: InterfaceGeneration,
    ) -> (RawFields, Vec<Field>) {
        let mut drifted = Vec::new();
        let mut text = |field: Field, required: bool| {
            let value = self.first_text(scope, generation, field);
            if value.is_none() {
                if required {
                    log_drift(generation, field, &self.selectors.chain(generation, field));
                } else {
                    debug!("No {} in scope (generation {})", field.name(), generation);
                }
                drifted.push(field);
            }
            value
        };

        let title = text(Field::Title, true);
        let company = text(Field::Company, true);
        let location = text(Field::Location, false);
        let salary_text = text(Field::Salary, false);

        let raw = RawFields {
            title,
            company,
            location,
            description_rich: self.block_text(scope, generation, Field::DescriptionRich),
            description_summary: self.first_text(scope, generation, Field::DescriptionSummary),
            salary_text,
            insights: self.all_texts(scope, generation, Field::Insights),
            posted_date: self.posted_date(scope, generation, Utc::now().date_naive()),
            apply: self.apply_target(scope, generation),
            listing_id: self.listing_id(scope, generation),
            listing_url: self.listing_url(scope, generation),
        };
        (raw, drifted)
    }

    fn first_text(
        &self,
        scope: ElementRef<'_>,
        generation: InterfaceGeneration,
        field: Field,
    ) -> Option<String> {
        self.selectors
            .chain(generation, field)
            .iter()
            .flat_map(|locator| locator.select_in(scope))
            .find_map(|el| clean_text(&el.text().collect::<Vec<_>>().join(" ")))
    }

    fn all_texts(
        &self,
        scope: ElementRef<'_>,
        generation: InterfaceGeneration,
        field: Field,
    ) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for locator in self.selectors.chain(generation, field) {
            for el in locator.select_in(scope) {
                if let Some(text) = clean_text(&el.text().collect::<Vec<_>>().join(" ")) {
                    if !out.contains(&text) {
                        out.push(text);
                    }
                }
            }
        }
        out
    }

    /// Paragraph-preserving text of the first matching container.
    fn block_text(
        &self,
        scope: ElementRef<'_>,
        generation: InterfaceGeneration,
        field: Field,
    ) -> Option<String> {
        self.selectors
            .chain(generation, field)
            .iter()
            .flat_map(|locator| locator.select_in(scope))
            .find_map(|el| {
                let lines: Vec<String> = el
                    .text()
                    .filter_map(clean_text)
                    .collect();
                (!lines.is_empty()).then(|| lines.join("\n"))
            })
    }

    fn posted_date(
        &self,
        scope: ElementRef<'_>,
        generation: InterfaceGeneration,
        today: NaiveDate,
    ) -> Option<NaiveDate> {
        self.selectors
            .chain(generation, Field::PostedDate)
            .iter()
            .flat_map(|locator| locator.select_in(scope))
            .find_map(|el| {
                el.value()
                    .attr("datetime")
                    .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok())
                    .or_else(|| parse_relative_date(&el.text().collect::<String>(), today))
            })
    }

    /// Quick apply, or external apply with its URL. `None` when no control
    /// says which, so a listing never claims external apply without a URL.
    fn apply_target(
        &self,
        scope: ElementRef<'_>,
        generation: InterfaceGeneration,
    ) -> Option<(ApplyKind, Option<String>)> {
        for locator in self.selectors.chain(generation, Field::ExternalApplyLink) {
            for el in locator.select_in(scope) {
                if let Some(url) = self.element_target(el) {
                    return Some((ApplyKind::External, Some(url)));
                }
            }
        }
        for locator in self.selectors.chain(generation, Field::ApplyButton) {
            if let Some(el) = locator.select_in(scope).into_iter().next() {
                let label = format!(
                    "{} {}",
                    el.text().collect::<String>(),
                    el.value().attr("aria-label").unwrap_or_default()
                )
                .to_lowercase();
                if label.contains("easy apply") || label.contains("quick apply") {
                    return Some((ApplyKind::QuickApply, None));
                }
                if let Some(url) = self.element_target(el) {
                    return Some((ApplyKind::External, Some(url)));
                }
                debug!("Apply control without a target or quick-apply label");
            }
        }
        None
    }

    /// Navigable URL of an element: `href`, a `window.open` handler or a
    /// `data-apply-url` attribute. Redirect wrappers are unwrapped.
    fn element_target(&self, el: ElementRef<'_>) -> Option<String> {
        let attrs = el.value();
        let raw = attrs
            .attr("href")
            .filter(|h| !h.trim().is_empty() && !h.starts_with('#') && !h.starts_with("javascript:"))
            .map(str::to_string)
            .or_else(|| {
                attrs
                    .attr("onclick")
                    .and_then(|js| WINDOW_OPEN.captures(js))
                    .map(|c| c[1].to_string())
            })
            .or_else(|| attrs.attr("data-apply-url").map(str::to_string))?;
        let absolute = self.absolutize(&raw)?;
        Some(unwrap_redirect(&absolute))
    }

    fn listing_id(&self, scope: ElementRef<'_>, generation: InterfaceGeneration) -> Option<String> {
        let from_attrs = |el: ElementRef<'_>| {
            ["data-job-id", "data-occludable-job-id", "data-entity-urn"]
                .iter()
                .find_map(|attr| el.value().attr(attr))
                .and_then(id_from_attr)
        };
        if let Some(id) = from_attrs(scope) {
            return Some(id);
        }
        for locator in self.selectors.chain(generation, Field::ListingId) {
            if let Some(id) = locator.select_in(scope).into_iter().find_map(from_attrs) {
                return Some(id);
            }
        }
        self.selectors
            .chain(generation, Field::CardLink)
            .iter()
            .flat_map(|l| l.select_in(scope))
            .filter_map(|el| el.value().attr("href"))
            .find_map(id_from_url)
    }

    fn listing_url(&self, scope: ElementRef<'_>, generation: InterfaceGeneration) -> Option<String> {
        self.selectors
            .chain(generation, Field::CardLink)
            .iter()
            .flat_map(|l| l.select_in(scope))
            .filter_map(|el| el.value().attr("href"))
            .find_map(|href| {
                let mut url = url::Url::parse(&self.absolutize(href)?).ok()?;
                url.set_query(None);
                url.set_fragment(None);
                Some(url.to_string())
            })
    }

    fn absolutize(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if let Ok(url) = url::Url::parse(href) {
            return Some(url.to_string());
        }
        let base = url::Url::parse(&self.base_url).ok()?;
        base.join(href).ok().map(|u| u.to_string())
    }
}

/// Turn raw fields into a listing; `None` without title and company.
pub fn build_listing(raw: RawFields, today: NaiveDate) -> Option<JobListing> {
    let mut listing = JobListing::new(raw.title.clone()?, raw.company.clone()?)?;
    let (arrangement, job_type, level) = classify(&raw);
    listing.location = raw.location.as_deref().map(primary_location);
    listing.description = raw.description_rich.or(raw.description_summary);
    listing.salary = raw
        .salary_text
        .as_deref()
        .or_else(|| raw.insights.iter().find(|i| SALARY.is_match(i)).map(|s| s.as_str()))
        .and_then(parse_salary);
    listing.work_arrangement = arrangement;
    listing.job_type = job_type;
    listing.experience_level = level;
    listing.posted_date = raw.posted_date.filter(|d| *d <= today);
    if let Some((kind, url)) = raw.apply {
        listing.apply_kind = kind;
        listing.application_url = url;
    }
    listing.listing_id = raw.listing_id;
    listing.listing_url = raw.listing_url;
    Some(listing)
}

/// Work arrangement, job type and level from insights, then location and title.
fn classify(
    raw: &RawFields,
) -> (Option<WorkArrangement>, Option<JobType>, Option<ExperienceLevel>) {
    let arrangement = raw
        .insights
        .iter()
        .map(String::as_str)
        .chain(raw.location.as_deref())
        .find_map(WorkArrangement::from_text)
        .or_else(|| raw.title.as_deref().and_then(WorkArrangement::from_title));
    let job_type = raw.insights.iter().find_map(|s| JobType::from_text(s));
    let level = raw
        .insights
        .iter()
        .find_map(|s| ExperienceLevel::from_text(s));
    (arrangement, job_type, level)
}

/// "Berlin, Germany · 3 days ago · 40 applicants" -> "Berlin, Germany"
fn primary_location(text: &str) -> String {
    let head = text.split(['·', '•']).next().unwrap_or(text);
    let head = head.split(" (").next().unwrap_or(head);
    normalize_whitespace(head)
}

pub fn parse_salary(text: &str) -> Option<SalaryRange> {
    let caps = SALARY.captures(text)?;
    let amount = |value: Option<regex::Match<'_>>, thousands: Option<regex::Match<'_>>| {
        let n: f64 = value?.as_str().replace(',', "").parse().ok()?;
        Some(if thousands.is_some() { n * 1000.0 } else { n })
    };
    let min = amount(caps.get(2), caps.get(3));
    let max = amount(caps.get(5), caps.get(6).or(caps.get(3)));
    let currency = match caps.get(1).map(|m| m.as_str()) {
        Some("$") => Some("USD".to_string()),
        Some("€") => Some("EUR".to_string()),
        Some("£") => Some("GBP".to_string()),
        _ => None,
    };
    let period = match caps
        .get(7)
        .or(caps.get(4))
        .map(|m| m.as_str().to_lowercase())
        .as_deref()
    {
        Some("yr") | Some("year") => Some(SalaryPeriod::Year),
        Some("hr") | Some("hour") => Some(SalaryPeriod::Hour),
        Some("mo") | Some("month") => Some(SalaryPeriod::Month),
        _ if min.is_some_and(|m| m >= 10_000.0) => Some(SalaryPeriod::Year),
        _ => None,
    };
    Some(SalaryRange {
        min,
        max,
        currency,
        period,
    })
}

/// "3 days ago", "1 week ago", "Just now" relative to `today`.
pub fn parse_relative_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let lower = text.trim().to_lowercase();
    if lower.contains("just now") || lower.contains("today") {
        return Some(today);
    }
    if lower.contains("yesterday") {
        return today.checked_sub_signed(Duration::days(1));
    }
    let caps = RELATIVE_DATE.captures(&lower)?;
    let n: i64 = caps[1].parse().ok()?;
    let days = match &caps[2] {
        "minute" | "hour" => 0,
        "day" => n,
        "week" => n * 7,
        "month" => n * 30,
        _ => n * 365,
    };
    today.checked_sub_signed(Duration::days(days))
}

fn id_from_attr(value: &str) -> Option<String> {
    let tail = value.rsplit(':').next().unwrap_or(value).trim();
    (!tail.is_empty() && tail.chars().all(|c| c.is_ascii_digit())).then(|| tail.to_string())
}

fn id_from_url(href: &str) -> Option<String> {
    let caps = JOB_VIEW_ID.captures(href)?;
    caps.get(1).or(caps.get(2)).map(|m| m.as_str().to_string())
}

/// Unwrap `...redirect?url=<encoded>` style links.
fn unwrap_redirect(url: &str) -> String {
    let Ok(parsed) = url::Url::parse(url) else {
        return url.to_string();
    };
    if !parsed.path().contains("redir") {
        return url.to_string();
    }
    parsed
        .query_pairs()
        .find(|(k, _)| k == "url")
        .and_then(|(_, v)| {
            let target = v.into_owned();
            // Some wrappers encode the target twice.
            let target = if target.contains("%3A") || target.contains("%2F") {
                urlencoding::decode(&target).map(|d| d.into_owned()).unwrap_or(target)
            } else {
                target
            };
            target.starts_with("http").then_some(target)
        })
        .unwrap_or_else(|| url.to_string())
}
