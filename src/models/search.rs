//! Search parameters and the closed vocabularies used by search filters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::listing::WorkArrangement;

/// Posting age window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateWindow {
    PastDay,
    PastWeek,
    PastMonth,
}

impl DateWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PastDay => "past_day",
            Self::PastWeek => "past_week",
            Self::PastMonth => "past_month",
        }
    }

    /// Label shown on the filter option.
    pub fn label(&self) -> &'static str {
        match self {
            Self::PastDay => "Past 24 hours",
            Self::PastWeek => "Past week",
            Self::PastMonth => "Past month",
        }
    }
}

impl FromStr for DateWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "past_day" | "day" | "24h" | "past_24_hours" => Ok(Self::PastDay),
            "past_week" | "week" => Ok(Self::PastWeek),
            "past_month" | "month" => Ok(Self::PastMonth),
            other => Err(format!("unknown date window: {}", other)),
        }
    }
}

/// Seniority bucket used by the site's experience filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceLevel {
    Internship,
    EntryLevel,
    Associate,
    MidSenior,
    Director,
    Executive,
}

impl ExperienceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Internship => "internship",
            Self::EntryLevel => "entry_level",
            Self::Associate => "associate",
            Self::MidSenior => "mid_senior",
            Self::Director => "director",
            Self::Executive => "executive",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Internship => "Internship",
            Self::EntryLevel => "Entry level",
            Self::Associate => "Associate",
            Self::MidSenior => "Mid-Senior level",
            Self::Director => "Director",
            Self::Executive => "Executive",
        }
    }

    /// Normalize free text ("Mid-Senior level", "entry-level") into a level.
    pub fn from_text(text: &str) -> Option<Self> {
        let lower = text.to_lowercase();
        if lower.contains("mid-senior") || lower.contains("mid senior") || lower.contains("senior")
        {
            Some(Self::MidSenior)
        } else if lower.contains("entry") || lower.contains("junior") {
            Some(Self::EntryLevel)
        } else if lower.contains("associate") {
            Some(Self::Associate)
        } else if lower.contains("director") {
            Some(Self::Director)
        } else if lower.contains("executive") {
            Some(Self::Executive)
        } else if lower.contains("internship") || lower.contains("intern ") {
            Some(Self::Internship)
        } else {
            None
        }
    }
}

impl FromStr for ExperienceLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "internship" | "intern" => Ok(Self::Internship),
            "entry_level" | "entry" | "junior" => Ok(Self::EntryLevel),
            "associate" => Ok(Self::Associate),
            "mid_senior" | "mid_senior_level" | "senior" => Ok(Self::MidSenior),
            "director" => Ok(Self::Director),
            "executive" => Ok(Self::Executive),
            other => Err(format!("unknown experience level: {}", other)),
        }
    }
}

/// Employment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    FullTime,
    PartTime,
    Contract,
    Temporary,
    Internship,
    Volunteer,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FullTime => "full_time",
            Self::PartTime => "part_time",
            Self::Contract => "contract",
            Self::Temporary => "temporary",
            Self::Internship => "internship",
            Self::Volunteer => "volunteer",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::FullTime => "Full-time",
            Self::PartTime => "Part-time",
            Self::Contract => "Contract",
            Self::Temporary => "Temporary",
            Self::Internship => "Internship",
            Self::Volunteer => "Volunteer",
        }
    }

    pub fn from_text(text: &str) -> Option<Self> {
        let lower = text.to_lowercase();
        if lower.contains("full-time") || lower.contains("full time") {
            Some(Self::FullTime)
        } else if lower.contains("part-time") || lower.contains("part time") {
            Some(Self::PartTime)
        } else if lower.contains("contract") {
            Some(Self::Contract)
        } else if lower.contains("temporary") {
            Some(Self::Temporary)
        } else if lower.contains("internship") {
            Some(Self::Internship)
        } else if lower.contains("volunteer") {
            Some(Self::Volunteer)
        } else {
            None
        }
    }
}

impl FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "full_time" | "fulltime" => Ok(Self::FullTime),
            "part_time" | "parttime" => Ok(Self::PartTime),
            "contract" => Ok(Self::Contract),
            "temporary" | "temp" => Ok(Self::Temporary),
            "internship" => Ok(Self::Internship),
            "volunteer" => Ok(Self::Volunteer),
            other => Err(format!("unknown job type: {}", other)),
        }
    }
}

/// Annual salary constraint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SalaryBounds {
    #[serde(default)]
    pub min: Option<u32>,
    #[serde(default)]
    pub max: Option<u32>,
}

impl SalaryBounds {
    pub fn is_set(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }
}

/// The filters the site exposes through its search UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    DatePosted,
    WorkArrangement,
    ExperienceLevel,
    JobType,
    Salary,
    Company,
    Industry,
}

impl FilterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DatePosted => "date_posted",
            Self::WorkArrangement => "work_arrangement",
            Self::ExperienceLevel => "experience_level",
            Self::JobType => "job_type",
            Self::Salary => "salary",
            Self::Company => "company",
            Self::Industry => "industry",
        }
    }

    /// Text on the filter's trigger pill.
    pub fn trigger_label(&self) -> &'static str {
        match self {
            Self::DatePosted => "Date posted",
            Self::WorkArrangement => "Remote",
            Self::ExperienceLevel => "Experience level",
            Self::JobType => "Job type",
            Self::Salary => "Salary",
            Self::Company => "Company",
            Self::Industry => "Industry",
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Salary brackets offered by the salary filter, ascending.
const SALARY_BRACKETS: &[u32] = &[
    40_000, 60_000, 80_000, 100_000, 120_000, 140_000, 160_000, 180_000, 200_000,
];

/// Parameters for one search run.
///
/// A run borrows its parameters immutably for its whole duration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchParameters {
    /// Ordered keyword list; joined with spaces for the query.
    pub keywords: Vec<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub date_window: Option<DateWindow>,
    #[serde(default)]
    pub work_arrangements: Vec<WorkArrangement>,
    #[serde(default)]
    pub experience_levels: Vec<ExperienceLevel>,
    #[serde(default)]
    pub job_types: Vec<JobType>,
    #[serde(default)]
    pub salary: Option<SalaryBounds>,
    #[serde(default)]
    pub companies: Vec<String>,
    #[serde(default)]
    pub industries: Vec<String>,
}

impl SearchParameters {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_date_window(mut self, window: DateWindow) -> Self {
        self.date_window = Some(window);
        self
    }

    pub fn with_work_arrangement(mut self, arrangement: WorkArrangement) -> Self {
        self.work_arrangements.push(arrangement);
        self
    }

    pub fn with_experience_level(mut self, level: ExperienceLevel) -> Self {
        self.experience_levels.push(level);
        self
    }

    pub fn with_job_type(mut self, job_type: JobType) -> Self {
        self.job_types.push(job_type);
        self
    }

    pub fn with_salary(mut self, bounds: SalaryBounds) -> Self {
        self.salary = Some(bounds);
        self
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.companies.push(company.into());
        self
    }

    pub fn with_industry(mut self, industry: impl Into<String>) -> Self {
        self.industries.push(industry.into());
        self
    }

    /// Keywords joined into a single query string.
    pub fn query(&self) -> String {
        self.keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Filters beyond keywords and location, in application order.
    pub fn active_filters(&self) -> Vec<FilterKind> {
        let mut filters = Vec::new();
        if self.date_window.is_some() {
            filters.push(FilterKind::DatePosted);
        }
        if !self.work_arrangements.is_empty() {
            filters.push(FilterKind::WorkArrangement);
        }
        if !self.experience_levels.is_empty() {
            filters.push(FilterKind::ExperienceLevel);
        }
        if !self.job_types.is_empty() {
            filters.push(FilterKind::JobType);
        }
        if self.salary.as_ref().is_some_and(SalaryBounds::is_set) {
            filters.push(FilterKind::Salary);
        }
        if !self.companies.is_empty() {
            filters.push(FilterKind::Company);
        }
        if !self.industries.is_empty() {
            filters.push(FilterKind::Industry);
        }
        filters
    }

    /// Option labels to select inside a filter's panel.
    pub fn option_labels(&self, kind: FilterKind) -> Vec<String> {
        match kind {
            FilterKind::DatePosted => self
                .date_window
                .iter()
                .map(|w| w.label().to_string())
                .collect(),
            FilterKind::WorkArrangement => self
                .work_arrangements
                .iter()
                .map(|w| w.label().to_string())
                .collect(),
            FilterKind::ExperienceLevel => self
                .experience_levels
                .iter()
                .map(|l| l.label().to_string())
                .collect(),
            FilterKind::JobType => self
                .job_types
                .iter()
                .map(|t| t.label().to_string())
                .collect(),
            FilterKind::Salary => self
                .salary
                .as_ref()
                .and_then(|b| b.min)
                .and_then(salary_bracket_label)
                .into_iter()
                .collect(),
            FilterKind::Company => self.companies.clone(),
            FilterKind::Industry => self.industries.clone(),
        }
    }
}

/// Largest offered bracket not above `min`, formatted like "$80,000+".
fn salary_bracket_label(min: u32) -> Option<String> {
    let bracket = SALARY_BRACKETS.iter().rev().find(|b| **b <= min)?;
    let thousands = bracket / 1000;
    Some(format!("${},000+", thousands))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_joins_keywords() {
        let params = SearchParameters::new(["rust", " ", "backend "]);
        assert_eq!(params.query(), "rust backend");
    }

    #[test]
    fn test_active_filters_order() {
        let params = SearchParameters::new(["rust"])
            .with_company("Acme")
            .with_date_window(DateWindow::PastWeek)
            .with_job_type(JobType::Contract);
        assert_eq!(
            params.active_filters(),
            vec![
                FilterKind::DatePosted,
                FilterKind::JobType,
                FilterKind::Company
            ]
        );
    }

    #[test]
    fn test_empty_salary_bounds_is_not_a_filter() {
        let params = SearchParameters::new(["rust"]).with_salary(SalaryBounds::default());
        assert!(params.active_filters().is_empty());
    }

    #[test]
    fn test_salary_bracket_label() {
        assert_eq!(salary_bracket_label(95_000).as_deref(), Some("$80,000+"));
        assert_eq!(salary_bracket_label(250_000).as_deref(), Some("$200,000+"));
        assert_eq!(salary_bracket_label(30_000), None);
    }

    #[test]
    fn test_experience_level_from_text() {
        assert_eq!(
            ExperienceLevel::from_text("Mid-Senior level"),
            Some(ExperienceLevel::MidSenior)
        );
        assert_eq!(
            ExperienceLevel::from_text("Entry level"),
            Some(ExperienceLevel::EntryLevel)
        );
        assert_eq!(ExperienceLevel::from_text("Full-time"), None);
    }

    #[test]
    fn test_from_str_variants() {
        assert_eq!("past-week".parse::<DateWindow>(), Ok(DateWindow::PastWeek));
        assert_eq!("full time".parse::<JobType>(), Ok(JobType::FullTime));
        assert!("sometimes".parse::<JobType>().is_err());
    }
}
