//! Structured job listings produced by extraction.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::search::{ExperienceLevel, JobType};

/// Where the work happens. Closed set; free text is normalized into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkArrangement {
    OnSite,
    Remote,
    Hybrid,
}

impl WorkArrangement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnSite => "on_site",
            Self::Remote => "remote",
            Self::Hybrid => "hybrid",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::OnSite => "On-site",
            Self::Remote => "Remote",
            Self::Hybrid => "Hybrid",
        }
    }

    /// Keyword normalization of free text.
    ///
    /// Hybrid is checked first: "Hybrid (2 days remote)" is hybrid, not remote.
    pub fn from_text(text: &str) -> Option<Self> {
        let lower = text.to_lowercase();
        if lower.contains("hybrid") {
            Some(Self::Hybrid)
        } else if lower.contains("on-site")
            || lower.contains("onsite")
            || lower.contains("on site")
            || lower.contains("in-office")
            || lower.contains("in office")
        {
            Some(Self::OnSite)
        } else if lower.contains("remote") || lower.contains("work from home") {
            Some(Self::Remote)
        } else {
            None
        }
    }

    /// Arrangement stated as its own segment of a job title, as in
    /// "Rust Engineer (Remote)" or "SRE - Hybrid". Words inside the role
    /// name ("Remote Sensing Analyst") do not count.
    pub fn from_title(title: &str) -> Option<Self> {
        title
            .split(['(', ')', '[', ']', '|', ',', '/', '·', '–'])
            .flat_map(|part| part.split(" - "))
            .map(|part| part.trim().to_lowercase())
            .find_map(|part| match part.as_str() {
                "remote" | "fully remote" | "100% remote" | "remote first" | "remote-first"
                | "work from home" => Some(Self::Remote),
                "hybrid" => Some(Self::Hybrid),
                "on-site" | "onsite" | "on site" | "in office" | "in-office" => Some(Self::OnSite),
                _ => None,
            })
    }
}

impl fmt::Display for WorkArrangement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for WorkArrangement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_text(s).ok_or_else(|| format!("unknown work arrangement: {}", s))
    }
}

/// Pay period of a salary figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalaryPeriod {
    Hour,
    Month,
    Year,
}

/// Salary range as advertised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalaryRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// ISO 4217 code when the symbol is recognized.
    pub currency: Option<String>,
    pub period: Option<SalaryPeriod>,
}

/// How the candidate applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyKind {
    /// In-platform flow; there is no external URL.
    QuickApply,
    /// Applying happens on the employer's site.
    External,
    /// The apply control was not found.
    #[default]
    Unknown,
}

/// A job listing extracted from one result card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobListing {
    /// Identifier assigned by the site.
    pub listing_id: Option<String>,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub job_type: Option<JobType>,
    pub experience_level: Option<ExperienceLevel>,
    pub work_arrangement: Option<WorkArrangement>,
    pub salary: Option<SalaryRange>,
    pub posted_date: Option<NaiveDate>,
    /// External application URL; `None` for quick apply.
    pub application_url: Option<String>,
    #[serde(default)]
    pub apply_kind: ApplyKind,
    /// Canonical link to the posting on the site.
    pub listing_url: Option<String>,
    pub extracted_at: DateTime<Utc>,
}

impl JobListing {
    /// Create a listing; `None` when title or company is blank.
    pub fn new(title: impl Into<String>, company: impl Into<String>) -> Option<Self> {
        let title = title.into().trim().to_string();
        let company = company.into().trim().to_string();
        if title.is_empty() || company.is_empty() {
            return None;
        }
        Some(Self {
            listing_id: None,
            title,
            company,
            location: None,
            description: None,
            job_type: None,
            experience_level: None,
            work_arrangement: None,
            salary: None,
            posted_date: None,
            application_url: None,
            apply_kind: ApplyKind::Unknown,
            listing_url: None,
            extracted_at: Utc::now(),
        })
    }

    pub fn is_quick_apply(&self) -> bool {
        self.apply_kind == ApplyKind::QuickApply
    }

    /// Short label for logs.
    pub fn display_name(&self) -> String {
        format!("{} at {}", self.title, self.company)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_blank_fields() {
        assert!(JobListing::new("  ", "Acme").is_none());
        assert!(JobListing::new("Engineer", "").is_none());
        let listing = JobListing::new(" Engineer ", "Acme").unwrap();
        assert_eq!(listing.title, "Engineer");
        assert_eq!(listing.apply_kind, ApplyKind::Unknown);
    }

    #[test]
    fn test_work_arrangement_normalization() {
        assert_eq!(
            WorkArrangement::from_text("Hybrid (remote 2 days)"),
            Some(WorkArrangement::Hybrid)
        );
        assert_eq!(
            WorkArrangement::from_text("Fully REMOTE"),
            Some(WorkArrangement::Remote)
        );
        assert_eq!(
            WorkArrangement::from_text("On-site"),
            Some(WorkArrangement::OnSite)
        );
        assert_eq!(WorkArrangement::from_text("Berlin, Germany"), None);
    }
}
