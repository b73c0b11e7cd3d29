//! Choosing between the lightweight and full-automation search paths.

use std::fmt;

use serde::Serialize;

use crate::models::SearchParameters;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    /// Plain HTTP fetch of public listing pages.
    Lightweight,
    /// Browser session driving the search UI.
    FullAutomation,
}

impl SearchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lightweight => "lightweight",
            Self::FullAutomation => "full_automation",
        }
    }
}

impl fmt::Display for SearchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchPlan {
    pub strategy: SearchStrategy,
    pub reason: String,
}

/// Keywords and location alone can be served without a browser; any other
/// filter needs the search UI.
pub fn plan(params: &SearchParameters) -> SearchPlan {
    let filters = params.active_filters();
    if filters.is_empty() {
        return SearchPlan {
            strategy: SearchStrategy::Lightweight,
            reason: "only keywords and location are set".to_string(),
        };
    }
    let names: Vec<&str> = filters.iter().map(|f| f.as_str()).collect();
    SearchPlan {
        strategy: SearchStrategy::FullAutomation,
        reason: format!("filters require the search UI: {}", names.join(", ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        DateWindow, ExperienceLevel, JobType, SalaryBounds, WorkArrangement,
    };

    fn base() -> SearchParameters {
        SearchParameters::new(["rust", "backend"]).with_location("Berlin")
    }

    #[test]
    fn test_keywords_and_location_only() {
        assert_eq!(plan(&base()).strategy, SearchStrategy::Lightweight);
        assert_eq!(
            plan(&SearchParameters::new(["rust"])).strategy,
            SearchStrategy::Lightweight
        );
        assert_eq!(
            plan(&SearchParameters::default()).strategy,
            SearchStrategy::Lightweight
        );
    }

    #[test]
    fn test_each_filter_forces_full_automation() {
        let variants = [
            base().with_date_window(DateWindow::PastWeek),
            base().with_work_arrangement(WorkArrangement::Remote),
            base().with_experience_level(ExperienceLevel::MidSenior),
            base().with_job_type(JobType::FullTime),
            base().with_salary(SalaryBounds {
                min: Some(90_000),
                max: None,
            }),
            base().with_company("Acme"),
            base().with_industry("Software Development"),
        ];
        for params in variants {
            let decision = plan(&params);
            assert_eq!(decision.strategy, SearchStrategy::FullAutomation, "{:?}", params);
            assert!(decision.reason.contains("filters require"));
        }
    }

    #[test]
    fn test_empty_salary_bounds_do_not_count() {
        let params = base().with_salary(SalaryBounds::default());
        assert_eq!(plan(&params).strategy, SearchStrategy::Lightweight);
    }
}
