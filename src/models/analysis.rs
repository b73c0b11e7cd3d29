//! Qualification analysis request/response types.
//!
//! `AnalysisResponse` has no public constructor: the only way to obtain one is
//! through payload validation in `crate::analysis::validation`.

use serde::{Deserialize, Serialize};

use super::listing::JobListing;
use super::profile::{CandidateProfile, ResumeSnapshot};

/// Lowest score bucketed as highly qualified.
pub const HIGHLY_QUALIFIED_MIN: u8 = 85;
/// Lowest score bucketed as qualified.
pub const QUALIFIED_MIN: u8 = 70;
/// Lowest score bucketed as somewhat qualified.
pub const SOMEWHAT_QUALIFIED_MIN: u8 = 55;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualificationStatus {
    HighlyQualified,
    Qualified,
    SomewhatQualified,
    NotQualified,
}

impl QualificationStatus {
    pub fn from_score(score: u8) -> Self {
        if score >= HIGHLY_QUALIFIED_MIN {
            Self::HighlyQualified
        } else if score >= QUALIFIED_MIN {
            Self::Qualified
        } else if score >= SOMEWHAT_QUALIFIED_MIN {
            Self::SomewhatQualified
        } else {
            Self::NotQualified
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HighlyQualified => "highly_qualified",
            Self::Qualified => "qualified",
            Self::SomewhatQualified => "somewhat_qualified",
            Self::NotQualified => "not_qualified",
        }
    }
}

/// Which weighting table produced the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMethod {
    /// 70% resume signal, 30% profile signal.
    ResumeWeighted,
    /// 100% profile signal.
    ProfileOnly,
}

impl ScoringMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResumeWeighted => "resume_weighted",
            Self::ProfileOnly => "profile_only",
        }
    }

    /// Components of this method, in prompt order. Weights sum to 100.
    pub fn components(&self) -> &'static [ScoreComponent] {
        match self {
            Self::ResumeWeighted => &RESUME_COMPONENTS,
            Self::ProfileOnly => &PROFILE_COMPONENTS,
        }
    }
}

const RESUME_COMPONENTS: [ScoreComponent; 8] = [
    ScoreComponent::SkillsMatch,
    ScoreComponent::ExperienceRelevance,
    ScoreComponent::YearsMatch,
    ScoreComponent::Education,
    ScoreComponent::ProfileCrossCheck,
    ScoreComponent::ExperienceLevelMatch,
    ScoreComponent::WorkArrangementFit,
    ScoreComponent::LocationSalaryFit,
];

const PROFILE_COMPONENTS: [ScoreComponent; 4] = [
    ScoreComponent::Skills,
    ScoreComponent::ExperienceLevelYears,
    ScoreComponent::EducationField,
    ScoreComponent::Preferences,
];

/// Named sub-component of a qualification score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreComponent {
    // Resume-weighted: the first four are resume signal (70),
    // the last four profile signal (30).
    SkillsMatch,
    ExperienceRelevance,
    YearsMatch,
    Education,
    ProfileCrossCheck,
    ExperienceLevelMatch,
    WorkArrangementFit,
    LocationSalaryFit,
    // Profile-only.
    Skills,
    ExperienceLevelYears,
    EducationField,
    Preferences,
}

impl ScoreComponent {
    /// Key used in the service's JSON payload.
    pub fn key(&self) -> &'static str {
        match self {
            Self::SkillsMatch => "skills_match",
            Self::ExperienceRelevance => "experience_relevance",
            Self::YearsMatch => "years_match",
            Self::Education => "education",
            Self::ProfileCrossCheck => "profile_cross_check",
            Self::ExperienceLevelMatch => "experience_level_match",
            Self::WorkArrangementFit => "work_arrangement_fit",
            Self::LocationSalaryFit => "location_salary_fit",
            Self::Skills => "skills",
            Self::ExperienceLevelYears => "experience_level_years",
            Self::EducationField => "education_field",
            Self::Preferences => "preferences",
        }
    }

    /// Maximum points this component contributes.
    pub fn weight(&self) -> u8 {
        match self {
            Self::SkillsMatch => 25,
            Self::ExperienceRelevance => 20,
            Self::YearsMatch => 15,
            Self::Education => 10,
            Self::ProfileCrossCheck => 10,
            Self::ExperienceLevelMatch => 8,
            Self::WorkArrangementFit => 6,
            Self::LocationSalaryFit => 6,
            Self::Skills => 40,
            Self::ExperienceLevelYears => 30,
            Self::EducationField => 15,
            Self::Preferences => 15,
        }
    }
}

/// Points earned on one component (0..=weight).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComponentScore {
    pub component: ScoreComponent,
    pub points: f32,
}

/// Everything the scoring service sees about one job. Immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRequest {
    job: JobListing,
    profile: CandidateProfile,
    resume: Option<ResumeSnapshot>,
    has_resume: bool,
}

impl AnalysisRequest {
    /// Build a request. An empty resume counts as no resume.
    pub fn new(
        job: JobListing,
        profile: CandidateProfile,
        resume: Option<ResumeSnapshot>,
    ) -> Self {
        let resume = resume.filter(|r| !r.is_empty());
        let has_resume = resume.is_some();
        Self {
            job,
            profile,
            resume,
            has_resume,
        }
    }

    pub fn job(&self) -> &JobListing {
        &self.job
    }

    pub fn into_job(self) -> JobListing {
        self.job
    }

    pub fn profile(&self) -> &CandidateProfile {
        &self.profile
    }

    pub fn resume(&self) -> Option<&ResumeSnapshot> {
        self.resume.as_ref()
    }

    pub fn has_resume(&self) -> bool {
        self.has_resume
    }

    /// Weighting table implied by resume availability.
    pub fn scoring_method(&self) -> ScoringMethod {
        if self.has_resume {
            ScoringMethod::ResumeWeighted
        } else {
            ScoringMethod::ProfileOnly
        }
    }
}

/// A validated qualification result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResponse {
    qualification_score: u8,
    status: QualificationStatus,
    confidence: u8,
    matched_skills: Vec<String>,
    missing_skills: Vec<String>,
    recommendations: Vec<String>,
    components: Vec<ComponentScore>,
    scoring_method: ScoringMethod,
    ai_reasoning: String,
}

impl AnalysisResponse {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_validated(
        qualification_score: u8,
        confidence: u8,
        matched_skills: Vec<String>,
        missing_skills: Vec<String>,
        recommendations: Vec<String>,
        components: Vec<ComponentScore>,
        scoring_method: ScoringMethod,
        ai_reasoning: String,
    ) -> Self {
        Self {
            qualification_score,
            status: QualificationStatus::from_score(qualification_score),
            confidence,
            matched_skills,
            missing_skills,
            recommendations,
            components,
            scoring_method,
            ai_reasoning,
        }
    }

    pub fn qualification_score(&self) -> u8 {
        self.qualification_score
    }

    pub fn status(&self) -> QualificationStatus {
        self.status
    }

    pub fn confidence(&self) -> u8 {
        self.confidence
    }

    pub fn matched_skills(&self) -> &[String] {
        &self.matched_skills
    }

    pub fn missing_skills(&self) -> &[String] {
        &self.missing_skills
    }

    pub fn recommendations(&self) -> &[String] {
        &self.recommendations
    }

    pub fn components(&self) -> &[ComponentScore] {
        &self.components
    }

    pub fn scoring_method(&self) -> ScoringMethod {
        self.scoring_method
    }

    pub fn ai_reasoning(&self) -> &str {
        &self.ai_reasoning
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weight_sum(method: ScoringMethod) -> u32 {
        method
            .components()
            .iter()
            .map(|c| c.weight() as u32)
            .sum()
    }

    #[test]
    fn test_weights_sum_to_100() {
        assert_eq!(weight_sum(ScoringMethod::ResumeWeighted), 100);
        assert_eq!(weight_sum(ScoringMethod::ProfileOnly), 100);
    }

    #[test]
    fn test_resume_split_is_70_30() {
        let components = ScoringMethod::ResumeWeighted.components();
        let resume: u32 = components[..4].iter().map(|c| c.weight() as u32).sum();
        let profile: u32 = components[4..].iter().map(|c| c.weight() as u32).sum();
        assert_eq!(resume, 70);
        assert_eq!(profile, 30);
    }

    #[test]
    fn test_status_buckets() {
        assert_eq!(
            QualificationStatus::from_score(100),
            QualificationStatus::HighlyQualified
        );
        assert_eq!(
            QualificationStatus::from_score(85),
            QualificationStatus::HighlyQualified
        );
        assert_eq!(
            QualificationStatus::from_score(84),
            QualificationStatus::Qualified
        );
        assert_eq!(
            QualificationStatus::from_score(70),
            QualificationStatus::Qualified
        );
        assert_eq!(
            QualificationStatus::from_score(69),
            QualificationStatus::SomewhatQualified
        );
        assert_eq!(
            QualificationStatus::from_score(55),
            QualificationStatus::SomewhatQualified
        );
        assert_eq!(
            QualificationStatus::from_score(54),
            QualificationStatus::NotQualified
        );
        assert_eq!(
            QualificationStatus::from_score(0),
            QualificationStatus::NotQualified
        );
    }

    #[test]
    fn test_empty_resume_is_profile_only() {
        let job = JobListing::new("Engineer", "Acme").unwrap();
        let req = AnalysisRequest::new(
            job,
            CandidateProfile::default(),
            Some(ResumeSnapshot::default()),
        );
        assert!(!req.has_resume());
        assert_eq!(req.scoring_method(), ScoringMethod::ProfileOnly);
    }
}
