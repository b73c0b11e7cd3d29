//! Candidate profile and resume snapshots fed to qualification scoring.

use serde::{Deserialize, Serialize};

use super::listing::WorkArrangement;
use super::search::{ExperienceLevel, JobType};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Education {
    #[serde(default)]
    pub degree: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub institution: Option<String>,
}

/// What the candidate states about themselves.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CandidateProfile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub years_experience: Option<f32>,
    #[serde(default)]
    pub experience_level: Option<ExperienceLevel>,
    #[serde(default)]
    pub education: Vec<Education>,
    #[serde(default)]
    pub preferred_work_arrangements: Vec<WorkArrangement>,
    #[serde(default)]
    pub preferred_locations: Vec<String>,
    #[serde(default)]
    pub preferred_job_types: Vec<JobType>,
    #[serde(default)]
    pub min_salary: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResumeRole {
    pub title: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub years: Option<f32>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Skills and experience derived from an already-parsed resume.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResumeSnapshot {
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub years_experience: Option<f32>,
    #[serde(default)]
    pub roles: Vec<ResumeRole>,
    #[serde(default)]
    pub education: Vec<Education>,
    /// Plain resume text, truncated before it is sent anywhere.
    #[serde(default)]
    pub text: Option<String>,
}

impl ResumeSnapshot {
    /// A resume with nothing in it does not count as available.
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
            && self.roles.is_empty()
            && self.education.is_empty()
            && self.years_experience.is_none()
            && self.text.as_deref().map_or(true, |t| t.trim().is_empty())
    }
}
