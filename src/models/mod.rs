//! Data models for jobscout.

mod analysis;
mod listing;
mod profile;
mod search;
mod session;

pub use analysis::{
    AnalysisRequest, AnalysisResponse, ComponentScore, QualificationStatus, ScoreComponent,
    ScoringMethod, HIGHLY_QUALIFIED_MIN, QUALIFIED_MIN, SOMEWHAT_QUALIFIED_MIN,
};
pub use listing::{ApplyKind, JobListing, SalaryPeriod, SalaryRange, WorkArrangement};
pub use profile::{CandidateProfile, Education, ResumeRole, ResumeSnapshot};
pub use search::{
    DateWindow, ExperienceLevel, FilterKind, JobType, SalaryBounds, SearchParameters,
};
pub use session::{AuthState, ScrapingSession, SessionMetadata};
