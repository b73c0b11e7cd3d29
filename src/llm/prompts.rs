//! Qualification prompt construction.

use std::fmt::Write as _;

use crate::models::{AnalysisRequest, ScoringMethod};
use crate::utils::truncate_chars;

const PREAMBLE: &str = r#"You are a hiring analyst. Score how well the candidate fits the job below.

Score each component on its own scale (0 up to the component's weight), then set
qualification_score to the sum of the component scores (0-100). Be strict: a
missing required skill must lower skills scores, and years of experience outside
the job's range must lower the years score."#;

const RESPONSE_CONTRACT: &str = r#"Respond with ONLY a JSON object with exactly these fields:
{
  "qualification_score": <integer 0-100>,
  "confidence": <integer 1-100, how sure you are of the score>,
  "matched_skills": [<strings>],
  "missing_skills": [<strings>],
  "recommendations": [<strings, concrete steps for the candidate>],
  "component_scores": {<component key>: <number between 0 and its weight>},
  "ai_reasoning": "<two or three sentences explaining the score>"
}"#;

/// Build the scoring prompt for one request.
pub fn build_qualification_prompt(request: &AnalysisRequest, max_content_chars: usize) -> String {
    let method = request.scoring_method();
    let mut prompt = String::with_capacity(4096);

    prompt.push_str(PREAMBLE);
    prompt.push_str("\n\n");

    match method {
        ScoringMethod::ResumeWeighted => prompt.push_str(
            "A resume is available. Weighting: 70% resume evidence, 30% profile evidence.\n",
        ),
        ScoringMethod::ProfileOnly => prompt.push_str(
            "No resume is available. Weighting: 100% profile evidence.\n",
        ),
    }
    prompt.push_str("Components (key: weight):\n");
    for component in method.components() {
        let _ = writeln!(prompt, "- {}: {}", component.key(), component.weight());
    }

    prompt.push_str("\n## Job\n");
    write_job(&mut prompt, request, max_content_chars);

    prompt.push_str("\n## Candidate profile\n");
    write_profile(&mut prompt, request);

    if let Some(resume) = request.resume() {
        prompt.push_str("\n## Resume\n");
        if !resume.skills.is_empty() {
            let _ = writeln!(prompt, "Skills: {}", resume.skills.join(", "));
        }
        if let Some(years) = resume.years_experience {
            let _ = writeln!(prompt, "Years of experience: {}", years);
        }
        for role in &resume.roles {
            let _ = write!(prompt, "Role: {}", role.title);
            if let Some(company) = &role.company {
                let _ = write!(prompt, " at {}", company);
            }
            if let Some(years) = role.years {
                let _ = write!(prompt, " ({} years)", years);
            }
            prompt.push('\n');
            if let Some(summary) = &role.summary {
                let _ = writeln!(prompt, "  {}", summary);
            }
        }
        for edu in &resume.education {
            write_education(&mut prompt, edu);
        }
        if let Some(text) = &resume.text {
            let _ = writeln!(prompt, "Resume text:\n{}", truncate_chars(text, max_content_chars));
        }
    }

    prompt.push('\n');
    prompt.push_str(RESPONSE_CONTRACT);
    prompt
}

fn write_job(prompt: &mut String, request: &AnalysisRequest, max_content_chars: usize) {
    let job = request.job();
    let _ = writeln!(prompt, "Title: {}", job.title);
    let _ = writeln!(prompt, "Company: {}", job.company);
    if let Some(location) = &job.location {
        let _ = writeln!(prompt, "Location: {}", location);
    }
    if let Some(arrangement) = job.work_arrangement {
        let _ = writeln!(prompt, "Work arrangement: {}", arrangement.label());
    }
    if let Some(level) = job.experience_level {
        let _ = writeln!(prompt, "Experience level: {}", level.label());
    }
    if let Some(job_type) = job.job_type {
        let _ = writeln!(prompt, "Job type: {}", job_type.label());
    }
    if let Some(salary) = &job.salary {
        let _ = writeln!(
            prompt,
            "Salary: {} - {} {}",
            salary.min.map(|v| v.to_string()).unwrap_or_else(|| "?".into()),
            salary.max.map(|v| v.to_string()).unwrap_or_else(|| "?".into()),
            salary.currency.as_deref().unwrap_or("")
        );
    }
    if let Some(description) = &job.description {
        let _ = writeln!(
            prompt,
            "Description:\n{}",
            truncate_chars(description, max_content_chars)
        );
    }
}

fn write_profile(prompt: &mut String, request: &AnalysisRequest) {
    let profile = request.profile();
    if let Some(headline) = &profile.headline {
        let _ = writeln!(prompt, "Headline: {}", headline);
    }
    if !profile.skills.is_empty() {
        let _ = writeln!(prompt, "Skills: {}", profile.skills.join(", "));
    }
    if let Some(years) = profile.years_experience {
        let _ = writeln!(prompt, "Years of experience: {}", years);
    }
    if let Some(level) = profile.experience_level {
        let _ = writeln!(prompt, "Experience level: {}", level.label());
    }
    for edu in &profile.education {
        write_education(prompt, edu);
    }
    if !profile.preferred_work_arrangements.is_empty() {
        let labels: Vec<&str> = profile
            .preferred_work_arrangements
            .iter()
            .map(|w| w.label())
            .collect();
        let _ = writeln!(prompt, "Preferred arrangements: {}", labels.join(", "));
    }
    if !profile.preferred_locations.is_empty() {
        let _ = writeln!(
            prompt,
            "Preferred locations: {}",
            profile.preferred_locations.join(", ")
        );
    }
    if !profile.preferred_job_types.is_empty() {
        let labels: Vec<&str> = profile
            .preferred_job_types
            .iter()
            .map(|j| j.label())
            .collect();
        let _ = writeln!(prompt, "Preferred job types: {}", labels.join(", "));
    }
    if let Some(min) = profile.min_salary {
        let _ = writeln!(prompt, "Minimum salary: {}", min);
    }
}

fn write_education(prompt: &mut String, edu: &crate::models::Education) {
    let parts: Vec<&str> = [&edu.degree, &edu.field, &edu.institution]
        .into_iter()
        .filter_map(|p| p.as_deref())
        .collect();
    if !parts.is_empty() {
        let _ = writeln!(prompt, "Education: {}", parts.join(", "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CandidateProfile, JobListing, ResumeSnapshot};

    #[test]
    fn test_profile_only_prompt_lists_four_components() {
        let job = JobListing::new("Backend Engineer", "Acme").unwrap();
        let profile = CandidateProfile {
            skills: vec!["Python".to_string()],
            years_experience: Some(3.0),
            ..Default::default()
        };
        let prompt = build_qualification_prompt(&AnalysisRequest::new(job, profile, None), 1000);
        assert!(prompt.contains("100% profile evidence"));
        assert!(prompt.contains("- experience_level_years: 30"));
        assert!(!prompt.contains("skills_match"));
        assert!(prompt.contains("\"ai_reasoning\""));
    }

    #[test]
    fn test_resume_prompt_truncates_text() {
        let job = JobListing::new("Backend Engineer", "Acme").unwrap();
        let resume = ResumeSnapshot {
            text: Some("x".repeat(500)),
            ..Default::default()
        };
        let prompt = build_qualification_prompt(
            &AnalysisRequest::new(job, CandidateProfile::default(), Some(resume)),
            100,
        );
        assert!(prompt.contains("- skills_match: 25"));
        assert!(!prompt.contains(&"x".repeat(101)));
    }
}
