//! Shared helper functions for CLI commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use serde::de::DeserializeOwned;
use tokio::io::{AsyncWrite, BufWriter};

use crate::analysis::QualificationAnalyzer;
use crate::config::{Config, Settings};
use crate::llm::build_scoring_service;
use crate::quota::QuotaManager;
use crate::scrapers::{CaptchaGate, FileSessionStore, SelectorStrategy, SessionManager};

/// Truncate a string to `max` characters, adding an ellipsis.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

/// Read a profile or resume file; the format follows the extension.
pub fn load_document<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
    let value = match ext {
        "toml" => toml::from_str(&contents)?,
        "yaml" | "yml" => serde_yaml::from_str(&contents)?,
        _ => serde_json::from_str(&contents)?,
    };
    Ok(value)
}

/// Output target: a file, or stdout for `-`/None.
pub async fn open_output(
    path: Option<&Path>,
) -> anyhow::Result<Box<dyn AsyncWrite + Unpin + Send>> {
    match path {
        Some(p) if p != Path::new("-") => {
            if let Some(parent) = p.parent().filter(|d| !d.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            let file = tokio::fs::File::create(p)
                .await
                .with_context(|| format!("Failed to create {}", p.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        _ => Ok(Box::new(tokio::io::stdout())),
    }
}

/// Default timestamped results file.
pub fn default_output(settings: &Settings) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    settings.output_dir.join(format!("search-{}.jsonl", stamp))
}

pub fn session_manager(settings: &Settings, config: &Config) -> SessionManager {
    let store = Arc::new(FileSessionStore::new(settings.sessions_dir.clone()));
    SessionManager::new(store, &config.session).with_scrape_config(&config.scrape)
}

pub fn captcha_gate(config: &Config, selectors: &SelectorStrategy) -> CaptchaGate {
    CaptchaGate::new(&config.captcha, selectors)
}

pub fn analyzer(config: &Config) -> anyhow::Result<Arc<QualificationAnalyzer>> {
    let service = build_scoring_service(&config.llm)?;
    let quota = Arc::new(QuotaManager::new(config.quota.clone()));
    Ok(Arc::new(
        QualificationAnalyzer::new(service, quota)
            .with_max_content_chars(config.llm.max_content_chars),
    ))
}

pub fn progress_bar(len: Option<u64>, message: &str) -> ProgressBar {
    let bar = match len {
        Some(n) => ProgressBar::new(n),
        None => ProgressBar::new_spinner(),
    };
    let template = if len.is_some() {
        "{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}"
    } else {
        "{spinner:.green} {pos} {wide_msg}"
    };
    if let Ok(style) = ProgressStyle::default_bar().template(template) {
        bar.set_style(style.progress_chars("█▓░"));
    }
    bar.set_message(message.to_string());
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a much longer title", 10), "a much ...");
    }

    #[tokio::test]
    async fn test_open_output_creates_parent_dirs() {
        use crate::models::JobListing;
        use crate::services::{JsonLinesSink, ListingSink, ScoredListing};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs").join("search.jsonl");
        let mut sink = JsonLinesSink::new(open_output(Some(&path)).await.unwrap());
        for title in ["Rust Engineer", "Data Engineer"] {
            let item = ScoredListing {
                listing: JobListing::new(title, "Acme").unwrap(),
                analysis: None,
            };
            sink.accept(&item).await.unwrap();
        }
        assert_eq!(sink.written(), 2);

        let written = tokio::fs::read_to_string(&path).await.unwrap();
        let titles: Vec<String> = written
            .lines()
            .map(|line| {
                let value: serde_json::Value = serde_json::from_str(line).unwrap();
                value["listing"]["title"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(titles, ["Rust Engineer", "Data Engineer"]);
    }

    #[test]
    fn test_load_document_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.yaml");
        std::fs::write(&path, "skills: [rust, sql]\nyears_experience: 6\n").unwrap();
        let profile: crate::models::CandidateProfile = load_document(&path).unwrap();
        assert_eq!(profile.skills, vec!["rust", "sql"]);
        assert_eq!(profile.years_experience, Some(6.0));
    }
}
