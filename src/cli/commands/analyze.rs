//! Qualification scoring of stored listings.

use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::Context;
use console::style;
use indicatif::ProgressBar;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use super::helpers::{analyzer, load_document, open_output, progress_bar, truncate};
use crate::config::{Config, Settings};
use crate::models::{CandidateProfile, JobListing, ResumeSnapshot};
use crate::services::{BatchEvent, BatchReport, JsonLinesSink, QualificationBatch};

/// Read listings, one JSON object per line. Unparseable lines are skipped.
fn read_listings(path: &Path) -> anyhow::Result<Vec<JobListing>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut listings = Vec::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        // Search output wraps each listing; bare listings are accepted too.
        let value: serde_json::Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                warn!("Skipping line {}: {}", n + 1, e);
                continue;
            }
        };
        let inner = value.get("listing").cloned().unwrap_or(value);
        match serde_json::from_value::<JobListing>(inner) {
            Ok(listing) => listings.push(listing),
            Err(e) => warn!("Skipping line {}: {}", n + 1, e),
        }
    }
    Ok(listings)
}

/// Drive a progress bar from batch events.
pub(super) fn spawn_progress(
    mut event_rx: mpsc::Receiver<BatchEvent>,
    progress: ProgressBar,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                BatchEvent::ListingStarted { title } => {
                    progress.set_message(truncate(&title, 50));
                }
                BatchEvent::Scored { title, score } => {
                    progress.suspend(|| {
                        println!(
                            "  {} {:>3} {}",
                            style("✓").green(),
                            score,
                            truncate(&title, 60)
                        );
                    });
                    progress.inc(1);
                }
                BatchEvent::Unscored { title } => {
                    progress.suspend(|| {
                        println!("  {} unscored {}", style("✗").red(), truncate(&title, 60));
                    });
                    progress.inc(1);
                }
                BatchEvent::Skipped { .. } => progress.inc(1),
                BatchEvent::Exhausted { until } => {
                    progress.suspend(|| {
                        println!(
                            "{} Daily quota exhausted until {}; remaining listings are written unscored",
                            style("!").yellow(),
                            until.format("%Y-%m-%d %H:%M")
                        );
                    });
                }
            }
        }
        progress.finish_and_clear();
    })
}

pub(super) fn print_batch_report(report: &BatchReport) {
    println!(
        "{} Scored {} of {} listings",
        style("✓").green(),
        report.analyzed,
        report.total()
    );
    if report.unscored > 0 {
        println!("  {} {} could not be scored", style("!").yellow(), report.unscored);
    }
    if let Some(until) = report.exhausted_until {
        println!(
            "  {} {} skipped; quota resets {}",
            style("!").yellow(),
            report.skipped_after_exhaustion,
            until.format("%Y-%m-%d %H:%M")
        );
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn cmd_analyze(
    settings: &Settings,
    config: &Config,
    input: &Path,
    profile: &Path,
    resume: Option<&Path>,
    output: Option<&Path>,
    workers: Option<usize>,
    limit: usize,
) -> anyhow::Result<()> {
    let profile: CandidateProfile = load_document(profile)?;
    let resume: Option<ResumeSnapshot> = resume.map(load_document).transpose()?;

    let mut listings = read_listings(input)?;
    if limit > 0 {
        listings.truncate(limit);
    }
    if listings.is_empty() {
        println!("{} No listings in {}", style("!").yellow(), input.display());
        return Ok(());
    }

    let workers = workers.unwrap_or(settings.analysis_concurrency);
    println!(
        "{} Scoring {} listings with {} ({} workers)",
        style("→").cyan(),
        listings.len(),
        config.llm.provider.as_str(),
        workers
    );

    let batch = QualificationBatch::new(analyzer(config)?, profile, resume).with_concurrency(workers);
    let mut sink = JsonLinesSink::new(open_output(output).await?);

    let (event_tx, event_rx) = mpsc::channel::<BatchEvent>(100);
    let progress = progress_bar(Some(listings.len() as u64), "Scoring...");
    let event_handler = spawn_progress(event_rx, progress);

    let report = batch
        .run(futures::stream::iter(listings), &mut sink, Some(event_tx))
        .await?;
    let _ = event_handler.await;

    print_batch_report(&report);
    Ok(())
}
