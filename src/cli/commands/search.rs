//! Search command: run a search and stream listings to a JSON lines file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use console::style;
use indicatif::ProgressBar;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tracing::warn;

use super::analyze::{print_batch_report, spawn_progress};
use super::helpers::{
    analyzer, captcha_gate, default_output, load_document, open_output, progress_bar,
    session_manager,
};
use crate::config::{Config, Settings};
use crate::models::{CandidateProfile, JobListing, ResumeSnapshot, SearchParameters};
use crate::scrapers::{
    plan, BrowserLauncher, GuestSearchClient, JobSearchRunner, PageDriver, SearchRunReport,
    SearchStrategy, SelectorStrategy,
};
use crate::services::{
    BatchEvent, BatchReport, JsonLinesSink, ListingSink, QualificationBatch, ScoredListing,
};

pub struct SearchOptions {
    pub params: SearchParameters,
    pub session: Option<String>,
    pub output: Option<PathBuf>,
    pub analyze: bool,
    pub profile: Option<PathBuf>,
    pub resume: Option<PathBuf>,
    pub headless: bool,
}

type Sink = JsonLinesSink<Box<dyn AsyncWrite + Unpin + Send>>;

/// Write listings as they arrive, scoring them first when a batch is given.
async fn consume(
    mut rx: mpsc::Receiver<JobListing>,
    batch: Option<&QualificationBatch>,
    sink: &mut Sink,
    progress: ProgressBar,
    events: Option<mpsc::Sender<BatchEvent>>,
) -> std::io::Result<Option<BatchReport>> {
    match batch {
        Some(batch) => {
            let listings = futures::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|listing| (listing, rx))
            });
            batch.run(listings, sink, events).await.map(Some)
        }
        None => {
            while let Some(listing) = rx.recv().await {
                progress.set_message(listing.display_name());
                sink.accept(&ScoredListing {
                    listing,
                    analysis: None,
                })
                .await?;
                progress.inc(1);
            }
            progress.finish_and_clear();
            Ok(None)
        }
    }
}

fn print_report(report: &SearchRunReport, written: usize, output: &Path) {
    println!(
        "{} {} search: {} listings ({} duplicates, {} discarded, {} pages)",
        if report.succeeded() {
            style("✓").green()
        } else {
            style("!").yellow()
        },
        report.strategy,
        report.emitted,
        report.duplicates,
        report.discarded,
        report.pages_visited
    );
    if let Some(generation) = report.generation {
        println!("  {} interface: {}", style("·").dim(), generation);
    }
    if let Some(ref filters) = report.filters {
        let failed = filters.failed();
        if failed.is_empty() {
            println!("  {} all {} filters verified", style("·").dim(), filters.outcomes.len());
        } else {
            let names: Vec<&str> = failed.iter().map(|f| f.as_str()).collect();
            println!(
                "  {} filters not applied: {}",
                style("!").yellow(),
                names.join(", ")
            );
        }
    }
    if report.detail_errors > 0 {
        println!(
            "  {} {} detail views failed; those listings carry card data only",
            style("!").yellow(),
            report.detail_errors
        );
    }
    if report.drift_events > 0 {
        println!(
            "  {} {} selector misses; the page layout may have changed",
            style("!").yellow(),
            report.drift_events
        );
    }
    for challenge in &report.challenges {
        println!(
            "  {} challenge: {} ({})",
            style("!").yellow(),
            challenge.challenge_type,
            challenge.indicator
        );
    }
    if let Some(ref failure) = report.failure {
        println!(
            "  {} stopped ({}): {}",
            style("✗").red(),
            failure.kind,
            failure.message
        );
    }
    if output != Path::new("-") {
        println!("  {} {} written to {}", style("→").cyan(), written, output.display());
    }
}

pub async fn cmd_search(
    settings: &Settings,
    config: &Config,
    options: SearchOptions,
) -> anyhow::Result<()> {
    settings.ensure_directories()?;

    let decision = plan(&options.params);
    println!(
        "{} Searching {:?} via {} ({})",
        style("→").cyan(),
        options.params.query(),
        decision.strategy,
        decision.reason
    );

    let batch = if options.analyze {
        let Some(ref profile) = options.profile else {
            anyhow::bail!("--analyze needs --profile");
        };
        let profile: CandidateProfile = load_document(profile)?;
        let resume: Option<ResumeSnapshot> =
            options.resume.as_deref().map(load_document).transpose()?;
        Some(
            QualificationBatch::new(analyzer(config)?, profile, resume)
                .with_concurrency(settings.analysis_concurrency),
        )
    } else {
        None
    };

    let selectors = SelectorStrategy::default();
    let gate = captcha_gate(config, &selectors);
    let guest = GuestSearchClient::new(
        config.scrape.clone(),
        selectors.clone(),
        config.browser.user_agent.as_deref(),
    )?;
    let runner = JobSearchRunner::new(config.scrape.clone(), selectors, gate, Arc::new(guest));

    let mut manager = session_manager(settings, config);
    if let Some(ref id) = options.session {
        if !manager.load_session(id).await? {
            println!(
                "{} Session {} is unknown or expired; continuing without it",
                style("!").yellow(),
                id
            );
        }
    }

    let page: Option<Box<dyn PageDriver>> = if decision.strategy == SearchStrategy::FullAutomation
    {
        let mut browser = config.browser.clone();
        browser.headless |= options.headless;
        let page = BrowserLauncher::new(browser).open_page().await?;
        if manager.active().is_some() {
            manager.attach(page.as_ref()).await?;
        }
        Some(page)
    } else {
        None
    };

    let output = options
        .output
        .clone()
        .unwrap_or_else(|| default_output(settings));
    let mut sink = JsonLinesSink::new(open_output(Some(&output)).await?);

    let progress = progress_bar(None, "Searching...");
    let (event_tx, event_handler) = match batch {
        Some(_) => {
            let (tx, rx) = mpsc::channel::<BatchEvent>(100);
            (Some(tx), Some(spawn_progress(rx, progress.clone())))
        }
        None => (None, None),
    };

    let (tx, rx) = mpsc::channel::<JobListing>(64);
    let (report, consumed) = tokio::join!(
        runner.run(&options.params, manager.active(), page.as_deref(), tx),
        consume(rx, batch.as_ref(), &mut sink, progress.clone(), event_tx),
    );
    if let Some(handler) = event_handler {
        let _ = handler.await;
    }
    progress.finish_and_clear();
    let batch_report = consumed?;

    if manager.active().is_some() && !report.challenges.is_empty() {
        if let Err(e) = manager
            .record_challenges(&report.challenges, report.unresolved_challenge())
            .await
        {
            warn!("Failed to record challenge outcome on session: {}", e);
        }
    }

    if let Some(page) = page.as_deref() {
        if manager.active().is_some() {
            if let Err(e) = manager.capture(page).await {
                warn!("Failed to store browser state: {}", e);
            }
        }
    }

    print_report(&report, sink.written(), &output);
    if let Some(ref batch_report) = batch_report {
        print_batch_report(batch_report);
    }
    if let Some(ref failure) = report.failure {
        if report.emitted == 0 {
            anyhow::bail!("search failed: {}", failure.message);
        }
    }
    Ok(())
}
