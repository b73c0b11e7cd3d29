//! Qualification batches: score a stream of listings under one quota.
//!
//! Separated from UI concerns - emits events for progress tracking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::analysis::QualificationAnalyzer;
use crate::models::{AnalysisRequest, AnalysisResponse, CandidateProfile, JobListing, ResumeSnapshot};

/// Events emitted while a batch runs.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    ListingStarted { title: String },
    Scored { title: String, score: u8 },
    Unscored { title: String },
    /// No call was made: the daily budget is spent.
    Skipped { title: String },
    Exhausted { until: DateTime<Local> },
}

/// Totals for one batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub analyzed: usize,
    pub unscored: usize,
    pub skipped_after_exhaustion: usize,
    pub exhausted_until: Option<DateTime<Local>>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.analyzed + self.unscored + self.skipped_after_exhaustion
    }
}

/// A listing with its analysis, if any.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredListing {
    pub listing: JobListing,
    pub analysis: Option<AnalysisResponse>,
}

/// Where batch results go.
#[async_trait]
pub trait ListingSink: Send {
    async fn accept(&mut self, item: &ScoredListing) -> std::io::Result<()>;
}

/// Writes one JSON object per line, flushing after each so partial runs
/// still leave a readable file.
pub struct JsonLinesSink<W: AsyncWrite + Unpin + Send> {
    out: W,
    written: usize,
}

impl<W: AsyncWrite + Unpin + Send> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, written: 0 }
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> ListingSink for JsonLinesSink<W> {
    async fn accept(&mut self, item: &ScoredListing) -> std::io::Result<()> {
        let mut line = serde_json::to_vec(item)?;
        line.push(b'\n');
        self.out.write_all(&line).await?;
        self.out.flush().await?;
        self.written += 1;
        Ok(())
    }
}

enum Outcome {
    Scored(AnalysisResponse),
    Unscored,
    Skipped,
}

/// Scores listings with bounded concurrency.
///
/// All analyses share the analyzer's quota manager. After a daily
/// exhaustion no further calls are issued; remaining listings still reach
/// the sink, unscored.
pub struct QualificationBatch {
    analyzer: Arc<QualificationAnalyzer>,
    profile: CandidateProfile,
    resume: Option<ResumeSnapshot>,
    concurrency: usize,
    stopped: AtomicBool,
    exhausted_until: Mutex<Option<DateTime<Local>>>,
}

impl QualificationBatch {
    pub fn new(
        analyzer: Arc<QualificationAnalyzer>,
        profile: CandidateProfile,
        resume: Option<ResumeSnapshot>,
    ) -> Self {
        Self {
            analyzer,
            profile,
            resume,
            concurrency: 2,
            stopped: AtomicBool::new(false),
            exhausted_until: Mutex::new(None),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Score every listing in `listings` and hand each result to `sink`.
    pub async fn run<S, K>(
        &self,
        listings: S,
        sink: &mut K,
        event_tx: Option<mpsc::Sender<BatchEvent>>,
    ) -> std::io::Result<BatchReport>
    where
        S: Stream<Item = JobListing>,
        K: ListingSink + ?Sized,
    {
        let events = event_tx.as_ref();
        let results = listings
            .map(|listing| self.score_one(listing, events))
            .buffer_unordered(self.concurrency);
        futures::pin_mut!(results);

        let mut report = BatchReport::default();
        while let Some((listing, outcome)) = results.next().await {
            let analysis = match outcome {
                Outcome::Scored(resp) => {
                    report.analyzed += 1;
                    Some(resp)
                }
                Outcome::Unscored => {
                    report.unscored += 1;
                    None
                }
                Outcome::Skipped => {
                    report.skipped_after_exhaustion += 1;
                    None
                }
            };
            sink.accept(&ScoredListing { listing, analysis }).await?;
        }

        report.exhausted_until = self.exhausted_until.lock().ok().and_then(|u| *u);
        info!(
            "Batch finished: {} analyzed, {} unscored, {} skipped",
            report.analyzed, report.unscored, report.skipped_after_exhaustion
        );
        Ok(report)
    }

    async fn score_one(
        &self,
        listing: JobListing,
        events: Option<&mpsc::Sender<BatchEvent>>,
    ) -> (JobListing, Outcome) {
        let title = listing.display_name();
        if self.is_stopped() {
            debug!("Skipping {}: daily quota spent", title);
            send(events, BatchEvent::Skipped { title }).await;
            return (listing, Outcome::Skipped);
        }
        send(events, BatchEvent::ListingStarted { title: title.clone() }).await;

        let request = AnalysisRequest::new(listing, self.profile.clone(), self.resume.clone());
        let outcome = match self.analyzer.analyze(&request).await {
            Ok(Some(resp)) => {
                let score = resp.qualification_score();
                send(events, BatchEvent::Scored { title, score }).await;
                Outcome::Scored(resp)
            }
            Ok(None) => {
                send(events, BatchEvent::Unscored { title }).await;
                Outcome::Unscored
            }
            Err(e) => {
                let until = e.until();
                if !self.stopped.swap(true, Ordering::SeqCst) {
                    warn!("{}; no further analyses will be issued", e);
                    send(events, BatchEvent::Exhausted { until }).await;
                }
                if let Ok(mut slot) = self.exhausted_until.lock() {
                    *slot = Some(until);
                }
                send(events, BatchEvent::Skipped { title }).await;
                Outcome::Skipped
            }
        };
        (request.into_job(), outcome)
    }
}

async fn send(events: Option<&mpsc::Sender<BatchEvent>>, event: BatchEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event).await;
    }
}
