//! Quota gate for the external scoring service.
//!
//! One `QuotaManager` is constructed at startup and shared through an `Arc` by
//! every analyzer worker. It tracks three budgets (requests per rolling minute,
//! estimated tokens per rolling minute, requests per local day) plus cool-down
//! windows imposed by the service through its error payloads.
//!
//! `acquire` reserves a slot and returns how long the caller must wait before
//! using it. Slots are handed out in non-decreasing time order, so checking the
//! 60s window that ends at the reserved instant is enough to keep every window
//! within budget.

mod config;
mod payload;

pub use config::QuotaConfig;
pub use payload::{is_daily_exhaustion, parse_retry_delay, MAX_RETRY_DELAY};

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, NaiveDate};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::ErrorKind;

/// Length of the rolling per-minute window.
pub const WINDOW: Duration = Duration::from_secs(60);

/// Errors from the quota gate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuotaError {
    #[error("Daily scoring quota exhausted until {until}")]
    DailyExhausted { until: DateTime<Local> },
}

impl QuotaError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Terminal
    }

    /// When the daily budget becomes available again.
    pub fn until(&self) -> DateTime<Local> {
        match self {
            Self::DailyExhausted { until } => *until,
        }
    }
}

/// Outcome of recording a quota error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QuotaSignal {
    /// Per-minute exhaustion: wait, then retry.
    Transient { wait: Duration },
    /// Daily exhaustion: stop issuing calls until the next local midnight.
    Daily { until: DateTime<Local> },
}

/// Point-in-time view of the quota state.
#[derive(Debug, Clone, PartialEq)]
pub struct QuotaSnapshot {
    pub requests_in_window: u32,
    pub tokens_in_window: u64,
    pub daily_requests: u32,
    /// Remaining externally imposed cool-down.
    pub blocked_for: Option<Duration>,
    pub daily_exhausted_until: Option<DateTime<Local>>,
    pub quota_errors: u64,
}

#[derive(Debug)]
struct Reservation {
    at: Instant,
    tokens: u64,
    settled: bool,
}

#[derive(Debug)]
struct QuotaState {
    reservations: VecDeque<Reservation>,
    day: NaiveDate,
    daily_requests: u32,
    blocked_until: Option<Instant>,
    daily_exhausted_until: Option<DateTime<Local>>,
    quota_errors: u64,
}

impl QuotaState {
    fn new(today: NaiveDate) -> Self {
        Self {
            reservations: VecDeque::new(),
            day: today,
            daily_requests: 0,
            blocked_until: None,
            daily_exhausted_until: None,
            quota_errors: 0,
        }
    }

    fn roll_day(&mut self, today: NaiveDate) {
        if today != self.day {
            debug!("Quota day rolled over to {}", today);
            self.day = today;
            self.daily_requests = 0;
            self.daily_exhausted_until = None;
        }
    }

    fn prune(&mut self, now: Instant) {
        while self
            .reservations
            .front()
            .is_some_and(|r| r.at + WINDOW <= now)
        {
            self.reservations.pop_front();
        }
    }

    fn clear_expired_block(&mut self, now: Instant) {
        if self.blocked_until.is_some_and(|b| b <= now) {
            self.blocked_until = None;
        }
    }

    /// Requests and tokens inside the window ending at `t`.
    fn usage_at(&self, t: Instant) -> (u32, u64) {
        self.reservations
            .iter()
            .filter(|r| r.at <= t && r.at + WINDOW > t)
            .fold((0, 0), |(count, tokens), r| (count + 1, tokens + r.tokens))
    }

    /// Earliest instant at or after `start` where both minute budgets fit.
    fn earliest_slot(&self, start: Instant, tokens: u64, rpm: u32, tpm: u64) -> Instant {
        let candidates = std::iter::once(start).chain(
            self.reservations
                .iter()
                .map(|r| r.at + WINDOW)
                .filter(|t| *t > start),
        );

        let mut last = start;
        for t in candidates {
            last = t;
            let (count, used) = self.usage_at(t);
            if count < rpm && used + tokens <= tpm {
                return t;
            }
        }
        // Every reservation has left the window by the last candidate.
        last
    }
}

/// Thread-safe gate over the scoring service budgets.
pub struct QuotaManager {
    config: QuotaConfig,
    state: Mutex<QuotaState>,
}

impl QuotaManager {
    pub fn new(config: QuotaConfig) -> Self {
        Self {
            config,
            state: Mutex::new(QuotaState::new(Local::now().date_naive())),
        }
    }

    pub fn config(&self) -> &QuotaConfig {
        &self.config
    }

    /// Reserve a request slot for `estimated_tokens`.
    ///
    /// Returns how long to wait before sending (possibly zero), or
    /// `DailyExhausted` when no call may be issued before local midnight.
    pub async fn acquire(&self, estimated_tokens: u64) -> Result<Duration, QuotaError> {
        self.acquire_at(estimated_tokens, Instant::now(), Local::now())
            .await
    }

    /// Reserve a slot, then sleep until it is due.
    pub async fn wait_for_slot(&self, estimated_tokens: u64) -> Result<Duration, QuotaError> {
        let wait = self.acquire(estimated_tokens).await?;
        if !wait.is_zero() {
            debug!("Quota gate: waiting {:?} for a scoring slot", wait);
            tokio::time::sleep(wait).await;
        }
        Ok(wait)
    }

    pub(crate) async fn acquire_at(
        &self,
        estimated_tokens: u64,
        now: Instant,
        wall: DateTime<Local>,
    ) -> Result<Duration, QuotaError> {
        let mut state = self.state.lock().await;
        state.roll_day(wall.date_naive());

        if let Some(until) = state.daily_exhausted_until {
            if wall < until {
                return Err(QuotaError::DailyExhausted { until });
            }
            state.daily_exhausted_until = None;
        }

        if state.daily_requests >= self.config.requests_per_day {
            let until = next_local_midnight(wall);
            state.daily_exhausted_until = Some(until);
            info!(
                "Daily request budget ({}) used up; blocked until {}",
                self.config.requests_per_day, until
            );
            return Err(QuotaError::DailyExhausted { until });
        }

        state.prune(now);
        state.clear_expired_block(now);

        let tpm = self.config.tokens_per_minute;
        let tokens = if estimated_tokens > tpm {
            warn!(
                "Token estimate {} exceeds per-minute budget {}; clamping",
                estimated_tokens, tpm
            );
            tpm
        } else {
            estimated_tokens
        };

        let mut start = now;
        if let Some(blocked) = state.blocked_until {
            start = start.max(blocked);
        }
        if let Some(last) = state.reservations.back() {
            start = start.max(last.at);
        }

        let rpm = self.config.requests_per_minute.max(1);
        let at = state.earliest_slot(start, tokens, rpm, tpm);
        state.reservations.push_back(Reservation {
            at,
            tokens,
            settled: false,
        });
        state.daily_requests += 1;

        Ok(at.saturating_duration_since(now))
    }

    /// Replace the oldest unsettled token estimate with the actual usage.
    pub async fn record_success(&self, actual_tokens: u64) {
        let mut state = self.state.lock().await;
        if let Some(r) = state.reservations.iter_mut().find(|r| !r.settled) {
            r.tokens = actual_tokens;
            r.settled = true;
        }
    }

    /// Apply the cool-down carried by a quota error payload.
    pub async fn record_quota_error(&self, payload: &str) -> QuotaSignal {
        self.record_quota_error_at(payload, Instant::now(), Local::now())
            .await
    }

    pub(crate) async fn record_quota_error_at(
        &self,
        payload: &str,
        now: Instant,
        wall: DateTime<Local>,
    ) -> QuotaSignal {
        let mut state = self.state.lock().await;
        state.roll_day(wall.date_naive());
        state.quota_errors += 1;
        if let Some(r) = state.reservations.iter_mut().find(|r| !r.settled) {
            r.settled = true;
        }

        if is_daily_exhaustion(payload, &self.config.daily_signatures) {
            let until = next_local_midnight(wall);
            let remaining = (until - wall).to_std().unwrap_or(Duration::ZERO);
            state.daily_exhausted_until = Some(until);
            state.blocked_until = Some(later(now, remaining));
            warn!("Scoring service reports daily quota exhaustion; blocked until {}", until);
            return QuotaSignal::Daily { until };
        }

        let wait = match parse_retry_delay(payload) {
            Some(delay) => delay.saturating_add(self.config.safety_buffer()),
            None => self.config.fallback_wait(),
        };
        warn!(
            "Per-minute quota error (no daily signature matched), cooling down {:?}: {}",
            wait,
            payload_prefix(payload)
        );

        let until = later(now, wait);
        state.blocked_until = Some(state.blocked_until.map_or(until, |b| b.max(until)));
        QuotaSignal::Transient { wait }
    }

    pub async fn snapshot(&self) -> QuotaSnapshot {
        self.snapshot_at(Instant::now()).await
    }

    pub(crate) async fn snapshot_at(&self, now: Instant) -> QuotaSnapshot {
        let state = self.state.lock().await;
        let (requests_in_window, tokens_in_window) = state.usage_at(now);
        QuotaSnapshot {
            requests_in_window,
            tokens_in_window,
            daily_requests: state.daily_requests,
            blocked_for: state
                .blocked_until
                .filter(|b| *b > now)
                .map(|b| b - now),
            daily_exhausted_until: state.daily_exhausted_until,
            quota_errors: state.quota_errors,
        }
    }
}

/// Start of the next local calendar day.
pub fn next_local_midnight(wall: DateTime<Local>) -> DateTime<Local> {
    wall.date_naive()
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|naive| naive.and_local_timezone(Local).earliest())
        .unwrap_or_else(|| wall + chrono::Duration::hours(24))
}

/// `now + wait`, capped at the longest accepted cool-down.
fn later(now: Instant, wait: Duration) -> Instant {
    now.checked_add(wait.min(MAX_RETRY_DELAY))
        .unwrap_or(now)
}

fn payload_prefix(payload: &str) -> String {
    payload.chars().take(160).collect::<String>().replace('\n', " ")
}
