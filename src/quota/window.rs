//! The persisted quota window record and its pure transitions.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{ARCHIVE_KEEP, WINDOW_DURATION_HOURS};

/// Subscription tier of the external agent, fixing the window capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Pro,
    Max5x,
    Max20x,
}

impl PlanTier {
    /// Token capacity of one quota window for this tier.
    pub fn capacity(self) -> u64 {
        match self {
            PlanTier::Pro => 300_000,
            PlanTier::Max5x => 1_500_000,
            PlanTier::Max20x => 6_000_000,
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "pro" => Some(PlanTier::Pro),
            "max5x" => Some(PlanTier::Max5x),
            "max20x" => Some(PlanTier::Max20x),
            _ => None,
        }
    }
}

/// Per-session consumption inside one window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUsage {
    pub session_id: String,
    pub tokens_used: u64,
}

/// A session that did not fit the current window, queued for retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeferredSession {
    pub id: String,
    pub estimated_tokens: u64,
    pub due_at: DateTime<Utc>,
    pub reason: String,
}

/// Summary of a closed window, kept for variance reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedWindow {
    pub window_start: DateTime<Utc>,
    pub window_reset: DateTime<Utc>,
    pub tokens_used: u64,
    pub sessions: Vec<SessionUsage>,
}

/// The rolling quota window. Loaded wholesale, mutated in memory, written
/// back wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaWindow {
    pub plan: PlanTier,
    pub capacity: u64,
    pub window_duration_mins: i64,
    /// Opened lazily on the first non-zero consumption report.
    pub window_start: Option<DateTime<Utc>>,
    pub window_reset: Option<DateTime<Utc>>,
    pub tokens_used: u64,
    pub sessions: Vec<SessionUsage>,
    pub deferred: Vec<DeferredSession>,
    /// Highest usage band already notified this window (percent value).
    pub notified_band: u8,
    #[serde(default)]
    pub history: Vec<ArchivedWindow>,
}

impl QuotaWindow {
    pub fn new(plan: PlanTier) -> Self {
        Self::with_capacity(plan, plan.capacity())
    }

    /// A window with an explicit capacity override (used by tests and by
    /// operators whose real quota differs from the tier default).
    pub fn with_capacity(plan: PlanTier, capacity: u64) -> Self {
        Self {
            plan,
            capacity,
            window_duration_mins: WINDOW_DURATION_HOURS * 60,
            window_start: None,
            window_reset: None,
            tokens_used: 0,
            sessions: Vec::new(),
            deferred: Vec::new(),
            notified_band: 0,
            history: Vec::new(),
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(self.window_duration_mins)
    }

    /// Open the window clock if it is not already running.
    pub fn open_clock(&mut self, now: DateTime<Utc>) {
        if self.window_start.is_none() {
            self.window_start = Some(now);
            self.window_reset = Some(now + self.duration());
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.window_reset, Some(reset) if now >= reset)
    }

    /// Archive the consumed sessions and reopen a fresh window.
    ///
    /// Idempotent once applied: a rolled window has no open clock, zero
    /// usage, and a cleared notification watermark.
    pub fn roll(&mut self, _now: DateTime<Utc>) {
        let (Some(start), Some(reset)) = (self.window_start, self.window_reset) else {
            return;
        };
        self.history.push(ArchivedWindow {
            window_start: start,
            window_reset: reset,
            tokens_used: self.tokens_used,
            sessions: std::mem::take(&mut self.sessions),
        });
        if self.history.len() > ARCHIVE_KEEP {
            let excess = self.history.len() - ARCHIVE_KEEP;
            self.history.drain(..excess);
        }
        self.window_start = None;
        self.window_reset = None;
        self.tokens_used = 0;
        self.notified_band = 0;
    }

    /// Roll the window forward if its reset instant has passed.
    pub fn roll_if_expired(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_expired(now) {
            self.roll(now);
            true
        } else {
            false
        }
    }

    pub fn remaining(&self) -> u64 {
        self.capacity.saturating_sub(self.tokens_used)
    }

    pub fn percent_used(&self) -> f64 {
        if self.capacity == 0 {
            return 100.0;
        }
        (self.tokens_used as f64 / self.capacity as f64) * 100.0
    }

    /// Record consumption against a session, merging repeated reports.
    pub fn record(&mut self, session_id: &str, tokens: u64, now: DateTime<Utc>) {
        if tokens > 0 {
            self.open_clock(now);
        }
        self.tokens_used += tokens;
        match self
            .sessions
            .iter_mut()
            .find(|s| s.session_id == session_id)
        {
            Some(usage) => usage.tokens_used += tokens,
            None => self.sessions.push(SessionUsage {
                session_id: session_id.to_string(),
                tokens_used: tokens,
            }),
        }
    }

    /// The reset instant a caller should retry at. With no open clock the
    /// window is untouched, so a full duration from `now` is the projection.
    pub fn reset_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.window_reset.unwrap_or(now + self.duration())
    }
}
