//! Quota tracker operations over the persisted window record.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::alerts::{NotificationSink, Urgency};
use crate::store::StateStore;

use super::window::{DeferredSession, PlanTier, QuotaWindow};
use super::{DEFER_RETRY_MINS, USAGE_BANDS};

/// Outcome of an admission check. Advisory: the tracker never blocks
/// over-capacity recording, callers consult this before launching.
#[derive(Debug, Clone, PartialEq)]
pub struct Admission {
    pub admit: bool,
    pub remaining: u64,
    /// Earliest instant a refused task can retry.
    pub reset_at: DateTime<Utc>,
}

/// Pure snapshot of the current window.
#[derive(Debug, Clone)]
pub struct QuotaStatus {
    pub used: u64,
    pub remaining: u64,
    pub capacity: u64,
    pub percent: f64,
    pub reset_at: DateTime<Utc>,
    pub recommendation: &'static str,
}

/// Tracks consumption against the rolling quota window.
///
/// State is keyed by a caller-supplied identifier; `new` binds the
/// conventional "quota" key as the single live window per machine.
pub struct QuotaTracker {
    store: StateStore,
    sink: Arc<dyn NotificationSink>,
    plan: PlanTier,
    capacity_override: Option<u64>,
    key: String,
}

impl QuotaTracker {
    pub fn new(store: StateStore, sink: Arc<dyn NotificationSink>, plan: PlanTier) -> Self {
        Self::with_key(store, sink, plan, "quota")
    }

    pub fn with_key(
        store: StateStore,
        sink: Arc<dyn NotificationSink>,
        plan: PlanTier,
        key: &str,
    ) -> Self {
        Self {
            store,
            sink,
            plan,
            capacity_override: None,
            key: key.to_string(),
        }
    }

    /// Override the tier's default window capacity.
    pub fn with_capacity(mut self, capacity: u64) -> Self {
        self.capacity_override = Some(capacity);
        self
    }

    fn fresh_window(&self) -> QuotaWindow {
        match self.capacity_override {
            Some(capacity) => QuotaWindow::with_capacity(self.plan, capacity),
            None => QuotaWindow::new(self.plan),
        }
    }

    /// Load the window, rolling it forward in memory if its reset instant
    /// has passed. The caller persists after mutating.
    fn load(&self, now: DateTime<Utc>) -> QuotaWindow {
        let mut window: QuotaWindow = self
            .store
            .load(&self.key)
            .unwrap_or_else(|| self.fresh_window());
        if window.roll_if_expired(now) {
            tracing::info!(
                tokens_archived = window
                    .history
                    .last()
                    .map(|w| w.tokens_used)
                    .unwrap_or_default(),
                "Quota window rolled over"
            );
        }
        window
    }

    fn persist(&self, window: &QuotaWindow) -> Result<()> {
        self.store.save(&self.key, window)
    }

    /// Append consumption to the current window, lazily opening the window
    /// clock on the first non-zero report.
    pub fn record_consumption(&self, session_id: &str, tokens: u64) -> Result<QuotaStatus> {
        self.record_consumption_at(session_id, tokens, Utc::now())
    }

    pub fn record_consumption_at(
        &self,
        session_id: &str,
        tokens: u64,
        now: DateTime<Utc>,
    ) -> Result<QuotaStatus> {
        let mut window = self.load(now);
        window.record(session_id, tokens, now);
        self.fire_band_alert(&mut window);
        self.persist(&window)?;
        Ok(snapshot(&window, now))
    }

    /// Check whether a prospective task fits the remaining window.
    pub fn can_admit(&self, estimated_tokens: u64) -> Result<Admission> {
        self.can_admit_at(estimated_tokens, Utc::now())
    }

    pub fn can_admit_at(&self, estimated_tokens: u64, now: DateTime<Utc>) -> Result<Admission> {
        let window = self.load(now);
        let remaining = window.remaining();
        Ok(Admission {
            admit: estimated_tokens <= remaining,
            remaining,
            reset_at: window.reset_at(now),
        })
    }

    /// Persist an intent to retry a session shortly after the window
    /// reopens.
    pub fn defer_session(&self, id: &str, estimated_tokens: u64, reason: &str) -> Result<()> {
        self.defer_session_at(id, estimated_tokens, reason, Utc::now())
    }

    pub fn defer_session_at(
        &self,
        id: &str,
        estimated_tokens: u64,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut window = self.load(now);
        let due_at = window.reset_at(now) + chrono::Duration::minutes(DEFER_RETRY_MINS);
        window.deferred.push(DeferredSession {
            id: id.to_string(),
            estimated_tokens,
            due_at,
            reason: reason.to_string(),
        });
        tracing::info!(session = id, due_at = %due_at, reason, "Session deferred");
        self.persist(&window)
    }

    pub fn deferred(&self) -> Vec<DeferredSession> {
        self.deferred_at(Utc::now())
    }

    pub fn deferred_at(&self, now: DateTime<Utc>) -> Vec<DeferredSession> {
        self.load(now).deferred
    }

    /// Pure read of the current window. Repeated calls after the reset
    /// instant report zero usage and a freshly projected reset.
    pub fn status(&self) -> QuotaStatus {
        self.status_at(Utc::now())
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> QuotaStatus {
        snapshot(&self.load(now), now)
    }

    /// Dispatch at most one alert for the highest band newly crossed; the
    /// watermark clears only on window rollover, never mid-window.
    fn fire_band_alert(&self, window: &mut QuotaWindow) {
        let percent = window.percent_used();
        let crossed = USAGE_BANDS
            .iter()
            .copied()
            .filter(|band| percent >= *band as f64)
            .next_back();
        let Some(band) = crossed else { return };
        if band <= window.notified_band {
            return;
        }
        window.notified_band = band;
        let urgency = match band {
            90.. => Urgency::Critical,
            75.. => Urgency::High,
            _ => Urgency::Normal,
        };
        self.sink.notify(
            &format!(
                "Quota window at {percent:.0}% ({} of {} tokens). {}",
                window.tokens_used,
                window.capacity,
                recommendation_for(percent)
            ),
            urgency,
        );
    }
}

fn snapshot(window: &QuotaWindow, now: DateTime<Utc>) -> QuotaStatus {
    let percent = window.percent_used();
    QuotaStatus {
        used: window.tokens_used,
        remaining: window.remaining(),
        capacity: window.capacity,
        percent,
        reset_at: window.reset_at(now),
        recommendation: recommendation_for(percent),
    }
}

fn recommendation_for(percent: f64) -> &'static str {
    match percent {
        p if p >= 95.0 => "Window nearly exhausted; defer everything remaining to the next window.",
        p if p >= 90.0 => "Reserve the remainder for finishing in-flight work only.",
        p if p >= 75.0 => "Run small tasks only; defer anything heavy.",
        p if p >= 50.0 => "Half the window is gone; prioritize the most important session.",
        p if p >= 25.0 => "Consumption on pace; keep scheduling normally.",
        p if p >= 10.0 => "Plenty of window left.",
        _ => "Fresh window; schedule large tasks freely.",
    }
}
