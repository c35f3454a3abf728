//! Context tracker operations over the persisted usage record.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::alerts::{NotificationSink, Urgency};
use crate::store::StateStore;

use super::compaction::{CompactionEngine, CompactionOutcome, CompactionTier};
use super::record::{ContextUsageRecord, FileReadEntry, ToolResultEntry};
use super::{CONTEXT_ALERT_BANDS, CONTEXT_CEILING_TOKENS, FIXED_OVERHEAD_TOKENS, STALE_SESSION_HOURS};

/// Qualitative context state, monotone in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ContextHealth {
    Fresh,
    Light,
    Moderate,
    Elevated,
    Strained,
    Critical,
}

impl ContextHealth {
    pub fn from_percent(percent: f64) -> Self {
        match percent {
            p if p >= 90.0 => ContextHealth::Critical,
            p if p >= 75.0 => ContextHealth::Strained,
            p if p >= 50.0 => ContextHealth::Elevated,
            p if p >= 25.0 => ContextHealth::Moderate,
            p if p >= 10.0 => ContextHealth::Light,
            _ => ContextHealth::Fresh,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ContextHealth::Fresh => "fresh",
            ContextHealth::Light => "light",
            ContextHealth::Moderate => "moderate",
            ContextHealth::Elevated => "elevated",
            ContextHealth::Strained => "strained",
            ContextHealth::Critical => "critical",
        }
    }
}

/// Point-in-time usage estimate.
#[derive(Debug, Clone)]
pub struct ContextEstimate {
    pub session_id: String,
    /// Ledger total plus the fixed overhead constant.
    pub tokens: u64,
    pub percent: f64,
    pub health: ContextHealth,
}

/// Tracks per-category consumption for the current session.
pub struct ContextTracker {
    store: StateStore,
    sink: Arc<dyn NotificationSink>,
    key: String,
}

impl ContextTracker {
    pub fn new(store: StateStore, sink: Arc<dyn NotificationSink>) -> Self {
        Self::with_key(store, sink, "context")
    }

    pub fn with_key(store: StateStore, sink: Arc<dyn NotificationSink>, key: &str) -> Self {
        Self {
            store,
            sink,
            key: key.to_string(),
        }
    }

    /// Load the record, replacing a stale session with a fresh one.
    fn load(&self, now: DateTime<Utc>) -> ContextUsageRecord {
        match self.store.load::<ContextUsageRecord>(&self.key) {
            Some(record) if now - record.started_at < Duration::hours(STALE_SESSION_HOURS) => {
                record
            }
            Some(record) => {
                tracing::info!(
                    stale_session = %record.session_id,
                    "Replacing stale context session"
                );
                ContextUsageRecord::new(&Uuid::new_v4().to_string(), now)
            }
            None => ContextUsageRecord::new(&Uuid::new_v4().to_string(), now),
        }
    }

    fn persist(&self, record: &ContextUsageRecord) -> Result<()> {
        self.store.save(&self.key, record)
    }

    /// Begin a new session, zeroing the record.
    pub fn start_session(&self, session_id: Option<&str>) -> Result<String> {
        self.start_session_at(session_id, Utc::now())
    }

    pub fn start_session_at(
        &self,
        session_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let id = session_id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let record = ContextUsageRecord::new(&id, now);
        self.persist(&record)?;
        Ok(id)
    }

    /// Pure read: ledger totals plus fixed overhead against the ceiling.
    pub fn estimate(&self) -> ContextEstimate {
        self.estimate_at(Utc::now())
    }

    pub fn estimate_at(&self, now: DateTime<Utc>) -> ContextEstimate {
        estimate_of(&self.load(now))
    }

    pub fn track_file_read(&self, path: &str, tokens: u64) -> Result<ContextEstimate> {
        self.mutate(Utc::now(), |record, now| {
            record.file_reads.push(FileReadEntry {
                path: path.to_string(),
                tokens,
                timestamp: now,
            });
        })
    }

    pub fn track_tool_result(
        &self,
        tool: &str,
        summary: &str,
        tokens: u64,
    ) -> Result<ContextEstimate> {
        self.mutate(Utc::now(), |record, now| {
            record.tool_results.push(ToolResultEntry {
                tool: tool.to_string(),
                summary: summary.to_string(),
                tokens,
                timestamp: now,
                trimmed: false,
            });
        })
    }

    pub fn track_conversation(&self, tokens: u64) -> Result<ContextEstimate> {
        self.mutate(Utc::now(), |record, _| {
            record.conversation_tokens += tokens;
        })
    }

    pub fn track_generated_code(&self, tokens: u64) -> Result<ContextEstimate> {
        self.mutate(Utc::now(), |record, _| {
            record.code_tokens += tokens;
        })
    }

    fn mutate<F>(&self, now: DateTime<Utc>, f: F) -> Result<ContextEstimate>
    where
        F: FnOnce(&mut ContextUsageRecord, DateTime<Utc>),
    {
        let mut record = self.load(now);
        f(&mut record, now);
        self.fire_band_alert(&mut record);
        self.persist(&record)?;
        Ok(estimate_of(&record))
    }

    /// Rewrite the record in place at the given tier and persist.
    pub fn compact(&self, tier: CompactionTier) -> Result<CompactionOutcome> {
        self.compact_at(tier, Utc::now())
    }

    pub fn compact_at(&self, tier: CompactionTier, now: DateTime<Utc>) -> Result<CompactionOutcome> {
        let mut record = self.load(now);
        let outcome = CompactionEngine::apply(&mut record, tier);
        tracing::info!(
            tier = %tier,
            tokens_saved = outcome.tokens_saved,
            "Compaction applied"
        );
        self.persist(&record)?;
        Ok(outcome)
    }

    /// Run the transformation against a deep copy; nothing persists.
    pub fn preview(&self, tier: CompactionTier) -> CompactionOutcome {
        let record = self.load(Utc::now());
        CompactionEngine::preview(&record, tier)
    }

    /// Tier worth running for the current usage, if any.
    pub fn recommend(&self) -> Option<CompactionTier> {
        let estimate = self.estimate();
        CompactionEngine::recommend(estimate.tokens)
    }

    fn fire_band_alert(&self, record: &mut ContextUsageRecord) {
        let estimate = estimate_of(record);
        let crossed = CONTEXT_ALERT_BANDS
            .iter()
            .copied()
            .filter(|band| estimate.percent >= *band as f64)
            .next_back();
        let Some(band) = crossed else { return };
        if band <= record.notified_band {
            return;
        }
        record.notified_band = band;
        let urgency = match band {
            90.. => Urgency::Critical,
            80.. => Urgency::High,
            _ => Urgency::Normal,
        };
        let hint = match CompactionEngine::recommend(estimate.tokens) {
            Some(tier) => format!(" Run {tier} compaction."),
            None => String::new(),
        };
        self.sink.notify(
            &format!(
                "Context at {:.0}% of ceiling ({} tokens).{hint}",
                estimate.percent, estimate.tokens
            ),
            urgency,
        );
    }
}

fn estimate_of(record: &ContextUsageRecord) -> ContextEstimate {
    let tokens = record.total_tokens() + FIXED_OVERHEAD_TOKENS;
    let percent = (tokens as f64 / CONTEXT_CEILING_TOKENS as f64) * 100.0;
    ContextEstimate {
        session_id: record.session_id.clone(),
        tokens,
        percent,
        health: ContextHealth::from_percent(percent),
    }
}
