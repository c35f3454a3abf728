//! The persisted per-session context-usage record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReadEntry {
    pub path: String,
    pub tokens: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultEntry {
    pub tool: String,
    pub summary: String,
    pub tokens: u64,
    pub timestamp: DateTime<Utc>,
    /// Set when compaction shrank this entry.
    #[serde(default)]
    pub trimmed: bool,
}

/// Append-only record of per-category consumption within one session.
///
/// The file-read and tool-result ledgers are itemized; conversation and
/// generated-code totals are monotonically incremented counters, reducible
/// only by the compaction engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextUsageRecord {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub file_reads: Vec<FileReadEntry>,
    pub tool_results: Vec<ToolResultEntry>,
    pub conversation_tokens: u64,
    pub code_tokens: u64,
    /// Highest alert band already fired this session (percent value).
    pub notified_band: u8,
}

impl ContextUsageRecord {
    pub fn new(session_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.to_string(),
            started_at: now,
            file_reads: Vec::new(),
            tool_results: Vec::new(),
            conversation_tokens: 0,
            code_tokens: 0,
            notified_band: 0,
        }
    }

    pub fn file_read_tokens(&self) -> u64 {
        self.file_reads.iter().map(|e| e.tokens).sum()
    }

    pub fn tool_result_tokens(&self) -> u64 {
        self.tool_results.iter().map(|e| e.tokens).sum()
    }

    /// Ledger total, excluding the fixed overhead constant.
    pub fn total_tokens(&self) -> u64 {
        self.file_read_tokens()
            + self.tool_result_tokens()
            + self.conversation_tokens
            + self.code_tokens
    }

    pub fn entry_count(&self) -> usize {
        self.file_reads.len() + self.tool_results.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        "2026-08-06T08:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_totals_sum_ledgers() {
        let mut record = ContextUsageRecord::new("s1", t0());
        record.file_reads.push(FileReadEntry {
            path: "src/main.rs".into(),
            tokens: 500,
            timestamp: t0(),
        });
        record.tool_results.push(ToolResultEntry {
            tool: "Bash".into(),
            summary: "cargo tree".into(),
            tokens: 300,
            timestamp: t0(),
            trimmed: false,
        });
        record.conversation_tokens = 1_000;
        record.code_tokens = 200;

        assert_eq!(record.file_read_tokens(), 500);
        assert_eq!(record.tool_result_tokens(), 300);
        assert_eq!(record.total_tokens(), 2_000);
        assert_eq!(record.entry_count(), 2);
    }

    #[test]
    fn test_new_record_is_zeroed() {
        let record = ContextUsageRecord::new("s1", t0());
        assert_eq!(record.total_tokens(), 0);
        assert_eq!(record.notified_band, 0);
    }
}
