//! Three-tier compaction policy.
//!
//! Tiers are strictly cumulative: `strategic` chains `soft` first,
//! `emergency` chains `strategic`. Each tier applies the lower tier's
//! transformations and then tightens further.

use serde::{Deserialize, Serialize};

use super::CONTEXT_CEILING_TOKENS;
use super::record::ContextUsageRecord;

const SOFT_FILE_READ_KEEP: usize = 10;
const SOFT_TOOL_RESULT_KEEP: usize = 5;
const STRATEGIC_FILE_READ_KEEP: usize = 5;
const STRATEGIC_SHRINK_THRESHOLD: u64 = 1_000;
/// Oversized tool results shrink to this percentage of their size.
const STRATEGIC_SHRINK_PERCENT: u64 = 30;
const EMERGENCY_FILE_READ_KEEP: usize = 3;
const EMERGENCY_TOOL_RESULT_KEEP: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompactionTier {
    Soft,
    Strategic,
    Emergency,
}

impl std::fmt::Display for CompactionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CompactionTier::Soft => "soft",
            CompactionTier::Strategic => "strategic",
            CompactionTier::Emergency => "emergency",
        };
        write!(f, "{name}")
    }
}

impl std::str::FromStr for CompactionTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "soft" => Ok(CompactionTier::Soft),
            "strategic" => Ok(CompactionTier::Strategic),
            "emergency" => Ok(CompactionTier::Emergency),
            other => Err(format!("unknown compaction tier: {other}")),
        }
    }
}

/// One reclaim step inside an outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionItem {
    pub category: String,
    pub description: String,
    pub tokens_reclaimed: u64,
}

/// Before/after accounting for one compaction run. Ephemeral: returned to
/// the caller, never persisted on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionOutcome {
    pub tier: CompactionTier,
    pub tokens_before: u64,
    pub tokens_after: u64,
    pub tokens_saved: u64,
    pub entries_removed: usize,
    pub entries_preserved: usize,
    pub items: Vec<CompactionItem>,
}

pub struct CompactionEngine;

impl CompactionEngine {
    /// Rewrite the record in place at the given tier.
    pub fn apply(record: &mut ContextUsageRecord, tier: CompactionTier) -> CompactionOutcome {
        let tokens_before = record.total_tokens();
        let entries_before = record.entry_count();
        let mut items = Vec::new();

        apply_soft(record, &mut items);
        if tier >= CompactionTier::Strategic {
            apply_strategic_extras(record, &mut items);
        }
        if tier >= CompactionTier::Emergency {
            apply_emergency_extras(record, &mut items);
        }

        let tokens_after = record.total_tokens();
        CompactionOutcome {
            tier,
            tokens_before,
            tokens_after,
            tokens_saved: tokens_before.saturating_sub(tokens_after),
            entries_removed: entries_before.saturating_sub(record.entry_count()),
            entries_preserved: record.entry_count(),
            items,
        }
    }

    /// Run the identical transformation against a deep copy, leaving the
    /// record untouched.
    pub fn preview(record: &ContextUsageRecord, tier: CompactionTier) -> CompactionOutcome {
        let mut copy = record.clone();
        Self::apply(&mut copy, tier)
    }

    /// Map current usage to the tier worth running, if any.
    pub fn recommend(current_tokens: u64) -> Option<CompactionTier> {
        let percent = (current_tokens as f64 / CONTEXT_CEILING_TOKENS as f64) * 100.0;
        match percent {
            p if p >= 90.0 => Some(CompactionTier::Emergency),
            p if p >= 80.0 => Some(CompactionTier::Strategic),
            p if p >= 60.0 => Some(CompactionTier::Soft),
            _ => None,
        }
    }
}

fn apply_soft(record: &mut ContextUsageRecord, items: &mut Vec<CompactionItem>) {
    trim_file_reads(record, SOFT_FILE_READ_KEEP, items);
    dedup_tool_results(record, SOFT_TOOL_RESULT_KEEP, items);
}

fn apply_strategic_extras(record: &mut ContextUsageRecord, items: &mut Vec<CompactionItem>) {
    shrink_large_tool_results(record, items);
    trim_file_reads(record, STRATEGIC_FILE_READ_KEEP, items);
    cut_conversation(record, 2, "halved conversation history", items);
}

fn apply_emergency_extras(record: &mut ContextUsageRecord, items: &mut Vec<CompactionItem>) {
    trim_file_reads(record, EMERGENCY_FILE_READ_KEEP, items);
    dedup_tool_results(record, EMERGENCY_TOOL_RESULT_KEEP, items);
    cut_conversation(record, 4, "cut conversation history to a quarter", items);
    cut_code(record, items);
}

/// Keep only the most recent `keep` file-read entries.
fn trim_file_reads(record: &mut ContextUsageRecord, keep: usize, items: &mut Vec<CompactionItem>) {
    if record.file_reads.len() <= keep {
        return;
    }
    let drop_count = record.file_reads.len() - keep;
    let reclaimed: u64 = record
        .file_reads
        .drain(..drop_count)
        .map(|e| e.tokens)
        .sum();
    items.push(CompactionItem {
        category: "file_reads".into(),
        description: format!("dropped {drop_count} older file reads"),
        tokens_reclaimed: reclaimed,
    });
}

/// Keep only the most recent `keep` results per tool category.
fn dedup_tool_results(record: &mut ContextUsageRecord, keep: usize, items: &mut Vec<CompactionItem>) {
    use std::collections::HashMap;

    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut keep_flags = vec![false; record.tool_results.len()];
    for (i, entry) in record.tool_results.iter().enumerate().rev() {
        let count = seen.entry(entry.tool.clone()).or_insert(0);
        if *count < keep {
            *count += 1;
            keep_flags[i] = true;
        }
    }

    if keep_flags.iter().all(|&k| k) {
        return;
    }

    let mut reclaimed = 0u64;
    let mut dropped = 0usize;
    let mut idx = 0;
    record.tool_results.retain(|entry| {
        let kept = keep_flags[idx];
        idx += 1;
        if !kept {
            reclaimed += entry.tokens;
            dropped += 1;
        }
        kept
    });

    items.push(CompactionItem {
        category: "tool_results".into(),
        description: format!("deduplicated {dropped} tool results beyond {keep} per tool"),
        tokens_reclaimed: reclaimed,
    });
}

/// Shrink oversized tool results to a fraction of their size, tagging them
/// so a repeated pass leaves them alone.
fn shrink_large_tool_results(record: &mut ContextUsageRecord, items: &mut Vec<CompactionItem>) {
    let mut reclaimed = 0u64;
    let mut shrunk = 0usize;
    for entry in &mut record.tool_results {
        if entry.trimmed || entry.tokens <= STRATEGIC_SHRINK_THRESHOLD {
            continue;
        }
        let new_tokens = entry.tokens * STRATEGIC_SHRINK_PERCENT / 100;
        reclaimed += entry.tokens - new_tokens;
        entry.tokens = new_tokens;
        entry.trimmed = true;
        shrunk += 1;
    }
    if shrunk > 0 {
        items.push(CompactionItem {
            category: "tool_results".into(),
            description: format!("shrank {shrunk} oversized tool results"),
            tokens_reclaimed: reclaimed,
        });
    }
}

fn cut_conversation(
    record: &mut ContextUsageRecord,
    divisor: u64,
    description: &str,
    items: &mut Vec<CompactionItem>,
) {
    let after = record.conversation_tokens / divisor;
    let reclaimed = record.conversation_tokens - after;
    if reclaimed == 0 {
        return;
    }
    record.conversation_tokens = after;
    items.push(CompactionItem {
        category: "conversation".into(),
        description: description.to_string(),
        tokens_reclaimed: reclaimed,
    });
}

fn cut_code(record: &mut ContextUsageRecord, items: &mut Vec<CompactionItem>) {
    let after = record.code_tokens / 4;
    let reclaimed = record.code_tokens - after;
    if reclaimed == 0 {
        return;
    }
    record.code_tokens = after;
    items.push(CompactionItem {
        category: "generated_code".into(),
        description: "cut generated-code context to a quarter".to_string(),
        tokens_reclaimed: reclaimed,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::record::{FileReadEntry, ToolResultEntry};
    use chrono::{DateTime, Duration, Utc};

    fn t0() -> DateTime<Utc> {
        "2026-08-06T08:00:00Z".parse().unwrap()
    }

    fn record_with_file_reads(count: usize, tokens_each: u64) -> ContextUsageRecord {
        let mut record = ContextUsageRecord::new("s1", t0());
        for i in 0..count {
            record.file_reads.push(FileReadEntry {
                path: format!("src/file_{i}.rs"),
                tokens: tokens_each,
                timestamp: t0() + Duration::seconds(i as i64),
            });
        }
        record
    }

    fn tool_result(tool: &str, tokens: u64, offset: i64) -> ToolResultEntry {
        ToolResultEntry {
            tool: tool.into(),
            summary: format!("{tool} output"),
            tokens,
            timestamp: t0() + Duration::seconds(offset),
            trimmed: false,
        }
    }

    #[test]
    fn test_scenario_b_soft_trims_file_reads() {
        let mut record = record_with_file_reads(15, 500);
        let outcome = CompactionEngine::apply(&mut record, CompactionTier::Soft);

        assert_eq!(record.file_reads.len(), 10);
        assert_eq!(outcome.tokens_saved, 2_500);
        assert_eq!(outcome.entries_removed, 5);
        assert_eq!(outcome.entries_preserved, 10);
        // Most recent entries survive.
        assert_eq!(record.file_reads[0].path, "src/file_5.rs");
    }

    #[test]
    fn test_soft_dedups_per_tool_category() {
        let mut record = ContextUsageRecord::new("s1", t0());
        for i in 0..8 {
            record.tool_results.push(tool_result("Bash", 100, i));
        }
        for i in 0..3 {
            record.tool_results.push(tool_result("Grep", 100, 10 + i));
        }

        CompactionEngine::apply(&mut record, CompactionTier::Soft);

        let bash = record.tool_results.iter().filter(|e| e.tool == "Bash").count();
        let grep = record.tool_results.iter().filter(|e| e.tool == "Grep").count();
        assert_eq!(bash, 5);
        assert_eq!(grep, 3);
    }

    #[test]
    fn test_soft_is_idempotent() {
        let mut record = record_with_file_reads(15, 500);
        CompactionEngine::apply(&mut record, CompactionTier::Soft);
        let outcome = CompactionEngine::apply(&mut record, CompactionTier::Soft);

        assert_eq!(outcome.tokens_saved, 0);
        assert_eq!(record.file_reads.len(), 10);
    }

    #[test]
    fn test_strategic_chains_soft() {
        let mut record = record_with_file_reads(15, 500);
        record.tool_results.push(tool_result("Bash", 4_000, 0));
        record.conversation_tokens = 10_000;

        let outcome = CompactionEngine::apply(&mut record, CompactionTier::Strategic);

        assert_eq!(record.file_reads.len(), 5);
        assert_eq!(record.conversation_tokens, 5_000);
        let shrunk = &record.tool_results[0];
        assert_eq!(shrunk.tokens, 1_200);
        assert!(shrunk.trimmed);
        // soft trim (2,500) + strategic trim (2,500) + shrink (2,800) + halving (5,000)
        assert_eq!(outcome.tokens_saved, 12_800);
    }

    #[test]
    fn test_strategic_skips_already_trimmed_entries() {
        let mut record = ContextUsageRecord::new("s1", t0());
        record.tool_results.push(tool_result("Bash", 10_000, 0));

        CompactionEngine::apply(&mut record, CompactionTier::Strategic);
        let after_first = record.tool_results[0].tokens;
        assert_eq!(after_first, 3_000);

        CompactionEngine::apply(&mut record, CompactionTier::Strategic);
        assert_eq!(
            record.tool_results[0].tokens, after_first,
            "trimmed entries are not shrunk again"
        );
    }

    #[test]
    fn test_repeated_strategic_leaves_ledgers_stable() {
        let mut record = record_with_file_reads(15, 500);
        for i in 0..8 {
            record.tool_results.push(tool_result("Bash", 100, i));
        }

        CompactionEngine::apply(&mut record, CompactionTier::Strategic);
        let reads_after_one = record.file_reads.len();
        let tools_after_one = record.tool_results.len();

        CompactionEngine::apply(&mut record, CompactionTier::Strategic);
        assert_eq!(record.file_reads.len(), reads_after_one);
        assert_eq!(record.tool_results.len(), tools_after_one);
    }

    #[test]
    fn test_emergency_saves_at_least_strategic() {
        let mut record = record_with_file_reads(15, 500);
        for i in 0..8 {
            record.tool_results.push(tool_result("Bash", 2_000, i));
        }
        record.conversation_tokens = 20_000;
        record.code_tokens = 8_000;

        let strategic = CompactionEngine::preview(&record, CompactionTier::Strategic);
        let emergency = CompactionEngine::preview(&record, CompactionTier::Emergency);

        assert!(emergency.tokens_saved >= strategic.tokens_saved);
    }

    #[test]
    fn test_emergency_tightens_everything() {
        let mut record = record_with_file_reads(15, 500);
        for i in 0..8 {
            record.tool_results.push(tool_result("Bash", 100, i));
        }
        record.conversation_tokens = 20_000;
        record.code_tokens = 8_000;

        CompactionEngine::apply(&mut record, CompactionTier::Emergency);

        assert_eq!(record.file_reads.len(), 3);
        assert_eq!(record.tool_results.len(), 2);
        // 20,000 halved to 10,000, then cut to a quarter.
        assert_eq!(record.conversation_tokens, 2_500);
        assert_eq!(record.code_tokens, 2_000);
    }

    #[test]
    fn test_preview_does_not_mutate() {
        let record = record_with_file_reads(15, 500);
        let outcome = CompactionEngine::preview(&record, CompactionTier::Emergency);

        assert!(outcome.tokens_saved > 0);
        assert_eq!(record.file_reads.len(), 15);
    }

    #[test]
    fn test_recommend_bands() {
        let ceiling = CONTEXT_CEILING_TOKENS;
        assert_eq!(CompactionEngine::recommend(ceiling / 2), None);
        assert_eq!(
            CompactionEngine::recommend(ceiling * 65 / 100),
            Some(CompactionTier::Soft)
        );
        assert_eq!(
            CompactionEngine::recommend(ceiling * 85 / 100),
            Some(CompactionTier::Strategic)
        );
        assert_eq!(
            CompactionEngine::recommend(ceiling * 95 / 100),
            Some(CompactionTier::Emergency)
        );
    }

    #[test]
    fn test_outcome_itemizes_categories() {
        let mut record = record_with_file_reads(15, 500);
        record.conversation_tokens = 10_000;

        let outcome = CompactionEngine::apply(&mut record, CompactionTier::Strategic);
        let categories: Vec<&str> = outcome.items.iter().map(|i| i.category.as_str()).collect();
        assert!(categories.contains(&"file_reads"));
        assert!(categories.contains(&"conversation"));

        let itemized: u64 = outcome.items.iter().map(|i| i.tokens_reclaimed).sum();
        assert_eq!(itemized, outcome.tokens_saved);
    }
}
