//! Context compaction — `warden compact`, `warden new-session`.

use anyhow::{Result, anyhow};
use std::sync::Arc;

use warden::alerts::LogSink;
use warden::config::Config;
use warden::context::{CompactionOutcome, CompactionTier, ContextTracker};
use warden::store::StateStore;

pub fn cmd_compact(config: &Config, tier: Option<&str>, preview: bool) -> Result<()> {
    let tracker = ContextTracker::new(StateStore::new(&config.state_dir), Arc::new(LogSink));

    let tier = match tier {
        Some(name) => name.parse::<CompactionTier>().map_err(|e| anyhow!(e))?,
        None => match tracker.recommend() {
            Some(tier) => tier,
            None => {
                let estimate = tracker.estimate();
                println!(
                    "No compaction needed at {:.1}% of ceiling ({} tokens)",
                    estimate.percent, estimate.tokens
                );
                return Ok(());
            }
        },
    };

    let outcome = if preview {
        tracker.preview(tier)
    } else {
        tracker.compact(tier)?
    };
    print_outcome(&outcome, preview);
    Ok(())
}

pub fn cmd_new_session(config: &Config, id: Option<&str>) -> Result<()> {
    let tracker = ContextTracker::new(StateStore::new(&config.state_dir), Arc::new(LogSink));
    let id = tracker.start_session(id)?;
    println!("Started context session {id}");
    Ok(())
}

fn print_outcome(outcome: &CompactionOutcome, preview: bool) {
    let verb = if preview { "Would reclaim" } else { "Reclaimed" };
    println!();
    println!(
        "{} compaction: {} {} tokens ({} -> {})",
        outcome.tier, verb, outcome.tokens_saved, outcome.tokens_before, outcome.tokens_after
    );
    println!(
        "  entries: {} removed, {} preserved",
        outcome.entries_removed, outcome.entries_preserved
    );
    for item in &outcome.items {
        println!(
            "  [{}] {} (-{} tokens)",
            item.category, item.description, item.tokens_reclaimed
        );
    }
    println!();
}
