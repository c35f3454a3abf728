//! Quota and context status — `warden status`, `warden admit`.

use anyhow::Result;
use std::sync::Arc;

use warden::alerts::LogSink;
use warden::config::Config;
use warden::context::ContextTracker;
use warden::quota::{PlanTier, QuotaTracker};
use warden::store::StateStore;
use warden::ui;

fn quota_tracker(config: &Config) -> QuotaTracker {
    let plan = PlanTier::parse(&config.plan).unwrap_or(PlanTier::Max5x);
    QuotaTracker::new(StateStore::new(&config.state_dir), Arc::new(LogSink), plan)
}

pub fn cmd_status(config: &Config) -> Result<()> {
    let quota = quota_tracker(config);
    let context = ContextTracker::new(StateStore::new(&config.state_dir), Arc::new(LogSink));

    println!();
    println!("{}", ui::render_quota(&quota.status()));
    println!();
    println!("{}", ui::render_context(&context.estimate()));
    println!();
    Ok(())
}

pub fn cmd_admit(config: &Config, tokens: u64) -> Result<()> {
    let quota = quota_tracker(config);
    let admission = quota.can_admit(tokens)?;

    if admission.admit {
        println!(
            "Admitted: {} tokens fit ({} remaining in window)",
            tokens, admission.remaining
        );
    } else {
        println!(
            "Refused: {} tokens requested, {} remaining. Retry after {}",
            tokens,
            admission.remaining,
            admission.reset_at.format("%Y-%m-%d %H:%M UTC")
        );
    }
    Ok(())
}
