//! The orchestrator loop — `warden watch`.

use anyhow::Result;
use console::style;
use std::sync::Arc;

use warden::alerts::DesktopSink;
use warden::config::Config;
use warden::orchestrator::{FileCalendar, Orchestrator, OrchestratorEvent};
use warden::quota::{PlanTier, QuotaTracker};
use warden::store::StateStore;

pub async fn cmd_watch(config: Config) -> Result<()> {
    config.ensure_directories()?;

    let sink = Arc::new(DesktopSink);
    let plan = PlanTier::parse(&config.plan).unwrap_or(PlanTier::Max5x);
    let quota = QuotaTracker::new(StateStore::new(&config.state_dir), sink.clone(), plan);
    let calendar = Arc::new(FileCalendar::new(&config.state_dir.join("schedule.json")));

    let (mut orchestrator, mut events_rx, shutdown_tx) =
        Orchestrator::new(config, calendar, quota, sink);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    let printer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            print_event(&event);
        }
    });

    println!("Watching schedule (ctrl-c to stop)...");
    orchestrator.run().await?;
    printer.abort();
    println!("Stopped.");
    Ok(())
}

fn print_event(event: &OrchestratorEvent) {
    match event {
        OrchestratorEvent::Warning {
            event_id,
            minutes_until,
            ..
        } => {
            println!(
                "{} session {} starts in {} min",
                style("warn").yellow(),
                event_id,
                minutes_until
            );
        }
        OrchestratorEvent::Ready { event_id } => {
            println!("{} session {} ready (auto-start off)", style("ready").cyan(), event_id);
        }
        OrchestratorEvent::Started {
            session_id,
            event_id,
        } => {
            println!(
                "{} session {} for event {}",
                style("start").green(),
                session_id,
                event_id
            );
        }
        OrchestratorEvent::TokenDelta {
            billable_tokens, ..
        } => {
            println!("{} +{} tokens", style("tokens").dim(), billable_tokens);
        }
        OrchestratorEvent::ToolCall { name, .. } => {
            println!("{} {}", style("tool").dim(), name);
        }
        OrchestratorEvent::ToolResult { .. } => {}
        OrchestratorEvent::ObjectiveComplete { description, .. } => {
            println!("{} {}", style("done").green().bold(), description);
        }
        OrchestratorEvent::Skipped { event_id, reason } => {
            println!("{} {} ({})", style("skip").yellow(), event_id, reason);
        }
        OrchestratorEvent::Completed { report } => {
            println!(
                "{} session {}: {} tokens ({} budgeted), {} objectives",
                style("complete").green().bold(),
                report.session_id,
                report.billable_tokens,
                report.scheduled_budget,
                report.objectives_completed.len()
            );
        }
    }
}
