//! Post-hoc session metrics — `warden analyze <log>`.

use anyhow::Result;
use std::path::Path;

use warden::monitor::SessionLogMonitor;

pub fn cmd_analyze(log: &Path) -> Result<()> {
    let metrics = SessionLogMonitor::analyze_completed_session(log)?;

    println!();
    println!("Session log: {}", log.display());
    println!(
        "  tokens: {} input, {} output, {} cache-read ({} billable)",
        metrics.input_tokens,
        metrics.output_tokens,
        metrics.cache_read_tokens,
        metrics.billable_tokens()
    );
    println!("  tool calls: {}", metrics.tool_calls);
    println!(
        "  lines: {} parsed, {} malformed",
        metrics.lines_parsed, metrics.lines_malformed
    );
    if metrics.objectives_completed.is_empty() {
        println!("  objectives completed: none");
    } else {
        println!("  objectives completed:");
        for objective in &metrics.objectives_completed {
            println!("    - {objective}");
        }
    }
    if metrics.ended {
        println!(
            "  ended: yes{}",
            if metrics.ended_with_error {
                " (with error)"
            } else {
                ""
            }
        );
    } else {
        println!("  ended: no terminal entry found");
    }
    println!();
    Ok(())
}
