//! Terminal rendering for the status surfaces.

use console::style;

use crate::context::{ContextEstimate, ContextHealth};
use crate::quota::QuotaStatus;

/// Render the quota window snapshot.
pub fn render_quota(status: &QuotaStatus) -> String {
    let bar = usage_bar(status.percent);
    format!(
        "{}\n  {} {:.1}%  ({} / {} tokens)\n  resets {}\n  {}",
        style("Quota window").bold(),
        bar,
        status.percent,
        status.used,
        status.capacity,
        status.reset_at.format("%Y-%m-%d %H:%M UTC"),
        style(status.recommendation).dim(),
    )
}

/// Render the context-usage estimate.
pub fn render_context(estimate: &ContextEstimate) -> String {
    let bar = usage_bar(estimate.percent);
    let health = match estimate.health {
        ContextHealth::Fresh | ContextHealth::Light => {
            style(estimate.health.label()).green()
        }
        ContextHealth::Moderate | ContextHealth::Elevated => {
            style(estimate.health.label()).yellow()
        }
        ContextHealth::Strained | ContextHealth::Critical => {
            style(estimate.health.label()).red()
        }
    };
    format!(
        "{}\n  {} {:.1}%  ({} tokens, session {})\n  health: {}",
        style("Context usage").bold(),
        bar,
        estimate.percent,
        estimate.tokens,
        estimate.session_id,
        health,
    )
}

fn usage_bar(percent: f64) -> String {
    const WIDTH: usize = 20;
    let filled = ((percent / 100.0) * WIDTH as f64).round() as usize;
    let filled = filled.min(WIDTH);
    format!(
        "[{}{}]",
        "#".repeat(filled),
        "-".repeat(WIDTH - filled)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_bar_bounds() {
        assert_eq!(usage_bar(0.0), format!("[{}]", "-".repeat(20)));
        assert_eq!(usage_bar(100.0), format!("[{}]", "#".repeat(20)));
        assert_eq!(usage_bar(150.0), format!("[{}]", "#".repeat(20)));
    }

    #[test]
    fn test_usage_bar_half() {
        let bar = usage_bar(50.0);
        assert!(bar.contains("##########"));
        assert!(bar.contains("----------"));
    }
}
