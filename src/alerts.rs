//! Notification sink capability.
//!
//! The trackers and orchestrator only pick a message and an urgency; how an
//! alert is rendered belongs to the concrete binding. Swappable in tests.

use std::process::Command;

/// Alert treatment requested by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Normal,
    High,
    Critical,
}

impl Urgency {
    /// Urgency level understood by `notify-send`.
    fn desktop_level(self) -> &'static str {
        match self {
            Urgency::Normal => "normal",
            Urgency::High => "normal",
            Urgency::Critical => "critical",
        }
    }
}

/// One-method capability for surfacing alerts to the user.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, message: &str, urgency: Urgency);
}

/// Default binding: structured log lines.
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, message: &str, urgency: Urgency) {
        match urgency {
            Urgency::Normal => tracing::info!(target: "warden::alerts", "{message}"),
            Urgency::High => tracing::warn!(target: "warden::alerts", "{message}"),
            Urgency::Critical => tracing::error!(target: "warden::alerts", "{message}"),
        }
    }
}

/// Desktop binding: shells out to `notify-send`, falling back to the log
/// sink when the command is unavailable.
pub struct DesktopSink;

impl NotificationSink for DesktopSink {
    fn notify(&self, message: &str, urgency: Urgency) {
        let sent = Command::new("notify-send")
            .arg("-u")
            .arg(urgency.desktop_level())
            .arg("warden")
            .arg(message)
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        if !sent {
            LogSink.notify(message, urgency);
        }
    }
}
