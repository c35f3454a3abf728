//! Typed error hierarchy for the warden subsystems.
//!
//! Three top-level enums cover the three failure domains:
//! - `LaunchError` — agent process spawn and supervision failures
//! - `MonitorError` — session log stream failures
//! - `OrchestratorError` — calendar polling and session trigger failures
//!
//! Component-local recoverable conditions (missing state files, malformed
//! log lines) are absorbed where they occur and never appear here.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from launching and supervising the external agent process.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Failed to spawn agent process: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("Failed to create log directory at {path}: {source}")]
    LogDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write prompt file at {path}: {source}")]
    PromptWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Session log {path} did not appear within {waited_secs}s")]
    LogFileTimeout { path: PathBuf, waited_secs: u64 },

    #[error("Failed to terminate agent process {pid}: {message}")]
    TerminateFailed { pid: u32, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors from the session log monitor.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Failed to watch session log at {path}: {source}")]
    WatchFailed {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("Failed to read session log at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors from the calendar-triggered orchestrator.
///
/// Cross-component conditions surface here; the orchestrator is the single
/// point deciding whether to abort a trigger, retry, or keep polling.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Calendar provider unavailable: {0}")]
    CalendarUnavailable(String),

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error(transparent)]
    Monitor(#[from] MonitorError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
