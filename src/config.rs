use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Runtime configuration for warden.
///
/// Constructed once in `main` and passed down explicitly; the core never
/// reads environment or home-directory state on its own. Values come from
/// `warden.toml` in the state directory, overridden by CLI flags.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding all persisted state (quota, context, reports).
    pub state_dir: PathBuf,
    /// Directory for session logs and prompt files.
    pub log_dir: PathBuf,
    /// Command used to launch the external agent.
    pub agent_cmd: String,
    pub skip_permissions: bool,
    /// Quota plan tier name ("pro", "max5x", "max20x").
    pub plan: String,
    /// Orchestrator calendar poll interval.
    pub poll_interval_secs: u64,
    /// Warning lead times, in minutes before a scheduled start.
    pub lead_times_mins: Vec<i64>,
    /// Whether sessions launch automatically at the scheduled instant.
    pub auto_start: bool,
    /// Cancellable pause between trigger and launch.
    pub start_grace_secs: u64,
    /// Scheduled session phase duration.
    pub phase_duration_mins: i64,
    /// Hard timeout waiting for the agent to create its session log.
    pub log_wait_timeout_secs: u64,
    /// Poll sub-interval while waiting for the session log.
    pub log_wait_interval_ms: u64,
    /// Grace window for the polite phase of two-phase shutdown.
    pub terminate_timeout_secs: u64,
    pub verbose: bool,
}

/// On-disk settings, all optional. Missing or unreadable files fall back to
/// defaults; configuration problems must never stop the tool from running.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WardenToml {
    pub agent_cmd: Option<String>,
    pub skip_permissions: Option<bool>,
    pub plan: Option<String>,
    pub poll_interval_secs: Option<u64>,
    pub lead_times_mins: Option<Vec<i64>>,
    pub auto_start: Option<bool>,
    pub start_grace_secs: Option<u64>,
    pub phase_duration_mins: Option<i64>,
    pub log_wait_timeout_secs: Option<u64>,
    pub terminate_timeout_secs: Option<u64>,
}

impl WardenToml {
    /// Load `warden.toml` from the given directory, tolerating absence and
    /// parse failures.
    pub fn load_or_default(dir: &std::path::Path) -> Self {
        let path = dir.join("warden.toml");
        std::fs::read_to_string(&path)
            .ok()
            .and_then(|raw| toml::from_str(&raw).ok())
            .unwrap_or_default()
    }
}

impl Config {
    /// Build the runtime configuration.
    ///
    /// `state_dir` defaults to `~/.warden` when not supplied.
    pub fn new(state_dir: Option<PathBuf>, verbose: bool) -> Result<Self> {
        let state_dir = match state_dir {
            Some(dir) => dir,
            None => dirs::home_dir()
                .context("Failed to resolve home directory")?
                .join(".warden"),
        };

        let toml = WardenToml::load_or_default(&state_dir);
        let log_dir = state_dir.join("logs");

        Ok(Self {
            state_dir,
            log_dir,
            agent_cmd: toml.agent_cmd.unwrap_or_else(|| "claude".to_string()),
            skip_permissions: toml.skip_permissions.unwrap_or(true),
            plan: toml.plan.unwrap_or_else(|| "max5x".to_string()),
            poll_interval_secs: toml.poll_interval_secs.unwrap_or(60),
            lead_times_mins: toml.lead_times_mins.unwrap_or_else(|| vec![30, 5]),
            auto_start: toml.auto_start.unwrap_or(true),
            start_grace_secs: toml.start_grace_secs.unwrap_or(10),
            phase_duration_mins: toml.phase_duration_mins.unwrap_or(300),
            log_wait_timeout_secs: toml.log_wait_timeout_secs.unwrap_or(30),
            log_wait_interval_ms: 500,
            terminate_timeout_secs: toml.terminate_timeout_secs.unwrap_or(10),
            verbose,
        })
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.state_dir).context("Failed to create state directory")?;
        std::fs::create_dir_all(&self.log_dir).context("Failed to create log directory")?;
        std::fs::create_dir_all(self.state_dir.join("sessions"))
            .context("Failed to create sessions directory")?;
        Ok(())
    }

    /// Flags passed to the agent CLI so it writes a stream-JSON event log.
    pub fn agent_flags(&self) -> Vec<String> {
        let mut flags = Vec::new();
        if self.skip_permissions {
            flags.push("--dangerously-skip-permissions".to_string());
        }
        flags.push("--print".to_string());
        flags.push("--output-format".to_string());
        flags.push("stream-json".to_string());
        flags.push("--verbose".to_string());
        flags
    }
}
