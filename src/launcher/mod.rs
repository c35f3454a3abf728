//! Session launcher.
//!
//! Spawns the external agent detached in its own process group, hands it a
//! deterministically derived session-log path, and supervises termination.
//! The agent owns the log file; the launcher only waits for it to appear.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};

use crate::config::Config;
use crate::errors::LaunchError;

const EXIT_POLL_MS: u64 = 250;

/// Reference to a launched agent process and its log location.
pub struct SessionHandle {
    pub session_id: String,
    pub pid: u32,
    pub log_path: PathBuf,
    pub started_at: DateTime<Utc>,
    pub event_id: Option<String>,
    child: Child,
}

impl SessionHandle {
    /// Non-blocking exit check.
    pub fn try_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session_id", &self.session_id)
            .field("pid", &self.pid)
            .field("log_path", &self.log_path)
            .field("event_id", &self.event_id)
            .finish()
    }
}

pub struct SessionLauncher {
    config: Config,
}

impl SessionLauncher {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// The session-log location for a given session id. The same derivation
    /// the monitor relies on.
    pub fn log_path_for(&self, session_id: &str) -> PathBuf {
        self.config.log_dir.join(format!("session-{session_id}.jsonl"))
    }

    /// Spawn the agent detached, with the prompt on stdin and the derived
    /// log path passed through.
    pub async fn launch(
        &self,
        session_id: &str,
        project_dir: &Path,
        prompt: &str,
        event_id: Option<&str>,
    ) -> Result<SessionHandle, LaunchError> {
        std::fs::create_dir_all(&self.config.log_dir).map_err(|source| {
            LaunchError::LogDirFailed {
                path: self.config.log_dir.clone(),
                source,
            }
        })?;

        let prompt_path = self
            .config
            .log_dir
            .join(format!("session-{session_id}-prompt.md"));
        std::fs::write(&prompt_path, prompt).map_err(|source| LaunchError::PromptWriteFailed {
            path: prompt_path.clone(),
            source,
        })?;
        let prompt_file =
            std::fs::File::open(&prompt_path).map_err(LaunchError::SpawnFailed)?;

        let log_path = self.log_path_for(session_id);

        let mut cmd = Command::new(&self.config.agent_cmd);
        for flag in self.config.agent_flags() {
            cmd.arg(flag);
        }
        cmd.arg("--session-log").arg(&log_path);
        cmd.current_dir(project_dir)
            .stdin(Stdio::from(prompt_file))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(false);
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn().map_err(LaunchError::SpawnFailed)?;
        let pid = child.id().unwrap_or(0);

        tracing::info!(
            session_id,
            pid,
            log_path = %log_path.display(),
            "Agent process launched"
        );

        Ok(SessionHandle {
            session_id: session_id.to_string(),
            pid,
            log_path,
            started_at: Utc::now(),
            event_id: event_id.map(str::to_string),
            child,
        })
    }

    /// Poll until the agent creates its session log. The timeout is a hard
    /// failure, never silently retried.
    pub async fn wait_for_log_file(&self, path: &Path) -> Result<(), LaunchError> {
        let interval = Duration::from_millis(self.config.log_wait_interval_ms);
        let deadline = tokio::time::Instant::now()
            + Duration::from_secs(self.config.log_wait_timeout_secs);

        loop {
            if path.exists() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(LaunchError::LogFileTimeout {
                    path: path.to_path_buf(),
                    waited_secs: self.config.log_wait_timeout_secs,
                });
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// Two-phase shutdown: polite stop signal, bounded wait, then force.
    pub async fn terminate(&self, handle: &mut SessionHandle) -> Result<(), LaunchError> {
        if handle.try_exited() {
            return Ok(());
        }

        #[cfg(unix)]
        {
            // SIGTERM first so the agent can flush its log.
            unsafe {
                libc::kill(handle.pid as i32, libc::SIGTERM);
            }

            let deadline = tokio::time::Instant::now()
                + Duration::from_secs(self.config.terminate_timeout_secs);
            while tokio::time::Instant::now() < deadline {
                if handle.try_exited() {
                    tracing::info!(pid = handle.pid, "Agent exited after polite stop");
                    return Ok(());
                }
                tokio::time::sleep(Duration::from_millis(EXIT_POLL_MS)).await;
            }
        }

        tracing::warn!(pid = handle.pid, "Forcing agent termination");
        handle
            .child
            .start_kill()
            .map_err(|err| LaunchError::TerminateFailed {
                pid: handle.pid,
                message: err.to_string(),
            })?;
        handle
            .child
            .wait()
            .await
            .map_err(|err| LaunchError::TerminateFailed {
                pid: handle.pid,
                message: err.to_string(),
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_config(dir: &Path, agent_cmd: &str, log_wait_timeout_secs: u64) -> Config {
        let mut config = Config::new(Some(dir.to_path_buf()), false).unwrap();
        config.agent_cmd = agent_cmd.to_string();
        config.log_wait_timeout_secs = log_wait_timeout_secs;
        config.log_wait_interval_ms = 50;
        config.terminate_timeout_secs = 1;
        config
    }

    /// A fake agent that honors `--session-log` and then sleeps.
    #[cfg(unix)]
    fn write_fake_agent(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let script = dir.join("fake-agent.sh");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\nLOG=\"\"\nwhile [ $# -gt 0 ]; do\n  if [ \"$1\" = \"--session-log\" ]; then LOG=\"$2\"; shift 2; continue; fi\n  shift\ndone\n{body}\n"
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[test]
    fn test_log_path_is_deterministic() {
        let dir = tempdir().unwrap();
        let config = make_config(dir.path(), "claude", 5);
        let launcher = SessionLauncher::new(config.clone());

        let path = launcher.log_path_for("abc-123");
        assert_eq!(path, config.log_dir.join("session-abc-123.jsonl"));
        assert_eq!(path, launcher.log_path_for("abc-123"));
    }

    #[tokio::test]
    async fn test_launch_missing_command_is_spawn_failure() {
        let dir = tempdir().unwrap();
        let config = make_config(dir.path(), "/nonexistent/agent-binary", 5);
        let launcher = SessionLauncher::new(config);

        let err = launcher
            .launch("s1", dir.path(), "do the work", None)
            .await
            .unwrap_err();
        assert!(matches!(err, LaunchError::SpawnFailed(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_launch_and_wait_for_log() {
        let dir = tempdir().unwrap();
        let script = write_fake_agent(
            dir.path(),
            "echo '{\"type\":\"system\",\"subtype\":\"init\"}' > \"$LOG\"\nsleep 30",
        );
        let config = make_config(dir.path(), script.to_str().unwrap(), 5);
        let launcher = SessionLauncher::new(config);

        let mut handle = launcher
            .launch("s1", dir.path(), "do the work", Some("evt-1"))
            .await
            .unwrap();
        launcher.wait_for_log_file(&handle.log_path).await.unwrap();
        assert!(handle.log_path.exists());
        assert_eq!(handle.event_id.as_deref(), Some("evt-1"));

        launcher.terminate(&mut handle).await.unwrap();
        assert!(handle.try_exited());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_scenario_d_log_never_appears_times_out() {
        let dir = tempdir().unwrap();
        // Agent that ignores the log path entirely.
        let script = write_fake_agent(dir.path(), "sleep 30");
        let config = make_config(dir.path(), script.to_str().unwrap(), 1);
        let launcher = SessionLauncher::new(config);

        let mut handle = launcher
            .launch("s1", dir.path(), "do the work", None)
            .await
            .unwrap();
        let err = launcher
            .wait_for_log_file(&handle.log_path)
            .await
            .unwrap_err();
        assert!(matches!(err, LaunchError::LogFileTimeout { .. }));

        launcher.terminate(&mut handle).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_terminate_polite_phase_suffices() {
        let dir = tempdir().unwrap();
        // Default SIGTERM disposition terminates the sleep.
        let script = write_fake_agent(dir.path(), "sleep 30");
        let config = make_config(dir.path(), script.to_str().unwrap(), 1);
        let launcher = SessionLauncher::new(config);

        let mut handle = launcher
            .launch("s1", dir.path(), "work", None)
            .await
            .unwrap();
        launcher.terminate(&mut handle).await.unwrap();
        assert!(handle.try_exited());
    }
}
