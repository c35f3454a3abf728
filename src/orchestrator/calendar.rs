//! Calendar collaborator seam.
//!
//! The orchestrator never constructs schedules; it reads entries a
//! scheduling collaborator resolved, each carrying an opaque plan bundle.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Resolved configuration bundle attached to a scheduled entry. The
/// orchestrator only reads this; the scheduling side owns its contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionPlan {
    pub project_dir: PathBuf,
    /// Token budget the session is expected to need.
    pub token_budget: u64,
    pub phase: String,
    #[serde(default)]
    pub objectives: Vec<String>,
}

/// One upcoming scheduled session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledSession {
    pub event_id: String,
    pub starts_at: DateTime<Utc>,
    pub plan: SessionPlan,
}

/// Source of upcoming scheduled sessions.
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    async fn upcoming(&self) -> anyhow::Result<Vec<ScheduledSession>>;
}

/// Boundary binding that reads a `schedule.json` file maintained by the
/// scheduling collaborator. A missing file means an empty schedule.
pub struct FileCalendar {
    path: PathBuf,
}

impl FileCalendar {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

#[async_trait]
impl CalendarProvider for FileCalendar {
    async fn upcoming(&self) -> anyhow::Result<Vec<ScheduledSession>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let entries: Vec<ScheduledSession> = serde_json::from_str(&raw)?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_schedule_is_empty() {
        let dir = tempdir().unwrap();
        let calendar = FileCalendar::new(&dir.path().join("schedule.json"));
        assert!(calendar.upcoming().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_schedule_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("schedule.json");
        let entries = vec![ScheduledSession {
            event_id: "evt-1".into(),
            starts_at: "2026-08-06T09:00:00Z".parse().unwrap(),
            plan: SessionPlan {
                project_dir: PathBuf::from("/work/project"),
                token_budget: 60_000,
                phase: "implementation".into(),
                objectives: vec!["wire the API".into()],
            },
        }];
        std::fs::write(&path, serde_json::to_string(&entries).unwrap()).unwrap();

        let calendar = FileCalendar::new(&path);
        let loaded = calendar.upcoming().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].event_id, "evt-1");
        assert_eq!(loaded[0].plan.token_budget, 60_000);
    }

    #[tokio::test]
    async fn test_malformed_schedule_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("schedule.json");
        std::fs::write(&path, "[ not json").unwrap();

        let calendar = FileCalendar::new(&path);
        assert!(calendar.upcoming().await.is_err());
    }
}
