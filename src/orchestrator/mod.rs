//! Calendar-triggered session orchestrator.
//!
//! Polls the calendar collaborator on a fixed interval, warns ahead of
//! scheduled sessions, launches the agent at the scheduled instant, wires
//! the log monitor's events into the quota tracker, and finalizes the
//! session when the stream ends. At most one session is active at a time;
//! each poll tick is a complete, non-overlapping unit of work.

mod calendar;

pub use calendar::{CalendarProvider, FileCalendar, ScheduledSession, SessionPlan};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::alerts::{NotificationSink, Urgency};
use crate::config::Config;
use crate::launcher::{SessionHandle, SessionLauncher};
use crate::monitor::{MonitorEvent, SessionLogMonitor, SessionMetrics, billable_tokens};
use crate::quota::QuotaTracker;
use crate::store::StateStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    Polling,
    Triggering,
    Active,
    Completing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionLiveness {
    Pending,
    Active,
    Complete,
    Expired,
}

/// Orchestrator-level view of one scheduled session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionWindow {
    pub id: String,
    pub event_id: String,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
    pub status: SessionLiveness,
    pub tokens_used: u64,
}

/// Per-session bookkeeping written on finalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: String,
    pub event_id: String,
    pub phase: String,
    pub scheduled_budget: u64,
    pub billable_tokens: u64,
    /// Actual minus budgeted tokens.
    pub variance: i64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub tool_calls: u64,
    pub objectives_completed: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub ended_with_error: bool,
}

/// Events surfaced to the embedding application.
#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    Warning {
        event_id: String,
        lead_minutes: i64,
        minutes_until: i64,
    },
    /// Auto-start is off and a session is due.
    Ready { event_id: String },
    Started {
        session_id: String,
        event_id: String,
    },
    TokenDelta {
        session_id: String,
        billable_tokens: u64,
    },
    ToolCall {
        session_id: String,
        name: String,
    },
    ToolResult {
        session_id: String,
        payload: serde_json::Value,
    },
    ObjectiveComplete {
        session_id: String,
        description: String,
    },
    Skipped {
        event_id: String,
        reason: String,
    },
    Completed { report: SessionReport },
}

struct ActiveSession {
    window: SessionWindow,
    handle: SessionHandle,
    monitor: SessionLogMonitor,
    monitor_rx: mpsc::UnboundedReceiver<MonitorEvent>,
    phase: String,
    budget: u64,
}

pub struct Orchestrator {
    config: Config,
    calendar: Arc<dyn CalendarProvider>,
    quota: QuotaTracker,
    launcher: SessionLauncher,
    sink: Arc<dyn NotificationSink>,
    store: StateStore,
    events_tx: mpsc::UnboundedSender<OrchestratorEvent>,
    shutdown_rx: watch::Receiver<bool>,
    state: OrchestratorState,
    /// `(event_id, lead)` pairs already warned.
    warned: HashSet<String>,
    /// Events already launched, deferred, or surfaced as ready.
    handled: HashSet<String>,
    /// Events whose skip-while-active was already logged.
    skip_logged: HashSet<String>,
    active: Option<ActiveSession>,
}

impl Orchestrator {
    /// Returns the orchestrator, its outward event stream, and the stop
    /// signal that cancels the run loop (and any pending grace wait).
    pub fn new(
        config: Config,
        calendar: Arc<dyn CalendarProvider>,
        quota: QuotaTracker,
        sink: Arc<dyn NotificationSink>,
    ) -> (
        Self,
        mpsc::UnboundedReceiver<OrchestratorEvent>,
        watch::Sender<bool>,
    ) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let launcher = SessionLauncher::new(config.clone());
        let store = StateStore::new(&config.state_dir);
        (
            Self {
                config,
                calendar,
                quota,
                launcher,
                sink,
                store,
                events_tx,
                shutdown_rx,
                state: OrchestratorState::Idle,
                warned: HashSet::new(),
                handled: HashSet::new(),
                skip_logged: HashSet::new(),
                active: None,
            },
            events_rx,
            shutdown_tx,
        )
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn active_window(&self) -> Option<SessionWindow> {
        self.active.as_ref().map(|a| a.window.clone())
    }

    /// Run until the stop signal fires. Each tick settles completely
    /// before the next one starts.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        self.state = OrchestratorState::Polling;
        let mut ticker =
            tokio::time::interval(Duration::from_secs(self.config.poll_interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *self.shutdown_rx.borrow() {
                break;
            }

            enum Input {
                Tick,
                Monitor(Option<MonitorEvent>),
                Shutdown,
            }

            let input = {
                let monitor_rx = self.active.as_mut().map(|a| &mut a.monitor_rx);
                tokio::select! {
                    _ = ticker.tick() => Input::Tick,
                    ev = recv_or_pending(monitor_rx) => Input::Monitor(ev),
                    _ = self.shutdown_rx.changed() => Input::Shutdown,
                }
            };

            match input {
                Input::Tick => {
                    if let Err(err) = self.tick(Utc::now()).await {
                        tracing::warn!(error = %err, "Poll tick failed");
                    }
                }
                Input::Monitor(Some(event)) => self.on_monitor_event(event).await?,
                Input::Monitor(None) => self.finalize_active().await?,
                Input::Shutdown => break,
            }
        }

        if let Some(mut active) = self.active.take() {
            tracing::info!(session_id = %active.window.id, "Stopping active session");
            active.monitor.stop();
            if let Err(err) = self.launcher.terminate(&mut active.handle).await {
                tracing::warn!(error = %err, "Termination on shutdown failed");
            }
        }
        self.state = OrchestratorState::Idle;
        Ok(())
    }

    /// One complete poll cycle against the calendar at the given instant.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> anyhow::Result<()> {
        if self.state == OrchestratorState::Idle {
            self.state = OrchestratorState::Polling;
        }

        // An agent that died without a terminal log entry still ends the
        // session: drain whatever it flushed, then close the stream.
        if let Some(active) = self.active.as_mut() {
            if active.handle.try_exited() {
                active.monitor.drain_now();
                active.monitor.stop();
            }
        }

        // A session that outlives its scheduled window is torn down.
        if self
            .active
            .as_ref()
            .is_some_and(|a| now >= a.window.scheduled_end)
        {
            if let Some(active) = self.active.as_mut() {
                tracing::warn!(
                    session_id = %active.window.id,
                    "Session exceeded its scheduled window; expiring"
                );
                active.window.status = SessionLiveness::Expired;
            }
            self.finalize_active().await?;
        }

        let entries = match self.calendar.upcoming().await {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(error = %err, "Calendar unavailable; staying in polling");
                return Ok(());
            }
        };

        for entry in entries {
            let minutes_until = (entry.starts_at - now).num_minutes();
            let scheduled_end =
                entry.starts_at + ChronoDuration::minutes(self.config.phase_duration_mins);

            if now >= scheduled_end {
                continue;
            }

            if minutes_until > 0 {
                self.emit_warnings(&entry, minutes_until);
                continue;
            }

            if self.handled.contains(&entry.event_id) {
                continue;
            }

            if self.active.is_some() {
                if self.skip_logged.insert(entry.event_id.clone()) {
                    tracing::warn!(
                        event_id = %entry.event_id,
                        "Session already active; skipping trigger"
                    );
                    self.emit(OrchestratorEvent::Skipped {
                        event_id: entry.event_id.clone(),
                        reason: "another session is active".into(),
                    });
                }
                continue;
            }

            let admission = self.quota.can_admit(entry.plan.token_budget)?;
            if !admission.admit {
                self.quota.defer_session(
                    &entry.event_id,
                    entry.plan.token_budget,
                    "quota window exhausted",
                )?;
                self.sink.notify(
                    &format!(
                        "Deferring session {}: {} tokens needed, {} remaining (window resets {})",
                        entry.event_id,
                        entry.plan.token_budget,
                        admission.remaining,
                        admission.reset_at.format("%H:%M")
                    ),
                    Urgency::High,
                );
                self.emit(OrchestratorEvent::Skipped {
                    event_id: entry.event_id.clone(),
                    reason: "quota window exhausted".into(),
                });
                self.handled.insert(entry.event_id);
                continue;
            }

            if !self.config.auto_start {
                self.sink.notify(
                    &format!("Session {} is ready to start", entry.event_id),
                    Urgency::Normal,
                );
                self.emit(OrchestratorEvent::Ready {
                    event_id: entry.event_id.clone(),
                });
                self.handled.insert(entry.event_id);
                continue;
            }

            self.trigger(entry, now).await;
            break;
        }

        Ok(())
    }

    /// Warnings fire once per `(event, lead-time)` pair.
    fn emit_warnings(&mut self, entry: &ScheduledSession, minutes_until: i64) {
        for &lead in &self.config.lead_times_mins {
            if minutes_until > lead {
                continue;
            }
            let key = format!("{}-{}", entry.event_id, lead);
            if !self.warned.insert(key) {
                continue;
            }
            let urgency = if lead <= 5 {
                Urgency::High
            } else {
                Urgency::Normal
            };
            self.sink.notify(
                &format!(
                    "Session {} ({}) starts in {} minutes",
                    entry.event_id, entry.plan.phase, minutes_until
                ),
                urgency,
            );
            self.emit(OrchestratorEvent::Warning {
                event_id: entry.event_id.clone(),
                lead_minutes: lead,
                minutes_until,
            });
        }
    }

    /// The triggering transition: grace wait, launch, bind the monitor.
    /// Any failure aborts back to polling with no session marked active.
    async fn trigger(&mut self, entry: ScheduledSession, now: DateTime<Utc>) {
        self.state = OrchestratorState::Triggering;

        let grace = Duration::from_secs(self.config.start_grace_secs);
        tokio::select! {
            _ = tokio::time::sleep(grace) => {}
            _ = self.shutdown_rx.changed() => {
                tracing::info!(event_id = %entry.event_id, "Trigger cancelled by stop signal");
                self.state = OrchestratorState::Polling;
                return;
            }
        }

        let session_id = Uuid::new_v4().to_string();
        let prompt = build_prompt(&entry.plan);

        let mut handle = match self
            .launcher
            .launch(
                &session_id,
                &entry.plan.project_dir,
                &prompt,
                Some(&entry.event_id),
            )
            .await
        {
            Ok(handle) => handle,
            Err(err) => {
                tracing::error!(event_id = %entry.event_id, error = %err, "Launch failed");
                self.sink
                    .notify(&format!("Session launch failed: {err}"), Urgency::Critical);
                self.state = OrchestratorState::Polling;
                return;
            }
        };

        if let Err(err) = self.launcher.wait_for_log_file(&handle.log_path).await {
            tracing::error!(event_id = %entry.event_id, error = %err, "Session log never appeared");
            self.sink
                .notify(&format!("Session aborted: {err}"), Urgency::Critical);
            if let Err(term_err) = self.launcher.terminate(&mut handle).await {
                tracing::warn!(error = %term_err, "Cleanup termination failed");
            }
            self.state = OrchestratorState::Polling;
            return;
        }

        let (monitor, monitor_rx) = match SessionLogMonitor::start_from_origin(&handle.log_path) {
            Ok(pair) => pair,
            Err(err) => {
                tracing::error!(event_id = %entry.event_id, error = %err, "Monitor bind failed");
                if let Err(term_err) = self.launcher.terminate(&mut handle).await {
                    tracing::warn!(error = %term_err, "Cleanup termination failed");
                }
                self.state = OrchestratorState::Polling;
                return;
            }
        };

        let window = SessionWindow {
            id: session_id.clone(),
            event_id: entry.event_id.clone(),
            scheduled_start: entry.starts_at,
            scheduled_end: entry.starts_at
                + ChronoDuration::minutes(self.config.phase_duration_mins),
            status: SessionLiveness::Active,
            tokens_used: 0,
        };

        tracing::info!(
            session_id = %session_id,
            event_id = %entry.event_id,
            phase = %entry.plan.phase,
            scheduled_start = %entry.starts_at,
            actual_start = %now,
            "Session active"
        );

        // Anything the agent flushed before the bind is still unread.
        monitor.drain_now();

        self.handled.insert(entry.event_id.clone());
        self.active = Some(ActiveSession {
            window,
            handle,
            monitor,
            monitor_rx,
            phase: entry.plan.phase.clone(),
            budget: entry.plan.token_budget,
        });
        self.state = OrchestratorState::Active;
        self.emit(OrchestratorEvent::Started {
            session_id,
            event_id: entry.event_id,
        });
    }

    async fn on_monitor_event(&mut self, event: MonitorEvent) -> anyhow::Result<()> {
        let Some(active) = self.active.as_mut() else {
            return Ok(());
        };
        let session_id = active.window.id.clone();

        match event {
            MonitorEvent::TokenDelta {
                input_tokens,
                output_tokens,
                cache_read_tokens,
            } => {
                let billable = billable_tokens(input_tokens, output_tokens, cache_read_tokens);
                active.window.tokens_used += billable;
                self.quota.record_consumption(&session_id, billable)?;
                self.emit(OrchestratorEvent::TokenDelta {
                    session_id,
                    billable_tokens: billable,
                });
            }
            MonitorEvent::ToolCall { name, .. } => {
                self.emit(OrchestratorEvent::ToolCall { session_id, name });
            }
            MonitorEvent::ToolResult { payload } => {
                self.emit(OrchestratorEvent::ToolResult {
                    session_id,
                    payload,
                });
            }
            MonitorEvent::ObjectiveComplete { description } => {
                tracing::info!(session_id = %session_id, objective = %description, "Objective complete");
                self.emit(OrchestratorEvent::ObjectiveComplete {
                    session_id,
                    description,
                });
            }
            MonitorEvent::RawLine { text } => {
                tracing::debug!(session_id = %session_id, line = %text, "Unparsed log line");
            }
            MonitorEvent::StreamError { message } => {
                tracing::warn!(session_id = %session_id, error = %message, "Session log stream error");
            }
            MonitorEvent::Stopped { .. } => {
                self.finalize_active().await?;
            }
        }
        Ok(())
    }

    /// Close out the active session: final metrics, report, completion
    /// event, back to polling.
    async fn finalize_active(&mut self) -> anyhow::Result<()> {
        let Some(mut active) = self.active.take() else {
            return Ok(());
        };
        self.state = OrchestratorState::Completing;

        active.monitor.drain_now();
        let metrics = active.monitor.metrics();
        active.monitor.stop();
        if let Err(err) = self.launcher.terminate(&mut active.handle).await {
            tracing::warn!(error = %err, "Post-session termination failed");
        }

        if active.window.status != SessionLiveness::Expired {
            active.window.status = SessionLiveness::Complete;
        }
        let report = build_report(&active, metrics, Utc::now());
        self.store
            .save(&format!("sessions/{}", report.session_id), &report)?;

        tracing::info!(
            session_id = %report.session_id,
            billable_tokens = report.billable_tokens,
            variance = report.variance,
            objectives = report.objectives_completed.len(),
            "Session complete"
        );
        self.sink.notify(
            &format!(
                "Session {} complete: {} tokens used ({} budgeted), {} objectives done",
                report.session_id,
                report.billable_tokens,
                report.scheduled_budget,
                report.objectives_completed.len()
            ),
            Urgency::Normal,
        );
        self.emit(OrchestratorEvent::Completed { report });

        self.state = OrchestratorState::Polling;
        Ok(())
    }

    fn emit(&self, event: OrchestratorEvent) {
        let _ = self.events_tx.send(event);
    }
}

async fn recv_or_pending(
    rx: Option<&mut mpsc::UnboundedReceiver<MonitorEvent>>,
) -> Option<MonitorEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn build_prompt(plan: &SessionPlan) -> String {
    let objectives = plan
        .objectives
        .iter()
        .map(|o| format!("- {o}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are working a scheduled {} session.\n\n\
         ## OBJECTIVES\n{}\n\n\
         ## RULES\n\
         1. Work the objectives in order\n\
         2. Verify each change before moving on\n\
         3. When an objective is fully complete and verified, output:\n\
         <objective-complete>objective description</objective-complete>\n",
        plan.phase, objectives
    )
}

fn build_report(
    active: &ActiveSession,
    metrics: SessionMetrics,
    ended_at: DateTime<Utc>,
) -> SessionReport {
    let billable = metrics.billable_tokens();
    SessionReport {
        session_id: active.window.id.clone(),
        event_id: active.window.event_id.clone(),
        phase: active.phase.clone(),
        scheduled_budget: active.budget,
        billable_tokens: billable,
        variance: billable as i64 - active.budget as i64,
        input_tokens: metrics.input_tokens,
        output_tokens: metrics.output_tokens,
        cache_read_tokens: metrics.cache_read_tokens,
        tool_calls: metrics.tool_calls,
        objectives_completed: metrics.objectives_completed,
        started_at: active.handle.started_at,
        ended_at,
        ended_with_error: metrics.ended_with_error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::testing::RecordingSink;
    use crate::quota::PlanTier;
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct StaticCalendar {
        entries: Mutex<Vec<ScheduledSession>>,
    }

    #[async_trait::async_trait]
    impl CalendarProvider for StaticCalendar {
        async fn upcoming(&self) -> anyhow::Result<Vec<ScheduledSession>> {
            Ok(self.entries.lock().unwrap().clone())
        }
    }

    fn entry(event_id: &str, starts_at: DateTime<Utc>, budget: u64) -> ScheduledSession {
        ScheduledSession {
            event_id: event_id.into(),
            starts_at,
            plan: SessionPlan {
                project_dir: std::env::temp_dir(),
                token_budget: budget,
                phase: "implementation".into(),
                objectives: vec!["finish the parser".into()],
            },
        }
    }

    fn make_orchestrator(
        dir: &std::path::Path,
        entries: Vec<ScheduledSession>,
        auto_start: bool,
    ) -> (
        Orchestrator,
        mpsc::UnboundedReceiver<OrchestratorEvent>,
        Arc<RecordingSink>,
    ) {
        let mut config = Config::new(Some(dir.to_path_buf()), false).unwrap();
        config.auto_start = auto_start;
        config.start_grace_secs = 0;

        let sink = Arc::new(RecordingSink::new());
        let quota = QuotaTracker::new(
            StateStore::new(&config.state_dir),
            sink.clone(),
            PlanTier::Max5x,
        )
        .with_capacity(200_000);
        let calendar = Arc::new(StaticCalendar {
            entries: Mutex::new(entries),
        });
        let (orch, events_rx, _shutdown) =
            Orchestrator::new(config, calendar, quota, sink.clone());
        (orch, events_rx, sink)
    }

    fn t0() -> DateTime<Utc> {
        "2026-08-06T12:00:00Z".parse().unwrap()
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<OrchestratorEvent>) -> Vec<OrchestratorEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    #[tokio::test]
    async fn test_scenario_c_warnings_fire_once_per_lead() {
        let dir = tempdir().unwrap();
        let start = t0() + ChronoDuration::minutes(20);
        let (mut orch, mut rx, _sink) =
            make_orchestrator(dir.path(), vec![entry("evt-1", start, 10_000)], true);

        // 20 minutes out: inside the 30-minute lead.
        orch.tick(t0()).await.unwrap();
        let events = drain(&mut rx);
        assert!(matches!(
            events.as_slice(),
            [OrchestratorEvent::Warning { lead_minutes: 30, .. }]
        ));

        // Still 20 minutes out on the next tick: no re-fire.
        orch.tick(t0() + ChronoDuration::seconds(30)).await.unwrap();
        assert!(drain(&mut rx).is_empty());

        // 3 minutes out: only the 5-minute lead fires, exactly once.
        let three_before = start - ChronoDuration::minutes(3);
        orch.tick(three_before).await.unwrap();
        let events = drain(&mut rx);
        assert!(matches!(
            events.as_slice(),
            [OrchestratorEvent::Warning { lead_minutes: 5, minutes_until: 3, .. }]
        ));

        orch.tick(three_before + ChronoDuration::seconds(30))
            .await
            .unwrap();
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_due_session_without_autostart_surfaces_ready() {
        let dir = tempdir().unwrap();
        let (mut orch, mut rx, _sink) =
            make_orchestrator(dir.path(), vec![entry("evt-1", t0(), 10_000)], false);

        orch.tick(t0()).await.unwrap();
        let events = drain(&mut rx);
        assert!(matches!(events.as_slice(), [OrchestratorEvent::Ready { .. }]));
        assert_eq!(orch.state(), OrchestratorState::Polling);
        assert!(orch.active_window().is_none());

        // Ready surfaces once, not every tick.
        orch.tick(t0() + ChronoDuration::minutes(1)).await.unwrap();
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_insufficient_quota_defers_instead_of_launching() {
        let dir = tempdir().unwrap();
        let (mut orch, mut rx, _sink) =
            make_orchestrator(dir.path(), vec![entry("evt-1", t0(), 60_000)], true);

        // Consume most of the 200k window first.
        orch.quota.record_consumption("prior", 150_000).unwrap();

        orch.tick(t0()).await.unwrap();
        let events = drain(&mut rx);
        assert!(matches!(
            events.as_slice(),
            [OrchestratorEvent::Skipped { .. }]
        ));
        assert!(orch.active_window().is_none());

        let deferred = orch.quota.deferred();
        assert_eq!(deferred.len(), 1);
        assert_eq!(deferred[0].id, "evt-1");
    }

    #[tokio::test]
    async fn test_long_past_entries_are_ignored() {
        let dir = tempdir().unwrap();
        let stale = t0() - ChronoDuration::hours(10);
        let (mut orch, mut rx, _sink) =
            make_orchestrator(dir.path(), vec![entry("evt-old", stale, 10_000)], false);

        orch.tick(t0()).await.unwrap();
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_calendar_failure_stays_polling() {
        struct BrokenCalendar;
        #[async_trait::async_trait]
        impl CalendarProvider for BrokenCalendar {
            async fn upcoming(&self) -> anyhow::Result<Vec<ScheduledSession>> {
                anyhow::bail!("calendar offline")
            }
        }

        let dir = tempdir().unwrap();
        let config = Config::new(Some(dir.path().to_path_buf()), false).unwrap();
        let sink = Arc::new(RecordingSink::new());
        let quota = QuotaTracker::new(
            StateStore::new(&config.state_dir),
            sink.clone(),
            PlanTier::Pro,
        );
        let (mut orch, _rx, _shutdown) =
            Orchestrator::new(config, Arc::new(BrokenCalendar), quota, sink);

        orch.tick(t0()).await.unwrap();
        assert!(orch.active_window().is_none());
    }

    #[test]
    fn test_prompt_lists_objectives_and_marker() {
        let plan = SessionPlan {
            project_dir: std::env::temp_dir(),
            token_budget: 1_000,
            phase: "review".into(),
            objectives: vec!["triage findings".into(), "fix criticals".into()],
        };
        let prompt = build_prompt(&plan);
        assert!(prompt.contains("scheduled review session"));
        assert!(prompt.contains("- triage findings"));
        assert!(prompt.contains("<objective-complete>"));
    }
}
