//! Session log monitor.
//!
//! Follows the agent's line-delimited event log from its current end of
//! file forward, classifying each line and emitting typed events. Tailing
//! is push-driven by file-change notification and cursor-based: a byte
//! offset plus a partial-line tail buffer make burst notifications safe,
//! so a line is classified exactly once no matter how the change events
//! arrive.

mod events;

pub use events::{
    AssistantMessage, ContentBlock, LogEntry, MonitorEvent, SessionMetrics, StopReason,
    TokenUsage, billable_tokens,
};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use regex::Regex;
use std::collections::HashSet;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::errors::MonitorError;

static OBJECTIVE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<objective-complete>\s*(.*?)\s*</objective-complete>").unwrap()
});

/// Per-line classification shared by live tailing and post-hoc replay.
struct Classifier {
    metrics: SessionMetrics,
    seen_objectives: HashSet<String>,
}

impl Classifier {
    fn new() -> Self {
        Self {
            metrics: SessionMetrics::default(),
            seen_objectives: HashSet::new(),
        }
    }

    fn classify(&mut self, line: &str) -> Vec<MonitorEvent> {
        let entry: LogEntry = match serde_json::from_str(line) {
            Ok(entry) => entry,
            Err(_) => {
                self.metrics.lines_malformed += 1;
                return vec![MonitorEvent::RawLine {
                    text: line.to_string(),
                }];
            }
        };
        self.metrics.lines_parsed += 1;

        let mut out = Vec::new();
        match entry {
            LogEntry::Assistant { message, .. } => {
                if let Some(usage) = message.usage {
                    // Cache-creation tokens count as input; cache reads are
                    // tracked on their own and billed discounted.
                    let input = usage.input_tokens + usage.cache_creation_input_tokens;
                    if input + usage.output_tokens + usage.cache_read_input_tokens > 0 {
                        self.metrics.input_tokens += input;
                        self.metrics.output_tokens += usage.output_tokens;
                        self.metrics.cache_read_tokens += usage.cache_read_input_tokens;
                        out.push(MonitorEvent::TokenDelta {
                            input_tokens: input,
                            output_tokens: usage.output_tokens,
                            cache_read_tokens: usage.cache_read_input_tokens,
                        });
                    }
                }
                for block in message.content {
                    match block {
                        ContentBlock::ToolUse { name, input, .. } => {
                            self.metrics.tool_calls += 1;
                            out.push(MonitorEvent::ToolCall { name, input });
                        }
                        ContentBlock::Text { text } => {
                            for cap in OBJECTIVE_REGEX.captures_iter(&text) {
                                let description = cap[1].trim().to_string();
                                if description.is_empty() {
                                    continue;
                                }
                                if self.seen_objectives.insert(description.clone()) {
                                    self.metrics.objectives_completed.push(description.clone());
                                    out.push(MonitorEvent::ObjectiveComplete { description });
                                }
                            }
                        }
                        ContentBlock::Thinking { .. } => {}
                    }
                }
            }
            LogEntry::User { tool_use_result } => {
                if let Some(payload) = tool_use_result {
                    out.push(MonitorEvent::ToolResult { payload });
                }
            }
            LogEntry::Result { is_error, .. } => {
                self.metrics.ended = true;
                self.metrics.ended_with_error = is_error;
                out.push(MonitorEvent::Stopped {
                    reason: StopReason::Completed { is_error },
                });
            }
            LogEntry::System { .. } => {}
        }
        out
    }
}

struct TailState {
    offset: u64,
    tail: String,
    classifier: Classifier,
    stop_emitted: bool,
}

/// Tails one session log and emits [`MonitorEvent`]s on a channel.
pub struct SessionLogMonitor {
    path: PathBuf,
    state: Arc<Mutex<TailState>>,
    events_tx: mpsc::UnboundedSender<MonitorEvent>,
    watcher: Option<RecommendedWatcher>,
    pump: Option<JoinHandle<()>>,
}

impl SessionLogMonitor {
    /// Begin tailing from the file's current end. History already in the
    /// file is never re-emitted. Must be called from a tokio runtime.
    pub fn start(
        path: &Path,
    ) -> Result<(Self, mpsc::UnboundedReceiver<MonitorEvent>), MonitorError> {
        let offset = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        Self::start_from(path, offset)
    }

    /// Begin tailing a just-created session log from its first byte. For a
    /// log nothing has read yet, the whole file is unread history.
    pub fn start_from_origin(
        path: &Path,
    ) -> Result<(Self, mpsc::UnboundedReceiver<MonitorEvent>), MonitorError> {
        Self::start_from(path, 0)
    }

    fn start_from(
        path: &Path,
        offset: u64,
    ) -> Result<(Self, mpsc::UnboundedReceiver<MonitorEvent>), MonitorError> {
        let state = Arc::new(Mutex::new(TailState {
            offset,
            tail: String::new(),
            classifier: Classifier::new(),
            stop_emitted: false,
        }));

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (fs_tx, mut fs_rx) = mpsc::unbounded_channel::<()>();

        let watch_dir = path
            .parent()
            .ok_or_else(|| MonitorError::WatchFailed {
                path: path.to_path_buf(),
                source: notify::Error::generic("session log has no parent directory"),
            })?
            .to_path_buf();

        let target = path.to_path_buf();
        let error_tx = events_tx.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
                        && event.paths.iter().any(|p| p == &target)
                    {
                        let _ = fs_tx.send(());
                    }
                }
                Err(err) => {
                    let _ = error_tx.send(MonitorEvent::StreamError {
                        message: err.to_string(),
                    });
                }
            },
            notify::Config::default(),
        )
        .map_err(|source| MonitorError::WatchFailed {
            path: path.to_path_buf(),
            source,
        })?;

        watcher
            .watch(&watch_dir, RecursiveMode::NonRecursive)
            .map_err(|source| MonitorError::WatchFailed {
                path: path.to_path_buf(),
                source,
            })?;

        let pump_path = path.to_path_buf();
        let pump_state = state.clone();
        let pump_tx = events_tx.clone();
        let pump = tokio::spawn(async move {
            while fs_rx.recv().await.is_some() {
                drain(&pump_path, &pump_state, &pump_tx);
            }
        });

        tracing::debug!(path = %path.display(), offset, "Session log monitor started");

        Ok((
            Self {
                path: path.to_path_buf(),
                state,
                events_tx,
                watcher: Some(watcher),
                pump: Some(pump),
            },
            events_rx,
        ))
    }

    /// Classify any bytes appended since the last notification. Safe to
    /// call at any time; a call with nothing pending is a no-op.
    pub fn drain_now(&self) {
        drain(&self.path, &self.state, &self.events_tx);
    }

    /// Snapshot of the running totals. Pure read.
    pub fn metrics(&self) -> SessionMetrics {
        lock(&self.state).classifier.metrics.clone()
    }

    /// Release the watcher and emit a final stop event. Idempotent.
    pub fn stop(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            drop(watcher);
        }
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        let mut st = lock(&self.state);
        if !st.stop_emitted {
            st.stop_emitted = true;
            let _ = self.events_tx.send(MonitorEvent::Stopped {
                reason: StopReason::Detached,
            });
        }
    }

    /// One-shot, stateless re-derivation of full metrics by replaying the
    /// entire log. For sessions the monitor did not watch live.
    pub fn analyze_completed_session(path: &Path) -> Result<SessionMetrics, MonitorError> {
        let content =
            std::fs::read_to_string(path).map_err(|source| MonitorError::ReadFailed {
                path: path.to_path_buf(),
                source,
            })?;
        let mut classifier = Classifier::new();
        for line in content.lines() {
            let line = line.trim();
            if !line.is_empty() {
                classifier.classify(line);
            }
        }
        Ok(classifier.metrics)
    }
}

impl Drop for SessionLogMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock(state: &Mutex<TailState>) -> std::sync::MutexGuard<'_, TailState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Read from the cursor to the current end of file and classify complete
/// lines. The cursor advances before parsing, so overlapping notifications
/// never double-classify.
fn drain(path: &Path, state: &Mutex<TailState>, tx: &mpsc::UnboundedSender<MonitorEvent>) {
    let mut st = lock(state);
    if st.stop_emitted {
        return;
    }

    let Ok(metadata) = std::fs::metadata(path) else {
        return;
    };
    let size = metadata.len();

    // A shrunk file means truncation; start over from the top.
    if size < st.offset {
        st.offset = 0;
        st.tail.clear();
    }
    if size == st.offset {
        return;
    }

    let chunk = match read_chunk(path, st.offset, size) {
        Ok(chunk) => chunk,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "Session log read failed");
            return;
        }
    };
    st.offset = size;

    let combined = format!("{}{}", st.tail, String::from_utf8_lossy(&chunk));
    let mut parts: Vec<&str> = combined.split('\n').collect();
    st.tail = parts.pop().unwrap_or_default().to_string();

    for part in parts {
        let line = part.trim();
        if line.is_empty() {
            continue;
        }
        for event in st.classifier.classify(line) {
            if matches!(event, MonitorEvent::Stopped { .. }) {
                st.stop_emitted = true;
            }
            let _ = tx.send(event);
        }
    }
}

fn read_chunk(path: &Path, offset: u64, size: u64) -> std::io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = Vec::with_capacity((size - offset) as usize);
    file.take(size - offset).read_to_end(&mut buf)?;
    Ok(buf)
}
