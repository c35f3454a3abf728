//! Session log entry types and the monitor's outward event contract.
//!
//! The agent writes a line-delimited stream-JSON log; each line is one
//! entry. Parsing is per-line and independent: a malformed line becomes a
//! raw-text event, never a stream failure.

use serde::Deserialize;
use serde_json::Value;

/// One parsed log line, tagged by role.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum LogEntry {
    #[serde(rename = "assistant")]
    Assistant {
        message: AssistantMessage,
        #[serde(default)]
        session_id: String,
    },

    #[serde(rename = "user")]
    User {
        #[serde(default)]
        tool_use_result: Option<Value>,
    },

    #[serde(rename = "result")]
    Result {
        subtype: String,
        #[serde(default)]
        is_error: bool,
    },

    #[serde(rename = "system")]
    System { subtype: String },
}

#[derive(Debug, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "tool_use")]
    ToolUse {
        name: String,
        input: Value,
        #[serde(default)]
        id: String,
    },

    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "thinking")]
    Thinking {
        #[serde(default)]
        thinking: String,
    },
}

/// Raw usage block attached to assistant entries.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

/// Typed events the monitor emits to its observer.
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    /// Incremental token consumption from one assistant entry.
    TokenDelta {
        /// Fresh input plus cache-creation tokens.
        input_tokens: u64,
        output_tokens: u64,
        /// Tracked separately; billed at a 90% discount.
        cache_read_tokens: u64,
    },
    ToolCall {
        name: String,
        input: Value,
    },
    ToolResult {
        payload: Value,
    },
    ObjectiveComplete {
        description: String,
    },
    /// An unparsable line, surfaced rather than dropped.
    RawLine {
        text: String,
    },
    StreamError {
        message: String,
    },
    Stopped {
        reason: StopReason,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The log carried a terminal result entry.
    Completed { is_error: bool },
    /// `stop()` was called on the monitor.
    Detached,
}

/// Discounted token total a `TokenDelta` contributes to the quota window.
pub fn billable_tokens(input: u64, output: u64, cache_read: u64) -> u64 {
    input + output + cache_read / 10
}

/// Running totals for one session.
#[derive(Debug, Clone, Default)]
pub struct SessionMetrics {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub tool_calls: u64,
    pub objectives_completed: Vec<String>,
    pub lines_parsed: u64,
    pub lines_malformed: u64,
    pub ended: bool,
    pub ended_with_error: bool,
}

impl SessionMetrics {
    pub fn billable_tokens(&self) -> u64 {
        billable_tokens(
            self.input_tokens,
            self.output_tokens,
            self.cache_read_tokens,
        )
    }
}
