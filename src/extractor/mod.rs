// Session log extraction
// Turns the agent's persisted event logs into (query, answer) conversation turns


use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::{MemoryError, Result};

pub const SESSION_START_MARKER: &str = "Started new session with input:";
pub const FINAL_ANSWER_MARKER: &str = "FINAL_ANSWER:";

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One answered query from a past session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Searchable text that gets embedded
    pub text: String,
    pub query: String,
    pub answer: String,
    pub session_id: String,
    /// Seconds since the Unix epoch, taken from the final answer record
    pub timestamp: f64,
    /// `timestamp` rendered in UTC
    pub date: String,
}

impl ConversationTurn {
    #[inline]
    pub fn new(query: String, answer: String, session_id: String, timestamp: f64) -> Self {
        Self {
            text: format!("Query: {}\nAnswer: {}", query, answer),
            date: render_date(timestamp),
            query,
            answer,
            session_id,
            timestamp,
        }
    }
}

/// Render epoch seconds as `YYYY-MM-DD HH:MM:SS` in UTC
#[inline]
pub fn render_date(timestamp: f64) -> String {
    let seconds = timestamp.floor();
    let nanos = (((timestamp - seconds) * 1e9) as u32).min(999_999_999);
    DateTime::<Utc>::from_timestamp(seconds as i64, nanos)
        .unwrap_or_default()
        .format(DATE_FORMAT)
        .to_string()
}

/// A decoded event from a session log
#[derive(Debug, Clone, PartialEq)]
pub enum LogRecord {
    SessionStart { text: String, timestamp: f64 },
    ToolOutput { result: String, timestamp: f64 },
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawRecord {
    RunMetadata {
        #[serde(default)]
        text: String,
        #[serde(default)]
        timestamp: f64,
    },
    ToolOutput {
        #[serde(default)]
        tool_result: Option<RawToolResult>,
        #[serde(default)]
        timestamp: f64,
    },
}

#[derive(Debug, Deserialize)]
struct RawToolResult {
    #[serde(default)]
    result: Option<String>,
}

impl LogRecord {
    /// Decode one record; anything that is not a well-formed known shape is `Other`
    #[inline]
    pub fn decode(value: serde_json::Value) -> Self {
        match serde_json::from_value::<RawRecord>(value) {
            Ok(RawRecord::RunMetadata { text, timestamp }) => Self::SessionStart { text, timestamp },
            Ok(RawRecord::ToolOutput {
                tool_result,
                timestamp,
            }) => Self::ToolOutput {
                result: tool_result.and_then(|r| r.result).unwrap_or_default(),
                timestamp,
            },
            Err(_) => Self::Other,
        }
    }
}

/// Decode a whole session log. The log must be a JSON array of records.
#[inline]
pub fn parse_session_log(bytes: &[u8]) -> Result<Vec<LogRecord>> {
    let values: Vec<serde_json::Value> = serde_json::from_slice(bytes)
        .map_err(|e| MemoryError::SessionLog(format!("not a JSON array of records: {}", e)))?;
    Ok(values.into_iter().map(LogRecord::decode).collect())
}

/// Session identifier for a log file: its file name without extension
#[inline]
pub fn session_id_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Text between the first occurrence of `marker` and the next one, trimmed
fn marker_segment<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    text.split(marker).nth(1).map(str::trim)
}

/// Pair each session start with the next final answer.
///
/// A final answer with no pending query is dropped, and a query that never
/// receives an answer produces nothing.
#[inline]
pub fn extract_turns(records: &[LogRecord], session_id: &str) -> Vec<ConversationTurn> {
    let mut turns = Vec::new();
    let mut pending_query: Option<&str> = None;

    for record in records {
        match record {
            LogRecord::SessionStart { text, .. } => {
                if let Some(query) = marker_segment(text, SESSION_START_MARKER) {
                    pending_query = Some(query).filter(|q| !q.is_empty());
                }
            }
            LogRecord::ToolOutput { result, timestamp } => {
                let Some(answer) = marker_segment(result, FINAL_ANSWER_MARKER) else {
                    continue;
                };
                if answer.is_empty() {
                    continue;
                }
                if let Some(query) = pending_query.take() {
                    turns.push(ConversationTurn::new(
                        query.to_string(),
                        answer.to_string(),
                        session_id.to_string(),
                        *timestamp,
                    ));
                }
            }
            LogRecord::Other => {}
        }
    }

    debug!("Extracted {} turns from session {}", turns.len(), session_id);
    turns
}

/// Parse raw log bytes and extract every turn
#[inline]
pub fn extract_from_bytes(bytes: &[u8], session_id: &str) -> Result<Vec<ConversationTurn>> {
    let records = parse_session_log(bytes)?;
    Ok(extract_turns(&records, session_id))
}
