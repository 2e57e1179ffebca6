//! Chat session logs: raw JSON files normalized into [`LogEntry`] records.
//!
//! A log file looks like:
//!
//! ```text
//! {
//!   "requestId": "req-1",
//!   "timestamp": 1738886400000,
//!   "entry": {
//!     "id": "session-1",
//!     "modelName": "gemma-2",
//!     "systemPrompt": "... named Gemma ...",
//!     "agentName": "...",            // optional, also under metadata
//!     "metadata": {
//!       "agentName": "...", "personality": "...", "communicationStyle": "...",
//!       "previewText": "...",
//!       "messages": [{ "role": "user", "content": "hi" }, ...]
//!     }
//!   }
//! }
//! ```
//!
//! Display fields are resolved through fallback chains (explicit metadata,
//! then explicit entry fields, then message or prompt heuristics). Empty
//! strings count as absent at every step.

use crate::error::LoadError;
use crate::loader::{self, LoadPolicy, Loaded};
use crate::prompt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

pub const UNKNOWN_AGENT: &str = "Unknown Agent";
pub const NO_MESSAGES: &str = "No messages";

/// Previews longer than this many characters get truncated
const PREVIEW_MAX_CHARS: usize = 150;
/// Characters kept before the ellipsis when truncating
const PREVIEW_KEEP_CHARS: usize = 147;
const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    /// Image reference; when set the message renders as an image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
}

/// A normalized chat session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: String,
    pub request_id: String,
    /// Epoch milliseconds
    pub timestamp: i64,
    pub model_name: String,
    pub agent_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub communication_style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_text: Option<String>,
    pub messages: Vec<ChatMessage>,
}

impl LogEntry {
    /// Text shown under the agent name in session lists
    pub fn display_preview(&self) -> &str {
        self.preview_text
            .as_deref()
            .or_else(|| self.messages.last().and_then(|m| m.content.as_deref()))
            .filter(|s| !s.is_empty())
            .unwrap_or(NO_MESSAGES)
    }
}

/// Load and normalize every log in `dir`, newest first.
pub fn load_logs(dir: &Path, policy: LoadPolicy) -> Result<Loaded<LogEntry>, LoadError> {
    let mut loaded = loader::load_each(dir, policy, |path, content| {
        let raw: Value = serde_json::from_str(content).map_err(|e| LoadError::json(path, e))?;
        normalize_log(path, &raw)
    })?;
    sort_newest_first(&mut loaded.items);
    Ok(loaded)
}

/// Reload `dir` and return the session with `id`.
pub fn get_log_by_id(dir: &Path, policy: LoadPolicy, id: &str) -> Result<Option<LogEntry>, LoadError> {
    let loaded = load_logs(dir, policy)?;
    Ok(loaded.items.into_iter().find(|log| log.id == id))
}

/// First session with `id` in an already loaded collection
pub fn find_log<'a>(logs: &'a [LogEntry], id: &str) -> Option<&'a LogEntry> {
    logs.iter().find(|log| log.id == id)
}

pub fn sort_newest_first(logs: &mut [LogEntry]) {
    logs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

/// Map one raw log document to a [`LogEntry`].
pub fn normalize_log(path: &Path, raw: &Value) -> Result<LogEntry, LoadError> {
    if !raw.is_object() {
        return Err(LoadError::shape(path, "top-level value is not an object"));
    }

    let request_id = raw
        .get("requestId")
        .and_then(|v| v.as_str())
        .ok_or_else(|| LoadError::shape(path, "missing string field `requestId`"))?;
    let timestamp = raw
        .get("timestamp")
        .and_then(timestamp_millis)
        .ok_or_else(|| LoadError::shape(path, "missing numeric field `timestamp`"))?;
    let entry = raw
        .get("entry")
        .filter(|v| v.is_object())
        .ok_or_else(|| LoadError::shape(path, "missing object field `entry`"))?;
    let id = entry
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| LoadError::shape(path, "missing string field `entry.id`"))?;
    let model_name = entry.get("modelName").and_then(|v| v.as_str()).unwrap_or_default();

    let metadata = entry.get("metadata");
    let messages: Vec<ChatMessage> = match metadata.and_then(|m| m.get("messages")) {
        None | Some(Value::Null) => Vec::new(),
        Some(v) => serde_json::from_value(v.clone()).map_err(|e| LoadError::json(path, e))?,
    };

    let system_prompt = entry.get("systemPrompt").and_then(|v| v.as_str()).unwrap_or_default();
    let prompt_info = prompt::parse_system_prompt(system_prompt);

    let agent_name = explicit_field(entry, "agentName")
        .or_else(|| first_assistant_name(&messages))
        .or(prompt_info.agent_name)
        .unwrap_or_else(|| UNKNOWN_AGENT.to_string());

    let preview_text = explicit_field(entry, "previewText").or_else(|| {
        messages.last().map(|last| {
            let content = last.content.as_deref().filter(|c| !c.is_empty()).unwrap_or(NO_MESSAGES);
            truncate_preview(content)
        })
    });

    let personality = explicit_field(entry, "personality").or(prompt_info.personality);
    let communication_style =
        explicit_field(entry, "communicationStyle").or(prompt_info.communication_style);

    Ok(LogEntry {
        id: id.to_string(),
        request_id: request_id.to_string(),
        timestamp,
        model_name: model_name.to_string(),
        agent_name,
        personality,
        communication_style,
        preview_text,
        messages,
    })
}

/// Accept integer or float timestamps
fn timestamp_millis(v: &Value) -> Option<i64> {
    v.as_i64()
        .or_else(|| v.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
}

fn non_empty_str(v: Option<&Value>) -> Option<String> {
    v.and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// `entry.metadata.<key>`, then `entry.<key>`
fn explicit_field(entry: &Value, key: &str) -> Option<String> {
    non_empty_str(entry.get("metadata").and_then(|m| m.get(key))).or_else(|| non_empty_str(entry.get(key)))
}

/// `agentName` of the first assistant message (later ones are not consulted)
fn first_assistant_name(messages: &[ChatMessage]) -> Option<String> {
    messages
        .iter()
        .find(|m| m.role == Role::Assistant)?
        .agent_name
        .clone()
        .filter(|s| !s.is_empty())
}

pub fn truncate_preview(text: &str) -> String {
    if text.chars().count() > PREVIEW_MAX_CHARS {
        let kept: String = text.chars().take(PREVIEW_KEEP_CHARS).collect();
        format!("{}{}", kept, ELLIPSIS)
    } else {
        text.to_string()
    }
}
