//! Best-effort metadata extraction from free-form system prompts.
//!
//! This is not a grammar: each label is an independent regex and any label
//! that is missing simply yields `None`.
//!
//! ```text
//! Role: a curious companion named Gemma.
//! Personality:
//! - whimsical, warm
//! Communication: - short sentences
//! ```

use regex::Regex;
use std::sync::OnceLock;

/// Fields recovered from a system prompt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptInfo {
    pub agent_name: Option<String>,
    pub personality: Option<String>,
    pub communication_style: Option<String>,
}

fn name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)named\s+([^\s,.]+)").expect("static regex"))
}

fn personality_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)Personality:\s*(?:- )?([^\n]+)").expect("static regex"))
}

fn communication_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)Communication:\s*(?:- )?([^\n]+)").expect("static regex"))
}

/// First capture of `re` in `text`, trimmed; empty captures count as absent.
fn first_capture(re: &Regex, text: &str) -> Option<String> {
    let captured = re.captures(text)?.get(1)?.as_str().trim();
    (!captured.is_empty()).then(|| captured.to_string())
}

pub fn parse_system_prompt(prompt: &str) -> PromptInfo {
    PromptInfo {
        agent_name: first_capture(name_re(), prompt),
        personality: first_capture(personality_re(), prompt),
        communication_style: first_capture(communication_re(), prompt),
    }
}
