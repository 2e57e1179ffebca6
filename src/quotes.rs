//! Agent quotes and the featured-quote rotation on the home page.
//!
//! Quote files are arrays of `{ "quote": ..., "sessionId": ... }` objects.
//! The agent label comes from the file name (`mira.json` -> `Mira`), it is a
//! display label only and is not checked against the agent profiles.

use crate::error::LoadError;
use crate::loader::{self, LoadPolicy, Loaded};
use rand::Rng;
use serde::Serialize;
use std::path::Path;
use tracing::warn;

/// Draws made when trying to land on a different quote
const REROLL_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentQuote {
    pub quote: String,
    /// Links the quote to `LogEntry::id`
    pub session_id: String,
    pub agent_name: String,
}

/// Load quotes from every `*.json` file in `dir`.
///
/// Never fails: unreadable or malformed files are logged, reported in
/// `failures`, and contribute no quotes.
pub fn load_quotes(dir: &Path) -> Loaded<AgentQuote> {
    let per_file = match loader::load_each(dir, LoadPolicy::Isolated, |path, content| {
        let value: serde_json::Value =
            serde_json::from_str(content).map_err(|e| LoadError::json(path, e))?;
        Ok(quotes_from_value(&agent_label(path), &value))
    }) {
        Ok(loaded) => loaded,
        Err(e) => {
            warn!("Failed to scan quotes directory {}: {}", dir.display(), e);
            return Loaded::default();
        }
    };

    Loaded {
        items: per_file.items.into_iter().flatten().collect(),
        failures: per_file.failures,
    }
}

/// `mira.json` -> `Mira`
fn agent_label(path: &Path) -> String {
    let stem = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.strip_suffix(".json").unwrap_or(n))
        .unwrap_or_default();
    capitalize(stem)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Keep array elements with a non-empty `quote` and a `sessionId`.
fn quotes_from_value(agent_name: &str, value: &serde_json::Value) -> Vec<AgentQuote> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let quote = item.get("quote").and_then(|v| v.as_str()).filter(|s| !s.is_empty())?;
            let session_id = item.get("sessionId").and_then(|v| v.as_str()).filter(|s| !s.is_empty())?;
            Some(AgentQuote {
                quote: quote.to_string(),
                session_id: session_id.to_string(),
                agent_name: agent_name.to_string(),
            })
        })
        .collect()
}

/// Quote shown when the home page first renders
pub fn featured_quote<'a, R: Rng + ?Sized>(quotes: &'a [AgentQuote], rng: &mut R) -> Option<&'a AgentQuote> {
    if quotes.is_empty() {
        return None;
    }
    quotes.get(rng.gen_range(0..quotes.len()))
}

/// Quote shown after "Another Quote".
///
/// Cycles through agents in name order, picking a random quote of the next
/// agent. With a single agent (or no current quote) it picks at random and
/// tries a few times to avoid repeating the current one.
pub fn next_quote<'a, R: Rng + ?Sized>(
    quotes: &'a [AgentQuote],
    current: Option<&AgentQuote>,
    rng: &mut R,
) -> Option<&'a AgentQuote> {
    if quotes.is_empty() {
        return None;
    }

    let mut agents: Vec<&str> = quotes.iter().map(|q| q.agent_name.as_str()).collect();
    agents.sort_unstable();
    agents.dedup();

    if let Some(current) = current {
        if agents.len() > 1 {
            let next_idx = agents
                .iter()
                .position(|a| *a == current.agent_name)
                .map_or(0, |i| (i + 1) % agents.len());
            let next_agent = agents[next_idx];

            let candidates: Vec<&AgentQuote> =
                quotes.iter().filter(|q| q.agent_name == next_agent).collect();
            if !candidates.is_empty() {
                return Some(candidates[rng.gen_range(0..candidates.len())]);
            }
        }
    }

    let mut pick = &quotes[rng.gen_range(0..quotes.len())];
    let mut attempts = 1;
    while current == Some(pick) && attempts < REROLL_ATTEMPTS {
        pick = &quotes[rng.gen_range(0..quotes.len())];
        attempts += 1;
    }
    Some(pick)
}
