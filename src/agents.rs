//! Agent profiles, one JSON object per file.

use crate::error::LoadError;
use crate::loader::{self, LoadPolicy, Loaded};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Display record for one agent persona
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentProfile {
    pub name: String,
    pub personality: String,
    pub model_name: String,
    pub description: String,
    /// Asset path relative to the site base path
    pub image: String,
}

/// Load every `*.json` profile in `dir`.
///
/// Under [`LoadPolicy::Strict`] one malformed file fails the whole call.
pub fn load_agents(dir: &Path, policy: LoadPolicy) -> Result<Loaded<AgentProfile>, LoadError> {
    loader::load_each(dir, policy, parse_agent)
}

fn parse_agent(path: &Path, content: &str) -> Result<AgentProfile, LoadError> {
    serde_json::from_str(content).map_err(|e| LoadError::json(path, e))
}

/// Profile whose name equals `agent_name`, if any
pub fn find_agent<'a>(agents: &'a [AgentProfile], agent_name: &str) -> Option<&'a AgentProfile> {
    agents.iter().find(|a| a.name == agent_name)
}
