//! Access to the three content collections, optionally through the
//! snapshot cache.

use crate::agents::{self, AgentProfile};
use crate::cache::{Collection, SnapshotCache};
use crate::config::ContentConfig;
use crate::error::LoadError;
use crate::loader::Loaded;
use crate::logs::{self, LogEntry};
use crate::quotes::{self, AgentQuote};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Clone)]
pub struct ContentStore {
    config: ContentConfig,
    cache: Option<Arc<SnapshotCache>>,
}

impl ContentStore {
    /// Every call rescans the content directories
    pub fn new(config: ContentConfig) -> Self {
        Self { config, cache: None }
    }

    pub fn with_cache(config: ContentConfig, cache: Arc<SnapshotCache>) -> Self {
        Self { config, cache: Some(cache) }
    }

    pub fn config(&self) -> &ContentConfig {
        &self.config
    }

    /// Directories to watch for cache invalidation
    pub fn watch_dirs(&self) -> Vec<(Collection, PathBuf)> {
        vec![
            (Collection::Logs, self.config.logs_dir.clone()),
            (Collection::Agents, self.config.agents_dir.clone()),
            (Collection::Quotes, self.config.quotes_dir.clone()),
        ]
    }

    /// All sessions, newest first
    pub fn logs(&self) -> Result<Arc<Loaded<LogEntry>>, LoadError> {
        let load = || logs::load_logs(&self.config.logs_dir, self.config.policy());
        match &self.cache {
            Some(cache) => cache.get_or_load(Collection::Logs, load),
            None => load().map(Arc::new),
        }
    }

    /// Single session; uncached lookups rescan the whole log directory
    pub fn log_by_id(&self, id: &str) -> Result<Option<LogEntry>, LoadError> {
        match &self.cache {
            Some(_) => Ok(logs::find_log(&self.logs()?.items, id).cloned()),
            None => logs::get_log_by_id(&self.config.logs_dir, self.config.policy(), id),
        }
    }

    pub fn agents(&self) -> Result<Arc<Loaded<AgentProfile>>, LoadError> {
        let load = || agents::load_agents(&self.config.agents_dir, self.config.policy());
        match &self.cache {
            Some(cache) => cache.get_or_load(Collection::Agents, load),
            None => load().map(Arc::new),
        }
    }

    /// Quotes never fail to load; bad files are skipped
    pub fn quotes(&self) -> Arc<Loaded<AgentQuote>> {
        let load = || quotes::load_quotes(&self.config.quotes_dir);
        match &self.cache {
            Some(cache) => cache
                .get_or_load(Collection::Quotes, || Ok(load()))
                .unwrap_or_default(),
            None => Arc::new(load()),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use std::path::Path;

    /// Content directories populated with two agents, three logs and quotes
    pub(crate) fn fixture_config(root: &Path) -> ContentConfig {
        let logs_dir = root.join("logs");
        let agents_dir = root.join("agents");
        let quotes_dir = root.join("quotes");
        let public_dir = root.join("public");
        for dir in [&logs_dir, &agents_dir, &quotes_dir, &public_dir] {
            fs::create_dir_all(dir).unwrap();
        }

        for (file, name, model) in [("gemma.json", "Gemma", "gemma-2"), ("mira.json", "Mira", "llama-3")] {
            let agent = json!({
                "name": name,
                "personality": "curious",
                "modelName": model,
                "description": format!("{} likes questions", name),
                "image": format!("agents/{}.png", name.to_lowercase())
            });
            fs::write(agents_dir.join(file), agent.to_string()).unwrap();
        }

        let logs = [
            ("s-old", 1_700_000_000_000i64, "gemma-2", "Tell me about lighthouses", "named Gemma"),
            ("s-new", 1_700_000_200_000, "llama-3", "Write a haiku about rain", "named Mira"),
            ("s-mid", 1_700_000_100_000, "gemma-2", "What is the capital of France?", "named Gemma"),
        ];
        for (id, ts, model, question, prompt) in logs {
            let raw = json!({
                "requestId": format!("req-{}", id),
                "timestamp": ts,
                "entry": {
                    "id": id,
                    "modelName": model,
                    "systemPrompt": format!("You are an assistant {}.\nPersonality: - curious", prompt),
                    "metadata": { "messages": [
                        { "role": "user", "content": question },
                        { "role": "assistant", "content": format!("Answer to: {}", question) },
                        { "role": "user", "src": "./uploads/photo.png" }
                    ] }
                }
            });
            fs::write(logs_dir.join(format!("{}.json", id)), raw.to_string()).unwrap();
        }

        fs::write(
            quotes_dir.join("gemma.json"),
            json!([{ "quote": "Lighthouses are patient", "sessionId": "s-old" }]).to_string(),
        )
        .unwrap();
        fs::write(
            quotes_dir.join("mira.json"),
            json!([{ "quote": "Rain writes its own haiku", "sessionId": "s-new" }]).to_string(),
        )
        .unwrap();

        fs::write(public_dir.join("robots.txt"), "User-agent: *").unwrap();

        ContentConfig {
            logs_dir,
            agents_dir,
            quotes_dir,
            public_dir,
            base_path: String::new(),
            isolate_failures: false,
        }
    }

    #[test]
    fn test_store_reads_fixture() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::new(fixture_config(dir.path()));

        let logs = store.logs().unwrap();
        let ids: Vec<_> = logs.items.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["s-new", "s-mid", "s-old"]);
        assert_eq!(logs.items[0].agent_name, "Mira");
        assert_eq!(store.agents().unwrap().items.len(), 2);
        assert_eq!(store.quotes().items.len(), 2);
    }

    #[test]
    fn test_store_rescans_without_cache() {
        let dir = tempfile::tempdir().unwrap();
        let config = fixture_config(dir.path());
        let store = ContentStore::new(config.clone());
        assert_eq!(store.logs().unwrap().items.len(), 3);

        fs::remove_file(config.logs_dir.join("s-old.json")).unwrap();
        assert_eq!(store.logs().unwrap().items.len(), 2);
        assert!(store.log_by_id("s-old").unwrap().is_none());
        assert_eq!(store.log_by_id("s-mid").unwrap().unwrap().agent_name, "Gemma");
    }

    #[test]
    fn test_cached_store_without_watcher_still_rescans() {
        let dir = tempfile::tempdir().unwrap();
        let config = fixture_config(dir.path());
        let store = ContentStore::with_cache(config.clone(), SnapshotCache::new());
        assert_eq!(store.logs().unwrap().items.len(), 3);

        fs::remove_file(config.quotes_dir.join("mira.json")).unwrap();
        assert_eq!(store.quotes().items.len(), 1);
        assert!(store.log_by_id("s-new").unwrap().is_some());
    }
}
