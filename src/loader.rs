//! Directory scanning shared by the agent, quote and log loaders.
//!
//! Every content directory holds one JSON document per file. A missing
//! directory is an empty collection, not an error. What happens when a
//! single file is malformed is decided by [`LoadPolicy`].

use crate::error::LoadError;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// How a loader reacts to one malformed file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadPolicy {
    /// First bad file aborts the whole load.
    #[default]
    Strict,
    /// Bad files are skipped and reported in [`Loaded::failures`].
    Isolated,
}

impl LoadPolicy {
    pub fn from_isolate_flag(isolate: bool) -> Self {
        if isolate {
            LoadPolicy::Isolated
        } else {
            LoadPolicy::Strict
        }
    }
}

/// A file that was skipped during an isolated load
#[derive(Debug, Clone, Serialize)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Records read from a directory plus the files that were skipped.
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub items: Vec<T>,
    pub failures: Vec<LoadFailure>,
}

impl<T> Default for Loaded<T> {
    fn default() -> Self {
        Self { items: Vec::new(), failures: Vec::new() }
    }
}

/// List `*.json` files in `dir`, sorted by path.
/// Returns an empty list when the directory does not exist.
pub fn json_files(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    if !dir.exists() {
        debug!("Content directory does not exist: {}", dir.display());
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| LoadError::io(dir, e))? {
        let path = entry.map_err(|e| LoadError::io(dir, e))?.path();
        if path.is_file() && path.extension().map_or(false, |e| e == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Read and parse every JSON file in `dir` according to `policy`.
pub fn load_each<T, F>(dir: &Path, policy: LoadPolicy, mut parse: F) -> Result<Loaded<T>, LoadError>
where
    F: FnMut(&Path, &str) -> Result<T, LoadError>,
{
    let mut loaded = Loaded::default();

    for path in json_files(dir)? {
        let result = fs::read_to_string(&path)
            .map_err(|e| LoadError::io(&path, e))
            .and_then(|content| parse(&path, &content));

        match result {
            Ok(item) => loaded.items.push(item),
            Err(e) if policy == LoadPolicy::Isolated => {
                warn!("Skipping {}: {}", path.display(), e);
                loaded.failures.push(LoadFailure { path, reason: e.to_string() });
            }
            Err(e) => return Err(e),
        }
    }

    debug!(
        "Loaded {} records from {} ({} skipped)",
        loaded.items.len(),
        dir.display(),
        loaded.failures.len()
    );
    Ok(loaded)
}
