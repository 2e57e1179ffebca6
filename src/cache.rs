//! Optional snapshot cache for serve mode.
//!
//! Loaders are stateless and rescan their directory on every call. When the
//! cache is enabled, the last snapshot of each collection is kept until a
//! debounced file watcher reports a change in that collection's directory.
//! Collections whose directory is not watched are never cached.

use crate::error::LoadError;
use dashmap::{DashMap, DashSet};
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEvent};
use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

const DEBOUNCE_MS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Logs,
    Agents,
    Quotes,
}

type Snapshot = Arc<dyn Any + Send + Sync>;

pub struct SnapshotCache {
    /// Latest snapshot per collection, tagged with the generation it was loaded in
    snapshots: DashMap<Collection, (u64, Snapshot)>,
    /// Bumped on every invalidation
    generations: DashMap<Collection, u64>,
    /// Collections with a live watcher; only these may be cached
    watched: DashSet<Collection>,
}

impl SnapshotCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            snapshots: DashMap::new(),
            generations: DashMap::new(),
            watched: DashSet::new(),
        })
    }

    fn generation(&self, key: Collection) -> u64 {
        self.generations.get(&key).map_or(0, |g| *g)
    }

    /// Cached snapshot for `key`, or the result of `load` (cached when the
    /// collection is watched). No lock is held while loading; a snapshot
    /// loaded across an invalidation is stored under a stale generation and
    /// never served.
    pub fn get_or_load<T, F>(&self, key: Collection, load: F) -> Result<Arc<T>, LoadError>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Result<T, LoadError>,
    {
        if !self.watched.contains(&key) {
            return load().map(Arc::new);
        }

        let generation = self.generation(key);
        let cached = self
            .snapshots
            .get(&key)
            .filter(|entry| entry.0 == generation)
            .map(|entry| entry.1.clone());
        if let Some(hit) = cached.and_then(|snapshot| snapshot.downcast::<T>().ok()) {
            debug!("Snapshot cache hit: {:?}", key);
            return Ok(hit);
        }

        debug!("Snapshot cache miss: {:?}", key);
        let fresh = Arc::new(load()?);
        let snapshot: Snapshot = fresh.clone();
        self.snapshots.insert(key, (generation, snapshot));
        Ok(fresh)
    }

    pub fn invalidate(&self, key: Collection) {
        *self.generations.entry(key).or_insert(0) += 1;
        if self.snapshots.remove(&key).is_some() {
            debug!("Invalidated snapshot: {:?}", key);
        }
    }

    fn mark_watched(&self, key: Collection) {
        self.watched.insert(key);
    }
}

/// Start watching content directories; each change invalidates the snapshot
/// of the matching collection.
pub fn watch(cache: Arc<SnapshotCache>, dirs: Vec<(Collection, PathBuf)>) {
    std::thread::spawn(move || {
        let mut debouncers = Vec::new();

        for (collection, dir) in dirs {
            if !dir.exists() {
                info!("{} does not exist, {:?} will not be cached", dir.display(), collection);
                continue;
            }

            let handler_cache = cache.clone();
            let mut debouncer = match new_debouncer(
                Duration::from_millis(DEBOUNCE_MS),
                move |res: Result<Vec<DebouncedEvent>, notify::Error>| match res {
                    Ok(events) => {
                        debug!("{:?} watcher received {} events", collection, events.len());
                        handler_cache.invalidate(collection);
                    }
                    Err(e) => {
                        error!("{:?} watcher error: {:?}", collection, e);
                        handler_cache.invalidate(collection);
                    }
                },
            ) {
                Ok(d) => d,
                Err(e) => {
                    error!("Failed to create watcher for {}: {}", dir.display(), e);
                    continue;
                }
            };

            if let Err(e) = debouncer.watcher().watch(&dir, RecursiveMode::Recursive) {
                error!("Failed to watch {}: {}", dir.display(), e);
                continue;
            }

            cache.mark_watched(collection);
            info!("Watching {} for {:?} changes", dir.display(), collection);
            debouncers.push(debouncer);
        }

        if debouncers.is_empty() {
            return;
        }

        // Keep watchers alive
        loop {
            std::thread::sleep(Duration::from_secs(60));
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_load(counter: &AtomicUsize) -> Result<Vec<u32>, LoadError> {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(vec![1, 2, 3])
    }

    #[test]
    fn test_unwatched_collection_always_reloads() {
        let cache = SnapshotCache::new();
        let loads = AtomicUsize::new(0);

        cache.get_or_load(Collection::Logs, || counting_load(&loads)).unwrap();
        cache.get_or_load(Collection::Logs, || counting_load(&loads)).unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_watched_collection_is_cached_until_invalidated() {
        let cache = SnapshotCache::new();
        cache.mark_watched(Collection::Quotes);
        let loads = AtomicUsize::new(0);

        let first = cache.get_or_load(Collection::Quotes, || counting_load(&loads)).unwrap();
        let second = cache.get_or_load(Collection::Quotes, || counting_load(&loads)).unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));

        cache.invalidate(Collection::Quotes);
        cache.get_or_load(Collection::Quotes, || counting_load(&loads)).unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let cache = SnapshotCache::new();
        cache.mark_watched(Collection::Agents);

        let failed: Result<Arc<Vec<u32>>, _> = cache.get_or_load(Collection::Agents, || {
            Err(LoadError::shape("agents/x.json", "bad"))
        });
        assert!(failed.is_err());

        let loads = AtomicUsize::new(0);
        cache.get_or_load(Collection::Agents, || counting_load(&loads)).unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_load_overlapping_invalidation_is_not_served() {
        let cache = SnapshotCache::new();
        cache.mark_watched(Collection::Logs);
        let loads = AtomicUsize::new(0);

        // The watcher fires while the directory is being read
        let first = cache
            .get_or_load(Collection::Logs, || {
                cache.invalidate(Collection::Logs);
                counting_load(&loads)
            })
            .unwrap();
        assert_eq!(first.len(), 3);

        cache.get_or_load(Collection::Logs, || counting_load(&loads)).unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
        cache.get_or_load(Collection::Logs, || counting_load(&loads)).unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_concurrent_loads_do_not_block_each_other() {
        let cache = SnapshotCache::new();
        cache.mark_watched(Collection::Agents);
        let (started_tx, started_rx) = std::sync::mpsc::channel::<()>();
        let (tx, rx) = std::sync::mpsc::channel::<()>();

        std::thread::scope(|scope| {
            let slow_cache = cache.clone();
            let slow = scope.spawn(move || {
                slow_cache.get_or_load(Collection::Agents, || {
                    started_tx.send(()).unwrap();
                    // Finishes only once the other reader has been answered
                    rx.recv_timeout(Duration::from_secs(5)).unwrap();
                    Ok(vec![1u32])
                })
            });

            started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
            let quick: Arc<Vec<u32>> = cache.get_or_load(Collection::Agents, || Ok(vec![2])).unwrap();
            assert_eq!(*quick, vec![2]);
            tx.send(()).unwrap();
            assert_eq!(*slow.join().unwrap().unwrap(), vec![1]);
        });
    }

    #[tokio::test]
    async fn test_watcher_invalidates_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SnapshotCache::new();
        watch(cache.clone(), vec![(Collection::Logs, dir.path().to_path_buf())]);

        // Wait for the watcher thread to register
        for _ in 0..50 {
            if cache.watched.contains(&Collection::Logs) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(cache.watched.contains(&Collection::Logs));

        let loads = AtomicUsize::new(0);
        cache.get_or_load(Collection::Logs, || counting_load(&loads)).unwrap();
        std::fs::write(dir.path().join("new.json"), "{}").unwrap();

        let mut invalidated = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if !cache.snapshots.contains_key(&Collection::Logs) {
                invalidated = true;
                break;
            }
        }
        assert!(invalidated);
    }
}
