use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::models::CatalogItem;
use crate::storage::{self, read_json_or_default, KeyValueStorage};

/// The two snapshot collections. Episode progress is its own map, keyed by
/// series id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Favorites,
    Watchlist,
}

impl ListKind {
    fn key(self) -> &'static str {
        match self {
            ListKind::Favorites => storage::FAVORITES,
            ListKind::Watchlist => storage::WATCHLIST,
        }
    }
}

/// Single source of truth for personalization state. Reads serve an
/// in-memory cache loaded at construction; every mutation updates the cache
/// and writes the whole serialized collection back before returning.
///
/// Two stores over one backend have no mutual exclusion: each one's write
/// replaces the entire collection, so interleaved edits resolve to whichever
/// write lands last. `refresh` is the recovery path, not a fix.
pub struct WatchStore {
    storage: Arc<dyn KeyValueStorage>,
    favorites: Mutex<Vec<CatalogItem>>,
    watchlist: Mutex<Vec<CatalogItem>>,
    progress: Mutex<HashMap<i32, Vec<i32>>>,
}

impl WatchStore {
    pub fn load(storage: Arc<dyn KeyValueStorage>) -> Self {
        let favorites = read_json_or_default(storage.as_ref(), storage::FAVORITES);
        let watchlist = read_json_or_default(storage.as_ref(), storage::WATCHLIST);
        let progress = read_json_or_default(storage.as_ref(), storage::PROGRESS);
        Self {
            storage,
            favorites: Mutex::new(favorites),
            watchlist: Mutex::new(watchlist),
            progress: Mutex::new(progress),
        }
    }

    /// Re-reads all collections from the backend, discarding the cache.
    pub fn refresh(&self) {
        *lock(&self.favorites) = read_json_or_default(self.storage.as_ref(), storage::FAVORITES);
        *lock(&self.watchlist) = read_json_or_default(self.storage.as_ref(), storage::WATCHLIST);
        *lock(&self.progress) = read_json_or_default(self.storage.as_ref(), storage::PROGRESS);
    }

    /// Inserts the snapshot unless an entry with the same id already exists.
    /// Idempotent from the caller's point of view.
    pub fn add(&self, list: ListKind, item: CatalogItem) -> Result<()> {
        let mut entries = lock(self.list_for(list));
        if entries.iter().any(|e| e.id == item.id) {
            return Ok(());
        }
        entries.push(item);
        self.persist(list.key(), &*entries)
    }

    /// Removes the entry with the given id; no error if absent.
    pub fn remove(&self, list: ListKind, id: i32) -> Result<()> {
        let mut entries = lock(self.list_for(list));
        let before = entries.len();
        entries.retain(|e| e.id != id);
        if entries.len() == before {
            return Ok(());
        }
        self.persist(list.key(), &*entries)
    }

    pub fn contains(&self, list: ListKind, id: i32) -> bool {
        lock(self.list_for(list)).iter().any(|e| e.id == id)
    }

    /// Entries in insertion order.
    pub fn list(&self, list: ListKind) -> Vec<CatalogItem> {
        lock(self.list_for(list)).clone()
    }

    /// Marks the episode watched if it is not, unmarks it otherwise.
    /// Returns `true` when the episode is watched after the call. A series
    /// whose last episode is unmarked drops out of the map entirely.
    pub fn toggle_episode(&self, series_id: i32, episode_id: i32) -> Result<bool> {
        let mut progress = lock(&self.progress);
        let episodes = progress.entry(series_id).or_default();
        let watched = if let Some(pos) = episodes.iter().position(|&e| e == episode_id) {
            episodes.remove(pos);
            false
        } else {
            episodes.push(episode_id);
            true
        };
        if episodes.is_empty() {
            progress.remove(&series_id);
        }
        self.persist(storage::PROGRESS, &*progress)?;
        Ok(watched)
    }

    pub fn episode_watched(&self, series_id: i32, episode_id: i32) -> bool {
        lock(&self.progress)
            .get(&series_id)
            .is_some_and(|eps| eps.contains(&episode_id))
    }

    pub fn watched_episodes(&self, series_id: i32) -> Vec<i32> {
        lock(&self.progress)
            .get(&series_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn watched_count(&self, series_id: i32) -> usize {
        lock(&self.progress)
            .get(&series_id)
            .map_or(0, |eps| eps.len())
    }

    pub fn progress_map(&self) -> HashMap<i32, Vec<i32>> {
        lock(&self.progress).clone()
    }

    /// Unmarks every episode of the series.
    pub fn clear_progress(&self, series_id: i32) -> Result<()> {
        let mut progress = lock(&self.progress);
        if progress.remove(&series_id).is_none() {
            return Ok(());
        }
        self.persist(storage::PROGRESS, &*progress)
    }

    fn list_for(&self, list: ListKind) -> &Mutex<Vec<CatalogItem>> {
        match list {
            ListKind::Favorites => &self.favorites,
            ListKind::Watchlist => &self.watchlist,
        }
    }

    fn persist<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let serialized =
            serde_json::to_string(value).with_context(|| format!("Failed to serialize {key}"))?;
        self.storage.write(key, &serialized)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
