use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

/// Storage key for the favorites collection.
pub const FAVORITES: &str = "cineverse_favorites";
/// Storage key for the watchlist collection.
pub const WATCHLIST: &str = "cineverse_watchlist";
/// Storage key for the per-series episode-progress map.
pub const PROGRESS: &str = "cineverse_progress";
/// Storage key for the display-language preference.
pub const LANGUAGE: &str = "cineverse_lang";
/// Storage key for the quiz best score.
pub const HIGH_SCORE: &str = "cineverse_highscore";
/// Storage key for the chat transcript.
pub const CHAT_MESSAGES: &str = "ai_chat_messages";
/// Storage key for the accumulated recommendation set.
pub const RECOMMENDATIONS: &str = "ai_recommendations";
/// Storage key for the selected-media-for-prompt list.
pub const SELECTED_MEDIA: &str = "ai_selected_media";

/// Flat string-to-string persistence, the shape browser local storage has.
/// Access is synchronous: a single caller's operations apply in program
/// order. Two callers over one backend get no mutual exclusion beyond the
/// individual read/write, so last writer wins.
pub trait KeyValueStorage: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>>;
    fn write(&self, key: &str, value: &str) -> Result<()>;
    fn delete(&self, key: &str) -> Result<()>;
}

/// In-memory backend. Stands in for browser local storage and backs tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let entries = lock_entries(&self.entries)?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = lock_entries(&self.entries)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut entries = lock_entries(&self.entries)?;
        entries.remove(key);
        Ok(())
    }
}

fn lock_entries(
    entries: &Mutex<HashMap<String, String>>,
) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
    entries
        .lock()
        .map_err(|_| anyhow::anyhow!("storage lock poisoned"))
}

/// File backend: one file per key under a data directory.
#[derive(Debug)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStorage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Some(content))
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let path = self.path_for(key);
        fs::write(&path, value).with_context(|| format!("Failed to write {}", path.display()))
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete {}", path.display())),
        }
    }
}

/// Loads and deserializes a value, treating absence, a failed read, or
/// corrupt JSON as the default. Callers never see a storage error on the
/// read path.
pub(crate) fn read_json_or_default<T: serde::de::DeserializeOwned + Default>(
    storage: &dyn KeyValueStorage,
    key: &str,
) -> T {
    let raw = match storage.read(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return T::default(),
        Err(e) => {
            tracing::warn!("Failed to read '{key}': {e:#}");
            return T::default();
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Discarding corrupt value under '{key}': {e}");
            T::default()
        }
    }
}
