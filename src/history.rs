//! Watch-history ledger: most-recent-first, deduplicated by title slug,
//! persisted as one JSON blob behind a small key-value capability so the
//! store is testable without touching disk.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use dirs_next::data_dir;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::warn;

use crate::types::Track;

/// One in-progress title. Created on first successful playback, moved to
/// the front and overwritten on every subsequent playback of the same
/// title, removed only by explicit user action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchEntry {
    /// Provider-scoped anime identifier; the ledger's uniqueness key.
    pub slug: String,
    pub episode: u32,
    /// Cross-reference (MAL) identifier used to hydrate display data.
    pub title_id: i64,
    pub track: Track,
    pub watched_at: DateTime<Utc>,
}

/// Get/set/remove exactly one serialized blob; whole-ledger overwrite.
pub trait LedgerStore {
    fn get(&self) -> Result<Option<String>>;
    fn set(&mut self, blob: &str) -> Result<()>;
    fn remove(&mut self) -> Result<()>;
}

pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn default_path() -> Result<PathBuf> {
        let base = data_dir().ok_or_else(|| anyhow!("Could not determine data directory"))?;
        Ok(base.join("animist").join("watching.json"))
    }
}

impl LedgerStore for FileStore {
    fn get(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let blob = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read ledger file {}", self.path.display()))?;
        Ok(Some(blob))
    }

    fn set(&mut self, blob: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create ledger directory {}", parent.display())
            })?;
        }
        fs::write(&self.path, blob)
            .with_context(|| format!("failed to write ledger file {}", self.path.display()))?;
        Ok(())
    }

    fn remove(&mut self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("failed to remove ledger file {}", self.path.display()))?;
        }
        Ok(())
    }
}

/// In-memory store backing the ledger tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    blob: Option<String>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn seeded(blob: &str) -> Self {
        Self {
            blob: Some(blob.to_string()),
        }
    }
}

#[cfg(test)]
impl LedgerStore for MemoryStore {
    fn get(&self) -> Result<Option<String>> {
        Ok(self.blob.clone())
    }

    fn set(&mut self, blob: &str) -> Result<()> {
        self.blob = Some(blob.to_string());
        Ok(())
    }

    fn remove(&mut self) -> Result<()> {
        self.blob = None;
        Ok(())
    }
}

pub struct WatchHistory<S: LedgerStore> {
    store: S,
    entries: Vec<WatchEntry>,
}

impl WatchHistory<FileStore> {
    pub fn open() -> Result<Self> {
        Ok(Self::with_store(FileStore::new(FileStore::default_path()?)))
    }
}

impl<S: LedgerStore> WatchHistory<S> {
    /// Loads the persisted ledger. Unparsable or unreadable state is
    /// recovered silently as an empty ledger; it is never a fatal error.
    pub fn with_store(store: S) -> Self {
        let entries = match store.get() {
            Ok(Some(blob)) => match serde_json::from_str::<Vec<WatchEntry>>(&blob) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!("ledger is corrupt, starting empty: {err}");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(err) => {
                warn!("ledger is unreadable, starting empty: {err}");
                Vec::new()
            }
        };
        Self { store, entries }
    }

    pub fn entries(&self) -> &[WatchEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops any existing entry with the same slug, inserts the new entry
    /// at the front, and persists the whole ledger.
    pub fn record(&mut self, entry: WatchEntry) -> Result<()> {
        if let Some(pos) = self.entries.iter().position(|e| e.slug == entry.slug) {
            self.entries.remove(pos);
        }
        self.entries.insert(0, entry);
        self.persist()
    }

    /// No-op when the index is out of bounds for the current snapshot.
    pub fn remove(&mut self, index: usize) -> Result<()> {
        if index >= self.entries.len() {
            return Ok(());
        }
        self.entries.remove(index);
        self.persist()
    }

    /// Last recorded episode for a title, if any.
    pub fn last_episode(&self, slug: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|e| e.slug == slug)
            .map(|e| e.episode)
    }

    fn persist(&mut self) -> Result<()> {
        if self.entries.is_empty() {
            return self.store.remove();
        }
        let blob = serde_json::to_string_pretty(&self.entries)?;
        self.store.set(&blob)
    }
}
