//! Append-only snapshot store backed by a single JSON document
//!
//! The store keeps no in-memory state beyond its path: every operation
//! re-reads the file, and every mutation rewrites the whole document through
//! a temporary sibling followed by a rename. Only the UI thread mutates the
//! store; workers use [`SnapshotStore::read_records`], which never writes.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use shared::{parse_timestamp, NewSnapshot, Snapshot};

use crate::config::StoreConfig;
use crate::error::WorkbenchResult;

/// Document format version written to disk
pub const STORE_VERSION: &str = "1.0";

/// The whole history file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreDocument {
    pub records: Vec<Snapshot>,
    pub last_updated: DateTime<Utc>,
    pub version: String,
}

impl StoreDocument {
    pub fn fresh() -> Self {
        Self {
            records: Vec::new(),
            last_updated: Utc::now(),
            version: STORE_VERSION.to_string(),
        }
    }

    /// Move `last_updated` strictly forward
    pub fn touch(&mut self) {
        let now = Utc::now();
        self.last_updated = if now > self.last_updated {
            now
        } else {
            self.last_updated + chrono::Duration::microseconds(1)
        };
    }

    /// Id for the next record: `len + 1`, or one past the largest id when
    /// deletions have left `len + 1` in use.
    pub fn next_id(&self) -> u64 {
        let candidate = self.records.len() as u64 + 1;
        if self.records.iter().any(|r| r.id == candidate) {
            self.records.iter().map(|r| r.id).max().unwrap_or_default() + 1
        } else {
            candidate
        }
    }

    /// Rebuild a document from parsed JSON, default-filling damaged records.
    ///
    /// Records that are not objects are dropped. Records without a usable id,
    /// or whose id repeats an earlier one, get `position + 1` when free and
    /// one past the largest id otherwise.
    pub fn from_json_lenient(value: &Value) -> Option<Self> {
        let object = value.as_object()?;

        let parsed: Vec<(Snapshot, Option<u64>)> = match object.get("records") {
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| {
                    let record = Snapshot::from_json_lenient(item);
                    if record.is_none() {
                        warn!(index = i, "Dropping history record that is not an object");
                    }
                    record
                })
                .collect(),
            Some(_) => {
                warn!("History 'records' is not a list, treating as empty");
                Vec::new()
            }
            None => Vec::new(),
        };

        let mut taken: HashSet<u64> = HashSet::new();
        let mut keep_id = Vec::with_capacity(parsed.len());
        for (_, stored_id) in &parsed {
            keep_id.push(matches!(stored_id, Some(id) if taken.insert(*id)));
        }

        let mut records = Vec::with_capacity(parsed.len());
        for (position, ((mut snapshot, stored_id), keep)) in parsed.into_iter().zip(keep_id).enumerate() {
            if !keep {
                let candidate = position as u64 + 1;
                let id = if taken.contains(&candidate) {
                    taken.iter().max().copied().unwrap_or_default() + 1
                } else {
                    candidate
                };
                warn!(?stored_id, assigned = id, "Re-keying history record");
                taken.insert(id);
                snapshot.id = id;
            }
            records.push(snapshot);
        }

        Some(Self {
            records,
            last_updated: object
                .get("last_updated")
                .and_then(Value::as_str)
                .and_then(parse_timestamp)
                .unwrap_or_else(Utc::now),
            version: object
                .get("version")
                .and_then(Value::as_str)
                .unwrap_or(STORE_VERSION)
                .to_string(),
        })
    }
}

/// Result of reading the file once
enum ReadOutcome {
    Missing,
    Unreadable(io::Error),
    Corrupt(String),
    Loaded(StoreDocument),
}

/// Snapshot store over one history file
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
    read_retry_delay: Duration,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            read_retry_delay: Duration::from_millis(50),
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.path.clone()).with_read_retry_delay(config.read_retry_delay())
    }

    pub fn with_read_retry_delay(mut self, delay: Duration) -> Self {
        self.read_retry_delay = delay;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling file every persist writes before renaming over the store
    pub fn temp_path(&self) -> PathBuf {
        sibling_with_suffix(&self.path, "tmp")
    }

    /// Where unparsable content is copied before the store is reinitialized
    pub fn backup_path(&self) -> PathBuf {
        sibling_with_suffix(&self.path, "bak")
    }

    /// Load the document, creating or repairing the file when needed.
    ///
    /// A missing file is created with an empty document. Content that cannot
    /// be read or parsed, even after one retry, is copied to the backup path
    /// and replaced by an empty document.
    /// Never fails.
    pub fn load(&self) -> StoreDocument {
        match self.read_with_retry() {
            ReadOutcome::Loaded(doc) => doc,
            ReadOutcome::Missing => {
                info!(path = %self.path.display(), "Creating new history file");
                self.reinitialize()
            }
            ReadOutcome::Corrupt(reason) => {
                warn!(path = %self.path.display(), %reason, "History file is corrupt, reinitializing");
                self.back_up();
                self.reinitialize()
            }
            ReadOutcome::Unreadable(e) => {
                warn!(path = %self.path.display(), error = %e, "History file unreadable, reinitializing");
                self.back_up();
                self.reinitialize()
            }
        }
    }

    /// Append a snapshot and return its assigned id
    pub fn append(&self, snapshot: NewSnapshot) -> WorkbenchResult<u64> {
        let mut doc = self.load();
        let id = doc.next_id();
        let period_name = snapshot.period_name.clone();
        doc.records.push(snapshot.with_id(id));
        doc.touch();
        self.persist(&doc)?;
        info!(id, period = %period_name, "Snapshot appended");
        Ok(id)
    }

    /// Delete the snapshot with `id`; `Ok(false)` if there was none
    pub fn delete(&self, id: u64) -> WorkbenchResult<bool> {
        let mut doc = self.load();
        let before = doc.records.len();
        doc.records.retain(|r| r.id != id);
        let removed = doc.records.len() != before;
        doc.touch();
        self.persist(&doc)?;
        info!(id, removed, "Snapshot delete");
        Ok(removed)
    }

    pub fn list(&self) -> Vec<Snapshot> {
        self.load().records
    }

    pub fn get(&self, id: u64) -> Option<Snapshot> {
        self.list().into_iter().find(|r| r.id == id)
    }

    /// Read-only view for background workers.
    ///
    /// Never writes. A failed read (for instance a file caught mid-rename) is
    /// retried once; if it still fails the history is treated as empty.
    pub fn read_records(&self) -> Vec<Snapshot> {
        match self.read_with_retry() {
            ReadOutcome::Loaded(doc) => doc.records,
            ReadOutcome::Missing => Vec::new(),
            ReadOutcome::Corrupt(reason) => {
                warn!(%reason, "History unreadable for worker, treating as empty");
                Vec::new()
            }
            ReadOutcome::Unreadable(e) => {
                warn!(error = %e, "History unreadable for worker, treating as empty");
                Vec::new()
            }
        }
    }

    /// Write the full document atomically.
    ///
    /// On any failure the temporary file is removed and the existing store
    /// file is left exactly as it was.
    pub fn persist(&self, doc: &StoreDocument) -> WorkbenchResult<()> {
        let json = serde_json::to_string_pretty(doc)?;
        let tmp = self.temp_path();

        let written = (|| -> io::Result<()> {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let mut file = File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)
        })();

        if let Err(e) = written {
            warn!(path = %self.path.display(), error = %e, "History write failed");
            if tmp.is_file() {
                let _ = fs::remove_file(&tmp);
            }
            return Err(e.into());
        }

        debug!(path = %self.path.display(), records = doc.records.len(), "History persisted");
        Ok(())
    }

    fn reinitialize(&self) -> StoreDocument {
        let doc = StoreDocument::fresh();
        if let Err(e) = self.persist(&doc) {
            warn!(error = %e, "Could not write fresh history file");
        }
        doc
    }

    fn back_up(&self) {
        match fs::copy(&self.path, self.backup_path()) {
            Ok(_) => info!(backup = %self.backup_path().display(), "History file backed up"),
            Err(e) => warn!(error = %e, "Could not back up history file"),
        }
    }

    fn read_with_retry(&self) -> ReadOutcome {
        match self.read_once() {
            ReadOutcome::Unreadable(e) => {
                debug!(error = %e, "History read failed, retrying once");
                std::thread::sleep(self.read_retry_delay);
                self.read_once()
            }
            ReadOutcome::Corrupt(reason) => {
                debug!(%reason, "History parse failed, retrying once");
                std::thread::sleep(self.read_retry_delay);
                self.read_once()
            }
            outcome => outcome,
        }
    }

    fn read_once(&self) -> ReadOutcome {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return ReadOutcome::Missing,
            Err(e) => return ReadOutcome::Unreadable(e),
        };

        let value: Value = match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(e) => return ReadOutcome::Corrupt(e.to_string()),
        };

        match StoreDocument::from_json_lenient(&value) {
            Some(doc) => ReadOutcome::Loaded(doc),
            None => ReadOutcome::Corrupt("top-level value is not an object".to_string()),
        }
    }
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}
