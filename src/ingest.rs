//! Edit stream ingest.
//!
//! Two implementations of the same append/snapshot contract:
//!
//! - [`EditStream`] — in-memory, mutex-guarded, shared between threads of
//!   one process. `snapshot()` returns a point-in-time copy; appends that
//!   land afterwards never leak into a running merge.
//! - [`EditLog`] — file-backed (JSONL under `.ei/`), flock-guarded, shared
//!   between independent agent processes.
//!
//! Entries are validated on append and immutable afterwards. Everything
//! downstream of a snapshot is pass-by-value.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::edit::EditStreamEntry;
use crate::error::{Error, Result};
use crate::lock::{self, FileLock, DEFAULT_LOCK_TIMEOUT_MS};

/// Append-only store contract shared by both ingest implementations.
///
/// Merge runs only ever consume the snapshot, so injecting a different
/// store never exposes live mutable state to merge logic.
pub trait EditIngest {
    fn append_entry(&self, entry: EditStreamEntry) -> Result<()>;
    fn snapshot_entries(&self) -> Result<Vec<EditStreamEntry>>;
}

/// In-memory append-only edit stream.
///
/// Cheap to clone; clones share the same underlying log.
#[derive(Debug, Clone, Default)]
pub struct EditStream {
    entries: Arc<Mutex<Vec<EditStreamEntry>>>,
}

impl EditStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and append one entry.
    pub fn append(&self, entry: EditStreamEntry) -> Result<()> {
        entry.validate()?;
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| Error::OperationFailed("edit stream mutex poisoned".to_string()))?;
        entries.push(entry);
        Ok(())
    }

    /// Point-in-time copy of the stream.
    pub fn snapshot(&self) -> Vec<EditStreamEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EditIngest for EditStream {
    fn append_entry(&self, entry: EditStreamEntry) -> Result<()> {
        self.append(entry)
    }

    fn snapshot_entries(&self) -> Result<Vec<EditStreamEntry>> {
        Ok(self.snapshot())
    }
}

/// File-backed edit log shared across agent processes.
///
/// Appends hold an exclusive flock on a sibling `.lock` file, write one
/// JSON line, and fsync, so a snapshot never observes a partial entry.
#[derive(Debug, Clone)]
pub struct EditLog {
    path: PathBuf,
}

impl EditLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Validate and append one entry to the log file.
    pub fn append(&self, entry: &EditStreamEntry) -> Result<()> {
        entry.validate()?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let _lock = FileLock::acquire(self.lock_path(), DEFAULT_LOCK_TIMEOUT_MS)?;

        let json = serde_json::to_string(entry)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{json}")?;
        file.sync_all()?;
        Ok(())
    }

    /// Point-in-time copy of the log.
    pub fn snapshot(&self) -> Result<Vec<EditStreamEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let _lock = FileLock::acquire(self.lock_path(), DEFAULT_LOCK_TIMEOUT_MS)?;
        let contents = fs::read_to_string(&self.path)?;

        let mut entries = Vec::new();
        for line in contents.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let entry: EditStreamEntry = serde_json::from_str(trimmed)?;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Drop consumed entries after a successful apply, keeping any that
    /// arrived since the snapshot was taken.
    pub fn remove_entries(&self, consumed: &[Uuid]) -> Result<usize> {
        if !self.path.exists() {
            return Ok(0);
        }

        let _lock = FileLock::acquire(self.lock_path(), DEFAULT_LOCK_TIMEOUT_MS)?;
        let contents = fs::read_to_string(&self.path)?;

        let mut kept = Vec::new();
        let mut removed = 0usize;
        for line in contents.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let entry: EditStreamEntry = serde_json::from_str(trimmed)?;
            if consumed.contains(&entry.edit_id) {
                removed += 1;
            } else {
                kept.push(trimmed.to_string());
            }
        }

        let mut rewritten = kept.join("\n");
        if !rewritten.is_empty() {
            rewritten.push('\n');
        }
        lock::write_atomic(&self.path, rewritten.as_bytes())?;
        Ok(removed)
    }

    fn lock_path(&self) -> PathBuf {
        PathBuf::from(format!("{}.lock", self.path.display()))
    }
}

impl EditIngest for EditLog {
    fn append_entry(&self, entry: EditStreamEntry) -> Result<()> {
        self.append(&entry)
    }

    fn snapshot_entries(&self) -> Result<Vec<EditStreamEntry>> {
        self.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::{EditOperation, EditStreamEntry};
    use tempfile::TempDir;

    fn delete_entry(path: &str) -> EditStreamEntry {
        EditStreamEntry::new("agent-a", path, EditOperation::Delete)
    }

    #[test]
    fn snapshot_isolated_from_later_appends() {
        let stream = EditStream::new();
        stream.append(delete_entry("a.rs")).unwrap();

        let snapshot = stream.snapshot();
        stream.append(delete_entry("b.rs")).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(stream.len(), 2);
        assert_eq!(snapshot[0].file_path, "a.rs");
    }

    #[test]
    fn append_rejects_invalid_entries() {
        let stream = EditStream::new();
        let invalid = EditStreamEntry::new("agent-a", "f.rs", EditOperation::Create);
        assert!(stream.append(invalid).is_err());
        assert!(stream.is_empty());
    }

    #[test]
    fn log_round_trips_entries() {
        let temp = TempDir::new().unwrap();
        let log = EditLog::new(temp.path().join(".ei").join("edits.jsonl"));

        log.append(&delete_entry("a.rs")).unwrap();
        log.append(&delete_entry("b.rs")).unwrap();

        let entries = log.snapshot().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].file_path, "a.rs");
        assert_eq!(entries[1].file_path, "b.rs");
    }

    #[test]
    fn log_snapshot_of_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let log = EditLog::new(temp.path().join("edits.jsonl"));
        assert!(log.snapshot().unwrap().is_empty());
    }

    #[test]
    fn both_stores_satisfy_the_ingest_contract() {
        let temp = TempDir::new().unwrap();
        let stores: Vec<Box<dyn EditIngest>> = vec![
            Box::new(EditStream::new()),
            Box::new(EditLog::new(temp.path().join("edits.jsonl"))),
        ];

        for store in &stores {
            store.append_entry(delete_entry("x.rs")).unwrap();
            let snapshot = store.snapshot_entries().unwrap();
            assert_eq!(snapshot.len(), 1);
            assert_eq!(snapshot[0].file_path, "x.rs");
        }
    }

    #[test]
    fn remove_entries_keeps_unconsumed() {
        let temp = TempDir::new().unwrap();
        let log = EditLog::new(temp.path().join("edits.jsonl"));

        let first = delete_entry("a.rs");
        let second = delete_entry("b.rs");
        log.append(&first).unwrap();
        log.append(&second).unwrap();

        let removed = log.remove_entries(&[first.edit_id]).unwrap();
        assert_eq!(removed, 1);

        let remaining = log.snapshot().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].edit_id, second.edit_id);
    }
}
