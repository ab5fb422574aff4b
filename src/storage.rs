//! Storage layout for ei state.
//!
//! All state lives under `.ei/` at the workspace root (ignored by git):
//!
//! ```text
//! .ei/
//!   agent            # Persisted agent identity for this checkout
//!   edits.jsonl      # Pending edit stream (one entry per line)
//!   runs/            # Merge run audit records
//!     <timestamp>-<uuid>.json
//! ```
//!
//! Writes are atomic (temp + rename); anything read or written by more
//! than one process additionally holds a `FileLock`.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Error, Result};
use crate::lock;

/// Name of the workspace-local state directory
pub const LOCAL_DIR: &str = ".ei";

/// Storage manager for ei state
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Walk up from `start` to find a directory containing `.ei/`.
    pub fn discover(start: &Path) -> Result<Self> {
        let mut current = Some(start);
        while let Some(dir) = current {
            if dir.join(LOCAL_DIR).is_dir() {
                return Ok(Self::new(dir.to_path_buf()));
            }
            current = dir.parent();
        }
        Err(Error::NotInitialized(start.to_path_buf()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn local_dir(&self) -> PathBuf {
        self.root.join(LOCAL_DIR)
    }

    pub fn agent_file(&self) -> PathBuf {
        self.local_dir().join("agent")
    }

    pub fn edits_file(&self) -> PathBuf {
        self.local_dir().join("edits.jsonl")
    }

    pub fn runs_dir(&self) -> PathBuf {
        self.local_dir().join("runs")
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(".ei.toml")
    }

    /// Create the state directories and touch the edit log.
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(self.local_dir())?;
        fs::create_dir_all(self.runs_dir())?;

        let edits = self.edits_file();
        if !edits.exists() {
            File::create(&edits)?;
        }
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.local_dir().is_dir()
    }

    /// Write JSON atomically (temp + rename)
    pub fn write_json<T: Serialize>(&self, path: &Path, data: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        lock::write_atomic(path, json.as_bytes())
    }

    /// Read JSON from a file
    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Read the persisted agent identity, if any
    pub fn read_agent(&self) -> Option<String> {
        fs::read_to_string(self.agent_file())
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Persist the agent identity for this checkout
    pub fn write_agent(&self, agent: &str) -> Result<()> {
        fs::create_dir_all(self.local_dir())?;
        lock::write_atomic(self.agent_file(), agent.as_bytes())
    }
}

/// Ensure `.ei/` is ignored by git when a `.git` directory is present.
pub fn ensure_gitignore(root: &Path) -> Result<bool> {
    let path = root.join(".gitignore");
    if path.exists() && !path.is_file() {
        return Err(Error::OperationFailed(format!(
            ".gitignore exists but is not a file: {}",
            path.display()
        )));
    }

    let existing = if path.exists() {
        fs::read_to_string(&path)?
    } else {
        String::new()
    };

    let already = existing.lines().any(|line| {
        let trimmed = line.trim();
        trimmed == ".ei" || trimmed == ".ei/" || trimmed == "/.ei" || trimmed == "/.ei/"
    });
    if already {
        return Ok(false);
    }

    let mut file = fs::OpenOptions::new().create(true).append(true).open(&path)?;
    if !existing.is_empty() && !existing.ends_with('\n') {
        writeln!(file)?;
    }
    writeln!(file, ".ei/")?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn paths_are_rooted_under_local_dir() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path().to_path_buf());

        assert_eq!(storage.local_dir(), temp.path().join(".ei"));
        assert_eq!(storage.edits_file(), temp.path().join(".ei/edits.jsonl"));
        assert_eq!(storage.runs_dir(), temp.path().join(".ei/runs"));
        assert_eq!(storage.config_file(), temp.path().join(".ei.toml"));
    }

    #[test]
    fn init_creates_dirs_and_log() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path().to_path_buf());
        assert!(!storage.is_initialized());

        storage.init().unwrap();
        assert!(storage.is_initialized());
        assert!(storage.runs_dir().is_dir());
        assert!(storage.edits_file().is_file());
    }

    #[test]
    fn discover_walks_up() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path().to_path_buf());
        storage.init().unwrap();

        let nested = temp.path().join("src").join("deep");
        fs::create_dir_all(&nested).unwrap();

        let found = Storage::discover(&nested).unwrap();
        assert_eq!(found.root(), temp.path());
    }

    #[test]
    fn discover_fails_outside_a_workspace() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            Storage::discover(temp.path()),
            Err(Error::NotInitialized(_))
        ));
    }

    #[test]
    fn agent_round_trips() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path().to_path_buf());

        assert!(storage.read_agent().is_none());
        storage.write_agent("agent-7").unwrap();
        assert_eq!(storage.read_agent(), Some("agent-7".to_string()));
    }

    #[test]
    fn gitignore_entry_is_added_once() {
        let temp = TempDir::new().unwrap();

        assert!(ensure_gitignore(temp.path()).unwrap());
        assert!(!ensure_gitignore(temp.path()).unwrap());

        let content = fs::read_to_string(temp.path().join(".gitignore")).unwrap();
        assert_eq!(content.matches(".ei/").count(), 1);
    }
}
