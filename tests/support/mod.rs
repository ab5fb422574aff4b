use std::fs;
use std::path::{Path, PathBuf};

use ei::edit::EditStreamEntry;
use ei::storage::Storage;
use tempfile::TempDir;

pub struct TestWorkspace {
    dir: TempDir,
    storage: Storage,
}

impl TestWorkspace {
    pub fn init() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let storage = Storage::new(dir.path().to_path_buf());
        storage.init().expect("init storage");
        Self { dir, storage }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn write_file(&self, rel_path: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, contents).expect("write file");
        path
    }

    pub fn read_file(&self, rel_path: &str) -> String {
        fs::read_to_string(self.dir.path().join(rel_path)).expect("read file")
    }

    pub fn file_exists(&self, rel_path: &str) -> bool {
        self.dir.path().join(rel_path).exists()
    }

    pub fn write_config(&self, contents: &str) -> PathBuf {
        let path = self.dir.path().join(".ei.toml");
        fs::write(&path, contents).expect("write config");
        path
    }

    pub fn edit_log(&self) -> ei::ingest::EditLog {
        ei::ingest::EditLog::new(self.storage.edits_file())
    }

    pub fn pending_edits(&self) -> Vec<EditStreamEntry> {
        self.edit_log().snapshot().expect("snapshot edit log")
    }
}

/// A numbered base document: `line 1\n` through `line n\n`.
pub fn numbered_base(n: usize) -> String {
    (1..=n).map(|i| format!("line {i}\n")).collect()
}
