//! Merge run audit log.
//!
//! Every merge run appends one record under `.ei/runs/`, mirroring the
//! terminal `IntegratorOutput` so strategy and rationale stay auditable
//! after the stream is consumed.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::lock::{self, FileLock, DEFAULT_LOCK_TIMEOUT_MS};
use crate::outcome::IntegratorOutput;
use crate::storage::Storage;

/// Audit record for one merge run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    /// Whether conflicted files were sent to the reasoning engine
    pub engine_used: bool,
    /// Whether merged content was written back to the checkout
    pub applied: bool,
    pub output: IntegratorOutput,
}

impl RunRecord {
    pub fn new(agent: Option<String>, engine_used: bool, applied: bool) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            agent,
            engine_used,
            applied,
            output: IntegratorOutput::new(),
        }
    }

    pub fn with_output(mut self, output: IntegratorOutput) -> Self {
        self.finished_at = Utc::now();
        self.output = output;
        self
    }
}

/// Run log manager
#[derive(Debug, Clone)]
pub struct RunLog {
    dir: PathBuf,
}

impl RunLog {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn for_storage(storage: &Storage) -> Self {
        Self::new(storage.runs_dir())
    }

    /// Append a run record to the log
    pub fn append(&self, record: &RunRecord) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let _lock = FileLock::acquire(runs_lock_path(&self.dir), DEFAULT_LOCK_TIMEOUT_MS)?;

        let path = self.dir.join(record_filename(record));
        if path.exists() {
            return Err(Error::OperationFailed(format!(
                "run record already exists: {}",
                path.display()
            )));
        }

        let json = serde_json::to_vec_pretty(record)?;
        lock::write_atomic(&path, &json)?;
        Ok(path)
    }

    /// Read all run records (oldest first)
    pub fn read_all(&self) -> Result<Vec<RunRecord>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let _lock = FileLock::acquire(runs_lock_path(&self.dir), DEFAULT_LOCK_TIMEOUT_MS)?;

        let mut paths: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some("json"))
            .collect();
        paths.sort();

        let mut records = Vec::new();
        for path in paths {
            let content = fs::read_to_string(&path)?;
            records.push(serde_json::from_str(&content)?);
        }
        Ok(records)
    }

    /// Most recent run record, if any
    pub fn read_latest(&self) -> Result<Option<RunRecord>> {
        Ok(self.read_all()?.into_iter().last())
    }
}

/// Format a single run record for human-readable output
pub fn format_record(record: &RunRecord) -> String {
    let status = if record.output.success { "success" } else { "partial" };
    format!(
        "{ts} {id} status={status} merged={merged} unresolved={unresolved} engine={engine} applied={applied}",
        ts = record.finished_at.to_rfc3339(),
        id = record.run_id,
        merged = record.output.merged_files.len(),
        unresolved = record.output.unresolved.len(),
        engine = record.engine_used,
        applied = record.applied,
    )
}

fn runs_lock_path(dir: &Path) -> PathBuf {
    dir.join("runs.lock")
}

fn record_filename(record: &RunRecord) -> String {
    let ts = record.started_at.format("%Y%m%dT%H%M%S%.3fZ");
    format!("{}-{}.json", ts, record.run_id)
}
