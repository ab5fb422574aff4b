//! Conflict grouping.
//!
//! Partitions an ingest snapshot into per-file work units. Pure and
//! deterministic: groups by path, orders each group's edits by
//! `(submitted_at, agent_id)` so clock skew between agents is bounded by a
//! stable lexical tie-break.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::edit::EditStreamEntry;
use crate::error::{Error, Result};

/// The unit of work handed to merge logic: one file, its last known common
/// base, and every edit proposed against it in deterministic order.
///
/// Materialized fresh per merge run from a snapshot; never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct FileConflictContext {
    pub file_path: String,

    /// Last known common base text; empty for files being created.
    pub original_content: String,

    /// Ordered by `(submitted_at, agent_id)`.
    pub edits: Vec<EditStreamEntry>,
}

impl FileConflictContext {
    /// A context with exactly one edit is never a true conflict.
    pub fn is_single_edit(&self) -> bool {
        self.edits.len() == 1
    }

    /// Candidate conflict: the file was touched by more than one agent.
    pub fn touched_by_multiple_agents(&self) -> bool {
        self.edits
            .iter()
            .any(|edit| edit.agent_id != self.edits[0].agent_id)
    }

    /// Defensive invariant check; a zero-edit context is a grouper bug,
    /// never user input.
    pub fn ensure_non_empty(&self) -> Result<()> {
        if self.edits.is_empty() {
            return Err(Error::EmptyEditSet(self.file_path.clone()));
        }
        Ok(())
    }
}

/// Group a snapshot of entries into per-file contexts.
///
/// `bases` maps file path to the last known common base content; a missing
/// entry means the file does not exist yet (correct for creations).
pub fn group_entries(
    entries: Vec<EditStreamEntry>,
    bases: &BTreeMap<String, String>,
) -> BTreeMap<String, FileConflictContext> {
    let mut grouped: BTreeMap<String, Vec<EditStreamEntry>> = BTreeMap::new();
    for entry in entries {
        grouped.entry(entry.file_path.clone()).or_default().push(entry);
    }

    grouped
        .into_iter()
        .map(|(file_path, mut edits)| {
            edits.sort_by(|a, b| {
                a.submitted_at
                    .cmp(&b.submitted_at)
                    .then_with(|| a.agent_id.cmp(&b.agent_id))
            });
            let original_content = bases.get(&file_path).cloned().unwrap_or_default();
            let context = FileConflictContext {
                file_path: file_path.clone(),
                original_content,
                edits,
            };
            (file_path, context)
        })
        .collect()
}
