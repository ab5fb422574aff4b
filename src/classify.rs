//! Pairwise conflict classification.
//!
//! `classify` assigns a taxonomy label to a pair of edits against the same
//! file, or `None` when the pair is provably independent (both sides carry
//! hunks and no ranges intersect). The ladder is evaluated top to bottom,
//! first match wins, and the result is symmetric in its arguments.
//!
//! The `Logical` fallback is deliberately conservative: missing hunk
//! metadata is treated as a reason for arbitration, not as evidence of
//! independence.

use serde::{Deserialize, Serialize};

use crate::edit::{EditOperation, EditStreamEntry};
use crate::group::FileConflictContext;

/// Conflict taxonomy for an edit pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictType {
    /// Both edits touch an identical line range.
    SameLine,
    /// Overlapping but not identical line ranges.
    SameBlock,
    /// One side deletes the file the other modifies.
    DeleteModify,
    /// Either side renames the file.
    RenameConflict,
    /// Overlap cannot be ruled out (missing hunk metadata, full-content
    /// edits, or matching operations with no geometry to compare).
    Logical,
}

impl ConflictType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::SameLine => "same line",
            Self::SameBlock => "same block",
            Self::DeleteModify => "delete/modify",
            Self::RenameConflict => "rename",
            Self::Logical => "logical",
        }
    }
}

/// Classify one pair of edits. `None` means provably independent.
pub fn classify(a: &EditStreamEntry, b: &EditStreamEntry) -> Option<ConflictType> {
    let a_deletes = a.operation == EditOperation::Delete;
    let b_deletes = b.operation == EditOperation::Delete;
    if a_deletes != b_deletes {
        return Some(ConflictType::DeleteModify);
    }

    if a.operation == EditOperation::Rename || b.operation == EditOperation::Rename {
        return Some(ConflictType::RenameConflict);
    }

    if a.has_hunks() && b.has_hunks() {
        return classify_hunk_geometry(
            a.diff_hunks.as_deref().unwrap_or_default(),
            b.diff_hunks.as_deref().unwrap_or_default(),
        );
    }

    Some(ConflictType::Logical)
}

/// All pairwise classifications for a context, deduplicated, in ladder
/// order. Single-edit contexts report no conflicts.
pub fn classify_context(context: &FileConflictContext) -> Vec<ConflictType> {
    let mut found = Vec::new();
    for (index, a) in context.edits.iter().enumerate() {
        for b in context.edits.iter().skip(index + 1) {
            if let Some(kind) = classify(a, b) {
                if !found.contains(&kind) {
                    found.push(kind);
                }
            }
        }
    }
    found
}

/// True when every pair in the context is provably independent.
pub fn all_pairs_independent(context: &FileConflictContext) -> bool {
    for (index, a) in context.edits.iter().enumerate() {
        for b in context.edits.iter().skip(index + 1) {
            if classify(a, b).is_some() {
                return false;
            }
        }
    }
    true
}

fn classify_hunk_geometry(
    ours: &[crate::hunk::DiffHunk],
    theirs: &[crate::hunk::DiffHunk],
) -> Option<ConflictType> {
    let mut saw_overlap = false;
    for a in ours {
        let (a_start, a_end) = a.range();
        for b in theirs {
            let (b_start, b_end) = b.range();
            if a_start == b_start && a_end == b_end {
                return Some(ConflictType::SameLine);
            }
            if a_start < b_end && b_start < a_end {
                saw_overlap = true;
            }
        }
    }

    if saw_overlap {
        Some(ConflictType::SameBlock)
    } else {
        None
    }
}
