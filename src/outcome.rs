//! Merge outcome model.
//!
//! `IntegratorOutput` is the terminal artifact of a merge run: per-file
//! merged content with the strategy and rationale that produced it, plus
//! every file that remains unresolved. The caller persists contents; this
//! subsystem never writes to the checkout.

use serde::{Deserialize, Serialize};

use crate::classify::ConflictType;
use crate::group::FileConflictContext;

/// Outcome label attached to a merged file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MergeStrategy {
    /// Mechanical merge, no arbitration involved.
    Auto,
    /// Engine combined both sides.
    MergeBoth,
    /// Engine rewrote the region to accommodate both intents.
    Refactor,
    /// Engine kept the first side.
    TakeA,
    /// Engine kept the second side.
    TakeB,
}

impl MergeStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Auto => "AUTO",
            Self::MergeBoth => "MERGE_BOTH",
            Self::Refactor => "REFACTOR",
            Self::TakeA => "TAKE_A",
            Self::TakeB => "TAKE_B",
        }
    }
}

/// One successfully merged file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedFile {
    pub file_path: String,

    /// Merged text; `None` records a delete.
    pub content: Option<String>,

    /// Rename target when the surviving edit renames the file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renamed_to: Option<String>,

    pub strategy: MergeStrategy,

    /// Human-readable rationale; verbatim from the engine for arbitrated
    /// files.
    pub reasoning: String,
}

/// One file that could not be resolved in this run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedFile {
    pub file_path: String,

    /// Pairwise classifications observed for the file, if any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflict_types: Vec<ConflictType>,

    pub error: String,
}

/// Request envelope handed to the semantic merge arbiter.
#[derive(Debug, Clone, Serialize)]
pub struct IntegratorInput {
    pub contexts: Vec<FileConflictContext>,
}

/// Terminal artifact of a merge run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegratorOutput {
    /// True iff every file resolved.
    pub success: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub merged_files: Vec<MergedFile>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unresolved: Vec<UnresolvedFile>,
}

impl IntegratorOutput {
    pub fn new() -> Self {
        Self {
            success: true,
            merged_files: Vec::new(),
            unresolved: Vec::new(),
        }
    }

    pub fn push_merged(&mut self, file: MergedFile) {
        self.merged_files.push(file);
    }

    pub fn push_unresolved(&mut self, file: UnresolvedFile) {
        self.success = false;
        self.unresolved.push(file);
    }

    /// Fold another output into this one.
    pub fn extend(&mut self, other: IntegratorOutput) {
        self.success = self.success && other.success;
        self.merged_files.extend(other.merged_files);
        self.unresolved.extend(other.unresolved);
    }

    pub fn total_files(&self) -> usize {
        self.merged_files.len() + self.unresolved.len()
    }
}
