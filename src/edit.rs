//! Edit stream entry model.
//!
//! One `EditStreamEntry` is one change proposed by one agent. Entries are
//! created at the ingest boundary, validated once, and immutable thereafter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::hunk::DiffHunk;

/// Operation kind carried by an edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditOperation {
    Create,
    Update,
    Delete,
    Rename,
}

impl EditOperation {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            "rename" => Ok(Self::Rename),
            other => Err(Error::InvalidArgument(format!(
                "invalid operation '{other}' (expected create|update|delete|rename)"
            ))),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Rename => "rename",
        }
    }
}

/// One change proposed by one agent against one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditStreamEntry {
    pub edit_id: Uuid,

    /// Opaque identifier of the submitting agent.
    pub agent_id: String,

    /// Repository-relative path; identity key for grouping.
    pub file_path: String,

    pub operation: EditOperation,

    /// Ordered hunks; absent for full-content, delete, and rename edits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_hunks: Option<Vec<DiffHunk>>,

    /// Full replacement text, used when hunks are unavailable or the
    /// operation is `create`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_content: Option<String>,

    /// Target path for `rename` operations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rename_to: Option<String>,

    /// Agent-supplied intent, forwarded verbatim to arbitration prompts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,

    /// Submission timestamp used for ordering and tie-breaking.
    pub submitted_at: DateTime<Utc>,
}

impl EditStreamEntry {
    /// Create a new entry stamped with a fresh id and the current time.
    pub fn new(
        agent_id: impl Into<String>,
        file_path: impl Into<String>,
        operation: EditOperation,
    ) -> Self {
        Self {
            edit_id: Uuid::new_v4(),
            agent_id: agent_id.into(),
            file_path: file_path.into(),
            operation,
            diff_hunks: None,
            new_content: None,
            rename_to: None,
            rationale: None,
            submitted_at: Utc::now(),
        }
    }

    pub fn with_hunks(mut self, hunks: Vec<DiffHunk>) -> Self {
        self.diff_hunks = Some(hunks);
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.new_content = Some(content.into());
        self
    }

    pub fn with_rename_to(mut self, target: impl Into<String>) -> Self {
        self.rename_to = Some(target.into());
        self
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }

    pub fn with_submitted_at(mut self, at: DateTime<Utc>) -> Self {
        self.submitted_at = at;
        self
    }

    /// True when the entry carries at least one hunk.
    pub fn has_hunks(&self) -> bool {
        self.diff_hunks
            .as_ref()
            .map(|hunks| !hunks.is_empty())
            .unwrap_or(false)
    }

    /// Start line of the first hunk, if any. Auto-merge sorts by this.
    pub fn first_hunk_start(&self) -> Option<usize> {
        self.diff_hunks
            .as_ref()
            .and_then(|hunks| hunks.first())
            .map(|hunk| hunk.start_line)
    }

    /// Enforce the per-operation shape invariants.
    pub fn validate(&self) -> Result<()> {
        if self.agent_id.trim().is_empty() {
            return Err(Error::InvalidEntry("agent_id cannot be empty".to_string()));
        }
        if self.file_path.trim().is_empty() {
            return Err(Error::InvalidEntry("file_path cannot be empty".to_string()));
        }

        match self.operation {
            EditOperation::Create => {
                if self.new_content.is_none() {
                    return Err(Error::InvalidEntry(format!(
                        "create of {} requires new_content",
                        self.file_path
                    )));
                }
                if self.diff_hunks.is_some() {
                    return Err(Error::InvalidEntry(format!(
                        "create of {} cannot carry diff_hunks",
                        self.file_path
                    )));
                }
            }
            EditOperation::Update => {
                if !self.has_hunks() && self.new_content.is_none() {
                    return Err(Error::InvalidEntry(format!(
                        "update of {} requires diff_hunks or new_content",
                        self.file_path
                    )));
                }
            }
            EditOperation::Delete => {
                if self.new_content.is_some() || self.diff_hunks.is_some() {
                    return Err(Error::InvalidEntry(format!(
                        "delete of {} cannot carry content or hunks",
                        self.file_path
                    )));
                }
            }
            EditOperation::Rename => {
                if self.rename_to.as_deref().map(str::trim).unwrap_or("").is_empty() {
                    return Err(Error::InvalidEntry(format!(
                        "rename of {} requires rename_to",
                        self.file_path
                    )));
                }
                if self.diff_hunks.is_some() {
                    return Err(Error::InvalidEntry(format!(
                        "rename of {} cannot carry diff_hunks",
                        self.file_path
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hunk::DiffHunk;

    #[test]
    fn create_requires_content_and_forbids_hunks() {
        let bare = EditStreamEntry::new("agent-a", "new.rs", EditOperation::Create);
        assert!(bare.validate().is_err());

        let ok = bare.clone().with_content("fn main() {}\n");
        assert!(ok.validate().is_ok());

        let bad = ok.with_hunks(vec![DiffHunk::replace_line(1, "a", "b")]);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn delete_carries_nothing() {
        let ok = EditStreamEntry::new("agent-a", "old.rs", EditOperation::Delete);
        assert!(ok.validate().is_ok());

        let bad = ok.with_content("leftover");
        assert!(bad.validate().is_err());
    }

    #[test]
    fn rename_requires_target() {
        let bare = EditStreamEntry::new("agent-a", "a.rs", EditOperation::Rename);
        assert!(bare.validate().is_err());
        assert!(bare.with_rename_to("b.rs").validate().is_ok());
    }

    #[test]
    fn update_requires_some_payload() {
        let bare = EditStreamEntry::new("agent-a", "f.rs", EditOperation::Update);
        assert!(bare.validate().is_err());
        assert!(bare
            .clone()
            .with_hunks(vec![DiffHunk::replace_line(1, "a", "b")])
            .validate()
            .is_ok());
        assert!(bare.with_content("whole file").validate().is_ok());
    }

    #[test]
    fn empty_identity_rejected() {
        let entry = EditStreamEntry::new("  ", "f.rs", EditOperation::Delete);
        assert!(entry.validate().is_err());
    }

    #[test]
    fn serializes_operation_snake_case() {
        let entry = EditStreamEntry::new("a", "f.rs", EditOperation::Delete);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["operation"], "delete");
        assert!(json.get("new_content").is_none());
    }
}
