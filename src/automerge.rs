//! Mechanical auto-merge.
//!
//! A context is eligible when it has exactly one edit or when every
//! pairwise classification proves independence. Eligible contexts merge
//! deterministically: edits are applied in descending order of their first
//! hunk's start line (ties broken by submission order) so earlier document
//! regions are unaffected by later splices.

use crate::classify;
use crate::edit::EditOperation;
use crate::error::Result;
use crate::group::FileConflictContext;
use crate::hunk::apply_hunks;
use crate::outcome::{IntegratorOutput, MergedFile, MergeStrategy, UnresolvedFile};

/// True when the context can be merged mechanically.
///
/// `Logical` pairs are not eligible: only geometrically verified
/// non-overlap is auto-mergeable.
pub fn can_auto_merge(context: &FileConflictContext) -> bool {
    context.is_single_edit() || classify::all_pairs_independent(context)
}

/// Merge one context mechanically.
///
/// An edit supplying `new_content` instead of hunks overrides the
/// accumulated content entirely; when several such edits hit one file the
/// last-applied edit wins and earlier replacements are discarded. This is
/// a known limitation, kept intentionally — see DESIGN.md.
pub fn auto_merge(context: &FileConflictContext) -> Result<MergedFile> {
    context.ensure_non_empty()?;

    let mut ordered: Vec<_> = context.edits.iter().collect();
    ordered.sort_by(|a, b| {
        b.first_hunk_start()
            .unwrap_or(0)
            .cmp(&a.first_hunk_start().unwrap_or(0))
            .then_with(|| a.submitted_at.cmp(&b.submitted_at))
            .then_with(|| a.agent_id.cmp(&b.agent_id))
    });

    let mut content = context.original_content.clone();
    let mut deleted = false;
    let mut renamed_to = None;

    for edit in ordered {
        match edit.operation {
            EditOperation::Delete => deleted = true,
            EditOperation::Rename => renamed_to = edit.rename_to.clone(),
            EditOperation::Create | EditOperation::Update => {
                if edit.has_hunks() {
                    let hunks = edit.diff_hunks.as_deref().unwrap_or_default();
                    content = apply_hunks(&context.file_path, &content, hunks)?;
                } else if let Some(replacement) = &edit.new_content {
                    content = replacement.clone();
                }
            }
        }
    }

    let count = context.edits.len();
    let reasoning = if count == 1 {
        "auto-merged 1 edit".to_string()
    } else {
        format!("auto-merged {count} non-overlapping edits")
    };

    Ok(MergedFile {
        file_path: context.file_path.clone(),
        content: if deleted { None } else { Some(content) },
        renamed_to,
        strategy: MergeStrategy::Auto,
        reasoning,
    })
}

/// Merge a batch of eligible contexts, folding per-file failures into the
/// unresolved list instead of aborting the batch.
pub fn auto_merge_contexts(contexts: &[FileConflictContext]) -> IntegratorOutput {
    let mut output = IntegratorOutput::new();
    for context in contexts {
        match auto_merge(context) {
            Ok(merged) => output.push_merged(merged),
            Err(err) => output.push_unresolved(UnresolvedFile {
                file_path: context.file_path.clone(),
                conflict_types: classify::classify_context(context),
                error: err.to_string(),
            }),
        }
    }
    output
}
