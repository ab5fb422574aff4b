//! Merge run orchestration.
//!
//! Wires the grouper, classifier, auto-merge engine, and arbiter into one
//! run over an ingest snapshot. Everything here operates on pass-by-value
//! data; the live edit stream is never touched after the snapshot is
//! taken. Per-file failures accumulate in the output — only structural
//! failures (an unreadable snapshot, handled by the caller) abort a run.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::arbiter::{self, ArbiterOptions};
use crate::automerge;
use crate::classify;
use crate::edit::EditStreamEntry;
use crate::engine::ReasoningEngine;
use crate::error::Result;
use crate::group::{self, FileConflictContext};
use crate::outcome::{IntegratorInput, IntegratorOutput, UnresolvedFile};
use crate::progress::{CancelToken, NullSink, ProgressReporter, ProgressSink};

/// Run a merge over a snapshot without progress observation.
pub async fn run_merge_run<E>(
    snapshot: Vec<EditStreamEntry>,
    bases: &BTreeMap<String, String>,
    engine: Option<Arc<E>>,
    options: ArbiterOptions,
) -> IntegratorOutput
where
    E: ReasoningEngine + 'static,
{
    let mut sink = NullSink;
    run_merge_run_with_progress(
        snapshot,
        bases,
        engine,
        options,
        CancelToken::new(),
        &mut sink,
    )
    .await
}

/// Run a merge over a snapshot, surfacing stage events through `sink`.
///
/// Both entry points derive from the same state; the sink variant exists
/// for UI-observable runs.
pub async fn run_merge_run_with_progress<E>(
    snapshot: Vec<EditStreamEntry>,
    bases: &BTreeMap<String, String>,
    engine: Option<Arc<E>>,
    options: ArbiterOptions,
    cancel: CancelToken,
    sink: &mut dyn ProgressSink,
) -> IntegratorOutput
where
    E: ReasoningEngine + 'static,
{
    let mut reporter = ProgressReporter::new(sink);
    let groups = group::group_entries(snapshot, bases);
    reporter.analyzing(groups.len());

    let mut output = IntegratorOutput::new();
    let mut needs_arbitration: Vec<FileConflictContext> = Vec::new();

    for (file_path, context) in groups {
        if cancel.is_cancelled() {
            output.push_unresolved(cancelled(&context));
            reporter.merging(&file_path);
            continue;
        }

        if automerge::can_auto_merge(&context) {
            match automerge::auto_merge(&context) {
                Ok(merged) => {
                    tracing::debug!(file = %file_path, "auto-merged");
                    output.push_merged(merged);
                    reporter.merging(&file_path);
                }
                Err(err) => {
                    // Mechanical failure (malformed hunk): unresolved by
                    // mechanism, handed to arbitration rather than crashed.
                    tracing::warn!(file = %file_path, error = %err, "auto-merge failed");
                    needs_arbitration.push(context);
                }
            }
        } else {
            needs_arbitration.push(context);
        }
    }

    if !needs_arbitration.is_empty() {
        match engine {
            Some(engine) => {
                let arbitrated = arbiter::arbitrate(
                    IntegratorInput {
                        contexts: needs_arbitration,
                    },
                    engine,
                    options,
                    cancel,
                    |file_path| reporter.merging(file_path),
                )
                .await;
                output.extend(arbitrated);
            }
            None => {
                for context in needs_arbitration {
                    output.push_unresolved(UnresolvedFile {
                        file_path: context.file_path.clone(),
                        conflict_types: classify::classify_context(&context),
                        error: "conflicting edits require arbitration, but no reasoning \
                                engine is configured"
                            .to_string(),
                    });
                    reporter.merging(&context.file_path);
                }
            }
        }
    }

    reporter.validating();
    reporter.complete(&output);
    output
}

/// Synchronous wrapper for callers without a runtime.
pub fn run_merge_run_blocking<E>(
    snapshot: Vec<EditStreamEntry>,
    bases: &BTreeMap<String, String>,
    engine: Option<Arc<E>>,
    options: ArbiterOptions,
) -> Result<IntegratorOutput>
where
    E: ReasoningEngine + 'static,
{
    let runtime = tokio::runtime::Runtime::new()?;
    Ok(runtime.block_on(run_merge_run(snapshot, bases, engine, options)))
}

fn cancelled(context: &FileConflictContext) -> UnresolvedFile {
    UnresolvedFile {
        file_path: context.file_path.clone(),
        conflict_types: classify::classify_context(context),
        error: "merge run cancelled".to_string(),
    }
}
