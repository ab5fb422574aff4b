//! ei status command implementation
//!
//! Shows the pending edit stream grouped per file, with conflict
//! candidates, pairwise classifications, and the last merge run.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::automerge;
use crate::classify;
use crate::error::Result;
use crate::group;
use crate::ingest::EditLog;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::runlog::{format_record, RunLog};
use crate::storage::Storage;

#[derive(serde::Serialize)]
struct StatusReport {
    pending_edits: usize,
    files: Vec<FileStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_run: Option<LastRun>,
}

#[derive(serde::Serialize)]
struct FileStatus {
    file: String,
    edits: usize,
    agents: Vec<String>,
    candidate_conflict: bool,
    conflict_types: Vec<crate::classify::ConflictType>,
    auto_mergeable: bool,
}

#[derive(serde::Serialize)]
struct LastRun {
    run_id: uuid::Uuid,
    success: bool,
    merged: usize,
    unresolved: usize,
}

pub fn run(root: Option<PathBuf>, json: bool, quiet: bool) -> Result<()> {
    let start = match root {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    let storage = Storage::discover(&start)?;

    let log = EditLog::new(storage.edits_file());
    let snapshot = log.snapshot()?;
    let pending_edits = snapshot.len();

    let bases = read_bases(&storage, &snapshot);
    let groups = group::group_entries(snapshot, &bases);

    let files: Vec<FileStatus> = groups
        .values()
        .map(|context| {
            let mut agents: Vec<String> = context
                .edits
                .iter()
                .map(|edit| edit.agent_id.clone())
                .collect();
            agents.dedup();
            FileStatus {
                file: context.file_path.clone(),
                edits: context.edits.len(),
                agents,
                candidate_conflict: context.touched_by_multiple_agents(),
                conflict_types: classify::classify_context(context),
                auto_mergeable: automerge::can_auto_merge(context),
            }
        })
        .collect();

    let last_run_record = RunLog::for_storage(&storage).read_latest()?;
    let last_run = last_run_record.as_ref().map(|record| LastRun {
        run_id: record.run_id,
        success: record.output.success,
        merged: record.output.merged_files.len(),
        unresolved: record.output.unresolved.len(),
    });

    let report = StatusReport {
        pending_edits,
        files,
        last_run,
    };

    let mut human = HumanOutput::new(format!(
        "ei status: {pending_edits} pending edit(s) across {} file(s)",
        report.files.len()
    ));
    for file in &report.files {
        let labels: Vec<&str> = file
            .conflict_types
            .iter()
            .map(|kind| kind.label())
            .collect();
        let state = if file.auto_mergeable {
            "auto-mergeable".to_string()
        } else if labels.is_empty() {
            "needs arbitration".to_string()
        } else {
            format!("conflicts: {}", labels.join(", "))
        };
        human.push_detail(format!(
            "{} - {} edit(s) by [{}] - {}",
            file.file,
            file.edits,
            file.agents.join(", "),
            state
        ));
    }
    if let Some(record) = &last_run_record {
        human.push_summary("last run", format_record(record));
    }
    if report.files.iter().any(|file| !file.auto_mergeable) {
        human.push_next_step("ei merge");
    }

    emit_success(OutputOptions { json, quiet }, "status", &report, Some(&human))?;
    Ok(())
}

fn read_bases(
    storage: &Storage,
    snapshot: &[crate::edit::EditStreamEntry],
) -> BTreeMap<String, String> {
    let mut bases = BTreeMap::new();
    for entry in snapshot {
        if bases.contains_key(&entry.file_path) {
            continue;
        }
        if let Ok(content) = std::fs::read_to_string(storage.root().join(&entry.file_path)) {
            bases.insert(entry.file_path.clone(), content);
        }
    }
    bases
}
