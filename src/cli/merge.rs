//! ei merge command implementation
//!
//! Snapshots the pending stream, runs a merge over it, records the run,
//! and optionally writes merged content back to the checkout. Persisting
//! content is this command's job, not the engine's: the integration logic
//! itself never touches the checkout.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use uuid::Uuid;

use crate::agent::resolve_agent;
use crate::arbiter::ArbiterOptions;
use crate::config::Config;
use crate::edit::EditStreamEntry;
use crate::engine::HttpEngine;
use crate::error::Result;
use crate::events::{Event, EventDestination, EventKind, EventSink};
use crate::ingest::EditLog;
use crate::integrate::{run_merge_run, run_merge_run_with_progress};
use crate::outcome::IntegratorOutput;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::progress::CancelToken;
use crate::runlog::{RunLog, RunRecord};
use crate::storage::Storage;

pub struct MergeArgs {
    pub root: Option<PathBuf>,
    pub agent: Option<String>,
    pub apply: bool,
    pub no_engine: bool,
    pub events: Option<String>,
    pub json: bool,
    pub quiet: bool,
}

#[derive(serde::Serialize)]
struct MergeReport {
    run_id: Uuid,
    engine_used: bool,
    applied: bool,
    output: IntegratorOutput,
}

pub fn run(args: MergeArgs) -> Result<()> {
    let start = match &args.root {
        Some(path) => path.clone(),
        None => std::env::current_dir()?,
    };
    let storage = Storage::discover(&start)?;
    let config = Config::load_from_root(&storage.root().to_path_buf());
    let agent = resolve_agent(Some(storage.root()), args.agent.as_deref())?;

    let mut event_sink = match EventDestination::parse(args.events.as_deref()) {
        Some(destination) => Some(destination.open()?),
        None => None,
    };

    let log = EditLog::new(storage.edits_file());
    let snapshot = match log.snapshot() {
        Ok(snapshot) => snapshot,
        Err(err) => {
            // Structural failure: the whole run aborts.
            if let Some(sink) = &mut event_sink {
                let event = Event::new(EventKind::RunFailed, Some(agent.clone()))
                    .with_data(serde_json::json!({"error": err.to_string()}))?;
                sink.emit(&event)?;
            }
            return Err(err);
        }
    };

    if snapshot.is_empty() {
        let mut human = HumanOutput::new("ei merge: nothing to merge");
        human.push_next_step("ei submit <file> ...");
        emit_success(
            OutputOptions {
                json: args.json,
                quiet: args.quiet,
            },
            "merge",
            &serde_json::json!({"pending_edits": 0}),
            Some(&human),
        )?;
        return Ok(());
    }

    let bases = read_bases(storage.root(), &snapshot);
    let engine_enabled = !args.no_engine && config.engine.enabled;
    let engine = if engine_enabled {
        Some(Arc::new(HttpEngine::from_config(&config.engine)))
    } else {
        None
    };
    let options = ArbiterOptions::from(&config.engine);

    if let Some(sink) = &mut event_sink {
        let event = Event::new(EventKind::RunStarted, Some(agent.clone())).with_data(
            serde_json::json!({
                "pending_edits": snapshot.len(),
                "engine_enabled": engine_enabled,
            }),
        )?;
        sink.emit(&event)?;
    }

    let record = RunRecord::new(Some(agent.clone()), engine_enabled, args.apply);
    let runtime = tokio::runtime::Runtime::new()?;
    let output = match &mut event_sink {
        Some(sink) => runtime.block_on(run_merge_run_with_progress(
            snapshot.clone(),
            &bases,
            engine,
            options,
            CancelToken::new(),
            sink,
        )),
        None => runtime.block_on(run_merge_run(snapshot.clone(), &bases, engine, options)),
    };

    if let Some(sink) = &mut event_sink {
        emit_outcome_events(sink, &agent, &output)?;
    }

    let record = record.with_output(output.clone());
    RunLog::for_storage(&storage).append(&record)?;

    let applied = if args.apply {
        apply_output(storage.root(), &output)?;
        if config.merge.consume_on_apply {
            let consumed = consumed_edit_ids(&snapshot, &output);
            log.remove_entries(&consumed)?;
        }
        true
    } else {
        false
    };

    let report = MergeReport {
        run_id: record.run_id,
        engine_used: engine_enabled,
        applied,
        output: output.clone(),
    };

    let header = if output.success {
        format!("ei merge: {} file(s) merged", output.merged_files.len())
    } else {
        format!(
            "ei merge: {} file(s) merged, {} unresolved",
            output.merged_files.len(),
            output.unresolved.len()
        )
    };
    let mut human = HumanOutput::new(header);
    human.push_summary("run", record.run_id.to_string());
    human.push_summary("agent", agent);
    human.push_summary("applied", applied.to_string());
    for file in &output.merged_files {
        human.push_detail(format!(
            "{} - {}: {}",
            file.file_path,
            file.strategy.label(),
            file.reasoning
        ));
    }
    for file in &output.unresolved {
        human.push_warning(format!("{} - {}", file.file_path, file.error));
    }
    if !output.success {
        human.push_next_step("rerun `ei merge` later; unresolved edits stay pending");
    } else if !applied {
        human.push_next_step("ei merge --apply");
    }

    emit_success(
        OutputOptions {
            json: args.json,
            quiet: args.quiet,
        },
        "merge",
        &report,
        Some(&human),
    )?;
    Ok(())
}

fn read_bases(root: &Path, snapshot: &[EditStreamEntry]) -> BTreeMap<String, String> {
    let mut bases = BTreeMap::new();
    for entry in snapshot {
        if bases.contains_key(&entry.file_path) {
            continue;
        }
        if let Ok(content) = std::fs::read_to_string(root.join(&entry.file_path)) {
            bases.insert(entry.file_path.clone(), content);
        }
    }
    bases
}

fn emit_outcome_events(sink: &mut EventSink, agent: &str, output: &IntegratorOutput) -> Result<()> {
    for file in &output.merged_files {
        let event = Event::new(EventKind::FileMerged, Some(agent.to_string())).with_data(
            serde_json::json!({
                "file": file.file_path,
                "strategy": file.strategy,
                "reasoning": file.reasoning,
            }),
        )?;
        sink.emit(&event)?;
    }
    for file in &output.unresolved {
        let event = Event::new(EventKind::FileUnresolved, Some(agent.to_string())).with_data(
            serde_json::json!({
                "file": file.file_path,
                "error": file.error,
            }),
        )?;
        sink.emit(&event)?;
    }

    let event = Event::new(EventKind::RunCompleted, Some(agent.to_string())).with_data(
        serde_json::json!({
            "success": output.success,
            "merged": output.merged_files.len(),
            "unresolved": output.unresolved.len(),
        }),
    )?;
    sink.emit(&event)?;
    Ok(())
}

/// Persist merged content. This is the caller-side step the engine leaves
/// to us: one serialized write per file, no cross-file transaction.
fn apply_output(root: &Path, output: &IntegratorOutput) -> Result<()> {
    for file in &output.merged_files {
        let source = root.join(&file.file_path);
        match (&file.content, &file.renamed_to) {
            (None, _) => {
                if source.exists() {
                    std::fs::remove_file(&source)?;
                }
            }
            (Some(content), Some(renamed_to)) => {
                let target = root.join(renamed_to);
                write_file(&target, content)?;
                if source.exists() && source != target {
                    std::fs::remove_file(&source)?;
                }
            }
            (Some(content), None) => {
                write_file(&source, content)?;
            }
        }
    }
    Ok(())
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

/// Edits whose file resolved are consumed; unresolved files keep their
/// entries pending for the next run.
fn consumed_edit_ids(snapshot: &[EditStreamEntry], output: &IntegratorOutput) -> Vec<Uuid> {
    snapshot
        .iter()
        .filter(|entry| {
            output
                .merged_files
                .iter()
                .any(|file| file.file_path == entry.file_path)
        })
        .map(|entry| entry.edit_id)
        .collect()
}
