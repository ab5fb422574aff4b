//! ei submit command implementation
//!
//! Appends one validated edit entry to the pending stream.

use std::io::Read;
use std::path::PathBuf;

use uuid::Uuid;

use crate::agent::resolve_agent;
use crate::edit::{EditOperation, EditStreamEntry};
use crate::error::{Error, Result};
use crate::events::{Event, EventDestination, EventKind};
use crate::hunk::DiffHunk;
use crate::ingest::EditLog;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::storage::Storage;

pub struct SubmitArgs {
    pub root: Option<PathBuf>,
    pub agent: Option<String>,
    pub file: String,
    pub op: String,
    pub content_file: Option<String>,
    pub hunks_file: Option<PathBuf>,
    pub rename_to: Option<String>,
    pub rationale: Option<String>,
    pub events: Option<String>,
    pub json: bool,
    pub quiet: bool,
}

#[derive(serde::Serialize)]
struct SubmitReport {
    edit_id: Uuid,
    agent: String,
    file: String,
    operation: String,
    pending: usize,
}

pub fn run(args: SubmitArgs) -> Result<()> {
    let start = match &args.root {
        Some(path) => path.clone(),
        None => std::env::current_dir()?,
    };
    let storage = Storage::discover(&start)?;
    let agent = resolve_agent(Some(storage.root()), args.agent.as_deref())?;
    let operation = EditOperation::parse(&args.op)?;

    let mut entry = EditStreamEntry::new(agent.clone(), args.file.clone(), operation);
    if let Some(content_file) = &args.content_file {
        entry = entry.with_content(read_content(content_file)?);
    }
    if let Some(hunks_file) = &args.hunks_file {
        entry = entry.with_hunks(read_hunks(hunks_file)?);
    }
    if let Some(rename_to) = &args.rename_to {
        entry = entry.with_rename_to(rename_to.clone());
    }
    if let Some(rationale) = &args.rationale {
        entry = entry.with_rationale(rationale.clone());
    }

    let log = EditLog::new(storage.edits_file());
    log.append(&entry)?;
    let pending = log.snapshot()?.len();

    if let Some(destination) = EventDestination::parse(args.events.as_deref()) {
        let mut sink = destination.open()?;
        let event = Event::new(EventKind::EditRecorded, Some(agent.clone())).with_data(
            serde_json::json!({
                "edit_id": entry.edit_id,
                "file": entry.file_path,
                "operation": entry.operation.label(),
            }),
        )?;
        sink.emit(&event)?;
    }

    let report = SubmitReport {
        edit_id: entry.edit_id,
        agent: agent.clone(),
        file: entry.file_path.clone(),
        operation: entry.operation.label().to_string(),
        pending,
    };

    let mut human = HumanOutput::new(format!(
        "ei submit: recorded {} of {}",
        entry.operation.label(),
        entry.file_path
    ));
    human.push_summary("agent", agent);
    human.push_summary("edit", entry.edit_id.to_string());
    human.push_summary("pending edits", pending.to_string());
    human.push_next_step("ei status");
    human.push_next_step("ei merge");

    emit_success(
        OutputOptions {
            json: args.json,
            quiet: args.quiet,
        },
        "submit",
        &report,
        Some(&human),
    )?;
    Ok(())
}

fn read_content(source: &str) -> Result<String> {
    if source == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        return Ok(buffer);
    }
    Ok(std::fs::read_to_string(source)?)
}

fn read_hunks(path: &PathBuf) -> Result<Vec<DiffHunk>> {
    let content = std::fs::read_to_string(path)?;
    let hunks: Vec<DiffHunk> = serde_json::from_str(&content).map_err(|err| {
        Error::InvalidArgument(format!(
            "invalid hunks file {}: {err}",
            path.display()
        ))
    })?;
    if hunks.is_empty() {
        return Err(Error::InvalidArgument(format!(
            "hunks file {} contains no hunks",
            path.display()
        )));
    }
    Ok(hunks)
}
