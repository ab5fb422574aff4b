//! ei agent commands implementation

use std::path::PathBuf;

use crate::agent::{persist_agent, resolve_agent};
use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::storage::Storage;

#[derive(serde::Serialize)]
struct AgentReport {
    agent: String,
}

pub fn set(root: Option<PathBuf>, name: &str, json: bool, quiet: bool) -> Result<()> {
    let start = match root {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    let storage = Storage::discover(&start)?;
    persist_agent(storage.root(), name)?;

    let report = AgentReport {
        agent: name.trim().to_string(),
    };
    let mut human = HumanOutput::new(format!("ei agent: set to {}", report.agent));
    human.push_summary("stored in", ".ei/agent".to_string());

    emit_success(OutputOptions { json, quiet }, "agent set", &report, Some(&human))?;
    Ok(())
}

pub fn show(root: Option<PathBuf>, cli_agent: Option<&str>, json: bool, quiet: bool) -> Result<()> {
    let start = match root {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    let resolved_root = Storage::discover(&start).ok().map(|s| s.root().to_path_buf());
    let agent = resolve_agent(resolved_root.as_deref(), cli_agent)?;

    let report = AgentReport { agent };
    let human = HumanOutput::new(format!("ei agent: {}", report.agent));

    emit_success(OutputOptions { json, quiet }, "agent show", &report, Some(&human))?;
    Ok(())
}
