//! Command-line interface for ei
//!
//! This module defines the CLI structure using clap derive macros.
//! Each subcommand is defined in its own submodule.

use clap::{Parser, Subcommand};

use crate::error::Result;

mod agent;
mod init;
mod merge;
mod status;
mod submit;

/// ei - Edit Integration
///
/// A CLI that reconciles file edits submitted concurrently by multiple
/// autonomous coding agents: mechanical merges where provable, semantic
/// arbitration where not.
#[derive(Parser, Debug)]
#[command(name = "ei")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the workspace root (defaults to current directory)
    #[arg(long, global = true, env = "EI_ROOT")]
    pub root: Option<std::path::PathBuf>,

    /// Agent identity for submitted edits and run records
    #[arg(long, global = true, env = "EI_AGENT")]
    pub agent: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit JSONL events to a file, or "-" for stdout
    #[arg(long, global = true)]
    pub events: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize ei state in this checkout
    Init,

    /// Submit one edit to the pending stream
    Submit {
        /// Repository-relative file path the edit targets
        file: String,

        /// Operation: create, update, delete, rename
        #[arg(long, default_value = "update")]
        op: String,

        /// Read full replacement content from a file ("-" for stdin)
        #[arg(long)]
        content_file: Option<String>,

        /// Read diff hunks from a JSON file (array of {start_line,
        /// old_lines, new_lines})
        #[arg(long)]
        hunks_file: Option<std::path::PathBuf>,

        /// Target path for rename operations
        #[arg(long)]
        rename_to: Option<String>,

        /// Why the agent made this edit (forwarded to arbitration)
        #[arg(long)]
        rationale: Option<String>,
    },

    /// Show the pending stream grouped per file with conflict candidates
    Status,

    /// Snapshot the stream and run a merge
    Merge {
        /// Write merged content back to the checkout and consume the
        /// resolved entries
        #[arg(long)]
        apply: bool,

        /// Skip the reasoning engine; conflicted files stay unresolved
        #[arg(long)]
        no_engine: bool,
    },

    /// Agent identity management
    #[command(subcommand)]
    Agent(AgentCommands),
}

/// Agent subcommands
#[derive(Subcommand, Debug)]
pub enum AgentCommands {
    /// Persist the agent identity for this checkout
    Set {
        /// Agent name
        name: String,
    },

    /// Show the resolved agent identity
    Show,
}

impl Cli {
    pub fn run(&self) -> Result<()> {
        let root = self.root.clone();
        let json = self.json;
        let quiet = self.quiet;

        match &self.command {
            Commands::Init => init::run(root, json, quiet),
            Commands::Submit {
                file,
                op,
                content_file,
                hunks_file,
                rename_to,
                rationale,
            } => submit::run(submit::SubmitArgs {
                root,
                agent: self.agent.clone(),
                file: file.clone(),
                op: op.clone(),
                content_file: content_file.clone(),
                hunks_file: hunks_file.clone(),
                rename_to: rename_to.clone(),
                rationale: rationale.clone(),
                events: self.events.clone(),
                json,
                quiet,
            }),
            Commands::Status => status::run(root, json, quiet),
            Commands::Merge { apply, no_engine } => merge::run(merge::MergeArgs {
                root,
                agent: self.agent.clone(),
                apply: *apply,
                no_engine: *no_engine,
                events: self.events.clone(),
                json,
                quiet,
            }),
            Commands::Agent(agent_cmd) => match agent_cmd {
                AgentCommands::Set { name } => agent::set(root, name, json, quiet),
                AgentCommands::Show => agent::show(root, self.agent.as_deref(), json, quiet),
            },
        }
    }
}
