//! ei - Edit Integration Library
//!
//! This library provides the core functionality for the ei CLI tool:
//! reconciling file edits produced concurrently by multiple autonomous
//! coding agents working on one shared checkout.
//!
//! # Core Concepts
//!
//! - **Edit Stream**: an append-only, concurrency-safe log of proposed
//!   edits, snapshotted per merge run
//! - **Conflict Grouping**: deterministic per-file partitioning of a
//!   snapshot
//! - **Classification**: a conservative taxonomy over edit pairs (same
//!   line, same block, delete/modify, rename, logical)
//! - **Auto-Merge**: mechanical merging of provably independent edits
//! - **Arbitration**: semantic merges delegated to an external reasoning
//!   engine with strict response validation
//! - **Progress**: a finite stage-event stream with cooperative
//!   cancellation
//!
//! # Module Organization
//!
//! - `cli`: command-line interface using clap
//! - `config`: configuration loading from `.ei.toml`
//! - `error`: error types and result aliases
//! - `hunk`: diff hunk model and application
//! - `edit`: edit stream entry model
//! - `ingest`: in-memory and file-backed edit stream ingest
//! - `group`: per-file conflict grouping
//! - `classify`: pairwise conflict classification
//! - `automerge`: mechanical merge engine
//! - `engine`: external reasoning engine boundary
//! - `arbiter`: semantic merge arbitration
//! - `outcome`: merge outcome model (`IntegratorOutput`)
//! - `integrate`: merge run orchestration
//! - `progress`: stage events, sinks, and cancellation
//! - `agent`: agent identity management
//! - `storage`: `.ei/` state layout
//! - `lock`: file locking and atomic writes
//! - `runlog`: merge run audit log
//! - `events`: JSONL event output for integrations
//! - `output`: shared CLI output formatting

pub mod agent;
pub mod arbiter;
pub mod automerge;
pub mod classify;
pub mod cli;
pub mod config;
pub mod edit;
pub mod engine;
pub mod error;
pub mod events;
pub mod group;
pub mod hunk;
pub mod ingest;
pub mod integrate;
pub mod lock;
pub mod outcome;
pub mod output;
pub mod progress;
pub mod runlog;
pub mod storage;

pub use error::{Error, Result};
