//! ei init command implementation
//!
//! Creates initial ei config and storage directories in a checkout.

use std::path::PathBuf;

use crate::config::Config;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::storage::{ensure_gitignore, Storage};

#[derive(serde::Serialize)]
struct InitReport {
    root: PathBuf,
    created: InitCreated,
    updated: InitUpdated,
}

#[derive(serde::Serialize)]
struct InitCreated {
    config: bool,
    ei_dir: bool,
}

#[derive(serde::Serialize)]
struct InitUpdated {
    gitignore: bool,
}

pub fn run(root: Option<PathBuf>, json: bool, quiet: bool) -> Result<()> {
    let root = match root {
        Some(path) => path,
        None => std::env::current_dir()?,
    };

    let storage = Storage::new(root.clone());
    let created_ei_dir = !storage.is_initialized();
    storage.init()?;

    let config_path = storage.config_file();
    let created_config = if config_path.exists() {
        false
    } else {
        Config::default().save(&config_path)?;
        true
    };

    let updated_gitignore = ensure_gitignore(&root)?;

    let report = InitReport {
        root: root.clone(),
        created: InitCreated {
            config: created_config,
            ei_dir: created_ei_dir,
        },
        updated: InitUpdated {
            gitignore: updated_gitignore,
        },
    };

    let mut created_items = Vec::new();
    if created_config {
        created_items.push(".ei.toml");
    }
    if created_ei_dir {
        created_items.push(".ei/");
    }

    let header = if created_items.is_empty() && !updated_gitignore {
        "ei init: nothing to do".to_string()
    } else {
        "ei init: initialized workspace".to_string()
    };

    let mut human = HumanOutput::new(header);
    human.push_summary("root", root.display().to_string());
    human.push_summary(
        "created",
        if created_items.is_empty() {
            "none".to_string()
        } else {
            created_items.join(", ")
        },
    );
    if updated_gitignore {
        human.push_summary("updated", ".gitignore".to_string());
    }
    human.push_next_step("ei agent set <name>");
    human.push_next_step("ei submit <file> --op update --hunks-file <hunks.json>");

    emit_success(OutputOptions { json, quiet }, "init", &report, Some(&human))?;
    Ok(())
}
