//! Agent identity management.
//!
//! Resolution order:
//! 1) CLI --agent (explicit)
//! 2) EI_AGENT environment variable
//! 3) Persisted value in .ei/agent
//! 4) Config default (agent.default) or "unknown"

use std::path::Path;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::storage::Storage;

/// Resolve the current agent using CLI, environment, persisted value, and
/// config.
pub fn resolve_agent(root: Option<&Path>, cli_agent: Option<&str>) -> Result<String> {
    if let Some(agent) = non_empty(cli_agent) {
        return Ok(agent.to_string());
    }

    if let Ok(env_agent) = std::env::var("EI_AGENT") {
        if let Some(agent) = non_empty(Some(env_agent.as_str())) {
            return Ok(agent.to_string());
        }
    }

    if let Some(root) = root {
        let storage = Storage::new(root.to_path_buf());
        if let Some(agent) = storage.read_agent() {
            return Ok(agent);
        }

        let config = Config::load_from_root(&root.to_path_buf());
        return Ok(config.agent.default);
    }

    Ok("unknown".to_string())
}

/// Persist the agent identity in `.ei/agent`.
pub fn persist_agent(root: &Path, agent: &str) -> Result<()> {
    let agent = non_empty(Some(agent))
        .ok_or_else(|| Error::InvalidArgument("agent name cannot be empty".to_string()))?;

    let storage = Storage::new(root.to_path_buf());
    storage.write_agent(agent)
}

fn non_empty(input: Option<&str>) -> Option<&str> {
    input.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn cli_value_wins() {
        let agent = resolve_agent(None, Some("cli-agent")).unwrap();
        assert_eq!(agent, "cli-agent");
    }

    #[test]
    fn blank_cli_value_is_ignored() {
        let agent = resolve_agent(None, Some("   ")).unwrap();
        assert_eq!(agent, "unknown");
    }

    #[test]
    fn persisted_value_is_used() {
        let temp = TempDir::new().unwrap();
        persist_agent(temp.path(), "stored-agent").unwrap();

        let agent = resolve_agent(Some(temp.path()), None).unwrap();
        assert_eq!(agent, "stored-agent");
    }

    #[test]
    fn persist_rejects_empty() {
        let temp = TempDir::new().unwrap();
        assert!(persist_agent(temp.path(), "  ").is_err());
    }

    #[test]
    fn falls_back_to_config_default() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(".ei.toml"), "[agent]\ndefault = \"bot\"\n").unwrap();

        let agent = resolve_agent(Some(temp.path()), None).unwrap();
        assert_eq!(agent, "bot");
    }
}
