//! Configuration loading and management
//!
//! Handles parsing of `.ei.toml` configuration files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Agent identity configuration
    #[serde(default)]
    pub agent: AgentConfig,

    /// Reasoning engine configuration
    #[serde(default)]
    pub engine: EngineConfig,

    /// Merge behavior configuration
    #[serde(default)]
    pub merge: MergeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            agent: AgentConfig::default(),
            engine: EngineConfig::default(),
            merge: MergeConfig::default(),
        }
    }
}

/// Agent-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Default agent name when none specified
    #[serde(default = "default_agent")]
    pub default: String,
}

fn default_agent() -> String {
    "unknown".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            default: default_agent(),
        }
    }
}

/// Reasoning engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Whether arbitration through the engine is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Base URL of an OpenAI-compatible endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model identifier passed through to the endpoint
    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the bearer token (optional for local
    /// endpoints)
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Per-call timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Response token budget per call
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Decoding temperature; merges should be consistent, not creative
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Bounded concurrency for in-flight arbitration calls
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_true() -> bool {
    true
}

fn default_endpoint() -> String {
    "http://localhost:11434/v1".to_string()
}

fn default_model() -> String {
    "qwen2.5-coder:14b".to_string()
}

fn default_api_key_env() -> String {
    "EI_ENGINE_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f64 {
    0.1
}

fn default_concurrency() -> usize {
    4
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            concurrency: default_concurrency(),
        }
    }
}

/// Merge behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Truncate consumed edit log entries after `ei merge --apply`
    #[serde(default = "default_true")]
    pub consume_on_apply: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            consume_on_apply: true,
        }
    }
}

impl Config {
    /// Load configuration from a `.ei.toml` file
    pub fn load(path: &PathBuf) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the workspace root, or return defaults
    pub fn load_from_root(root: &PathBuf) -> Self {
        let config_path = root.join(".ei.toml");
        if config_path.exists() {
            Self::load(&config_path).unwrap_or_default()
        } else {
            Self::default()
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &PathBuf) -> crate::error::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> crate::error::Result<()> {
        self.engine.validate()?;
        Ok(())
    }
}

impl EngineConfig {
    fn validate(&self) -> crate::error::Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(crate::error::Error::InvalidConfig(
                "engine.endpoint cannot be empty".to_string(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(crate::error::Error::InvalidConfig(
                "engine.model cannot be empty".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(crate::error::Error::InvalidConfig(
                "engine.timeout_secs must be > 0".to_string(),
            ));
        }
        if self.max_tokens == 0 {
            return Err(crate::error::Error::InvalidConfig(
                "engine.max_tokens must be > 0".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(crate::error::Error::InvalidConfig(
                "engine.concurrency must be > 0".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(crate::error::Error::InvalidConfig(
                "engine.temperature must be within 0.0..=2.0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_are_expected() {
        let cfg = Config::default();
        assert_eq!(cfg.agent.default, "unknown");
        assert!(cfg.engine.enabled);
        assert_eq!(cfg.engine.endpoint, "http://localhost:11434/v1");
        assert_eq!(cfg.engine.timeout_secs, 60);
        assert_eq!(cfg.engine.max_tokens, 4096);
        assert_eq!(cfg.engine.concurrency, 4);
        assert!(cfg.engine.temperature < 0.2);
        assert!(cfg.merge.consume_on_apply);
    }

    #[test]
    fn load_parses_overrides() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".ei.toml");
        let content = r#"
[agent]
default = "reviewer"

[engine]
endpoint = "https://api.example.com/v1"
model = "merge-arbiter-large"
timeout_secs = 120
max_tokens = 8192
temperature = 0.0
concurrency = 2

[merge]
consume_on_apply = false
"#;
        fs::write(&path, content.trim()).expect("write config");

        let cfg = Config::load(&path).expect("load config");
        assert_eq!(cfg.agent.default, "reviewer");
        assert_eq!(cfg.engine.endpoint, "https://api.example.com/v1");
        assert_eq!(cfg.engine.model, "merge-arbiter-large");
        assert_eq!(cfg.engine.timeout_secs, 120);
        assert_eq!(cfg.engine.max_tokens, 8192);
        assert_eq!(cfg.engine.concurrency, 2);
        assert!(!cfg.merge.consume_on_apply);
    }

    #[test]
    fn zero_concurrency_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".ei.toml");
        fs::write(&path, "[engine]\nconcurrency = 0\n").expect("write config");

        let err = Config::load(&path).expect_err("invalid config");
        match err {
            crate::error::Error::InvalidConfig(_) => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_model_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".ei.toml");
        fs::write(&path, "[engine]\nmodel = \"  \"\n").expect("write config");
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn load_from_root_defaults_when_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = Config::load_from_root(&dir.path().to_path_buf());
        assert_eq!(cfg.agent.default, "unknown");
    }

    #[test]
    fn save_writes_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.toml");
        let cfg = Config::default();
        cfg.save(&path).expect("save config");

        let written = fs::read_to_string(&path).expect("read config");
        assert!(written.contains("[engine]"));
        assert!(written.contains("concurrency = 4"));
    }
}
