//! Engine configuration, loadable from RON.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_HISTORY_LIMIT: usize = 50;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of snapshots kept for undo/redo.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Whether a run may revert to an earlier decision.
    #[serde(default = "default_true")]
    pub allow_backtracking: bool,
    /// Whether a run enters the next module as soon as one is exhausted.
    #[serde(default = "default_true")]
    pub auto_advance_module: bool,
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            allow_backtracking: true,
            auto_advance_module: true,
        }
    }
}

impl EngineConfig {
    pub fn load_from_ron(path: &Path) -> Result<EngineConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<EngineConfig, ConfigError> {
        Ok(ron::from_str(input)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let cfg = EngineConfig::parse_ron("(history_limit: 10)").unwrap();
        assert_eq!(cfg.history_limit, 10);
        assert!(cfg.allow_backtracking);
        assert!(cfg.auto_advance_module);
    }

    #[test]
    fn empty_struct_is_default() {
        let cfg = EngineConfig::parse_ron("()").unwrap();
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn unknown_syntax_is_an_error() {
        assert!(EngineConfig::parse_ron("(history_limit: \"many\")").is_err());
    }

    #[test]
    fn load_fixture() {
        let path = std::path::PathBuf::from("tests/fixtures/engine.ron");
        let cfg = EngineConfig::load_from_ron(&path).unwrap();
        assert_eq!(cfg.history_limit, 25);
        assert!(!cfg.allow_backtracking);
    }
}
