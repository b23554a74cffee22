//! Store configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ReferentialAction;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("history_capacity must be at least 1")]
    ZeroCapacity,
}

/// Referential actions given to FK columns the engine creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FkDefaults {
    #[serde(default)]
    pub on_delete: ReferentialAction,
    #[serde(default)]
    pub on_update: ReferentialAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Maximum number of snapshots kept for undo/redo.
    #[serde(default = "StoreConfig::default_history_capacity")]
    pub history_capacity: usize,

    #[serde(default)]
    pub fk_defaults: FkDefaults,
}

impl StoreConfig {
    pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

    fn default_history_capacity() -> usize {
        Self::DEFAULT_HISTORY_CAPACITY
    }

    pub fn from_json(input: &str) -> Result<Self, ConfigError> {
        let config: StoreConfig = serde_json::from_str(input)?;
        if config.history_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(config)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            history_capacity: Self::DEFAULT_HISTORY_CAPACITY,
            fk_defaults: FkDefaults::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = StoreConfig::from_json("{}").unwrap();
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.history_capacity, 50);
        assert_eq!(config.fk_defaults.on_delete, ReferentialAction::NoAction);
    }

    #[test]
    fn test_partial_config() {
        let config =
            StoreConfig::from_json(r#"{"history_capacity": 5, "fk_defaults": {"on_delete": "CASCADE"}}"#)
                .unwrap();
        assert_eq!(config.history_capacity, 5);
        assert_eq!(config.fk_defaults.on_delete, ReferentialAction::Cascade);
        assert_eq!(config.fk_defaults.on_update, ReferentialAction::NoAction);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            StoreConfig::from_json(r#"{"history_capacity": 0}"#),
            Err(ConfigError::ZeroCapacity)
        ));
        assert!(matches!(StoreConfig::from_json("not json"), Err(ConfigError::Parse(_))));
    }
}
