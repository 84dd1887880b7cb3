use std::env;
use std::fs;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Interpreter tunables, loaded the way the engine loads its other config
/// blocks: JSON on disk, environment override, defaults that just work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmConfig {
    /// Hard cap on instructions per interpretation call. A tripped cap is a
    /// script error, not a frozen game.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Log every executed instruction at trace level.
    #[serde(default)]
    pub trace_execution: bool,
}

fn default_max_steps() -> usize {
    100_000
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            trace_execution: false,
        }
    }
}

impl VmConfig {
    /// Load from the JSON file named by `ZEPHYR_CONFIG`. Unset, unreadable,
    /// or malformed all fall back to defaults with a logged warning.
    pub fn load() -> Self {
        let Ok(path) = env::var("ZEPHYR_CONFIG") else {
            return Self::default();
        };
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => config,
                Err(err) => {
                    warn!(%path, "malformed config, using defaults: {err}");
                    Self::default()
                }
            },
            Err(err) => {
                warn!(%path, "cannot read config, using defaults: {err}");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: VmConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.max_steps, 100_000);
        assert!(!config.trace_execution);
    }

    #[test]
    fn fields_override_individually() {
        let config: VmConfig =
            serde_json::from_str(r#"{"max_steps": 64, "trace_execution": true}"#).unwrap();
        assert_eq!(config.max_steps, 64);
        assert!(config.trace_execution);
    }
}
