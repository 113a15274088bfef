//! Engine Configuration
//!
//! Maps the level names used by rules and groups onto problem levels, and
//! bounds the fixpoint loop. Loaded from JSON or YAML.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

use crate::problem::ProblemLevel;

fn default_info() -> i32 {
    10
}

fn default_warn() -> i32 {
    20
}

fn default_error() -> i32 {
    30
}

fn default_max_rounds() -> usize {
    100
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Level name to numeric severity.
    #[serde(rename = "level-map", alias = "level_map", default)]
    pub level_map: HashMap<String, i32>,
    #[serde(default = "default_info")]
    pub info: i32,
    #[serde(default = "default_warn")]
    pub warn: i32,
    #[serde(default = "default_error")]
    pub error: i32,
    /// Upper bound on fixpoint rounds.
    #[serde(rename = "max-rounds", alias = "max_rounds", default = "default_max_rounds")]
    pub max_rounds: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            level_map: HashMap::new(),
            info: default_info(),
            warn: default_warn(),
            error: default_error(),
            max_rounds: default_max_rounds(),
        }
    }
}

impl EngineConfig {
    pub fn with_level(mut self, name: impl Into<String>, severity: i32) -> Self {
        self.level_map.insert(name.into(), severity);
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Problem level for a named rule level. Unknown names are errors.
    pub fn level(&self, name: &str) -> ProblemLevel {
        let Some(&severity) = self.level_map.get(name) else {
            return ProblemLevel::Error;
        };
        if severity < self.info {
            ProblemLevel::Quiet
        } else if severity < self.warn {
            ProblemLevel::Info
        } else if severity < self.error {
            ProblemLevel::Warn
        } else {
            ProblemLevel::Error
        }
    }

    /// Loads a `.json`, `.yaml` or `.yml` file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        let config: EngineConfig = match ext.as_deref() {
            Some("json") => serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse JSON config {}", path.display()))?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&raw)
                .with_context(|| format!("Failed to parse YAML config {}", path.display()))?,
            other => {
                warn!(extension = ?other, "unrecognized config extension, trying YAML");
                serde_yaml::from_str(&raw)
                    .with_context(|| format!("Failed to parse config {}", path.display()))?
            }
        };

        debug!(levels = config.level_map.len(), max_rounds = config.max_rounds, "loaded engine config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config() -> EngineConfig {
        EngineConfig::default()
            .with_level("trace", 0)
            .with_level("note", 10)
            .with_level("should", 20)
            .with_level("must", 30)
            .with_level("never", 99)
    }

    #[test]
    fn test_level_thresholds() {
        let c = config();
        assert_eq!(c.level("trace"), ProblemLevel::Quiet);
        assert_eq!(c.level("note"), ProblemLevel::Info);
        assert_eq!(c.level("should"), ProblemLevel::Warn);
        // Reaching the error threshold is an error.
        assert_eq!(c.level("must"), ProblemLevel::Error);
        assert_eq!(c.level("never"), ProblemLevel::Error);
        assert_eq!(c.level("undefined"), ProblemLevel::Error);
    }

    #[tokio::test]
    async fn test_load_yaml() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "level-map:\n  low: 1\n  mid: 15\ninfo: 5\nwarn: 20\nerror: 40\nmax-rounds: 7").unwrap();

        let c = EngineConfig::load(file.path()).await.unwrap();
        assert_eq!(c.max_rounds, 7);
        assert_eq!(c.level("low"), ProblemLevel::Quiet);
        assert_eq!(c.level("mid"), ProblemLevel::Info);
    }

    #[tokio::test]
    async fn test_load_json_defaults() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"level-map": {{"x": 25}}}}"#).unwrap();

        let c = EngineConfig::load(file.path()).await.unwrap();
        assert_eq!(c.max_rounds, 100);
        assert_eq!(c.level("x"), ProblemLevel::Warn);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let err = EngineConfig::load("/nonexistent/engine.yaml").await.unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
