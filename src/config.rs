use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::ai::AiTimings;
use crate::constants::{
    CHASE_TIME_SECS, GHOST_BASE_SPEED, PATH_TTL_MS, PLAYER_BASE_SPEED, POWER_DURATION_MS,
    SCATTER_TIME_SECS, STARTING_LIVES,
};
use crate::pathfinding::SearchAlgorithm;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct TuningConfig {
    pub chase_time_secs: f32,
    pub scatter_time_secs: f32,
    pub path_ttl_ms: u64,
    pub ghost_speed: f32,
    pub player_speed: f32,
    pub power_duration_ms: u64,
    pub lives: i32,
    pub algorithm: SearchAlgorithm,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            chase_time_secs: CHASE_TIME_SECS,
            scatter_time_secs: SCATTER_TIME_SECS,
            path_ttl_ms: PATH_TTL_MS,
            ghost_speed: GHOST_BASE_SPEED,
            player_speed: PLAYER_BASE_SPEED,
            power_duration_ms: POWER_DURATION_MS,
            lives: STARTING_LIVES,
            algorithm: SearchAlgorithm::default(),
        }
    }
}

impl TuningConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn ai_timings(&self) -> AiTimings {
        AiTimings {
            chase_secs: self.chase_time_secs,
            scatter_secs: self.scatter_time_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config = TuningConfig::from_json(r#"{"chaseTimeSecs": 5.0, "algorithm": "bfs"}"#)
            .expect("valid json");
        assert_eq!(config.chase_time_secs, 5.0);
        assert_eq!(config.algorithm, SearchAlgorithm::BreadthFirst);
        assert_eq!(config.scatter_time_secs, SCATTER_TIME_SECS);
        assert_eq!(config.path_ttl_ms, PATH_TTL_MS);
        assert_eq!(config.lives, STARTING_LIVES);
    }

    #[test]
    fn algorithm_accepts_the_same_names_as_the_cli() {
        for name in ["bfs", "astar", "a*"] {
            let config = TuningConfig::from_json(&format!(r#"{{"algorithm": "{name}"}}"#))
                .expect("valid json");
            assert_eq!(Some(config.algorithm), SearchAlgorithm::parse(name));
        }
        assert!(TuningConfig::from_json(r#"{"algorithm": "dijkstra"}"#).is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(TuningConfig::from_json(r#"{"chaseTime": 5.0}"#).is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let target = std::env::temp_dir()
            .join("pacman-ghost-ai-missing-dir")
            .join("tuning.json");
        assert!(matches!(
            TuningConfig::load(&target),
            Err(ConfigError::Io { .. })
        ));
    }
}
