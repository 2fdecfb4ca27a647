use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{PathweaverError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconstructionConfig {
    /// Number of candidate paths returned per session
    pub top_k: usize,

    /// Session splitting settings
    pub splitter: SplitterConfig,

    /// Traversal cost weights
    pub cost: CostConfig,

    /// Search budget limits
    pub search: SearchBudget,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitterConfig {
    /// Idle gap between same-thread events that forces a session split
    /// (milliseconds)
    pub idle_gap_ms: i64,

    /// Statement ids that mark a process/request boundary; a boundary
    /// event starts a new session and belongs to it
    pub boundary_statements: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostConfig {
    /// Penalty for traversing a statement-bearing node without consuming
    /// an observed event
    pub skip_cost: u64,

    /// Penalty per loop iteration beyond what the evidence requires
    pub loop_penalty: u64,

    /// Safety bound on inferred consecutive iterations of one node
    pub max_loop_repeats: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchBudget {
    /// Maximum number of search states explored per alignment
    pub max_states: usize,

    /// Optional ceiling on accumulated walk cost
    pub max_cost: Option<u64>,

    /// Optional wall-clock deadline per alignment (milliseconds)
    pub wall_clock_ms: Option<u64>,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            splitter: SplitterConfig {
                idle_gap_ms: 30_000,
                boundary_statements: Vec::new(),
            },
            cost: CostConfig {
                skip_cost: 10,
                loop_penalty: 25,
                max_loop_repeats: 1024,
            },
            search: SearchBudget {
                max_states: 1_000_000,
                max_cost: None,
                wall_clock_ms: Some(10_000),
            },
        }
    }
}

impl ReconstructionConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ReconstructionConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| PathweaverError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration with fallback to default
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => {
                if p.as_ref().exists() {
                    Self::load(p)
                } else {
                    Ok(Self::default())
                }
            }
            None => {
                // Try common config file locations
                let candidates = [
                    "Pathweaver.toml",
                    "pathweaver.toml",
                    ".pathweaver.toml",
                ];

                for candidate in &candidates {
                    if Path::new(candidate).exists() {
                        return Self::load(candidate);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    /// Check option combinations that would make reconstruction meaningless
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(PathweaverError::Config(
                "top_k must be at least 1".to_string(),
            ));
        }
        if self.cost.max_loop_repeats == 0 {
            return Err(PathweaverError::Config(
                "max_loop_repeats must be at least 1".to_string(),
            ));
        }
        if self.search.max_states == 0 {
            return Err(PathweaverError::Config(
                "search.max_states must be at least 1".to_string(),
            ));
        }
        if self.splitter.idle_gap_ms <= 0 {
            return Err(PathweaverError::Config(
                "splitter.idle_gap_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ReconstructionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.top_k, 3);
    }

    #[test]
    fn test_zero_top_k_rejected() {
        let mut config = ReconstructionConfig::default();
        config.top_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = ReconstructionConfig::default();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pathweaver.toml");
        config.save(&path).unwrap();

        let loaded = ReconstructionConfig::load(&path).unwrap();
        assert_eq!(loaded.cost.skip_cost, config.cost.skip_cost);
        assert_eq!(loaded.search.max_states, config.search.max_states);
        assert_eq!(loaded.splitter.idle_gap_ms, config.splitter.idle_gap_ms);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let loaded =
            ReconstructionConfig::load_or_default(Some("/nonexistent/pathweaver.toml")).unwrap();
        assert_eq!(loaded.top_k, ReconstructionConfig::default().top_k);
    }
}
