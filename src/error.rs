use thiserror::Error;

use crate::core::LogStatementId;

/// Main error type for Pathweaver operations
#[derive(Error, Debug)]
pub enum PathweaverError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Call graph error: {0}")]
    Graph(String),

    #[error("Unknown statement id '{statement}' at observation {sequence_index}")]
    UnknownStatementId {
        statement: LogStatementId,
        sequence_index: u64,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, PathweaverError>;
