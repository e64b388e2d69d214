use crate::types::IntegrationId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, KnowledgeError>;

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Integration not found: {0}")]
    IntegrationNotFound(IntegrationId),

    #[error("Source error: {0}")]
    Source(String),

    #[error("No tokio runtime available to run the cache janitor")]
    NoRuntime,
}
