use thiserror::Error;

#[derive(Debug, Error)]
pub enum SlateError {
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("No active session: {0}")]
    NoSession(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Inflation failed: {0}")]
    Inflation(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Extension error: {0}")]
    Extension(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SlateError>;
