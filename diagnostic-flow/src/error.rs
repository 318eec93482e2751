use thiserror::Error;

/// Errors surfaced by the recommendation and literature pipelines
#[derive(Error, Debug)]
pub enum FlowError {
    /// Caller supplied something we cannot work with. The message is client-facing.
    #[error("{0}")]
    Validation(String),

    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("Failed to parse model response: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),
}

pub type Result<T> = std::result::Result<T, FlowError>;
