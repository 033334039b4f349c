use thiserror::Error;

/// Errors surfaced by the session and theme core.
#[derive(Debug, Error)]
pub enum Error {
    /// A transition was requested from a state that forbids it.
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A store write or read failed. Never rolls back in-memory state.
    #[error("persistence failure: {0:#}")]
    Persistence(anyhow::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
