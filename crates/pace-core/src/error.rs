use thiserror::Error;

/// All errors produced by the live-pace notifier.
#[derive(Error, Debug)]
pub enum PaceError {
    /// A command referenced a player (or subscription) that is not tracked.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The paceman.gg API could not be reached or returned something unusable.
    #[error("Remote fetch failed: {0}")]
    RemoteFetch(String),

    /// A message could not be handed to the chat transport.
    #[error("Delivery to {destination} failed: {message}")]
    Delivery {
        destination: String,
        message: String,
    },

    /// The subscription document could not be loaded or saved.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PaceError {
    /// Shorthand for a [`PaceError::Delivery`] built from any displayable cause.
    pub fn delivery(destination: &str, cause: impl std::fmt::Display) -> Self {
        PaceError::Delivery {
            destination: destination.to_string(),
            message: cause.to_string(),
        }
    }
}

/// Convenience alias used throughout the livepace crates.
pub type Result<T> = std::result::Result<T, PaceError>;
