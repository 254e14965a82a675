//! Error types for session room operations.

/// Error type for session room operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A session with this identifier already exists in the room.
    #[error("Session already exists: {0}")]
    AlreadyExists(String),

    /// No session with this identifier exists in the room.
    #[error("Session not found: {0}")]
    NotFound(String),

    /// The session exists but holds no value for the key.
    #[error("Key '{key}' not found in session {id}")]
    KeyNotFound { id: String, key: String },

    /// The room has been closed and no longer accepts operations.
    #[error("Room is closed")]
    Closed,

    /// The room configuration was rejected.
    #[error("Invalid room config: {0}")]
    InvalidConfig(String),

    /// Failed to parse a TOML room configuration.
    #[error("Failed to parse room config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Result type for session room operations.
pub type Result<T> = std::result::Result<T, Error>;
