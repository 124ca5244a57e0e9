//! Error types for the SAN reliability model

use thiserror::Error;

/// Result alias for core operations
pub type Result<T> = std::result::Result<T, SanError>;

/// Core error type for model evaluation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SanError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Missing reliability for component {0}")]
    MissingComponent(String),

    #[error("Unknown mitigation scheme {0} (expected 1..=4)")]
    UnknownScheme(u8),

    #[error("Fault tree has {count} basic events, exact enumeration supports at most {max}")]
    TooManyComponents { count: usize, max: usize },

    #[error("Topology error: {0}")]
    Topology(String),
}

impl SanError {
    /// Create an invalid-input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a topology error
    pub fn topology(msg: impl Into<String>) -> Self {
        Self::Topology(msg.into())
    }
}
