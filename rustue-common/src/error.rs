//! Error types for rustue

use thiserror::Error;

/// Error types for the rustue library.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Identity module (USIM) errors.
    #[error("Identity error: {0}")]
    Identity(String),

    /// Network or file I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Lifecycle/state machine errors.
    #[error("State error: {0}")]
    State(String),

    /// YAML parsing errors.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),
}
