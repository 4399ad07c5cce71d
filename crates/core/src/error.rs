//! Error types for the Open Swarm domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Subsystem crates define
//! their own error enums and convert into [`Error`] at the application edge.

use thiserror::Error;

/// The top-level error type for Open Swarm operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_displays_message() {
        let err = Error::Config {
            message: "LLM profile 'fast' not found".into(),
        };
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("fast"));
    }

    #[test]
    fn serde_errors_convert() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = parse.into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
