//! Context error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ContextError {
    #[error("tokenizer failed for model {model}: {reason}")]
    Tokenizer { model: String, reason: String },

    #[error("unknown truncation mode '{0}' (expected 'simple' or 'pairs')")]
    UnknownMode(String),
}
