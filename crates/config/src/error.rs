//! Configuration errors.
//!
//! Every variant renders as a single actionable line: what is missing or
//! broken, where, and what to do next.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "No swarm_config.json found (searched: {}). {hint}",
        display_paths(.searched)
    )]
    NotFound { searched: Vec<PathBuf>, hint: String },

    #[error("Failed to read config file at {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    Validation(String),

    #[error(
        "LLM profile '{requested}' not found (available: {}). Add it under \"llm\" in swarm_config.json or pick an available profile",
        display_names(.available)
    )]
    ProfileNotFound {
        requested: String,
        available: Vec<String>,
    },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn display_names(names: &[String]) -> String {
    if names.is_empty() {
        "none".into()
    } else {
        names.join(", ")
    }
}

impl From<ConfigError> for openswarm_core::Error {
    fn from(e: ConfigError) -> Self {
        Self::Config {
            message: e.to_string(),
        }
    }
}
