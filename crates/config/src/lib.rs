//! Configuration discovery, substitution and profile resolution for Open Swarm.
//!
//! Blueprints read one `swarm_config.json`. This crate finds it, expands
//! `${VAR}` references from the environment, merges the layered settings and
//! checks that every referenced LLM profile exists before anything runs.
//!
//! ```no_run
//! use openswarm_config::{Resolver, get_profile};
//!
//! let config = Resolver::new().blueprint("echocraft").resolve()?;
//! let profile = get_profile(&config, config.active_profile())?;
//! println!("model: {:?}", profile.model);
//! # Ok::<(), openswarm_config::ConfigError>(())
//! ```

mod cache;
mod discovery;
mod env;
mod error;
mod merge;
mod resolve;
mod schema;

pub use cache::ProfileCache;
pub use discovery::{CONFIG_FILE_NAME, INIT_HINT, default_config_path, find_config_file};
pub use env::{EnvSource, ProcessEnv, substitute_env_vars, substitute_env_vars_with, substitute_str};
pub use error::ConfigError;
pub use merge::merge_values;
pub use resolve::{
    DEFAULT_PROFILE, Resolver, ResolvedConfig, get_profile, load_config_file, parse_config, resolve,
};
pub use schema::{LlmProfile, McpServerConfig, SwarmConfig};
