//! Layered configuration resolution.
//!
//! Turns one discovered `swarm_config.json` plus caller overrides into a
//! [`ResolvedConfig`]. Settings are merged lowest to highest:
//!
//! | Layer | Source |
//! |-------|--------|
//! | 1 | built-in defaults |
//! | 2 | top-level `settings` |
//! | 3 | `defaults` |
//! | 4 | `profiles.<active profile>` |
//! | 5 | `blueprints.<blueprint>` |
//! | 6 | CLI overrides (env-substituted) |
//!
//! Environment variables are substituted into the whole document before it
//! is typed, so `llm.*.api_key = "${OPENAI_API_KEY}"` arrives resolved.

use std::path::{Path, PathBuf};

use openswarm_context::{
    ContextLimits, DEFAULT_MAX_MESSAGES, DEFAULT_MAX_TOKENS, TruncationMode,
};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::discovery::{default_config_path, find_config_file};
use crate::env::{EnvSource, ProcessEnv, substitute_env_vars_with};
use crate::error::ConfigError;
use crate::merge::merge_values;
use crate::schema::{LlmProfile, SwarmConfig};

/// Profile used when nothing selects one.
pub const DEFAULT_PROFILE: &str = "default";

const PROFILE_KEY: &str = "llm_profile";
const MAX_TOKENS_KEY: &str = "max_context_tokens";
const MAX_MESSAGES_KEY: &str = "max_context_messages";
const MODE_KEY: &str = "truncation_mode";

/// Optional top-level sections; each must be an object when present.
const OBJECT_SECTIONS: &[&str] = &["mcpServers", "blueprints", "profiles", "settings", "defaults"];

/// Resolve configuration with the process environment.
///
/// `default_path` overrides the default application config location and
/// `explicit_path` takes precedence over discovery.
pub fn resolve(
    default_path: Option<&Path>,
    explicit_path: Option<&Path>,
    profile_override: Option<&str>,
    cli_overrides: &Map<String, Value>,
) -> Result<ResolvedConfig, ConfigError> {
    let mut resolver = Resolver::new().cli_overrides(cli_overrides.clone());
    if let Some(path) = default_path {
        resolver = resolver.default_path(path);
    }
    if let Some(path) = explicit_path {
        resolver = resolver.explicit_path(path);
    }
    if let Some(profile) = profile_override {
        resolver = resolver.profile(profile);
    }
    resolver.resolve()
}

/// Look up a profile by name.
pub fn get_profile<'a, C>(config: &'a C, name: &str) -> Result<&'a LlmProfile, ConfigError>
where
    C: AsRef<SwarmConfig> + ?Sized,
{
    let config = config.as_ref();
    config
        .llm
        .get(name)
        .ok_or_else(|| ConfigError::ProfileNotFound {
            requested: name.to_string(),
            available: config.profile_names(),
        })
}

/// Read, check, substitute and type one config file.
pub fn load_config_file(path: &Path, env: &dyn EnvSource) -> Result<SwarmConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    parse_config(&content, path, env)
}

/// Parse config text; `path` is only used in error messages.
pub fn parse_config(content: &str, path: &Path, env: &dyn EnvSource) -> Result<SwarmConfig, ConfigError> {
    let raw: Value = serde_json::from_str(content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    check_structure(&raw)?;

    let substituted = substitute_env_vars_with(raw, env);
    serde_json::from_value(substituted).map_err(|e| {
        ConfigError::Validation(format!("{}: {e}", path.display()))
    })
}

fn check_structure(raw: &Value) -> Result<(), ConfigError> {
    let Some(root) = raw.as_object() else {
        return Err(ConfigError::Validation(format!(
            "config root must be a JSON object, found {}",
            kind(raw)
        )));
    };

    let llm = root.get("llm").ok_or_else(|| {
        ConfigError::Validation("missing required \"llm\" section (profile name → settings)".into())
    })?;
    let Some(profiles) = llm.as_object() else {
        return Err(ConfigError::Validation(format!(
            "\"llm\" must be an object of profiles, found {}",
            kind(llm)
        )));
    };
    for (name, profile) in profiles {
        if !profile.is_object() {
            return Err(ConfigError::Validation(format!(
                "llm profile '{name}' must be an object, found {}",
                kind(profile)
            )));
        }
    }

    for section in OBJECT_SECTIONS {
        if let Some(value) = root.get(*section).filter(|v| !v.is_object()) {
            return Err(ConfigError::Validation(format!(
                "\"{section}\" must be an object, found {}",
                kind(value)
            )));
        }
    }
    Ok(())
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn builtin_defaults() -> Map<String, Value> {
    let mut defaults = Map::new();
    defaults.insert(PROFILE_KEY.into(), DEFAULT_PROFILE.into());
    defaults.insert(MAX_TOKENS_KEY.into(), DEFAULT_MAX_TOKENS.into());
    defaults.insert(MAX_MESSAGES_KEY.into(), DEFAULT_MAX_MESSAGES.into());
    defaults.insert(MODE_KEY.into(), TruncationMode::default().as_str().into());
    defaults
}

fn profile_setting(settings: &Map<String, Value>) -> Option<&str> {
    settings.get(PROFILE_KEY).and_then(Value::as_str)
}

/// Builder for a configuration resolution.
pub struct Resolver {
    default_path: Option<PathBuf>,
    explicit_path: Option<PathBuf>,
    cwd: Option<PathBuf>,
    profile: Option<String>,
    blueprint: Option<String>,
    cli_overrides: Map<String, Value>,
    env: Box<dyn EnvSource>,
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            default_path: None,
            explicit_path: None,
            cwd: None,
            profile: None,
            blueprint: None,
            cli_overrides: Map::new(),
            env: Box::new(ProcessEnv),
        }
    }

    /// Replace the default application config path.
    pub fn default_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.default_path = Some(path.into());
        self
    }

    /// Load this file instead of searching, if it exists.
    pub fn explicit_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit_path = Some(path.into());
        self
    }

    /// Start the upward search here instead of the process working directory.
    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Force the active LLM profile.
    pub fn profile(mut self, name: impl Into<String>) -> Self {
        self.profile = Some(name.into());
        self
    }

    /// Apply `blueprints.<name>` overrides.
    pub fn blueprint(mut self, name: impl Into<String>) -> Self {
        self.blueprint = Some(name.into());
        self
    }

    /// Highest-precedence settings.
    pub fn cli_overrides(mut self, overrides: Map<String, Value>) -> Self {
        self.cli_overrides = overrides;
        self
    }

    /// Read variables from `env` instead of the process environment.
    pub fn env(mut self, env: impl EnvSource + 'static) -> Self {
        self.env = Box::new(env);
        self
    }

    pub fn resolve(self) -> Result<ResolvedConfig, ConfigError> {
        let cwd = match self.cwd.clone() {
            Some(dir) => dir,
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        };
        let default_path = self.default_path.clone().unwrap_or_else(default_config_path);
        let path = find_config_file(self.explicit_path.as_deref(), &cwd, &default_path)?;
        let document = load_config_file(&path, self.env.as_ref())?;
        self.resolve_document(document, path)
    }

    /// Resolve an already-loaded document.
    pub fn resolve_document(
        self,
        document: SwarmConfig,
        path: PathBuf,
    ) -> Result<ResolvedConfig, ConfigError> {
        let overrides = match substitute_env_vars_with(Value::Object(self.cli_overrides), self.env.as_ref()) {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        let blueprint_settings = match self.blueprint.as_deref() {
            Some(name) => {
                let found = document.blueprints.get(name);
                if found.is_none() {
                    debug!("No blueprint overrides for '{name}' in {}", path.display());
                }
                found
            }
            None => None,
        };

        let active_profile = self
            .profile
            .clone()
            .or_else(|| profile_setting(&overrides).map(str::to_string))
            .or_else(|| blueprint_settings.and_then(profile_setting).map(str::to_string))
            .or_else(|| profile_setting(&document.defaults).map(str::to_string))
            .or_else(|| profile_setting(&document.settings).map(str::to_string))
            .unwrap_or_else(|| DEFAULT_PROFILE.to_string());

        // Every profile named anywhere in play must exist.
        get_profile(&document, &active_profile)?;
        let referenced = [
            profile_setting(&document.settings),
            profile_setting(&document.defaults),
            document
                .profiles
                .get(&active_profile)
                .and_then(profile_setting),
            blueprint_settings.and_then(profile_setting),
            profile_setting(&overrides),
        ];
        for name in referenced.into_iter().flatten() {
            get_profile(&document, name)?;
        }

        let mut merged = Value::Object(builtin_defaults());
        let layers = [
            Some(&document.settings),
            Some(&document.defaults),
            document.profiles.get(&active_profile),
            blueprint_settings,
            Some(&overrides),
        ];
        for layer in layers.into_iter().flatten() {
            merge_values(&mut merged, &Value::Object(layer.clone()));
        }
        let mut settings = match merged {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        settings.insert(PROFILE_KEY.into(), active_profile.clone().into());

        info!(
            "Resolved config from {} (profile={active_profile}, blueprint={})",
            path.display(),
            self.blueprint.as_deref().unwrap_or("-")
        );

        Ok(ResolvedConfig {
            document,
            path,
            settings,
            active_profile,
            blueprint: self.blueprint,
        })
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

/// The outcome of a resolution: the typed document plus flat settings.
///
/// Treat as read-only and share it; to pick up file changes, resolve again
/// and swap the stored value.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    document: SwarmConfig,
    path: PathBuf,
    settings: Map<String, Value>,
    active_profile: String,
    blueprint: Option<String>,
}

impl ResolvedConfig {
    pub fn document(&self) -> &SwarmConfig {
        &self.document
    }

    /// The file the document was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Merged settings, `llm_profile` included.
    pub fn settings(&self) -> &Map<String, Value> {
        &self.settings
    }

    pub fn setting(&self, key: &str) -> Option<&Value> {
        self.settings.get(key)
    }

    pub fn active_profile(&self) -> &str {
        &self.active_profile
    }

    pub fn blueprint(&self) -> Option<&str> {
        self.blueprint.as_deref()
    }

    /// The active LLM profile.
    pub fn profile(&self) -> Result<&LlmProfile, ConfigError> {
        get_profile(&self.document, &self.active_profile)
    }

    /// Switch the active profile. Fails without changing anything if the
    /// name is unknown.
    pub fn set_active_profile(&mut self, name: &str) -> Result<(), ConfigError> {
        get_profile(&self.document, name)?;
        self.active_profile = name.to_string();
        self.settings.insert(PROFILE_KEY.into(), name.into());
        Ok(())
    }

    pub fn max_context_tokens(&self) -> usize {
        self.usize_setting(MAX_TOKENS_KEY, DEFAULT_MAX_TOKENS)
    }

    pub fn max_context_messages(&self) -> usize {
        self.usize_setting(MAX_MESSAGES_KEY, DEFAULT_MAX_MESSAGES)
    }

    /// Configured truncation mode; unknown values fall back to the default.
    pub fn truncation_mode(&self) -> TruncationMode {
        let Some(raw) = self.setting(MODE_KEY).and_then(Value::as_str) else {
            return TruncationMode::default();
        };
        raw.parse().unwrap_or_else(|e| {
            warn!("Ignoring {MODE_KEY} setting: {e}");
            TruncationMode::default()
        })
    }

    /// Budgets for the context truncator.
    pub fn context_limits(&self) -> ContextLimits {
        ContextLimits::new(self.max_context_tokens(), self.max_context_messages())
    }

    fn usize_setting(&self, key: &str, default: usize) -> usize {
        match self.setting(key) {
            None => default,
            Some(value) => match value.as_u64().and_then(|n| usize::try_from(n).ok()) {
                Some(n) => n,
                None => {
                    warn!("Setting {key} must be a non-negative integer, got {value}; using {default}");
                    default
                }
            },
        }
    }
}

impl AsRef<SwarmConfig> for ResolvedConfig {
    fn as_ref(&self) -> &SwarmConfig {
        &self.document
    }
}
