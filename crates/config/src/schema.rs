//! Typed configuration document.
//!
//! Maps directly to `swarm_config.json`. Keys this crate does not interpret
//! are kept in `extra` maps so nothing is lost on the way through.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// The root configuration structure.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwarmConfig {
    /// LLM connection profiles by name
    pub llm: BTreeMap<String, LlmProfile>,

    /// MCP server launch specs by name (substituted, never launched here)
    #[serde(default, rename = "mcpServers")]
    pub mcp_servers: BTreeMap<String, McpServerConfig>,

    /// Per-blueprint setting overrides
    #[serde(default)]
    pub blueprints: BTreeMap<String, Map<String, Value>>,

    /// Per-profile setting overrides
    #[serde(default)]
    pub profiles: BTreeMap<String, Map<String, Value>>,

    /// Top-level settings (lowest file precedence)
    #[serde(default)]
    pub settings: Map<String, Value>,

    /// Defaults shared by every blueprint
    #[serde(default)]
    pub defaults: Map<String, Value>,

    /// Unrecognized top-level keys
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SwarmConfig {
    /// Sorted profile names, as listed in error messages.
    pub fn profile_names(&self) -> Vec<String> {
        self.llm.keys().cloned().collect()
    }

    /// A starter document for `swarm config init`.
    pub fn template() -> Self {
        let mut llm = BTreeMap::new();
        llm.insert(
            "default".to_string(),
            LlmProfile {
                provider: Some("openai".into()),
                model: Some("gpt-4o".into()),
                api_key: Some("${OPENAI_API_KEY}".into()),
                base_url: Some("${OPENAI_BASE_URL:-https://api.openai.com/v1}".into()),
                extra: Map::new(),
            },
        );

        let mut defaults = Map::new();
        defaults.insert("llm_profile".into(), "default".into());
        defaults.insert(
            "max_context_tokens".into(),
            openswarm_context::DEFAULT_MAX_TOKENS.into(),
        );
        defaults.insert(
            "max_context_messages".into(),
            openswarm_context::DEFAULT_MAX_MESSAGES.into(),
        );

        Self {
            llm,
            defaults,
            ..Self::default()
        }
    }

    /// Pretty JSON for [`SwarmConfig::template`].
    pub fn template_json() -> String {
        serde_json::to_string_pretty(&Self::template()).unwrap_or_default()
    }
}

impl AsRef<SwarmConfig> for SwarmConfig {
    fn as_ref(&self) -> &SwarmConfig {
        self
    }
}

/// A named LLM connection configuration.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Provider-specific settings (temperature, headers, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LlmProfile {
    /// True when an API key is present and non-empty after substitution.
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

/// Launch spec for an MCP server process.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub command: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,

    /// Startup timeout in seconds
    #[serde(default, alias = "timeout", skip_serializing_if = "Option::is_none")]
    pub startup_timeout: Option<f64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for SwarmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwarmConfig")
            .field("llm", &self.llm)
            .field("mcp_servers", &self.mcp_servers)
            .field("blueprints", &self.blueprints.keys().collect::<Vec<_>>())
            .field("profiles", &self.profiles.keys().collect::<Vec<_>>())
            .field("settings", &self.settings)
            .field("defaults", &self.defaults)
            .finish()
    }
}

impl std::fmt::Debug for LlmProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmProfile")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("extra", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl std::fmt::Debug for McpServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // env values routinely carry tokens
        f.debug_struct("McpServerConfig")
            .field("command", &self.command)
            .field("args", &self.args)
            .field("env", &self.env.keys().collect::<Vec<_>>())
            .field("cwd", &self.cwd)
            .field("startup_timeout", &self.startup_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_document() {
        let json = r#"{
            "llm": {
                "default": {"provider": "openai", "model": "gpt-4o", "api_key": "sk-x", "temperature": 0.2},
                "fast": {"model": "gpt-4o-mini"}
            },
            "mcpServers": {
                "filesystem": {
                    "command": "npx",
                    "args": ["-y", "@modelcontextprotocol/server-filesystem"],
                    "env": {"ROOT": "/tmp"},
                    "startup_timeout": 30
                }
            },
            "blueprints": {"echocraft": {"llm_profile": "fast"}},
            "defaults": {"max_context_tokens": 4000},
            "theme": "dark"
        }"#;
        let config: SwarmConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.profile_names(), vec!["default", "fast"]);
        assert_eq!(config.llm["default"].extra["temperature"], 0.2);
        assert_eq!(config.mcp_servers["filesystem"].args.len(), 2);
        assert_eq!(config.mcp_servers["filesystem"].startup_timeout, Some(30.0));
        assert_eq!(config.blueprints["echocraft"]["llm_profile"], "fast");
        assert_eq!(config.extra["theme"], "dark");
        assert!(config.profiles.is_empty());
    }

    #[test]
    fn mcp_startup_timeout_is_typed() {
        let server: McpServerConfig =
            serde_json::from_str(r#"{"command": "uvx", "startup_timeout": 12.5}"#).unwrap();
        assert_eq!(server.startup_timeout, Some(12.5));
        assert!(server.extra.is_empty());

        let out = serde_json::to_value(&server).unwrap();
        assert_eq!(out["startup_timeout"], 12.5);
    }

    #[test]
    fn llm_section_is_required() {
        let result: Result<SwarmConfig, _> = serde_json::from_str(r#"{"defaults": {}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn debug_redacts_secrets() {
        let profile = LlmProfile {
            api_key: Some("sk-very-secret".into()),
            ..LlmProfile::default()
        };
        let server = McpServerConfig {
            command: "mcp".into(),
            env: BTreeMap::from([("TOKEN".to_string(), "ghp_secret".to_string())]),
            ..McpServerConfig::default()
        };
        let debug = format!("{profile:?} {server:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("sk-very-secret"));
        assert!(!debug.contains("ghp_secret"));
        assert!(debug.contains("TOKEN"));
    }

    #[test]
    fn template_roundtrips() {
        let json = SwarmConfig::template_json();
        let parsed: SwarmConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, SwarmConfig::template());
        assert!(json.contains("${OPENAI_API_KEY}"));
    }

    #[test]
    fn api_key_presence() {
        let mut profile = LlmProfile::default();
        assert!(!profile.has_api_key());
        profile.api_key = Some(String::new());
        assert!(!profile.has_api_key());
        profile.api_key = Some("sk-1".into());
        assert!(profile.has_api_key());
    }
}
