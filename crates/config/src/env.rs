//! Environment-variable substitution over parsed JSON values.
//!
//! Supported references inside string values:
//! - `${NAME}`
//! - `${NAME:-default}`: `default` when `NAME` is unset or empty
//! - `$NAME`, where `NAME` matches `[A-Za-z_][A-Za-z0-9_]*`
//!
//! Unset variables without a default become the empty string. A `$` that
//! does not start a valid reference, and an unterminated `${`, are kept as
//! written. Object keys and non-string values are never touched.

use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

/// Where variable values come from.
pub trait EnvSource: Send + Sync {
    fn var(&self, name: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Substitute variables from the process environment.
pub fn substitute_env_vars(value: Value) -> Value {
    substitute_env_vars_with(value, &ProcessEnv)
}

/// Substitute variables from `env`, recursing through objects and arrays.
pub fn substitute_env_vars_with(value: Value, env: &dyn EnvSource) -> Value {
    match value {
        Value::String(s) => Value::String(substitute_str(&s, env)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|v| substitute_env_vars_with(v, env))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, substitute_env_vars_with(v, env)))
                .collect(),
        ),
        other => other,
    }
}

/// Substitute variable references in a single string.
pub fn substitute_str(input: &str, env: &dyn EnvSource) -> String {
    if !input.contains('$') {
        return input.to_string();
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(braced) = after.strip_prefix('{') {
            if let Some(end) = closing_brace(braced) {
                if let Some(value) = expand_braced(&braced[..end], env) {
                    out.push_str(&value);
                    rest = &braced[end + 1..];
                    continue;
                }
            }
            out.push('$');
            rest = after;
            continue;
        }

        let len = identifier_len(after);
        if len > 0 {
            out.push_str(&lookup(&after[..len], None, env));
            rest = &after[len..];
        } else {
            out.push('$');
            rest = after;
        }
    }
    out.push_str(rest);
    out
}

/// Expand the inside of `${...}`. `None` means it is not a valid reference.
fn expand_braced(body: &str, env: &dyn EnvSource) -> Option<String> {
    let (name, default) = match body.split_once(":-") {
        Some((name, default)) => (name, Some(default)),
        None => (body, None),
    };
    if name.is_empty() || identifier_len(name) != name.len() {
        return None;
    }
    // The default word is itself expanded, as in POSIX `${NAME:-word}`.
    let default = default.map(|word| substitute_str(word, env));
    Some(lookup(name, default.as_deref(), env))
}

/// Byte offset of the `}` closing a `${`, skipping nested `${...}`.
fn closing_brace(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut prev = '\0';
    for (i, c) in s.char_indices() {
        match c {
            '{' if prev == '$' => depth += 1,
            '}' if depth == 0 => return Some(i),
            '}' => depth -= 1,
            _ => {}
        }
        prev = c;
    }
    None
}

fn lookup(name: &str, default: Option<&str>, env: &dyn EnvSource) -> String {
    match (env.var(name), default) {
        (Some(value), Some(default)) if value.is_empty() => default.to_string(),
        (Some(value), _) => value,
        (None, Some(default)) => default.to_string(),
        (None, None) => {
            warn!("Environment variable {name} is not set, substituting an empty string");
            String::new()
        }
    }
}

/// Length in bytes of the identifier at the start of `s` (0 if none).
fn identifier_len(s: &str) -> usize {
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return 0,
    }
    chars
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        .map_or(s.len(), |(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn braced_and_bare_references() {
        let env = env(&[("TEST_VAR", "test_value")]);
        assert_eq!(substitute_str("prefix_${TEST_VAR}_suffix", &env), "prefix_test_value_suffix");
        assert_eq!(substitute_str("prefix_$TEST_VAR", &env), "prefix_test_value");
        assert_eq!(substitute_str("hello $TEST_VAR world", &env), "hello test_value world");
    }

    #[test]
    fn missing_variable_becomes_empty() {
        let env = env(&[]);
        assert_eq!(substitute_str("prefix_${NONEXISTENT_VAR}_suffix", &env), "prefix__suffix");
        assert_eq!(substitute_str("$NONEXISTENT_VAR", &env), "");
    }

    #[test]
    fn shell_style_defaults() {
        let env = env(&[("SET", "yes"), ("EMPTY", "")]);
        assert_eq!(substitute_str("${UNSET:-fallback}", &env), "fallback");
        assert_eq!(substitute_str("${SET:-fallback}", &env), "yes");
        assert_eq!(substitute_str("${EMPTY:-fallback}", &env), "fallback");
        assert_eq!(substitute_str("${UNSET:-}", &env), "");
        assert_eq!(
            substitute_str("${BASE:-https://api.openai.com/v1}", &env),
            "https://api.openai.com/v1"
        );
    }

    #[test]
    fn default_words_are_expanded() {
        let env = env(&[("B", "bee"), ("HOST", "example.org")]);
        assert_eq!(substitute_str("${A:-$B}", &env), "bee");
        assert_eq!(substitute_str("${A:-${B}}", &env), "bee");
        assert_eq!(
            substitute_str("${URL:-https://${HOST}/v1}", &env),
            "https://example.org/v1"
        );
        assert_eq!(substitute_str("${A:-${C:-nested}}-x", &env), "nested-x");

        let once = substitute_str("${A:-$B}", &env);
        assert_eq!(substitute_str(&once, &env), once);
    }

    #[test]
    fn non_references_are_literal() {
        let env = env(&[("A", "x")]);
        assert_eq!(substitute_str("costs $5", &env), "costs $5");
        assert_eq!(substitute_str("trailing $", &env), "trailing $");
        assert_eq!(substitute_str("${unterminated", &env), "${unterminated");
        assert_eq!(substitute_str("${}", &env), "${}");
        assert_eq!(substitute_str("${1BAD}", &env), "${1BAD}");
        assert_eq!(substitute_str("$$A", &env), "$x");
    }

    #[test]
    fn identifier_boundaries() {
        let env = env(&[("HOME_DIR", "/home/me"), ("HOME", "/root")]);
        assert_eq!(substitute_str("$HOME_DIR/bin", &env), "/home/me/bin");
        assert_eq!(substitute_str("$HOME-dir", &env), "/root-dir");
        assert_eq!(substitute_str("${HOME}_DIR", &env), "/root_DIR");
    }

    #[test]
    fn unicode_around_references() {
        let env = env(&[("NAME", "wörld")]);
        assert_eq!(substitute_str("héllo $NAME ✓", &env), "héllo wörld ✓");
    }

    #[test]
    fn recurses_through_values() {
        let env = env(&[("KEY", "sk-test123"), ("PORT", "8080")]);
        let value = json!({
            "llm": {"default": {"api_key": "${KEY}", "retries": 3}},
            "args": ["--port", "$PORT", true, null],
            "$KEY": "keys are untouched"
        });
        let out = substitute_env_vars_with(value, &env);
        assert_eq!(out["llm"]["default"]["api_key"], "sk-test123");
        assert_eq!(out["llm"]["default"]["retries"], 3);
        assert_eq!(out["args"], json!(["--port", "8080", true, null]));
        assert_eq!(out["$KEY"], "keys are untouched");
    }

    #[test]
    fn plain_data_is_a_fixed_point() {
        let env = env(&[("X", "1")]);
        let value = json!({"a": [1, 2.5, "text", {"b": null}], "c": false});
        let once = substitute_env_vars_with(value.clone(), &env);
        let twice = substitute_env_vars_with(once.clone(), &env);
        assert_eq!(once, value);
        assert_eq!(twice, once);
    }

    #[test]
    fn process_env_source() {
        // PATH is set in every test environment we run under.
        let path = std::env::var("PATH").unwrap_or_default();
        assert_eq!(substitute_env_vars(json!("${PATH}")), json!(path));
    }
}
