//! `swarm context`: conversation history tooling.

use std::path::{Path, PathBuf};

use openswarm_config::Resolver;
use openswarm_context::{
    ContextError, ContextLimits, HeuristicCounter, MODE_ENV_VAR, TruncationMode, messages_tokens,
    truncate_value,
};
use openswarm_core::Message;
use tracing::{info, warn};

pub struct TruncateArgs {
    pub file: PathBuf,
    pub max_tokens: Option<usize>,
    pub max_messages: Option<usize>,
    pub mode: Option<String>,
    pub model: String,
}

/// Budgets from the resolved config, or the built-in defaults when there is
/// no usable config.
fn configured(resolver: Resolver) -> (ContextLimits, TruncationMode) {
    match resolver.resolve() {
        Ok(resolved) => (resolved.context_limits(), resolved.truncation_mode()),
        Err(e) => {
            warn!("Using built-in context budgets: {e}");
            (ContextLimits::default(), TruncationMode::default())
        }
    }
}

/// Pick the budgets and mode for one run.
///
/// Flags win, then `SWARM_TRUNCATION_MODE` (mode only), then whatever
/// `configured` yields. `configured` is only called when something is
/// still unset. An invalid `--mode` is an error; an invalid env value is
/// logged and ignored.
fn select_budget(
    args: &TruncateArgs,
    env_mode: Option<&str>,
    configured: impl FnOnce() -> (ContextLimits, TruncationMode),
) -> Result<(ContextLimits, TruncationMode), ContextError> {
    let mode = match (args.mode.as_deref(), env_mode) {
        (Some(raw), _) => Some(raw.parse::<TruncationMode>()?),
        (None, Some(raw)) => match raw.parse::<TruncationMode>() {
            Ok(mode) => Some(mode),
            Err(e) => {
                warn!("Ignoring {MODE_ENV_VAR}: {e}");
                None
            }
        },
        (None, None) => None,
    };

    if let (Some(max_tokens), Some(max_messages), Some(mode)) =
        (args.max_tokens, args.max_messages, mode)
    {
        return Ok((ContextLimits::new(max_tokens, max_messages), mode));
    }

    let (defaults, configured_mode) = configured();
    Ok((
        ContextLimits::new(
            args.max_tokens.unwrap_or(defaults.max_tokens),
            args.max_messages.unwrap_or(defaults.max_messages),
        ),
        mode.unwrap_or(configured_mode),
    ))
}

async fn run_truncate(
    resolver: Resolver,
    args: &TruncateArgs,
    env_mode: Option<&str>,
) -> Result<Vec<Message>, Box<dyn std::error::Error>> {
    let (limits, mode) = select_budget(args, env_mode, || configured(resolver))?;

    let raw = tokio::fs::read_to_string(&args.file)
        .await
        .map_err(|e| format!("Failed to read {}: {e}", args.file.display()))?;
    let history: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|e| format!("{} is not valid JSON: {e}", args.file.display()))?;
    let total = history.as_array().map_or(0, Vec::len);

    let kept = truncate_value(
        &history,
        &HeuristicCounter,
        &args.model,
        limits.max_tokens,
        limits.max_messages,
        mode,
    );
    info!(
        "Kept {} of {total} messages ({} tokens, budget {}/{}, mode {mode})",
        kept.len(),
        messages_tokens(&HeuristicCounter, &kept, &args.model),
        limits.max_tokens,
        limits.max_messages
    );
    Ok(kept)
}

pub async fn truncate(
    config: Option<&Path>,
    args: TruncateArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let resolver = match config {
        Some(path) => Resolver::new().explicit_path(path),
        None => Resolver::new(),
    };
    let env_mode = std::env::var(MODE_ENV_VAR).ok();
    let kept = run_truncate(resolver, &args, env_mode.as_deref()).await?;
    println!("{}", serde_json::to_string_pretty(&kept)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use openswarm_core::Role;
    use serde_json::json;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn args(file: PathBuf) -> TruncateArgs {
        TruncateArgs {
            file,
            max_tokens: None,
            max_messages: None,
            mode: None,
            model: "gpt-4o".into(),
        }
    }

    fn from_config() -> (ContextLimits, TruncationMode) {
        (ContextLimits::new(300, 7), TruncationMode::Simple)
    }

    /// A resolver confined to `dir`, with an empty environment.
    fn resolver_in(dir: &Path) -> Resolver {
        Resolver::new()
            .cwd(dir)
            .default_path(dir.join("app").join("swarm_config.json"))
            .env(HashMap::new())
    }

    fn write_history(dir: &Path) -> PathBuf {
        let path = dir.join("history.json");
        let history = json!([
            {"role": "system", "content": "sys"},
            {"role": "user", "content": "Hi"},
            {"role": "assistant", "content": null,
             "tool_calls": [{"id": "T1", "type": "function",
                             "function": {"name": "f", "arguments": "{}"}}]},
            {"role": "tool", "tool_call_id": "T1", "content": "R"},
            {"role": "user", "content": "Bye"}
        ]);
        std::fs::write(&path, history.to_string()).unwrap();
        path
    }

    #[test]
    fn flags_win_and_skip_config() {
        let mut a = args(PathBuf::from("h.json"));
        a.max_tokens = Some(10);
        a.max_messages = Some(2);
        a.mode = Some("pairs".into());
        let picked = select_budget(&a, Some("simple"), || panic!("config consulted")).unwrap();
        assert_eq!(picked, (ContextLimits::new(10, 2), TruncationMode::Pairs));
    }

    #[test]
    fn env_mode_beats_config() {
        let a = args(PathBuf::from("h.json"));
        let picked = select_budget(&a, Some("pairs"), from_config).unwrap();
        assert_eq!(picked, (ContextLimits::new(300, 7), TruncationMode::Pairs));
    }

    #[test]
    fn config_fills_what_flags_leave_unset() {
        let mut a = args(PathBuf::from("h.json"));
        a.max_messages = Some(3);
        let picked = select_budget(&a, None, from_config).unwrap();
        assert_eq!(picked, (ContextLimits::new(300, 3), TruncationMode::Simple));
    }

    #[test]
    fn invalid_env_mode_is_ignored() {
        let a = args(PathBuf::from("h.json"));
        let picked = select_budget(&a, Some("fifo"), from_config).unwrap();
        assert_eq!(picked.1, TruncationMode::Simple);
    }

    #[test]
    fn invalid_mode_flag_is_an_error() {
        let mut a = args(PathBuf::from("h.json"));
        a.mode = Some("fifo".into());
        let err = select_budget(&a, None, from_config).unwrap_err();
        assert!(matches!(err, ContextError::UnknownMode(_)));
    }

    #[test]
    fn missing_config_falls_back_to_builtin_budgets() {
        let tmp = TempDir::new().unwrap();
        let picked = configured(resolver_in(tmp.path()));
        assert_eq!(picked, (ContextLimits::default(), TruncationMode::Pairs));
    }

    #[test]
    fn config_file_budgets_are_used() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("swarm_config.json"),
            json!({
                "llm": {"default": {}},
                "settings": {"max_context_tokens": 120, "max_context_messages": 4, "truncation_mode": "simple"}
            })
            .to_string(),
        )
        .unwrap();
        let picked = configured(resolver_in(tmp.path()));
        assert_eq!(picked, (ContextLimits::new(120, 4), TruncationMode::Simple));
    }

    #[tokio::test]
    async fn truncates_history_file_with_flag_budgets() {
        let tmp = TempDir::new().unwrap();
        let mut a = args(write_history(tmp.path()));
        a.max_tokens = Some(1000);
        a.max_messages = Some(3);
        a.mode = Some("pairs".into());

        let kept = run_truncate(resolver_in(tmp.path()), &a, None).await.unwrap();
        assert_eq!(kept, vec![Message::system("sys"), Message::user("Bye")]);
    }

    #[tokio::test]
    async fn truncates_with_builtin_budgets_when_no_config() {
        let tmp = TempDir::new().unwrap();
        let a = args(write_history(tmp.path()));
        let kept = run_truncate(resolver_in(tmp.path()), &a, None).await.unwrap();
        assert_eq!(kept.len(), 5);
        assert_eq!(kept[3].role, Role::Tool);
    }

    #[tokio::test]
    async fn unreadable_or_invalid_history_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let missing = args(tmp.path().join("nope.json"));
        assert!(run_truncate(resolver_in(tmp.path()), &missing, None).await.is_err());

        let garbage = tmp.path().join("garbage.json");
        std::fs::write(&garbage, "not json").unwrap();
        let a = args(garbage);
        assert!(run_truncate(resolver_in(tmp.path()), &a, None).await.is_err());
    }
}
