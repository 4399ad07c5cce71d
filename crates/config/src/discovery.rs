//! Config file discovery.
//!
//! Search order, first existing file wins:
//! 1. an explicitly given path
//! 2. `swarm_config.json` in the working directory or any ancestor
//! 3. the default application config path
//! 4. the working directory
//!
//! Discovery only checks for existence; it never reads or creates files.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::ConfigError;

/// Canonical config file name.
pub const CONFIG_FILE_NAME: &str = "swarm_config.json";

/// Remediation shown when no config file exists.
pub const INIT_HINT: &str =
    "Create one with `swarm config init`, or pass --config <path> to point at an existing file.";

/// `$XDG_CONFIG_HOME/swarm/swarm_config.json`, falling back to `~/.config`.
pub fn default_config_path() -> PathBuf {
    config_home().join("swarm").join(CONFIG_FILE_NAME)
}

fn config_home() -> PathBuf {
    match std::env::var("XDG_CONFIG_HOME") {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs_home().join(".config"),
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Locate the config file to load.
pub fn find_config_file(
    explicit: Option<&Path>,
    cwd: &Path,
    default_path: &Path,
) -> Result<PathBuf, ConfigError> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(path) = explicit {
        if !path.is_file() {
            warn!(
                "Config file {} does not exist, falling back to discovery",
                path.display()
            );
        }
        candidates.push(path.to_path_buf());
    }
    candidates.extend(cwd.ancestors().map(|dir| dir.join(CONFIG_FILE_NAME)));
    candidates.push(default_path.to_path_buf());
    candidates.push(cwd.join(CONFIG_FILE_NAME));

    let mut searched: Vec<PathBuf> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if searched.contains(&candidate) {
            continue;
        }
        if candidate.is_file() {
            debug!("Using config file {}", candidate.display());
            return Ok(candidate);
        }
        searched.push(candidate);
    }

    Err(ConfigError::NotFound {
        searched,
        hint: INIT_HINT.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(dir: &Path) -> PathBuf {
        let path = dir.join(CONFIG_FILE_NAME);
        fs::write(&path, r#"{"llm": {}}"#).unwrap();
        path
    }

    #[test]
    fn explicit_path_wins() {
        let tmp = TempDir::new().unwrap();
        let explicit = tmp.path().join("custom.json");
        fs::write(&explicit, "{}").unwrap();
        write_config(tmp.path());

        let found = find_config_file(Some(&explicit), tmp.path(), Path::new("/nonexistent/x.json")).unwrap();
        assert_eq!(found, explicit);
    }

    #[test]
    fn missing_explicit_path_falls_back_to_search() {
        let tmp = TempDir::new().unwrap();
        let expected = write_config(tmp.path());
        let found = find_config_file(
            Some(&tmp.path().join("missing.json")),
            tmp.path(),
            Path::new("/nonexistent/x.json"),
        )
        .unwrap();
        assert_eq!(found, expected);
    }

    #[test]
    fn walks_up_from_nested_directory() {
        let tmp = TempDir::new().unwrap();
        let expected = write_config(tmp.path());
        let nested = tmp.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        let found = find_config_file(None, &nested, Path::new("/nonexistent/x.json")).unwrap();
        assert_eq!(found, expected);
    }

    #[test]
    fn nearest_ancestor_wins() {
        let tmp = TempDir::new().unwrap();
        write_config(tmp.path());
        let inner = tmp.path().join("project");
        fs::create_dir_all(&inner).unwrap();
        let expected = write_config(&inner);

        let found = find_config_file(None, &inner, Path::new("/nonexistent/x.json")).unwrap();
        assert_eq!(found, expected);
    }

    #[test]
    fn default_path_used_when_tree_has_none() {
        let tree = TempDir::new().unwrap();
        let app = TempDir::new().unwrap();
        let default_path = write_config(app.path());

        let found = find_config_file(None, tree.path(), &default_path).unwrap();
        assert_eq!(found, default_path);
    }

    #[test]
    fn nothing_found_is_an_error_with_hint() {
        let tree = TempDir::new().unwrap();
        let default_path = tree.path().join("app").join(CONFIG_FILE_NAME);

        let err = find_config_file(None, tree.path(), &default_path).unwrap_err();
        match &err {
            ConfigError::NotFound { searched, hint } => {
                assert!(searched.contains(&default_path));
                assert!(searched.contains(&tree.path().join(CONFIG_FILE_NAME)));
                assert!(hint.contains("swarm config init"));
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn default_path_ends_with_canonical_name() {
        let path = default_config_path();
        assert!(path.ends_with(Path::new("swarm").join(CONFIG_FILE_NAME)));
    }
}
