//! `swarm config`: configuration management commands.

use std::path::Path;

use openswarm_config::{
    ConfigError, Resolver, SwarmConfig, default_config_path, find_config_file, get_profile,
};

fn resolver(config: Option<&Path>) -> Resolver {
    match config {
        Some(path) => Resolver::new().explicit_path(path),
        None => Resolver::new(),
    }
}

pub async fn init(config: Option<&Path>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let target = config
        .map(Path::to_path_buf)
        .unwrap_or_else(default_config_path);

    if tokio::fs::try_exists(&target).await? && !force {
        return Err(format!(
            "{} already exists (use --force to overwrite)",
            target.display()
        )
        .into());
    }
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&target, SwarmConfig::template_json()).await?;

    println!("✅ Wrote {}", target.display());
    println!("   Set OPENAI_API_KEY, then run `swarm config validate`.");
    Ok(())
}

pub async fn validate(
    config: Option<&Path>,
    blueprint: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    let mut resolver = resolver(config);
    if let Some(name) = blueprint {
        resolver = resolver.blueprint(name);
    }

    let resolved = match resolver.resolve() {
        Ok(resolved) => resolved,
        Err(e) => {
            println!("   ❌ {e}");
            return Err(e.into());
        }
    };
    println!("   ✅ {} parsed", resolved.path().display());

    let document = resolved.document();
    let mut warnings = Vec::new();
    for (name, profile) in &document.llm {
        if !profile.has_api_key() {
            warnings.push(format!("LLM profile '{name}' has no API key after substitution"));
        }
        if profile.model.is_none() {
            warnings.push(format!("LLM profile '{name}' does not name a model"));
        }
    }
    for (name, server) in &document.mcp_servers {
        if server.command.trim().is_empty() {
            warnings.push(format!("MCP server '{name}' has an empty command"));
        }
    }
    if resolved.max_context_tokens() == 0 || resolved.max_context_messages() == 0 {
        warnings.push("A zero context budget drops every non-system message".to_string());
    }

    if warnings.is_empty() {
        println!("   ✅ All checks passed");
    } else {
        println!();
        for w in &warnings {
            println!("   ⚠️  {w}");
        }
    }

    println!();
    println!("   Profile:     {}", resolved.active_profile());
    println!("   Profiles:    {}", document.profile_names().join(", "));
    println!("   MCP servers: {}", document.mcp_servers.len());
    println!("   Blueprints:  {}", document.blueprints.len());
    println!(
        "   Context:     {} tokens / {} messages ({})",
        resolved.max_context_tokens(),
        resolved.max_context_messages(),
        resolved.truncation_mode()
    );
    Ok(())
}

pub async fn show(
    config: Option<&Path>,
    blueprint: Option<&str>,
    profile: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut resolver = resolver(config);
    if let Some(name) = blueprint {
        resolver = resolver.blueprint(name);
    }
    if let Some(name) = profile {
        resolver = resolver.profile(name);
    }
    let resolved = resolver
        .resolve()
        .map_err(|e| format!("Failed to load config: {e}"))?;
    println!("{}", serde_json::to_string_pretty(resolved.settings())?);
    Ok(())
}

pub async fn path(config: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let cwd = std::env::current_dir()?;
    match find_config_file(config, &cwd, &default_config_path()) {
        Ok(found) => println!("{}", found.display()),
        Err(e @ ConfigError::NotFound { .. }) => {
            println!("{}", default_config_path().display());
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

pub async fn profile(config: Option<&Path>, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let resolved = resolver(config).profile(name).resolve()?;
    let mut profile = get_profile(&resolved, name)?.clone();
    if profile.has_api_key() {
        profile.api_key = Some("[REDACTED]".into());
    }
    println!("{}", serde_json::to_string_pretty(&profile)?);
    Ok(())
}
