//! Loading the declared configuration
//!
//! The config lives in `config.toml` or `config.json` inside the config
//! directory, or at an explicit `--config` path. Both formats deserialize
//! straight into [`reconcile::Config`].

use anyhow::{Context, Result};
use reconcile::{Config, SourceType, Transport};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::paths;

/// Base name of the config file inside the config directory
const CONFIG_STEM: &str = "config";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    pub const ALL: [Self; 2] = [Self::Toml, Self::Json];

    pub fn extension(self) -> &'static str {
        match self {
            Self::Toml => "toml",
            Self::Json => "json",
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no config.toml or config.json in {}", .0.display())]
    NotFound(PathBuf),

    #[error("unsupported config format: {} (expected .toml or .json)", .0.display())]
    UnknownFormat(PathBuf),

    #[error("invalid config:\n  - {}", .0.join("\n  - "))]
    Invalid(Vec<String>),
}

/// A parsed config and where it came from
#[derive(Debug)]
pub struct LoadedConfig {
    pub path: PathBuf,
    pub format: ConfigFormat,
    pub config: Config,
}

/// Find the config file, preferring an explicit path
pub fn locate(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(paths::expand(&path.to_string_lossy()));
    }

    let dir = paths::config_dir()?;
    let found = ConfigFormat::ALL
        .iter()
        .map(|format| dir.join(format!("{CONFIG_STEM}.{}", format.extension())))
        .find(|candidate| candidate.is_file());

    match found {
        Some(path) => Ok(path),
        None => Err(ConfigError::NotFound(dir).into()),
    }
}

/// Locate, parse, expand and validate the config
pub fn load(explicit: Option<&Path>) -> Result<LoadedConfig> {
    let path = locate(explicit)?;
    let format = ConfigFormat::from_path(&path)
        .ok_or_else(|| ConfigError::UnknownFormat(path.clone()))?;

    log::info!("Loading config from {}", path.display());
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Could not read config file: {}", path.display()))?;

    let config = parse(&content, format)
        .with_context(|| format!("Invalid config file: {}", path.display()))?;
    let config = expand(config)?;
    validate(&config)?;

    Ok(LoadedConfig {
        path,
        format,
        config,
    })
}

pub fn parse(content: &str, format: ConfigFormat) -> Result<Config> {
    match format {
        ConfigFormat::Toml => toml::from_str(content).context("Invalid TOML"),
        ConfigFormat::Json => serde_json::from_str(content).context("Invalid JSON"),
    }
}

/// Expand `~` in directory sources and `$VAR` in MCP env and header values
///
/// Keeps secrets out of the config file; a referenced variable that is not
/// set is an error rather than an empty credential.
pub fn expand(mut config: Config) -> Result<Config> {
    for source in &mut config.sources {
        if source.source_type == SourceType::Directory
            && let Some(path) = &source.path
        {
            source.path = Some(paths::expand(path).to_string_lossy().into_owned());
        }
    }

    for (name, server) in &mut config.mcp_servers {
        for (key, value) in server.env.iter_mut().chain(server.headers.iter_mut()) {
            let expanded = shellexpand::env(value.as_str())
                .with_context(|| format!("MCP server '{name}': cannot expand value of {key}"))?;
            *value = expanded.into_owned();
        }
    }

    Ok(config)
}

/// Collect every problem in the config instead of stopping at the first
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    let mut problems = Vec::new();

    let mut sources = HashSet::new();
    for source in &config.sources {
        if source.name.trim().is_empty() {
            problems.push("source with an empty name".to_string());
            continue;
        }
        if !sources.insert(source.name.as_str()) {
            problems.push(format!("source '{}' is declared twice", source.name));
        }
        if let Err(e) = source.resolved() {
            problems.push(e.to_string());
        }
    }

    let mut plugins = HashSet::new();
    for plugin in &config.plugins {
        if plugin.name.trim().is_empty() {
            problems.push("plugin with an empty name".to_string());
            continue;
        }
        if !plugins.insert(plugin.name.as_str()) {
            problems.push(format!("plugin '{}' is declared twice", plugin.name));
        }
        if let Some(alias) = plugin.source_alias()
            && config.find_source(alias).is_none()
        {
            log::debug!(
                "plugin '{}' refers to source '{alias}' which is not declared here",
                plugin.name
            );
        }
    }

    for (name, server) in &config.mcp_servers {
        match server.transport {
            Transport::Stdio if server.command.as_deref().is_none_or(str::is_empty) => {
                problems.push(format!("MCP server '{name}' has no command"));
            }
            Transport::Http | Transport::Sse if server.url.as_deref().is_none_or(str::is_empty) => {
                problems.push(format!(
                    "MCP server '{name}' uses {} but has no url",
                    server.transport
                ));
            }
            _ => {}
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Invalid(problems))
    }
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;
    use reconcile::Scope;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
[[sources]]
name = "tools"
type = "github"
repo = "acme/tools"

[[sources]]
name = "local"
type = "directory"
path = "~/dev/plugins"

[[plugins]]
name = "lint@tools"

[[plugins]]
name = "draft@local"
enabled = false
scope = "project"

[mcp_servers.filesystem]
command = "npx"
args = ["-y", "@mcp/filesystem"]

[mcp_servers.search]
type = "http"
url = "https://search.example.com/mcp"
headers = { Authorization = "Bearer ${PLUGSYNC_TEST_SEARCH_TOKEN}" }
"#;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_toml() {
        // SAFETY: variable is unique to this test
        unsafe { std::env::set_var("PLUGSYNC_TEST_SEARCH_TOKEN", "s3cret") };
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "config.toml", SAMPLE);

        let loaded = load(Some(&path)).unwrap();
        assert_eq!(loaded.format, ConfigFormat::Toml);

        let config = loaded.config;
        assert_eq!(config.sources.len(), 2);
        let home = dirs::home_dir().unwrap();
        assert_eq!(
            config.sources[1].path.as_deref(),
            Some(home.join("dev/plugins").to_string_lossy().as_ref())
        );
        assert_eq!(config.plugins[1].scope, Some(Scope::Project));
        assert!(!config.plugins[1].desired_enabled());

        let search = &config.mcp_servers["search"];
        assert_eq!(search.transport, Transport::Http);
        assert_eq!(search.headers["Authorization"], "Bearer s3cret");
    }

    #[test]
    fn test_load_json_with_camel_case_servers() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "config.json",
            r#"{
                "plugins": [{"name": "lint@tools"}],
                "mcpServers": {"fs": {"command": "npx", "args": ["fs"]}}
            }"#,
        );

        let loaded = load(Some(&path)).unwrap();
        assert_eq!(loaded.format, ConfigFormat::Json);
        assert_eq!(loaded.config.mcp_servers["fs"].args, vec!["fs"]);
    }

    #[test]
    fn test_unknown_extension() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "config.yaml", "plugins: []");
        let err = load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }

    #[test]
    fn test_unset_variable_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "config.toml",
            r#"
[mcp_servers.api]
command = "api-server"
env = { API_KEY = "$PLUGSYNC_TEST_DEFINITELY_UNSET" }
"#,
        );
        let err = load(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("API_KEY"));
    }

    #[test]
    fn test_validate_collects_all_problems() {
        let config = parse(
            r#"
[[sources]]
name = "tools"
type = "git"

[[plugins]]
name = "a"

[[plugins]]
name = "a"

[mcp_servers.remote]
type = "sse"
"#,
            ConfigFormat::Toml,
        )
        .unwrap();

        match validate(&config) {
            Err(ConfigError::Invalid(problems)) => {
                assert_eq!(problems.len(), 3, "{problems:?}");
                assert!(problems.iter().any(|p| p.contains("declared twice")));
                assert!(problems.iter().any(|p| p.contains("no url")));
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
    }
}
