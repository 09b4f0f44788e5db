//! Observed host state
//!
//! Either a JSON snapshot of [`reconcile::State`] (`--state`) or the host
//! program's own files, read leniently: a missing file means nothing of
//! that kind is installed, and a malformed entry is skipped with a warning.

use anyhow::{Context, Result, bail};
use reconcile::{McpServerState, PluginState, Scope, SourceState, SourceType, State};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths;

/// Locations of the host files that make up the observed state
#[derive(Debug, Clone)]
pub struct HostFiles {
    pub known_marketplaces: PathBuf,
    pub installed_plugins: PathBuf,
    pub settings: PathBuf,
    pub host_config: PathBuf,
    /// Project whose local and project-scoped MCP servers count as observed
    pub project_dir: PathBuf,
}

impl HostFiles {
    /// Host files at their default locations
    pub fn discover() -> Result<Self> {
        let project_dir =
            std::env::current_dir().context("Could not determine the current directory")?;
        Ok(Self::in_dir(
            &paths::host_dir()?,
            paths::host_settings_file()?,
            project_dir,
        ))
    }

    pub fn in_dir(host_dir: &Path, host_config: PathBuf, project_dir: PathBuf) -> Self {
        let plugins = host_dir.join("plugins");
        Self {
            known_marketplaces: plugins.join("known_marketplaces.json"),
            installed_plugins: plugins.join("installed_plugins.json"),
            settings: host_dir.join("settings.json"),
            host_config,
            project_dir,
        }
    }

    /// Shared project config holding project-scoped MCP servers
    pub fn project_mcp_config(&self) -> PathBuf {
        self.project_dir.join(".mcp.json")
    }
}

/// Load observed state from a snapshot when given, the host files otherwise
pub fn load(snapshot: Option<&Path>) -> Result<State> {
    match snapshot {
        Some(path) => load_snapshot(path),
        None => Ok(read_host_state(&HostFiles::discover()?)),
    }
}

pub fn load_snapshot(path: &Path) -> Result<State> {
    log::info!("Loading state snapshot from {}", path.display());
    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read state snapshot: {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Invalid state snapshot: {}", path.display()))?;
    if !value.is_object() {
        bail!(
            "Invalid state snapshot: {} (expected a JSON object)",
            path.display()
        );
    }
    serde_json::from_value(value)
        .with_context(|| format!("Invalid state snapshot: {}", path.display()))
}

pub fn read_host_state(files: &HostFiles) -> State {
    let state = State {
        sources: read_marketplaces(&files.known_marketplaces),
        plugins: read_plugins(&files.installed_plugins, &files.settings),
        mcp_servers: read_mcp_servers(files),
    };
    log::debug!(
        "observed {} sources, {} plugins, {} MCP servers",
        state.sources.len(),
        state.plugins.len(),
        state.mcp_servers.len()
    );
    state
}

/// Parse a JSON file, treating absence and corruption as "nothing there"
fn read_json<T: DeserializeOwned + Default>(path: &Path) -> T {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("{} not found", path.display());
            return T::default();
        }
        Err(e) => {
            log::warn!("Could not read {}: {e}", path.display());
            return T::default();
        }
    };

    serde_json::from_str(&content).unwrap_or_else(|e| {
        log::warn!("Ignoring malformed {}: {e}", path.display());
        T::default()
    })
}

fn entries<T: DeserializeOwned>(what: &str, map: BTreeMap<String, Value>) -> Vec<(String, T)> {
    map.into_iter()
        .filter_map(|(name, value)| match serde_json::from_value(value) {
            Ok(entry) => Some((name, entry)),
            Err(e) => {
                log::warn!("Skipping {what} '{name}': {e}");
                None
            }
        })
        .collect()
}

// ============================================================================
// Marketplaces
// ============================================================================

#[derive(Deserialize)]
struct MarketplaceEntry {
    source: MarketplaceSource,
}

#[derive(Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
enum MarketplaceSource {
    Github { repo: String },
    Git { url: String },
    Url { url: String },
    Directory { path: String },
}

impl From<MarketplaceSource> for SourceState {
    fn from(source: MarketplaceSource) -> Self {
        let (source_type, location) = match source {
            MarketplaceSource::Github { repo } => (SourceType::Github, repo),
            MarketplaceSource::Git { url } | MarketplaceSource::Url { url } => {
                (SourceType::Git, url)
            }
            MarketplaceSource::Directory { path } => (SourceType::Directory, path),
        };
        Self {
            source_type,
            location,
        }
    }
}

fn read_marketplaces(path: &Path) -> BTreeMap<String, SourceState> {
    let raw: BTreeMap<String, Value> = read_json(path);
    entries::<MarketplaceEntry>("marketplace", raw)
        .into_iter()
        .map(|(name, entry)| (name, entry.source.into()))
        .collect()
}

// ============================================================================
// Plugins
// ============================================================================

#[derive(Default, Deserialize)]
struct InstalledPlugins {
    #[serde(default)]
    plugins: BTreeMap<String, Value>,
}

/// One installation record; newer files hold a list per plugin
#[derive(Deserialize)]
#[serde(untagged)]
enum Installations {
    Many(Vec<Installation>),
    One(Installation),
}

#[derive(Deserialize)]
struct Installation {
    #[serde(default)]
    scope: Scope,
    #[serde(default)]
    version: Option<String>,
}

#[derive(Default, Deserialize)]
struct Settings {
    #[serde(default, rename = "enabledPlugins")]
    enabled_plugins: BTreeMap<String, bool>,
}

fn read_plugins(installed: &Path, settings: &Path) -> BTreeMap<String, PluginState> {
    let installed: InstalledPlugins = read_json(installed);
    let settings: Settings = read_json(settings);

    entries::<Installations>("plugin", installed.plugins)
        .into_iter()
        .filter_map(|(name, installations)| {
            let installation = match installations {
                Installations::One(one) => one,
                Installations::Many(many) => many.into_iter().next()?,
            };
            // Installed plugins are enabled unless settings say otherwise
            let enabled = settings.enabled_plugins.get(&name).copied().unwrap_or(true);
            Some((
                name,
                PluginState {
                    enabled,
                    scope: installation.scope,
                    version: installation.version,
                },
            ))
        })
        .collect()
}

// ============================================================================
// MCP servers
// ============================================================================

#[derive(Default, Deserialize)]
struct McpConfig {
    #[serde(default, rename = "mcpServers")]
    mcp_servers: BTreeMap<String, Value>,
}

#[derive(Default, Deserialize)]
struct HostConfig {
    #[serde(default, rename = "mcpServers")]
    mcp_servers: BTreeMap<String, Value>,
    /// Per-project settings keyed by absolute project path
    #[serde(default)]
    projects: BTreeMap<String, McpConfig>,
}

/// User, project and local servers merged; the narrower scope wins a name clash
fn read_mcp_servers(files: &HostFiles) -> BTreeMap<String, McpServerState> {
    let mut host: HostConfig = read_json(&files.host_config);
    let project: McpConfig = read_json(&files.project_mcp_config());
    let local = host
        .projects
        .remove(files.project_dir.to_string_lossy().as_ref())
        .unwrap_or_default();

    let mut servers = BTreeMap::new();
    for (scope, raw) in [
        (Scope::User, host.mcp_servers),
        (Scope::Project, project.mcp_servers),
        (Scope::Local, local.mcp_servers),
    ] {
        for (name, mut server) in entries::<McpServerState>("MCP server", raw) {
            server.scope = Some(scope);
            servers.insert(name, server);
        }
    }
    servers
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::Transport;
    use tempfile::TempDir;

    fn host(dir: &TempDir) -> HostFiles {
        HostFiles::in_dir(
            dir.path(),
            dir.path().join(".claude.json"),
            dir.path().join("project"),
        )
    }

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_missing_files_mean_empty_state() {
        let dir = TempDir::new().unwrap();
        assert_eq!(read_host_state(&host(&dir)), State::default());
    }

    #[test]
    fn test_reads_host_files() {
        let dir = TempDir::new().unwrap();
        let files = host(&dir);

        write(
            &files.known_marketplaces,
            r#"{
                "tools": {"source": {"source": "github", "repo": "acme/tools"}, "installLocation": "/x"},
                "local": {"source": {"source": "directory", "path": "/home/me/plugins"}},
                "weird": {"source": {"source": "carrier-pigeon"}}
            }"#,
        );
        write(
            &files.installed_plugins,
            r#"{
                "version": 2,
                "plugins": {
                    "lint@tools": [{"scope": "project", "version": "1.4.0", "installPath": "/x"}],
                    "draft@local": {"version": "0.1.0"}
                }
            }"#,
        );
        write(
            &files.settings,
            r#"{"enabledPlugins": {"draft@local": false}, "theme": "dark"}"#,
        );
        write(
            &files.host_config,
            r#"{
                "numStartups": 12,
                "mcpServers": {
                    "fs": {"type": "stdio", "command": "npx", "args": ["-y", "fs"], "env": {}},
                    "search": {"type": "http", "url": "https://search.example.com/mcp"}
                }
            }"#,
        );

        let state = read_host_state(&files);

        assert_eq!(state.sources.len(), 2);
        assert_eq!(state.sources["tools"].location, "acme/tools");
        assert_eq!(state.sources["local"].source_type, SourceType::Directory);

        let lint = &state.plugins["lint@tools"];
        assert!(lint.enabled);
        assert_eq!(lint.scope, Scope::Project);
        assert_eq!(lint.version.as_deref(), Some("1.4.0"));
        let draft = &state.plugins["draft@local"];
        assert!(!draft.enabled);
        assert_eq!(draft.scope, Scope::User);

        assert_eq!(state.mcp_servers["fs"].args, vec!["-y", "fs"]);
        assert_eq!(state.mcp_servers["fs"].scope, Some(Scope::User));
        assert_eq!(state.mcp_servers["search"].transport, Transport::Http);
    }

    #[test]
    fn test_reads_project_and_local_mcp_servers() {
        let dir = TempDir::new().unwrap();
        let files = host(&dir);
        let project_key = files.project_dir.to_string_lossy().into_owned();

        write(
            &files.host_config,
            &serde_json::json!({
                "mcpServers": {"fs": {"command": "npx"}},
                "projects": {
                    project_key: {
                        "mcpServers": {
                            "db": {"command": "db-mcp"},
                            "fs": {"command": "local-fs"}
                        }
                    },
                    "/some/other/project": {
                        "mcpServers": {"elsewhere": {"command": "x"}}
                    }
                }
            })
            .to_string(),
        );
        write(
            &files.project_mcp_config(),
            r#"{"mcpServers": {"search": {"type": "http", "url": "https://search.example.com/mcp"}}}"#,
        );

        let state = read_host_state(&files);
        let scopes: Vec<_> = state
            .mcp_servers
            .iter()
            .map(|(name, server)| (name.as_str(), server.scope))
            .collect();
        assert_eq!(
            scopes,
            vec![
                ("db", Some(Scope::Local)),
                ("fs", Some(Scope::Local)),
                ("search", Some(Scope::Project)),
            ]
        );
        assert_eq!(state.mcp_servers["fs"].command.as_deref(), Some("local-fs"));
    }

    #[test]
    fn test_malformed_file_is_ignored() {
        let dir = TempDir::new().unwrap();
        let files = host(&dir);
        write(&files.installed_plugins, "{ not json");
        write(&files.host_config, r#"{"mcpServers": {"ok": {"command": "x"}}}"#);

        let state = read_host_state(&files);
        assert!(state.plugins.is_empty());
        assert_eq!(state.mcp_servers.len(), 1);
    }

    #[test]
    fn test_load_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snapshot.json");
        write(
            &path,
            r#"{"plugins": {"lint@tools": {"enabled": false, "scope": "local"}}}"#,
        );

        let state = load(Some(&path)).unwrap();
        assert_eq!(state.plugins["lint@tools"].scope, Scope::Local);
        assert!(state.sources.is_empty());

        write(&path, "[]");
        let err = load_snapshot(&path).unwrap_err();
        assert!(err.to_string().contains("expected a JSON object"));

        write(&path, "{ plugins");
        assert!(load_snapshot(&path).is_err());
    }
}
