//! Desired configuration and observed state models

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Shared enums
// ============================================================================

/// Where a plugin source (marketplace) is hosted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// GitHub repository, addressed as `owner/repo`
    Github,
    /// Any git URL
    Git,
    /// Local directory
    Directory,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Github => write!(f, "github"),
            Self::Git => write!(f, "git"),
            Self::Directory => write!(f, "directory"),
        }
    }
}

/// Installation scope of a plugin or MCP server
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    User,
    Project,
    Local,
}

impl Scope {
    /// Whether `--scope` can be omitted from host commands
    pub fn is_default(&self) -> bool {
        *self == Self::User
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Project => write!(f, "project"),
            Self::Local => write!(f, "local"),
        }
    }
}

/// MCP server transport
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Stdio,
    Http,
    Sse,
}

impl Transport {
    /// HTTP and SSE both talk to a remote URL
    pub fn is_http_based(&self) -> bool {
        matches!(self, Self::Http | Self::Sse)
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdio => write!(f, "stdio"),
            Self::Http => write!(f, "http"),
            Self::Sse => write!(f, "sse"),
        }
    }
}

// ============================================================================
// Desired configuration
// ============================================================================

/// A declared plugin marketplace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    /// `owner/repo` for github sources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    /// Clone URL for git sources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Filesystem path for directory sources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// A source reduced to the fields that identify where it lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSource {
    #[serde(rename = "type")]
    pub source_type: SourceType,
    pub location: String,
}

impl Source {
    /// The raw location for this source's type.
    pub fn location(&self) -> Option<&str> {
        let raw = match self.source_type {
            SourceType::Github => self.repo.as_deref(),
            SourceType::Git => self.url.as_deref(),
            SourceType::Directory => self.path.as_deref(),
        };
        raw.map(str::trim).filter(|s| !s.is_empty())
    }

    /// Resolve type and normalized location.
    pub fn resolved(&self) -> Result<ResolvedSource> {
        let location = self.location().ok_or_else(|| {
            let field = match self.source_type {
                SourceType::Github => "repo",
                SourceType::Git => "url",
                SourceType::Directory => "path",
            };
            Error::config(
                &self.name,
                format!("{} source has no `{field}`", self.source_type),
            )
        })?;

        Ok(ResolvedSource {
            source_type: self.source_type,
            location: normalize_location(self.source_type, location),
        })
    }
}

/// Normalize a source location so equivalent spellings compare equal.
///
/// Trailing slashes and a trailing `.git` are dropped; GitHub URLs collapse
/// to `owner/repo`.
pub fn normalize_location(source_type: SourceType, raw: &str) -> String {
    let mut location = raw.trim().trim_end_matches('/');
    if source_type != SourceType::Directory {
        location = location.strip_suffix(".git").unwrap_or(location);
    }

    if source_type == SourceType::Github {
        for prefix in ["https://github.com/", "http://github.com/", "git@github.com:"] {
            if let Some(rest) = location.strip_prefix(prefix) {
                return rest.to_string();
            }
        }
    }

    location.to_string()
}

/// A declared plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plugin {
    /// `plugin` or `plugin@source`
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
}

impl Plugin {
    /// Absent means enabled.
    pub fn desired_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    /// The plugin part of `plugin@source`.
    pub fn plugin_name(&self) -> &str {
        split_plugin_name(&self.name).0
    }

    /// The source alias of `plugin@source`, if any.
    pub fn source_alias(&self) -> Option<&str> {
        split_plugin_name(&self.name).1
    }
}

/// Split `plugin@source` into its parts.
pub fn split_plugin_name(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('@') {
        Some((plugin, alias)) if !plugin.is_empty() && !alias.is_empty() => (plugin, Some(alias)),
        _ => (name, None),
    }
}

/// A declared MCP server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpServer {
    #[serde(default, alias = "type")]
    pub transport: Transport,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
}

/// Desired configuration, already parsed and validated upstream
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub plugins: Vec<Plugin>,
    #[serde(default, alias = "mcpServers")]
    pub mcp_servers: BTreeMap<String, McpServer>,
}

impl Config {
    /// Find a declared source by name
    pub fn find_source(&self, name: &str) -> Option<&Source> {
        self.sources.iter().find(|s| s.name == name)
    }
}

// ============================================================================
// Observed state
// ============================================================================

/// A marketplace known to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceState {
    #[serde(rename = "type")]
    pub source_type: SourceType,
    pub location: String,
}

impl SourceState {
    pub fn resolved(&self) -> ResolvedSource {
        ResolvedSource {
            source_type: self.source_type,
            location: normalize_location(self.source_type, &self.location),
        }
    }
}

/// A plugin installed in the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginState {
    pub enabled: bool,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// An MCP server registered in the host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpServerState {
    #[serde(default, alias = "type")]
    pub transport: Transport,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
}

/// Observed host configuration, collected upstream
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    #[serde(default)]
    pub sources: BTreeMap<String, SourceState>,
    #[serde(default)]
    pub plugins: BTreeMap<String, PluginState>,
    #[serde(default, alias = "mcpServers")]
    pub mcp_servers: BTreeMap<String, McpServerState>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn github(name: &str, repo: &str) -> Source {
        Source {
            name: name.to_string(),
            source_type: SourceType::Github,
            repo: Some(repo.to_string()),
            url: None,
            path: None,
        }
    }

    #[test]
    fn test_normalize_github_forms() {
        for raw in [
            "owner/repo",
            "owner/repo/",
            "https://github.com/owner/repo",
            "https://github.com/owner/repo.git",
            "git@github.com:owner/repo.git",
        ] {
            assert_eq!(normalize_location(SourceType::Github, raw), "owner/repo");
        }
    }

    #[test]
    fn test_normalize_directory_keeps_git_suffix() {
        assert_eq!(
            normalize_location(SourceType::Directory, "/src/plugins.git/"),
            "/src/plugins.git"
        );
    }

    #[test]
    fn test_resolved_missing_location() {
        let mut source = github("official", "");
        assert!(source.resolved().is_err());
        source.repo = None;
        let err = source.resolved().unwrap_err();
        assert!(err.to_string().contains("`repo`"));
    }

    #[test]
    fn test_resolved_matches_state() {
        let source = github("official", "https://github.com/acme/plugins.git");
        let state = SourceState {
            source_type: SourceType::Github,
            location: "acme/plugins".to_string(),
        };
        assert_eq!(source.resolved().unwrap(), state.resolved());
    }

    #[test]
    fn test_split_plugin_name() {
        assert_eq!(split_plugin_name("lint@tools"), ("lint", Some("tools")));
        assert_eq!(split_plugin_name("lint"), ("lint", None));
        assert_eq!(split_plugin_name("lint@"), ("lint@", None));
        assert_eq!(split_plugin_name("@tools"), ("@tools", None));
    }

    #[test]
    fn test_plugin_enabled_default() {
        let plugin = Plugin {
            name: "p@s".to_string(),
            enabled: None,
            scope: None,
        };
        assert!(plugin.desired_enabled());
        assert_eq!(plugin.plugin_name(), "p");
        assert_eq!(plugin.source_alias(), Some("s"));
    }

    #[test]
    fn test_config_accepts_camel_case_servers() {
        let json = r#"{
            "mcpServers": {
                "docs": { "type": "http", "url": "https://example.com/mcp" }
            }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        let docs = &config.mcp_servers["docs"];
        assert_eq!(docs.transport, Transport::Http);
        assert!(config.sources.is_empty());
    }

    #[test]
    fn test_scope_default() {
        assert!(Scope::default().is_default());
        assert!(!Scope::Project.is_default());
    }
}
