//! Diff computation between desired configuration and observed state
//!
//! [`compute`] is a pure full outer join per entity kind: every name seen in
//! either side yields exactly one entry.

use crate::action::{Action, EntityKind, ItemKey};
use crate::oauth::server_requires_oauth;
use crate::types::{
    Config, McpServer, McpServerState, Plugin, PluginState, Source, SourceState, State, Transport,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Diff for one plugin source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDiff {
    pub name: String,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<SourceState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired: Option<Source>,
}

/// Diff for one plugin (`plugin` or `plugin@source`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDiff {
    pub name: String,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<PluginState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired: Option<Plugin>,
}

/// Diff for one MCP server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpServerDiff {
    pub name: String,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<McpServerState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired: Option<McpServer>,
    /// Computed once at diff time, see [`server_requires_oauth`]
    #[serde(default)]
    pub requires_oauth: bool,
}

macro_rules! relabel {
    ($ty:ty) => {
        impl $ty {
            /// Copy of this entry with a different action; payloads are untouched.
            pub fn with_action(&self, action: Action) -> Self {
                Self {
                    action,
                    ..self.clone()
                }
            }
        }
    };
}

relabel!(SourceDiff);
relabel!(PluginDiff);
relabel!(McpServerDiff);

/// Complete diff across all entity kinds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    pub sources: Vec<SourceDiff>,
    pub plugins: Vec<PluginDiff>,
    pub mcp_servers: Vec<McpServerDiff>,
}

/// Aggregate counts for quick status display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    /// Entries to add
    pub add: usize,
    /// Entries to update, enable or disable
    pub update: usize,
    /// Always 0: removals are never applied and count as attention
    pub remove: usize,
    /// Removals and git-blocked entries
    pub attention: usize,
}

impl DiffSummary {
    /// Number of entries that would run commands
    pub fn total_changes(&self) -> usize {
        self.add + self.update
    }

    /// Check if anything needs to be applied or looked at
    pub fn has_changes(&self) -> bool {
        self.total_changes() + self.attention > 0
    }
}

impl DiffResult {
    /// Every entry as `(key, action)`, sources first, then plugins, then MCP servers.
    pub fn entries(&self) -> Vec<(ItemKey, Action)> {
        let sources = self
            .sources
            .iter()
            .map(|d| (ItemKey::new(EntityKind::Source, &d.name), d.action));
        let plugins = self
            .plugins
            .iter()
            .map(|d| (ItemKey::new(EntityKind::Plugin, &d.name), d.action));
        let servers = self
            .mcp_servers
            .iter()
            .map(|d| (ItemKey::new(EntityKind::Mcp, &d.name), d.action));
        sources.chain(plugins).chain(servers).collect()
    }

    /// Keys of entries eligible for interactive approval, in canonical order
    pub fn actionable_keys(&self) -> Vec<ItemKey> {
        self.entries()
            .into_iter()
            .filter(|(_, action)| action.needs_approval())
            .map(|(key, _)| key)
            .collect()
    }

    /// Aggregate counts
    pub fn summary(&self) -> DiffSummary {
        let mut summary = DiffSummary::default();
        for (_, action) in self.entries() {
            match action {
                Action::Add => summary.add += 1,
                Action::Update | Action::Enable | Action::Disable => summary.update += 1,
                Action::Remove | Action::SkipGit => summary.attention += 1,
                Action::None => {}
            }
        }
        summary
    }

    /// Total number of entries
    pub fn len(&self) -> usize {
        self.sources.len() + self.plugins.len() + self.mcp_servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Compute the diff between desired configuration and observed state.
///
/// Pure and deterministic. Desired entries keep declaration order (a
/// repeated name keeps its first declaration), observed-only entries follow
/// in name order.
pub fn compute(config: &Config, state: &State) -> DiffResult {
    DiffResult {
        sources: diff_sources(config, state),
        plugins: diff_plugins(config, state),
        mcp_servers: diff_mcp_servers(config, state),
    }
}

fn diff_sources(config: &Config, state: &State) -> Vec<SourceDiff> {
    let mut seen = HashSet::new();
    let mut diffs = Vec::new();

    for source in &config.sources {
        if !seen.insert(source.name.as_str()) {
            log::warn!("duplicate source '{}' ignored", source.name);
            continue;
        }
        let current = state.sources.get(&source.name);
        let action = match current {
            None => Action::Add,
            Some(current) => match source.resolved() {
                Ok(resolved) if resolved == current.resolved() => Action::None,
                // An unresolvable declaration is surfaced by the executor
                _ => Action::Update,
            },
        };
        diffs.push(SourceDiff {
            name: source.name.clone(),
            action,
            current: current.cloned(),
            desired: Some(source.clone()),
        });
    }

    for (name, current) in &state.sources {
        if seen.contains(name.as_str()) {
            continue;
        }
        diffs.push(SourceDiff {
            name: name.clone(),
            action: Action::Remove,
            current: Some(current.clone()),
            desired: None,
        });
    }

    diffs
}

fn plugin_action(desired: &Plugin, current: &PluginState) -> Action {
    let desired_enabled = desired.desired_enabled();
    let mut action = Action::None;

    if desired_enabled != current.enabled {
        action = if desired_enabled {
            Action::Enable
        } else {
            Action::Disable
        };
    }

    // Scope change means reinstall, which supersedes enable/disable
    if let Some(scope) = desired.scope
        && scope != current.scope
    {
        action = Action::Update;
    }

    action
}

fn diff_plugins(config: &Config, state: &State) -> Vec<PluginDiff> {
    let mut seen = HashSet::new();
    let mut diffs = Vec::new();

    for plugin in &config.plugins {
        if !seen.insert(plugin.name.as_str()) {
            log::warn!("duplicate plugin '{}' ignored", plugin.name);
            continue;
        }
        let current = state.plugins.get(&plugin.name);
        let action = current.map_or(Action::Add, |current| plugin_action(plugin, current));
        diffs.push(PluginDiff {
            name: plugin.name.clone(),
            action,
            current: current.cloned(),
            desired: Some(plugin.clone()),
        });
    }

    for (name, current) in &state.plugins {
        if seen.contains(name.as_str()) {
            continue;
        }
        diffs.push(PluginDiff {
            name: name.clone(),
            action: Action::Remove,
            current: Some(current.clone()),
            desired: None,
        });
    }

    diffs
}

fn mcp_server_matches(desired: &McpServer, current: &McpServerState) -> bool {
    if desired.transport != current.transport {
        return false;
    }
    match desired.transport {
        Transport::Stdio => {
            desired.command == current.command
                && desired.args.len() == current.args.len()
                && desired.args.iter().zip(&current.args).all(|(a, b)| a == b)
        }
        Transport::Http | Transport::Sse => desired.url == current.url,
    }
}

fn diff_mcp_servers(config: &Config, state: &State) -> Vec<McpServerDiff> {
    let mut diffs = Vec::new();

    for (name, server) in &config.mcp_servers {
        let current = state.mcp_servers.get(name);
        let action = match current {
            None => Action::Add,
            Some(current) if mcp_server_matches(server, current) => Action::None,
            Some(_) => Action::Update,
        };
        let requires_oauth =
            matches!(action, Action::Add | Action::Update) && server_requires_oauth(server);
        diffs.push(McpServerDiff {
            name: name.clone(),
            action,
            current: current.cloned(),
            desired: Some(server.clone()),
            requires_oauth,
        });
    }

    for (name, current) in &state.mcp_servers {
        if config.mcp_servers.contains_key(name) {
            continue;
        }
        diffs.push(McpServerDiff {
            name: name.clone(),
            action: Action::Remove,
            current: Some(current.clone()),
            desired: None,
            requires_oauth: false,
        });
    }

    diffs
}
