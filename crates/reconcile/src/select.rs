//! Narrow a diff to operator-approved entries
//!
//! Entries with action `none` or `remove` always pass through: they are
//! either no-ops or informational, so approval never hides them.

use crate::action::{Action, EntityKind, ItemKey};
use crate::diff::DiffResult;
use std::collections::HashSet;

/// Set of approved entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    approved: HashSet<ItemKey>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Approve every key in the iterator
    pub fn from_keys(keys: impl IntoIterator<Item = ItemKey>) -> Self {
        Self {
            approved: keys.into_iter().collect(),
        }
    }

    pub fn approve(&mut self, key: ItemKey) {
        self.approved.insert(key);
    }

    pub fn is_approved(&self, key: &ItemKey) -> bool {
        self.approved.contains(key)
    }

    pub fn len(&self) -> usize {
        self.approved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.approved.is_empty()
    }

    fn keeps(&self, kind: EntityKind, name: &str, action: Action) -> bool {
        !action.needs_approval() || self.is_approved(&ItemKey::new(kind, name))
    }
}

/// Build a new diff containing only entries the selection keeps.
pub fn select(result: &DiffResult, selection: &Selection) -> DiffResult {
    DiffResult {
        sources: result
            .sources
            .iter()
            .filter(|d| selection.keeps(EntityKind::Source, &d.name, d.action))
            .cloned()
            .collect(),
        plugins: result
            .plugins
            .iter()
            .filter(|d| selection.keeps(EntityKind::Plugin, &d.name, d.action))
            .cloned()
            .collect(),
        mcp_servers: result
            .mcp_servers
            .iter()
            .filter(|d| selection.keeps(EntityKind::Mcp, &d.name, d.action))
            .cloned()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{McpServerDiff, PluginDiff, SourceDiff};

    fn source(name: &str, action: Action) -> SourceDiff {
        SourceDiff {
            name: name.to_string(),
            action,
            current: None,
            desired: None,
        }
    }

    fn plugin(name: &str, action: Action) -> PluginDiff {
        PluginDiff {
            name: name.to_string(),
            action,
            current: None,
            desired: None,
        }
    }

    fn server(name: &str, action: Action) -> McpServerDiff {
        McpServerDiff {
            name: name.to_string(),
            action,
            current: None,
            desired: None,
            requires_oauth: false,
        }
    }

    fn fixture() -> DiffResult {
        DiffResult {
            sources: vec![source("kept", Action::None), source("gone", Action::Remove)],
            plugins: vec![
                plugin("a", Action::Add),
                plugin("b", Action::Enable),
                plugin("c", Action::SkipGit),
            ],
            mcp_servers: vec![server("fs", Action::Update)],
        }
    }

    #[test]
    fn test_empty_selection_keeps_only_informational() {
        let filtered = select(&fixture(), &Selection::new());
        assert_eq!(filtered.sources.len(), 2);
        assert!(filtered.plugins.is_empty());
        assert!(filtered.mcp_servers.is_empty());
    }

    #[test]
    fn test_approved_entries_pass() {
        let selection = Selection::from_keys([
            ItemKey::new(EntityKind::Plugin, "b"),
            ItemKey::new(EntityKind::Mcp, "fs"),
        ]);
        let filtered = select(&fixture(), &selection);
        let plugins: Vec<_> = filtered.plugins.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(plugins, vec!["b"]);
        assert_eq!(filtered.mcp_servers.len(), 1);
    }

    #[test]
    fn test_key_kind_matters() {
        let selection = Selection::from_keys([ItemKey::new(EntityKind::Source, "a")]);
        let filtered = select(&fixture(), &selection);
        assert!(filtered.plugins.is_empty());
    }

    #[test]
    fn test_approving_everything_is_identity() {
        let result = fixture();
        let selection = Selection::from_keys(result.actionable_keys());
        assert_eq!(select(&result, &selection), result);
    }
}
