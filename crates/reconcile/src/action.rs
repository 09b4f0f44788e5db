//! The closed set of outcomes a diff entry can have.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of a single diff entry.
///
/// `Remove` and `SkipGit` are informational: nothing is ever executed for
/// them. `SkipGit` is never produced by diffing; only the git-status gate
/// assigns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Already matches, nothing to do
    None,
    /// Declared but not present
    Add,
    /// Present but configured differently
    Update,
    /// Present but disabled, declared enabled
    Enable,
    /// Present and enabled, declared disabled
    Disable,
    /// Present but not declared (never deleted automatically)
    Remove,
    /// Blocked by uncommitted changes in a local repository
    SkipGit,
}

impl Action {
    /// Actions that translate into external commands.
    pub fn is_actionable(&self) -> bool {
        matches!(
            self,
            Self::Add | Self::Update | Self::Enable | Self::Disable
        )
    }

    /// Actions that are surfaced to the operator but never applied.
    pub fn is_informational(&self) -> bool {
        matches!(self, Self::Remove | Self::SkipGit)
    }

    /// Entries an operator may approve or hold back interactively.
    ///
    /// Unchanged entries and removals pass through any selection untouched.
    pub fn needs_approval(&self) -> bool {
        !matches!(self, Self::None | Self::Remove)
    }

    /// Stable lowercase name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Add => "add",
            Self::Update => "update",
            Self::Enable => "enable",
            Self::Disable => "disable",
            Self::Remove => "remove",
            Self::SkipGit => "skip_git",
        }
    }

    /// Single-character marker used in diff listings.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::None => "=",
            Self::Add => "+",
            Self::Update => "~",
            Self::Enable | Self::Disable => "±",
            Self::Remove => "-",
            Self::SkipGit => "!",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three kinds of entity that are reconciled.
///
/// Variant order is the canonical processing order: sources before the
/// plugins that come from them, MCP servers last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Source,
    Plugin,
    Mcp,
}

impl EntityKind {
    /// All kinds in canonical order.
    pub const ALL: [Self; 3] = [Self::Source, Self::Plugin, Self::Mcp];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Plugin => "plugin",
            Self::Mcp => "mcp",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identity of a diff entry across gates: kind plus name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    pub kind: EntityKind,
    pub name: String,
}

impl ItemKey {
    pub fn new(kind: EntityKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actionable_and_informational_are_disjoint() {
        let all = [
            Action::None,
            Action::Add,
            Action::Update,
            Action::Enable,
            Action::Disable,
            Action::Remove,
            Action::SkipGit,
        ];
        for action in all {
            assert!(!(action.is_actionable() && action.is_informational()));
        }
        assert!(!Action::None.is_actionable());
        assert!(!Action::None.is_informational());
    }

    #[test]
    fn test_needs_approval() {
        assert!(!Action::None.needs_approval());
        assert!(!Action::Remove.needs_approval());
        assert!(Action::SkipGit.needs_approval());
        assert!(Action::Add.needs_approval());
        assert!(Action::Disable.needs_approval());
    }

    #[test]
    fn test_action_serializes_snake_case() {
        let json = serde_json::to_string(&Action::SkipGit).unwrap();
        assert_eq!(json, "\"skip_git\"");
        assert_eq!(Action::SkipGit.to_string(), "skip_git");
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        assert!(serde_json::from_str::<Action>("\"delete\"").is_err());
    }

    #[test]
    fn test_entity_kind_order() {
        let mut kinds = vec![EntityKind::Mcp, EntityKind::Source, EntityKind::Plugin];
        kinds.sort();
        assert_eq!(kinds, EntityKind::ALL.to_vec());
    }

    #[test]
    fn test_item_key_display() {
        assert_eq!(
            ItemKey::new(EntityKind::Plugin, "foo@bar").to_string(),
            "plugin:foo@bar"
        );
    }
}
