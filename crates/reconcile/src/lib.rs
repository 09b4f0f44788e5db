//! # Reconcile
//!
//! Converge a host's plugin sources, plugins and MCP servers toward a
//! declared configuration.
//!
//! The crate never touches the host directly. It compares a declared
//! [`Config`] with an observed [`State`], classifies every entry, and applies
//! the result through a caller-supplied [`CommandRunner`].
//!
//! ## Pipeline
//!
//! - **Diff**: [`compute`] performs a full outer join per entity kind
//! - **Git gate**: [`apply_git_gate`] holds back entries backed by a dirty
//!   local repository
//! - **Selection**: [`select`] narrows a diff to operator-approved entries
//! - **Commands**: [`generate_commands`] renders a diff for dry runs
//! - **Executor**: [`Executor`] runs the commands, isolating failures
//!
//! Removals are never executed. Entries present on the host but absent from
//! the configuration are reported for manual follow-up.
//!
//! ## Example
//!
//! ```ignore
//! use reconcile::{compute, ExecuteOptions, Executor};
//!
//! let result = compute(&config, &state);
//! for planned in result.generate_commands("claude") {
//!     println!("{}", planned.command);
//! }
//!
//! let outcome = Executor::new(runner).execute(&result, &ExecuteOptions::default())?;
//! println!("{} installed, {} failed", outcome.installed, outcome.failed);
//! ```
//!
//! ## Provider Traits
//!
//! - [`CommandRunner`]: Runs external commands
//! - [`GitStatusProvider`]: Reports the status of a local repository
//! - [`ProgressCallback`]: Receives progress updates

pub mod action;
pub mod commands;
pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod gate;
pub mod oauth;
pub mod select;
pub mod types;

// Re-export main types at crate root
pub use action::{Action, EntityKind, ItemKey};
pub use commands::{CommandStep, PlannedCommand, command_line, generate_commands};
pub use context::{CommandOutput, CommandRunner, NoProgress, ProgressCallback};
pub use diff::{DiffResult, DiffSummary, McpServerDiff, PluginDiff, SourceDiff, compute};
pub use error::{Error, Result};
pub use executor::{ExecuteOptions, ExecutionResult, Executor, ItemError, Operation};
pub use gate::{GateMessage, GateReport, GitCli, GitStatus, GitStatusProvider, apply_git_gate};
pub use oauth::server_requires_oauth;
pub use select::{Selection, select};
pub use types::{
    Config, McpServer, McpServerState, Plugin, PluginState, Scope, Source, SourceState,
    SourceType, State, Transport,
};
