//! Execution engine - applies a diff through a command runner
//!
//! Entries are walked sources first, then plugins, then MCP servers. A
//! failing entry is recorded and the walk continues; the run always returns
//! a complete [`ExecutionResult`].

use crate::action::{Action, EntityKind, ItemKey};
use crate::commands::{CommandStep, mcp_steps, plugin_steps, source_steps};
use crate::context::{CommandRunner, NoProgress, ProgressCallback};
use crate::diff::DiffResult;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Host program invoked when none is configured
pub const DEFAULT_PROGRAM: &str = "claude";

/// Per-command deadline when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Host program every command is addressed to
    pub program: String,
    /// Deadline for each external command
    pub timeout: Option<Duration>,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }
}

impl ExecuteOptions {
    fn validate(&self) -> Result<()> {
        if self.program.trim().is_empty() {
            return Err(Error::InvalidOptions("program must not be empty".to_string()));
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::InvalidOptions("timeout must be positive".to_string()));
        }
        Ok(())
    }
}

/// Audit-log entry for one attempted external command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub name: String,
    pub action: Action,
    /// Rendered command line; empty when the entry could not be rendered
    pub command: String,
    pub description: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A failed entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemError {
    pub key: ItemKey,
    pub message: String,
}

impl fmt::Display for ItemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.message)
    }
}

/// Outcome of one `execute` call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub installed: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Entries surfaced to the operator but never applied
    pub attention: Vec<String>,
    pub errors: Vec<ItemError>,
    /// Every attempted command, in execution order
    pub operations: Vec<Operation>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ExecutionResult {
    /// Check if execution had no failures
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Entries that ran commands successfully
    pub fn total_changes(&self) -> usize {
        self.installed + self.updated
    }

    fn record_failure(&mut self, key: ItemKey, message: String) {
        self.failed += 1;
        self.errors.push(ItemError { key, message });
    }
}

/// What to do with one diff entry
enum ItemPlan {
    Nothing,
    Attention { message: String, skipped: bool },
    Run(Result<Vec<CommandStep>>),
}

fn attention(kind: EntityKind, name: &str, action: Action) -> ItemPlan {
    let message = match action {
        Action::SkipGit => format!("{kind} (uncommitted changes): {name}"),
        _ => format!("{kind}: {name}"),
    };
    ItemPlan::Attention {
        message,
        skipped: false,
    }
}

/// Applies diffs through a [`CommandRunner`]
pub struct Executor<R: CommandRunner> {
    runner: R,
}

impl<R: CommandRunner> Executor<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    /// Apply a diff without progress reporting
    pub fn execute(&self, result: &DiffResult, options: &ExecuteOptions) -> Result<ExecutionResult> {
        self.execute_with_progress(result, options, &mut NoProgress)
    }

    /// Apply a diff, reporting each entry to `progress`
    ///
    /// The returned error is reserved for options that make the run
    /// impossible; per-entry failures are inside the [`ExecutionResult`].
    pub fn execute_with_progress<P: ProgressCallback + ?Sized>(
        &self,
        result: &DiffResult,
        options: &ExecuteOptions,
        progress: &mut P,
    ) -> Result<ExecutionResult> {
        options.validate()?;

        let mut outcome = ExecutionResult {
            started_at: Utc::now(),
            ..Default::default()
        };

        for diff in &result.sources {
            let plan = match diff.action {
                Action::None => ItemPlan::Nothing,
                Action::Remove | Action::SkipGit => {
                    attention(EntityKind::Source, &diff.name, diff.action)
                }
                _ => ItemPlan::Run(source_steps(diff)),
            };
            let key = ItemKey::new(EntityKind::Source, &diff.name);
            self.apply_item(key, diff.action, plan, options, &mut outcome, progress);
        }

        for diff in &result.plugins {
            let plan = match diff.action {
                Action::None => ItemPlan::Nothing,
                Action::Remove | Action::SkipGit => {
                    attention(EntityKind::Plugin, &diff.name, diff.action)
                }
                _ => ItemPlan::Run(plugin_steps(diff)),
            };
            let key = ItemKey::new(EntityKind::Plugin, &diff.name);
            self.apply_item(key, diff.action, plan, options, &mut outcome, progress);
        }

        for diff in &result.mcp_servers {
            let plan = match diff.action {
                Action::None => ItemPlan::Nothing,
                Action::Remove | Action::SkipGit => {
                    attention(EntityKind::Mcp, &diff.name, diff.action)
                }
                Action::Add | Action::Update if diff.requires_oauth => ItemPlan::Attention {
                    message: format!("mcp (oauth): {}", diff.name),
                    skipped: true,
                },
                _ => ItemPlan::Run(mcp_steps(diff)),
            };
            let key = ItemKey::new(EntityKind::Mcp, &diff.name);
            self.apply_item(key, diff.action, plan, options, &mut outcome, progress);
        }

        outcome.finished_at = Utc::now();
        log::info!(
            "sync finished: {} installed, {} updated, {} skipped, {} failed, {} need attention",
            outcome.installed,
            outcome.updated,
            outcome.skipped,
            outcome.failed,
            outcome.attention.len()
        );
        Ok(outcome)
    }

    fn apply_item<P: ProgressCallback + ?Sized>(
        &self,
        key: ItemKey,
        action: Action,
        plan: ItemPlan,
        options: &ExecuteOptions,
        outcome: &mut ExecutionResult,
        progress: &mut P,
    ) {
        let steps = match plan {
            ItemPlan::Nothing => return,
            ItemPlan::Attention { message, skipped } => {
                log::info!("needs attention: {message}");
                progress.on_attention(&message);
                outcome.attention.push(message);
                if skipped {
                    outcome.skipped += 1;
                }
                return;
            }
            ItemPlan::Run(Ok(steps)) => steps,
            ItemPlan::Run(Err(e)) => {
                log::warn!("cannot apply {key}: {e}");
                let operation = Operation {
                    kind: key.kind,
                    name: key.name.clone(),
                    action,
                    command: String::new(),
                    description: format!("Render {action} command for {key}"),
                    success: false,
                    error: Some(e.to_string()),
                };
                progress.on_operation(&operation);
                outcome.operations.push(operation);
                outcome.record_failure(key, e.to_string());
                return;
            }
        };

        if let Some(first) = steps.first() {
            progress.on_item_start(&key, &first.description);
        }

        for step in &steps {
            let command = step.display(&options.program);
            log::debug!("running: {command}");

            let run = self
                .runner
                .run_checked(&options.program, &step.args, options.timeout);
            let error = run.err().map(|e| e.with_command(command.as_str()).to_string());

            let operation = Operation {
                kind: key.kind,
                name: key.name.clone(),
                action,
                command,
                description: step.description.clone(),
                success: error.is_none(),
                error: error.clone(),
            };
            progress.on_operation(&operation);
            outcome.operations.push(operation);

            if let Some(message) = error {
                log::warn!("{key} failed: {message}");
                outcome.record_failure(key, message);
                return;
            }
        }

        match action {
            Action::Add => outcome.installed += 1,
            _ => outcome.updated += 1,
        }
    }
}
