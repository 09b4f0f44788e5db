//! `plugsync apply` - converge the host toward the config
//!
//! Pipeline: diff, git gate, optional interactive selection, then either a
//! printed plan (`--dry-run`) or execution through the host program.

use anyhow::{Context as AnyhowContext, Result, bail};
use chrono::Utc;
use colored::Colorize;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, MultiSelect};
use reconcile::{
    Action, Config, DiffResult, ExecuteOptions, ExecutionResult, Executor, GitCli, ItemKey,
    PlannedCommand, Selection, apply_git_gate, select,
};
use std::time::Duration;

use crate::Context;
use crate::cli::ApplyArgs;
use crate::commands::{load_inputs, print_diff};
use crate::progress::SpinnerProgress;
use crate::runner::SystemRunner;
use crate::ui;

pub fn run(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let inputs = load_inputs(ctx)?;
    let timeout = Duration::from_secs(args.timeout);
    let options = ExecuteOptions {
        program: ctx.program.clone(),
        timeout: Some(timeout),
    };
    let runner = SystemRunner;

    let mut result = inputs.result;
    if args.no_git_check {
        log::info!("git status check disabled");
    } else {
        result = gate(&result, &inputs.config.config, &runner, timeout, args.json);
    }

    if args.interactive {
        result = choose(&result)?;
    }

    let summary = result.summary();
    if !summary.has_changes() {
        if args.json {
            println!("{}", serde_json::to_string_pretty(&empty_outcome())?);
        } else {
            ui::success("Everything is in sync");
        }
        return Ok(());
    }

    if args.dry_run {
        let plan = result.generate_commands(&ctx.program);
        if args.json {
            println!("{}", serde_json::to_string_pretty(&plan)?);
        } else {
            print_plan(&plan);
        }
        return Ok(());
    }

    if !args.json {
        ui::header("Applying Plugin Config");
        print_diff(ctx, &result);
        println!();
    }

    if args.json && !args.yes && summary.total_changes() > 0 {
        bail!("--json output cannot be combined with a confirmation prompt; add --yes");
    }
    if summary.total_changes() > 0 && !args.yes && !confirm_proceed()? {
        ui::info("Cancelled");
        return Ok(());
    }

    let mut progress = SpinnerProgress::new(console::user_attended(), !args.json);
    let outcome = Executor::new(&runner).execute_with_progress(&result, &options, &mut progress);
    progress.finish();
    let outcome = outcome?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_summary(&outcome);
    }

    if args.strict && !outcome.is_success() {
        bail!("apply finished with {} failed", ui::count(outcome.failed, "change"));
    }
    Ok(())
}

/// Result of a run that had nothing to apply
fn empty_outcome() -> ExecutionResult {
    let now = Utc::now();
    ExecutionResult {
        started_at: now,
        finished_at: now,
        ..Default::default()
    }
}

/// Relabel entries whose local repository has uncommitted changes
fn gate(
    result: &DiffResult,
    config: &Config,
    runner: &SystemRunner,
    timeout: Duration,
    quiet: bool,
) -> DiffResult {
    let git = GitCli::new(runner).with_timeout(Some(timeout));
    let report = apply_git_gate(result, config, &git);

    if !quiet && !report.messages.is_empty() {
        ui::section("Local repositories");
        for message in &report.messages {
            if message.blocked {
                ui::warn(&message.to_string());
            } else {
                ui::info(&message.to_string());
            }
        }
    }
    if report.blocked() > 0 {
        log::info!(
            "{} held back by uncommitted changes",
            ui::count(report.blocked(), "change")
        );
    }

    report.result
}

/// Label shown in the interactive picker
fn selection_label(key: &ItemKey, action: Action) -> String {
    format!(
        "{} {:<8} {:<7} {}",
        action.symbol(),
        action.as_str(),
        key.kind.label(),
        key.name
    )
}

/// Entries the picker offers, with their actions, in canonical order
fn actionable_entries(result: &DiffResult) -> Vec<(ItemKey, Action)> {
    let actionable = result.actionable_keys();
    result
        .entries()
        .into_iter()
        .filter(|(key, _)| actionable.contains(key))
        .collect()
}

/// Ask which actionable entries to apply; everything starts selected
fn choose(result: &DiffResult) -> Result<DiffResult> {
    if !console::user_attended() {
        bail!("--interactive needs a terminal; use --yes or a plain apply instead");
    }

    let entries = actionable_entries(result);
    if entries.is_empty() {
        return Ok(result.clone());
    }

    let labels: Vec<String> = entries
        .iter()
        .map(|(key, action)| selection_label(key, *action))
        .collect();

    let chosen = MultiSelect::with_theme(&ColorfulTheme::default())
        .with_prompt("Select changes to apply (space toggles, enter confirms)")
        .items(&labels)
        .defaults(&vec![true; labels.len()])
        .interact()
        .context("Failed to read selection")?;

    let selection = Selection::from_keys(chosen.into_iter().map(|i| entries[i].0.clone()));
    log::debug!("approved {} of {} entries", selection.len(), entries.len());
    Ok(select(result, &selection))
}

/// Confirm with user
fn confirm_proceed() -> Result<bool> {
    if !console::user_attended() {
        bail!("Refusing to apply without confirmation; pass --yes to run non-interactively");
    }

    let confirmed = Confirm::new()
        .with_prompt("Continue?")
        .default(true)
        .interact()
        .context("Failed to read confirmation")?;

    Ok(confirmed)
}

fn print_plan(plan: &[PlannedCommand]) {
    ui::header("Planned Commands");
    println!();
    for planned in plan {
        if planned.executable {
            println!("{}", planned.command);
        } else {
            println!("{}", planned.command.dimmed());
        }
    }
    println!();
    ui::dim("Dry run - nothing was executed.");
}

/// Print final summary
fn print_summary(outcome: &ExecutionResult) {
    println!();
    if outcome.is_success() {
        println!("  {} Plugin config applied", "✓".green().bold());
    } else {
        println!("  {} Plugin config applied with errors", "⚠".yellow().bold());
    }

    if outcome.installed > 0 {
        println!("    • {} installed", outcome.installed);
    }
    if outcome.updated > 0 {
        println!("    • {} updated", outcome.updated);
    }
    if outcome.skipped > 0 {
        println!("    • {} skipped", outcome.skipped);
    }
    if outcome.failed > 0 {
        println!("    • {} {}", outcome.failed, "failed".red());
    }

    let elapsed = outcome.finished_at - outcome.started_at;
    ui::dim(&format!(
        "  finished at {} in {:.1}s",
        outcome
            .finished_at
            .with_timezone(&chrono::Local)
            .format("%H:%M:%S"),
        elapsed.num_milliseconds() as f64 / 1000.0
    ));

    if !outcome.attention.is_empty() {
        ui::section("Needs attention");
        for item in &outcome.attention {
            println!("  {} {}", "!".yellow(), item);
        }
        ui::dim("Undeclared entries are never removed; OAuth servers must be added by hand.");
    }

    if !outcome.errors.is_empty() {
        ui::section("Errors");
        for error in &outcome.errors {
            ui::error(&error.to_string());
        }
    }
}
