pub mod apply;
pub mod diff;
pub mod status;

use anyhow::Result;
use colored::Colorize;
use reconcile::{
    Action, DiffResult, McpServerDiff, PluginDiff, SourceDiff, State, compute,
};

use crate::Context;
use crate::config::{self, LoadedConfig};
use crate::state;
use crate::ui;

/// Everything a command needs: declared config, observed state and their diff
pub struct Inputs {
    pub config: LoadedConfig,
    pub state: State,
    pub result: DiffResult,
}

pub fn load_inputs(ctx: &Context) -> Result<Inputs> {
    let config = config::load(ctx.config.as_deref())?;
    let state = state::load(ctx.state.as_deref())?;
    let result = compute(&config.config, &state);
    log::debug!("diff has {} entries", result.len());

    Ok(Inputs {
        config,
        state,
        result,
    })
}

// ============================================================================
// Diff listing
// ============================================================================

/// Print every entry that is not already in sync, grouped by kind
///
/// Returns whether anything was printed.
pub fn print_diff(ctx: &Context, result: &DiffResult) -> bool {
    let sources: Vec<_> = result
        .sources
        .iter()
        .filter(|d| d.action != Action::None)
        .map(|d| (d.action, d.name.as_str(), source_detail(d)))
        .collect();
    let plugins: Vec<_> = result
        .plugins
        .iter()
        .filter(|d| d.action != Action::None)
        .map(|d| (d.action, d.name.as_str(), plugin_detail(d)))
        .collect();
    let servers: Vec<_> = result
        .mcp_servers
        .iter()
        .filter(|d| d.action != Action::None)
        .map(|d| (d.action, d.name.as_str(), mcp_detail(d)))
        .collect();

    let mut printed = false;
    for (title, rows) in [
        ("Sources", sources),
        ("Plugins", plugins),
        ("MCP servers", servers),
    ] {
        if rows.is_empty() {
            continue;
        }
        printed = true;
        ui::section(title);
        for (action, name, detail) in rows {
            println!("  {} {:<8} {}", ui::action_symbol(action), action.as_str(), name.bold());
            if !ctx.quiet && !detail.is_empty() {
                ui::dim(&format!("           {detail}"));
            }
        }
    }
    printed
}

fn source_detail(diff: &SourceDiff) -> String {
    let desired = diff
        .desired
        .as_ref()
        .and_then(|d| d.resolved().ok())
        .map(|r| r.location);
    let current = diff.current.as_ref().map(|c| c.resolved().location);

    match (diff.action, current, desired) {
        (Action::Update, Some(current), Some(desired)) => format!("{current} → {desired}"),
        (Action::Remove, ..) => "not in config (left installed)".to_string(),
        (Action::SkipGit, ..) => "uncommitted changes in local repository".to_string(),
        (_, _, Some(desired)) => desired,
        _ => String::new(),
    }
}

fn plugin_detail(diff: &PluginDiff) -> String {
    let current = diff.current.as_ref();
    let desired = diff.desired.as_ref();

    match diff.action {
        Action::Add => {
            let mut parts = Vec::new();
            if let Some(scope) = desired.and_then(|d| d.scope) {
                parts.push(format!("scope {scope}"));
            }
            if desired.is_some_and(|d| !d.desired_enabled()) {
                parts.push("disabled".to_string());
            }
            parts.join(", ")
        }
        Action::Update => match (current, desired.and_then(|d| d.scope)) {
            (Some(current), Some(scope)) => format!("reinstall: scope {} → {scope}", current.scope),
            _ => "reinstall".to_string(),
        },
        Action::Remove => "not in config (left installed)".to_string(),
        Action::SkipGit => "source has uncommitted changes".to_string(),
        _ => current
            .and_then(|c| c.version.as_deref())
            .map(|v| format!("version {v}"))
            .unwrap_or_default(),
    }
}

fn mcp_detail(diff: &McpServerDiff) -> String {
    let target = diff.desired.as_ref().map(|d| {
        d.url.clone().unwrap_or_else(|| {
            std::iter::once(d.command.clone().unwrap_or_default())
                .chain(d.args.iter().cloned())
                .collect::<Vec<_>>()
                .join(" ")
        })
    });

    match diff.action {
        Action::Remove => "not in config (left registered)".to_string(),
        _ if diff.requires_oauth => format!(
            "{} {}",
            target.unwrap_or_default(),
            "(requires OAuth, add manually)".yellow()
        ),
        _ => target.unwrap_or_default(),
    }
}
