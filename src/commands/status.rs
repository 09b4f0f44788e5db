use anyhow::Result;
use colored::Colorize;

use crate::Context;
use crate::commands::load_inputs;
use crate::runner;
use crate::ui;

pub fn run(ctx: &Context) -> Result<()> {
    let inputs = load_inputs(ctx)?;
    let config = &inputs.config.config;
    let state = &inputs.state;

    ui::header("Plugin Sync Status");

    ui::section("Setup");
    ui::kv(
        "Config",
        &format!(
            "{} ({})",
            inputs.config.path.display(),
            inputs.config.format.extension()
        ),
    );
    let host = if runner::command_exists(&ctx.program) {
        format!("{} {}", ctx.program, "✓".green())
    } else {
        format!("{} {}", ctx.program, "not found on PATH".yellow())
    };
    ui::kv("Host program", &host);

    ui::section("Declared vs installed");
    ui::kv(
        "Sources",
        &format!("{} declared, {} known", config.sources.len(), state.sources.len()),
    );
    ui::kv(
        "Plugins",
        &format!(
            "{} declared, {} installed",
            config.plugins.len(),
            state.plugins.len()
        ),
    );
    ui::kv(
        "MCP servers",
        &format!(
            "{} declared, {} registered",
            config.mcp_servers.len(),
            state.mcp_servers.len()
        ),
    );

    let summary = inputs.result.summary();
    let oauth = inputs
        .result
        .mcp_servers
        .iter()
        .filter(|d| d.requires_oauth)
        .count();

    ui::section("Pending");
    ui::kv("Add", &summary.add.to_string());
    ui::kv("Update", &summary.update.to_string());
    ui::kv("Attention", &summary.attention.to_string());
    if oauth > 0 {
        ui::kv("OAuth", &format!("{} need manual setup", ui::count(oauth, "server")));
    }

    println!();
    if summary.has_changes() {
        ui::info(&format!(
            "{} pending. Run 'plugsync diff' for details.",
            ui::count(summary.total_changes(), "change")
        ));
    } else {
        ui::success("Everything is in sync");
    }

    Ok(())
}
