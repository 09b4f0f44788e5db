use anyhow::Result;

use crate::Context;
use crate::cli::DiffArgs;
use crate::commands::{load_inputs, print_diff};
use crate::ui;

pub fn run(ctx: &Context, args: &DiffArgs) -> Result<()> {
    let inputs = load_inputs(ctx)?;
    let result = &inputs.result;

    if args.json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    ui::header("Plugin Sync Diff");

    if !print_diff(ctx, result) {
        println!();
        ui::success("No changes - installed plugins match the config");
        return Ok(());
    }

    let summary = result.summary();
    println!();
    ui::info(&format!(
        "{} to add, {} to update, {} need attention",
        summary.add, summary.update, summary.attention
    ));
    if summary.attention > 0 {
        ui::dim("Entries marked - are never removed automatically.");
    }

    Ok(())
}
