use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "plugsync")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Keep plugin marketplaces, plugins and MCP servers in sync", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: config.toml or config.json in the config dir)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Read observed state from a JSON snapshot instead of the host's files
    #[arg(long, global = true, value_name = "PATH")]
    pub state: Option<PathBuf>,

    /// Host program that receives install commands
    #[arg(
        long,
        global = true,
        env = "PLUGSYNC_PROGRAM",
        default_value = reconcile::executor::DEFAULT_PROGRAM
    )]
    pub program: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show a summary of pending changes
    Status,

    /// Preview what apply would change
    Diff(DiffArgs),

    /// Make the host match the config
    Apply(ApplyArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct DiffArgs {
    /// Print the diff as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
#[allow(clippy::struct_excessive_bools)]
pub struct ApplyArgs {
    /// Print the commands that would run, without running them
    #[arg(short = 'n', long, alias = "show-commands")]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Choose which changes to apply
    #[arg(short, long, conflicts_with = "json")]
    pub interactive: bool,

    /// Apply entries backed by local repositories even with uncommitted changes
    #[arg(long)]
    pub no_git_check: bool,

    /// Seconds each host command may run before it is killed
    #[arg(
        long,
        value_name = "SECS",
        default_value_t = 300,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout: u64,

    /// Exit with an error if any entry failed
    #[arg(long)]
    pub strict: bool,

    /// Print the plan or result as JSON
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_apply_flags() {
        let cli = Cli::try_parse_from([
            "plugsync",
            "--program",
            "claude-dev",
            "apply",
            "--show-commands",
            "--no-git-check",
            "--timeout",
            "30",
        ])
        .unwrap();

        assert_eq!(cli.program, "claude-dev");
        match cli.command {
            Command::Apply(args) => {
                assert!(args.dry_run);
                assert!(args.no_git_check);
                assert_eq!(args.timeout, 30);
                assert!(!args.strict);
            }
            _ => panic!("expected apply"),
        }
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        assert!(Cli::try_parse_from(["plugsync", "apply", "--timeout", "0"]).is_err());
        let cli = Cli::try_parse_from(["plugsync", "apply"]).unwrap();
        match cli.command {
            Command::Apply(args) => assert_eq!(args.timeout, 300),
            _ => panic!("expected apply"),
        }
    }

    #[test]
    fn test_interactive_conflicts_with_json() {
        assert!(Cli::try_parse_from(["plugsync", "apply", "-i", "--json"]).is_err());
    }
}
