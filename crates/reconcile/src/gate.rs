//! Git-status gate for local-path-backed sources and plugins
//!
//! Directory sources, and plugins installed from them, are checked for
//! version-control cleanliness before anything is applied. Only uncommitted
//! changes block an entry (relabeled to [`Action::SkipGit`]); every other
//! status is informational. A check that fails never blocks.

use crate::action::{Action, EntityKind, ItemKey};
use crate::context::CommandRunner;
use crate::diff::{DiffResult, PluginDiff, SourceDiff};
use crate::types::{Config, SourceType, split_plugin_name};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

/// Classification of a local repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum GitStatus {
    /// Clean and in sync with its upstream
    Clean,
    /// Local commits not pushed
    Ahead { commits: u32 },
    /// Upstream commits not pulled
    Behind { commits: u32 },
    /// Both ahead and behind
    Diverged { ahead: u32, behind: u32 },
    /// Modified, staged or untracked files
    Uncommitted,
    /// The path is not inside a git work tree
    NotARepository,
    /// Status could not be determined
    CheckFailed { reason: String },
}

impl GitStatus {
    /// Whether this status blocks applying the entry.
    pub fn blocks(&self) -> bool {
        matches!(self, Self::Uncommitted)
    }

    /// Whether there is anything worth telling the operator.
    pub fn is_noteworthy(&self) -> bool {
        !matches!(self, Self::Clean)
    }
}

impl fmt::Display for GitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clean => write!(f, "clean"),
            Self::Ahead { commits } => write!(f, "{commits} commit(s) ahead of remote"),
            Self::Behind { commits } => write!(f, "{commits} commit(s) behind remote"),
            Self::Diverged { ahead, behind } => {
                write!(f, "diverged ({ahead} ahead, {behind} behind)")
            }
            Self::Uncommitted => write!(f, "uncommitted changes"),
            Self::NotARepository => write!(f, "not a git repository"),
            Self::CheckFailed { reason } => write!(f, "git status check failed: {reason}"),
        }
    }
}

/// Source of git status classifications.
pub trait GitStatusProvider {
    fn status(&self, path: &Path) -> GitStatus;
}

/// Something the operator should know about an entry's repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateMessage {
    pub key: ItemKey,
    pub path: PathBuf,
    pub status: GitStatus,
    /// Whether the entry was relabeled to `skip_git`
    pub blocked: bool,
}

impl fmt::Display for GateMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.key, self.path.display(), self.status)?;
        if self.blocked {
            write!(f, " - skipped")?;
        }
        Ok(())
    }
}

/// Outcome of the gate: a rebuilt diff plus messages
#[derive(Debug, Clone, Default)]
pub struct GateReport {
    pub result: DiffResult,
    pub messages: Vec<GateMessage>,
}

impl GateReport {
    /// Number of entries relabeled to `skip_git`
    pub fn blocked(&self) -> usize {
        self.messages.iter().filter(|m| m.blocked).count()
    }
}

fn local_path(config: &Config, source_name: &str) -> Option<PathBuf> {
    let source = config.find_source(source_name)?;
    if source.source_type != SourceType::Directory {
        return None;
    }
    source.location().map(PathBuf::from)
}

fn source_path(diff: &SourceDiff) -> Option<PathBuf> {
    let desired = diff.desired.as_ref()?;
    if desired.source_type != SourceType::Directory {
        return None;
    }
    desired.location().map(PathBuf::from)
}

fn plugin_path(config: &Config, diff: &PluginDiff) -> Option<PathBuf> {
    let alias = split_plugin_name(&diff.name).1?;
    local_path(config, alias)
}

/// Run the gate over a diff.
///
/// Returns a new result; only the `action` of blocked entries differs from
/// the input. Entries that are not actionable are never relabeled, which
/// makes the gate idempotent.
pub fn apply_git_gate(
    result: &DiffResult,
    config: &Config,
    provider: &dyn GitStatusProvider,
) -> GateReport {
    let mut messages = Vec::new();

    let mut check = |kind: EntityKind, name: &str, action: Action, path: Option<PathBuf>| {
        let Some(path) = path else {
            return action;
        };
        if !action.is_actionable() {
            return action;
        }

        let status = provider.status(&path);
        let blocked = status.blocks();
        log::debug!("git status for {kind} '{name}' at {}: {status}", path.display());

        if status.is_noteworthy() {
            messages.push(GateMessage {
                key: ItemKey::new(kind, name),
                path,
                status,
                blocked,
            });
        }
        if blocked { Action::SkipGit } else { action }
    };

    let sources = result
        .sources
        .iter()
        .map(|d| {
            let action = check(EntityKind::Source, &d.name, d.action, source_path(d));
            d.with_action(action)
        })
        .collect();
    let plugins = result
        .plugins
        .iter()
        .map(|d| {
            let action = check(EntityKind::Plugin, &d.name, d.action, plugin_path(config, d));
            d.with_action(action)
        })
        .collect();

    GateReport {
        result: DiffResult {
            sources,
            plugins,
            mcp_servers: result.mcp_servers.clone(),
        },
        messages,
    }
}

// ============================================================================
// git CLI provider
// ============================================================================

static BRANCH_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^## .*?(?:\[(?:ahead (\d+))?(?:, )?(?:behind (\d+))?\])?$")
        .expect("branch header regex is valid")
});

/// Classify `git status --porcelain=v1 --branch` output.
pub fn parse_porcelain_status(output: &str) -> GitStatus {
    let mut lines = output.lines().filter(|l| !l.trim().is_empty());

    let header = match lines.next() {
        Some(line) if line.starts_with("## ") => line,
        Some(_) => return GitStatus::Uncommitted,
        None => return GitStatus::Clean,
    };

    if lines.next().is_some() {
        return GitStatus::Uncommitted;
    }

    let parse = |m: Option<regex::Match<'_>>| {
        m.and_then(|m| m.as_str().parse::<u32>().ok()).unwrap_or(0)
    };
    let (ahead, behind) = BRANCH_HEADER
        .captures(header.trim_end())
        .map_or((0, 0), |caps| (parse(caps.get(1)), parse(caps.get(2))));

    match (ahead, behind) {
        (0, 0) => GitStatus::Clean,
        (commits, 0) => GitStatus::Ahead { commits },
        (0, commits) => GitStatus::Behind { commits },
        (ahead, behind) => GitStatus::Diverged { ahead, behind },
    }
}

/// [`GitStatusProvider`] that shells out to `git` through a [`CommandRunner`].
pub struct GitCli<'a, R: CommandRunner + ?Sized> {
    runner: &'a R,
    timeout: Option<Duration>,
}

impl<'a, R: CommandRunner + ?Sized> GitCli<'a, R> {
    pub fn new(runner: &'a R) -> Self {
        Self {
            runner,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl<R: CommandRunner + ?Sized> GitStatusProvider for GitCli<'_, R> {
    fn status(&self, path: &Path) -> GitStatus {
        if !path.is_dir() {
            return GitStatus::NotARepository;
        }

        let path_arg = path.display().to_string();
        let args: Vec<String> = ["-C", &path_arg, "status", "--porcelain=v1", "--branch"]
            .iter()
            .map(|a| (*a).to_string())
            .collect();

        match self.runner.run("git", &args, self.timeout) {
            Ok(output) if output.success => parse_porcelain_status(&output.stdout_str()),
            Ok(output) => {
                let stderr = output.stderr_str();
                if stderr.contains("not a git repository") {
                    GitStatus::NotARepository
                } else {
                    GitStatus::CheckFailed {
                        reason: stderr.trim().to_string(),
                    }
                }
            }
            Err(e) => GitStatus::CheckFailed {
                reason: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CommandOutput;
    use crate::types::{Plugin, Source};
    use std::collections::HashMap;

    struct FixedStatus(HashMap<PathBuf, GitStatus>);

    impl GitStatusProvider for FixedStatus {
        fn status(&self, path: &Path) -> GitStatus {
            self.0.get(path).cloned().unwrap_or(GitStatus::Clean)
        }
    }

    fn directory_source(name: &str, path: &str) -> Source {
        Source {
            name: name.to_string(),
            source_type: SourceType::Directory,
            repo: None,
            url: None,
            path: Some(path.to_string()),
        }
    }

    fn fixture() -> (Config, DiffResult) {
        let config = Config {
            sources: vec![directory_source("local", "/work/plugins")],
            plugins: vec![
                Plugin {
                    name: "fmt@local".to_string(),
                    enabled: None,
                    scope: None,
                },
                Plugin {
                    name: "remote@elsewhere".to_string(),
                    enabled: None,
                    scope: None,
                },
            ],
            ..Default::default()
        };
        let result = crate::diff::compute(&config, &crate::types::State::default());
        (config, result)
    }

    #[test]
    fn test_uncommitted_blocks_source_and_its_plugins() {
        let (config, result) = fixture();
        let provider = FixedStatus(HashMap::from([(
            PathBuf::from("/work/plugins"),
            GitStatus::Uncommitted,
        )]));

        let report = apply_git_gate(&result, &config, &provider);
        assert_eq!(report.result.sources[0].action, Action::SkipGit);
        assert_eq!(report.result.plugins[0].action, Action::SkipGit);
        assert_eq!(report.result.plugins[1].action, Action::Add);
        assert_eq!(report.blocked(), 2);

        // payloads untouched
        assert_eq!(report.result.sources[0].desired, result.sources[0].desired);
        // input untouched
        assert_eq!(result.sources[0].action, Action::Add);
    }

    #[test]
    fn test_ahead_behind_are_informational() {
        let (config, result) = fixture();
        let provider = FixedStatus(HashMap::from([(
            PathBuf::from("/work/plugins"),
            GitStatus::Ahead { commits: 2 },
        )]));

        let report = apply_git_gate(&result, &config, &provider);
        assert_eq!(report.result, result);
        assert_eq!(report.messages.len(), 2);
        assert!(report.messages.iter().all(|m| !m.blocked));
    }

    #[test]
    fn test_check_failed_fails_open() {
        let (config, result) = fixture();
        let provider = FixedStatus(HashMap::from([(
            PathBuf::from("/work/plugins"),
            GitStatus::CheckFailed {
                reason: "boom".to_string(),
            },
        )]));

        let report = apply_git_gate(&result, &config, &provider);
        assert_eq!(report.result, result);
        assert_eq!(report.blocked(), 0);
    }

    #[test]
    fn test_gate_is_idempotent() {
        let (config, result) = fixture();
        let provider = FixedStatus(HashMap::from([(
            PathBuf::from("/work/plugins"),
            GitStatus::Uncommitted,
        )]));

        let once = apply_git_gate(&result, &config, &provider);
        let twice = apply_git_gate(&once.result, &config, &provider);
        assert_eq!(once.result, twice.result);
    }

    #[test]
    fn test_parse_clean() {
        assert_eq!(
            parse_porcelain_status("## main...origin/main\n"),
            GitStatus::Clean
        );
        assert_eq!(parse_porcelain_status("## main\n"), GitStatus::Clean);
        assert_eq!(parse_porcelain_status(""), GitStatus::Clean);
    }

    #[test]
    fn test_parse_ahead_behind() {
        assert_eq!(
            parse_porcelain_status("## main...origin/main [ahead 3]"),
            GitStatus::Ahead { commits: 3 }
        );
        assert_eq!(
            parse_porcelain_status("## main...origin/main [behind 1]"),
            GitStatus::Behind { commits: 1 }
        );
        assert_eq!(
            parse_porcelain_status("## main...origin/main [ahead 2, behind 5]"),
            GitStatus::Diverged {
                ahead: 2,
                behind: 5
            }
        );
    }

    #[test]
    fn test_parse_dirty() {
        let output = "## main...origin/main [ahead 1]\n M src/lib.rs\n?? notes.txt\n";
        assert_eq!(parse_porcelain_status(output), GitStatus::Uncommitted);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(GitStatus::Uncommitted.to_string(), "uncommitted changes");
        assert_eq!(
            GitStatus::Behind { commits: 4 }.to_string(),
            "4 commit(s) behind remote"
        );
    }

    /// Answers every git call with a canned result
    struct CannedGit(fn() -> crate::Result<CommandOutput>);

    impl CommandRunner for CannedGit {
        fn run(
            &self,
            program: &str,
            args: &[String],
            _timeout: Option<Duration>,
        ) -> crate::Result<CommandOutput> {
            assert_eq!(program, "git");
            assert_eq!(args[2], "status");
            (self.0)()
        }
    }

    fn status_with(answer: fn() -> crate::Result<CommandOutput>) -> GitStatus {
        GitCli::new(&CannedGit(answer)).status(&std::env::temp_dir())
    }

    #[test]
    fn test_git_cli_parses_successful_output() {
        let status = status_with(|| Ok(CommandOutput::ok("## main...origin/main\n M a.rs\n")));
        assert_eq!(status, GitStatus::Uncommitted);
    }

    #[test]
    fn test_git_cli_detects_non_repository() {
        let status = status_with(|| {
            Ok(CommandOutput {
                stdout: Vec::new(),
                stderr: b"fatal: not a git repository (or any of the parent directories): .git\n"
                    .to_vec(),
                success: false,
            })
        });
        assert_eq!(status, GitStatus::NotARepository);
    }

    #[test]
    fn test_git_cli_fails_open() {
        let status = status_with(|| {
            Ok(CommandOutput {
                stdout: Vec::new(),
                stderr: b"fatal: detected dubious ownership\n".to_vec(),
                success: false,
            })
        });
        assert_eq!(
            status,
            GitStatus::CheckFailed {
                reason: "fatal: detected dubious ownership".to_string()
            }
        );
        assert!(!status.blocks());

        let status = status_with(|| {
            Err(crate::Error::Timeout {
                command: "git status".to_string(),
                timeout: Duration::from_secs(5),
            })
        });
        assert!(matches!(status, GitStatus::CheckFailed { .. }));
        assert!(!status.blocks());
    }

    #[test]
    fn test_git_cli_missing_path_is_not_a_repository() {
        let runner = CannedGit(|| panic!("git must not run for a missing path"));
        let status = GitCli::new(&runner).status(Path::new("/definitely/not/here/plugins"));
        assert_eq!(status, GitStatus::NotARepository);
    }
}
