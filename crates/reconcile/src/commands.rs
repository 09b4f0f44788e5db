//! Rendering diff entries into host commands
//!
//! The same step builders feed both the dry-run listing
//! ([`generate_commands`]) and the executor, so what is shown is what runs.
//! Output order is always sources, plugins, MCP servers.

use crate::action::{Action, EntityKind};
use crate::diff::{DiffResult, McpServerDiff, PluginDiff, SourceDiff};
use crate::error::{Error, Result};
use crate::types::{McpServer, Scope, Transport};
use serde::{Deserialize, Serialize};

const MASK: &str = "***";

/// One external command for a diff entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandStep {
    /// Arguments passed to the host program
    pub args: Vec<String>,
    /// Same arguments with credential values masked
    pub display_args: Vec<String>,
    pub description: String,
}

impl CommandStep {
    fn new(args: Vec<String>, description: impl Into<String>) -> Self {
        Self {
            display_args: args.clone(),
            args,
            description: description.into(),
        }
    }

    /// Human-readable command line.
    pub fn display(&self, program: &str) -> String {
        command_line(program, &self.display_args)
    }
}

/// A rendered command as shown by `--show-commands`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedCommand {
    pub kind: EntityKind,
    pub name: String,
    pub action: Action,
    /// Command line, or a `#` comment for entries that are never executed
    pub command: String,
    pub description: String,
    /// False for informational comments
    pub executable: bool,
}

/// Join a program and its arguments, quoting arguments that need it.
pub fn command_line(program: &str, args: &[String]) -> String {
    std::iter::once(program.to_string())
        .chain(args.iter().map(|arg| shell_quote(arg)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:@=+,%~".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

fn strings(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| (*p).to_string()).collect()
}

fn push_scope(args: &mut Vec<String>, scope: Option<Scope>) {
    if let Some(scope) = scope.filter(|s| !s.is_default()) {
        args.push("--scope".to_string());
        args.push(scope.to_string());
    }
}

// ============================================================================
// Sources
// ============================================================================

/// Commands needed to apply an actionable source entry.
pub fn source_steps(diff: &SourceDiff) -> Result<Vec<CommandStep>> {
    let desired = diff
        .desired
        .as_ref()
        .ok_or_else(|| Error::config(&diff.name, "no desired source"))?;
    let resolved = desired.resolved()?;

    let add = CommandStep::new(
        strings(&["plugin", "marketplace", "add", &resolved.location]),
        format!("Add {} source '{}'", resolved.source_type, diff.name),
    );

    match diff.action {
        Action::Add => Ok(vec![add]),
        Action::Update => Ok(vec![
            CommandStep::new(
                strings(&["plugin", "marketplace", "remove", &diff.name]),
                format!("Remove outdated source '{}'", diff.name),
            ),
            add,
        ]),
        other => Err(Error::config(
            &diff.name,
            format!("action '{other}' does not apply to sources"),
        )),
    }
}

// ============================================================================
// Plugins
// ============================================================================

fn install_step(name: &str, scope: Option<Scope>) -> CommandStep {
    let mut args = strings(&["plugin", "install", name]);
    push_scope(&mut args, scope);
    CommandStep::new(args, format!("Install plugin '{name}'"))
}

fn toggle_step(name: &str, enable: bool, scope: Option<Scope>) -> CommandStep {
    let verb = if enable { "enable" } else { "disable" };
    let mut args = strings(&["plugin", verb, name]);
    push_scope(&mut args, scope);
    let description = if enable {
        format!("Enable plugin '{name}'")
    } else {
        format!("Disable plugin '{name}'")
    };
    CommandStep::new(args, description)
}

/// Commands needed to apply an actionable plugin entry.
pub fn plugin_steps(diff: &PluginDiff) -> Result<Vec<CommandStep>> {
    let name = diff.name.as_str();
    match diff.action {
        Action::Add => {
            let desired = diff
                .desired
                .as_ref()
                .ok_or_else(|| Error::config(name, "no desired plugin"))?;
            let mut steps = vec![install_step(name, desired.scope)];
            if !desired.desired_enabled() {
                steps.push(toggle_step(name, false, desired.scope));
            }
            Ok(steps)
        }
        Action::Update => {
            let desired = diff
                .desired
                .as_ref()
                .ok_or_else(|| Error::config(name, "no desired plugin"))?;
            let current = diff
                .current
                .as_ref()
                .ok_or_else(|| Error::config(name, "no installed plugin to reinstall"))?;

            let mut uninstall = strings(&["plugin", "uninstall", name]);
            push_scope(&mut uninstall, Some(current.scope));
            let mut steps = vec![
                CommandStep::new(
                    uninstall,
                    format!("Uninstall plugin '{name}' from {} scope", current.scope),
                ),
                install_step(name, desired.scope),
            ];
            if !desired.desired_enabled() {
                steps.push(toggle_step(name, false, desired.scope));
            }
            Ok(steps)
        }
        Action::Enable | Action::Disable => {
            let current = diff
                .current
                .as_ref()
                .ok_or_else(|| Error::config(name, "no installed plugin to toggle"))?;
            Ok(vec![toggle_step(
                name,
                diff.action == Action::Enable,
                Some(current.scope),
            )])
        }
        other => Err(Error::config(
            name,
            format!("action '{other}' does not apply to plugins"),
        )),
    }
}

// ============================================================================
// MCP servers
// ============================================================================

fn mcp_add_step(name: &str, server: &McpServer) -> Result<CommandStep> {
    let mut args = strings(&["mcp", "add"]);
    if server.transport.is_http_based() {
        args.push("--transport".to_string());
        args.push(server.transport.to_string());
    }
    push_scope(&mut args, server.scope);

    let mut display_args = args.clone();
    for (key, value) in &server.env {
        args.push("-e".to_string());
        args.push(format!("{key}={value}"));
        display_args.push("-e".to_string());
        display_args.push(format!("{key}={MASK}"));
    }
    for (key, value) in &server.headers {
        args.push("-H".to_string());
        args.push(format!("{key}: {value}"));
        display_args.push("-H".to_string());
        display_args.push(format!("{key}: {MASK}"));
    }

    let mut tail = vec![name.to_string()];
    match server.transport {
        Transport::Stdio => {
            let command = server
                .command
                .as_deref()
                .filter(|c| !c.trim().is_empty())
                .ok_or_else(|| Error::config(name, "stdio server has no command"))?;
            tail.push("--".to_string());
            tail.push(command.to_string());
            tail.extend(server.args.iter().cloned());
        }
        Transport::Http | Transport::Sse => {
            let url = server
                .url
                .as_deref()
                .filter(|u| !u.trim().is_empty())
                .ok_or_else(|| {
                    Error::config(name, format!("{} server has no url", server.transport))
                })?;
            tail.push(url.to_string());
        }
    }
    args.extend(tail.iter().cloned());
    display_args.extend(tail);

    Ok(CommandStep {
        args,
        display_args,
        description: format!("Add {} MCP server '{name}'", server.transport),
    })
}

/// Commands needed to apply an actionable MCP server entry.
///
/// Servers requiring OAuth have no executable steps; see [`render_mcp`].
pub fn mcp_steps(diff: &McpServerDiff) -> Result<Vec<CommandStep>> {
    let name = diff.name.as_str();
    let desired = diff
        .desired
        .as_ref()
        .ok_or_else(|| Error::config(name, "no desired MCP server"))?;

    match diff.action {
        Action::Add => Ok(vec![mcp_add_step(name, desired)?]),
        Action::Update => {
            let mut remove = strings(&["mcp", "remove", name]);
            push_scope(&mut remove, diff.current.as_ref().and_then(|c| c.scope));
            Ok(vec![
                CommandStep::new(remove, format!("Remove outdated MCP server '{name}'")),
                mcp_add_step(name, desired)?,
            ])
        }
        other => Err(Error::config(
            name,
            format!("action '{other}' does not apply to MCP servers"),
        )),
    }
}

/// Manual setup instruction for a server that needs OAuth.
pub fn oauth_instruction(program: &str, diff: &McpServerDiff) -> String {
    let url = diff
        .desired
        .as_ref()
        .and_then(|d| d.url.as_deref())
        .unwrap_or("<url>");
    let transport = diff
        .desired
        .as_ref()
        .map_or(Transport::Http, |d| d.transport);
    format!(
        "# {program} mcp add --transport {transport} {} {}  (then authorize via /mcp)",
        shell_quote(&diff.name),
        shell_quote(url)
    )
}

// ============================================================================
// Generator
// ============================================================================

fn comment(program: &str, args: &[&str]) -> String {
    format!("# {}", command_line(program, &strings(args)))
}

fn skip_git_line(kind: EntityKind, name: &str) -> String {
    format!("# skipped {kind} {name}: uncommitted changes in local repository")
}

fn render_steps(
    program: &str,
    kind: EntityKind,
    name: &str,
    action: Action,
    steps: Result<Vec<CommandStep>>,
) -> Vec<PlannedCommand> {
    match steps {
        Ok(steps) => steps
            .into_iter()
            .map(|step| PlannedCommand {
                kind,
                name: name.to_string(),
                action,
                command: step.display(program),
                description: step.description,
                executable: true,
            })
            .collect(),
        Err(e) => vec![PlannedCommand {
            kind,
            name: name.to_string(),
            action,
            command: format!("# error: {e}"),
            description: format!("Cannot render {kind} '{name}'"),
            executable: false,
        }],
    }
}

fn informational(
    kind: EntityKind,
    name: &str,
    action: Action,
    command: String,
    description: String,
) -> Vec<PlannedCommand> {
    vec![PlannedCommand {
        kind,
        name: name.to_string(),
        action,
        command,
        description,
        executable: false,
    }]
}

fn render_source(program: &str, diff: &SourceDiff) -> Vec<PlannedCommand> {
    let kind = EntityKind::Source;
    match diff.action {
        Action::None => Vec::new(),
        Action::Remove => informational(
            kind,
            &diff.name,
            diff.action,
            comment(program, &["plugin", "marketplace", "remove", &diff.name]),
            format!("Source '{}' is not declared (not removed automatically)", diff.name),
        ),
        Action::SkipGit => informational(
            kind,
            &diff.name,
            diff.action,
            skip_git_line(kind, &diff.name),
            format!("Source '{}' has uncommitted changes", diff.name),
        ),
        action => render_steps(program, kind, &diff.name, action, source_steps(diff)),
    }
}

fn render_plugin(program: &str, diff: &PluginDiff) -> Vec<PlannedCommand> {
    let kind = EntityKind::Plugin;
    match diff.action {
        Action::None => Vec::new(),
        Action::Remove => informational(
            kind,
            &diff.name,
            diff.action,
            comment(program, &["plugin", "uninstall", &diff.name]),
            format!("Plugin '{}' is not declared (not removed automatically)", diff.name),
        ),
        Action::SkipGit => informational(
            kind,
            &diff.name,
            diff.action,
            skip_git_line(kind, &diff.name),
            format!("Plugin '{}' comes from a source with uncommitted changes", diff.name),
        ),
        action => render_steps(program, kind, &diff.name, action, plugin_steps(diff)),
    }
}

fn render_mcp(program: &str, diff: &McpServerDiff) -> Vec<PlannedCommand> {
    let kind = EntityKind::Mcp;
    match diff.action {
        Action::None => Vec::new(),
        Action::Remove => informational(
            kind,
            &diff.name,
            diff.action,
            comment(program, &["mcp", "remove", &diff.name]),
            format!("MCP server '{}' is not declared (not removed automatically)", diff.name),
        ),
        Action::SkipGit => informational(
            kind,
            &diff.name,
            diff.action,
            skip_git_line(kind, &diff.name),
            format!("MCP server '{}' is blocked by git status", diff.name),
        ),
        Action::Add | Action::Update if diff.requires_oauth => informational(
            kind,
            &diff.name,
            diff.action,
            oauth_instruction(program, diff),
            format!("MCP server '{}' requires OAuth; add and authorize it manually", diff.name),
        ),
        action => render_steps(program, kind, &diff.name, action, mcp_steps(diff)),
    }
}

/// Render a diff into an ordered list of commands without executing anything.
pub fn generate_commands(result: &DiffResult, program: &str) -> Vec<PlannedCommand> {
    let sources = result.sources.iter().flat_map(|d| render_source(program, d));
    let plugins = result.plugins.iter().flat_map(|d| render_plugin(program, d));
    let servers = result.mcp_servers.iter().flat_map(|d| render_mcp(program, d));
    sources.chain(plugins).chain(servers).collect()
}

impl DiffResult {
    /// Dry-run rendering, see [`generate_commands`].
    pub fn generate_commands(&self, program: &str) -> Vec<PlannedCommand> {
        generate_commands(self, program)
    }
}
