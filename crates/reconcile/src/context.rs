//! Runner and progress traits
//!
//! These traits keep the reconcile crate free of process spawning and UI
//! code. The binary provides a real runner; tests provide recording mocks.

use crate::action::ItemKey;
use crate::commands::command_line;
use crate::error::{Error, Result};
use crate::executor::Operation;
use std::process::Output;
use std::time::Duration;

/// Output from an external command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub success: bool,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: output.stdout,
            stderr: output.stderr,
            success: output.status.success(),
        }
    }
}

impl CommandOutput {
    /// Successful output with the given stdout
    pub fn ok(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: Vec::new(),
            success: true,
        }
    }

    /// Get stdout as a string
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// Get stderr as a string
    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }

    /// Stdout and stderr together, trimmed
    pub fn combined(&self) -> String {
        let stdout = self.stdout_str();
        let stderr = self.stderr_str();
        match (stdout.trim(), stderr.trim()) {
            ("", err) => err.to_string(),
            (out, "") => out.to_string(),
            (out, err) => format!("{out}\n{err}"),
        }
    }
}

/// Executes external commands on behalf of the core.
///
/// The only seam through which reconciliation touches processes. A single
/// blocking call; implementations should honor `timeout` when given.
pub trait CommandRunner {
    /// Run a command and return its output, successful or not.
    ///
    /// `Err` is reserved for commands that could not run or finish
    /// (spawn failure, timeout).
    fn run(&self, program: &str, args: &[String], timeout: Option<Duration>)
    -> Result<CommandOutput>;

    /// Run a command, turning unsuccessful exits into [`Error::CommandFailed`].
    fn run_checked(
        &self,
        program: &str,
        args: &[String],
        timeout: Option<Duration>,
    ) -> Result<CommandOutput> {
        let output = self.run(program, args, timeout)?;
        if !output.success {
            return Err(Error::CommandFailed {
                command: command_line(program, args),
                output: output.combined(),
            });
        }
        Ok(output)
    }
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Option<Duration>,
    ) -> Result<CommandOutput> {
        (**self).run(program, args, timeout)
    }
}

/// Progress callback for execution
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback {
    /// Called before an entry's first command runs
    fn on_item_start(&mut self, key: &ItemKey, description: &str);

    /// Called after each attempted command
    fn on_operation(&mut self, operation: &Operation);

    /// Called when an entry is only surfaced, never executed
    fn on_attention(&mut self, message: &str);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_item_start(&mut self, _key: &ItemKey, _description: &str) {}
    fn on_operation(&mut self, _operation: &Operation) {}
    fn on_attention(&mut self, _message: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl CommandRunner for Failing {
        fn run(
            &self,
            _program: &str,
            _args: &[String],
            _timeout: Option<Duration>,
        ) -> Result<CommandOutput> {
            Ok(CommandOutput {
                stdout: b"partial\n".to_vec(),
                stderr: b"Error: plugin not found\n".to_vec(),
                success: false,
            })
        }
    }

    #[test]
    fn test_combined_output() {
        let output = CommandOutput {
            stdout: b"  \n".to_vec(),
            stderr: b"boom\n".to_vec(),
            success: false,
        };
        assert_eq!(output.combined(), "boom");
        assert_eq!(CommandOutput::ok("done\n").combined(), "done");
    }

    #[test]
    fn test_run_checked_captures_output() {
        let args = vec!["plugin".to_string(), "install".to_string(), "x".to_string()];
        let err = Failing.run_checked("claude", &args, None).unwrap_err();
        match err {
            Error::CommandFailed { command, output } => {
                assert_eq!(command, "claude plugin install x");
                assert_eq!(output, "partial\nError: plugin not found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_runner_by_reference() {
        let runner = &Failing;
        assert!(runner.run("claude", &[], None).is_ok());
    }
}
