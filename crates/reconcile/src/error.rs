//! Error types for reconciliation.
//!
//! Per-entry failures never abort a run; they are captured into the
//! [`ExecutionResult`](crate::executor::ExecutionResult). Only
//! [`Error::InvalidOptions`] is returned from `Executor::execute` itself.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while reconciling.
#[derive(Debug, Error)]
pub enum Error {
    /// A diff entry is missing the payload its action requires, or the
    /// payload cannot be rendered into a command.
    #[error("invalid configuration for {name}: {message}")]
    Config {
        /// Name of the entry that could not be processed
        name: String,
        /// What was missing or malformed
        message: String,
    },

    /// The external command exited unsuccessfully
    #[error("command failed: {command}: {output}")]
    CommandFailed {
        /// The rendered command line
        command: String,
        /// Combined stdout/stderr of the failed command
        output: String,
    },

    /// The external command did not finish in time and was killed
    #[error("command timed out after {}s: {command}", timeout.as_secs())]
    Timeout {
        /// The rendered command line
        command: String,
        /// The deadline that was exceeded
        timeout: Duration,
    },

    /// The external command could not be started
    #[error("failed to execute {program}: {source}")]
    Spawn {
        /// Program that could not be spawned
        program: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// The executor was asked to run with unusable options
    #[error("invalid execute options: {0}")]
    InvalidOptions(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a configuration error on a named entry.
    pub fn config(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Replace the command line carried by a command error.
    ///
    /// Used to swap the real argv for its masked rendering.
    pub fn with_command(self, command: impl Into<String>) -> Self {
        match self {
            Self::CommandFailed { output, .. } => Self::CommandFailed {
                command: command.into(),
                output,
            },
            Self::Timeout { timeout, .. } => Self::Timeout {
                command: command.into(),
                timeout,
            },
            other => other,
        }
    }

    /// Whether this error came from the external command rather than our own data.
    pub fn is_command_error(&self) -> bool {
        matches!(
            self,
            Self::CommandFailed { .. } | Self::Timeout { .. } | Self::Spawn { .. }
        )
    }
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = Error::config("github", "stdio server has no command");
        assert_eq!(
            err.to_string(),
            "invalid configuration for github: stdio server has no command"
        );
        assert!(!err.is_command_error());
    }

    #[test]
    fn test_timeout_display() {
        let err = Error::Timeout {
            command: "claude plugin install foo".to_string(),
            timeout: Duration::from_secs(30),
        };
        assert_eq!(
            err.to_string(),
            "command timed out after 30s: claude plugin install foo"
        );
        assert!(err.is_command_error());
    }

    #[test]
    fn test_with_command_replaces_command_line() {
        let err = Error::CommandFailed {
            command: "claude mcp add -e KEY=raw fs".to_string(),
            output: "boom".to_string(),
        }
        .with_command("claude mcp add -e 'KEY=***' fs");
        assert_eq!(
            err.to_string(),
            "command failed: claude mcp add -e 'KEY=***' fs: boom"
        );

        let err = Error::config("fs", "bad").with_command("ignored");
        assert_eq!(err.to_string(), "invalid configuration for fs: bad");
    }
}
