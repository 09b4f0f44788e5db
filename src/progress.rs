//! Spinner shown while apply runs host commands

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use reconcile::{ItemKey, Operation, ProgressCallback};
use std::time::Duration;

pub struct SpinnerProgress {
    bar: ProgressBar,
    /// Print per-command lines at all
    echo: bool,
}

impl SpinnerProgress {
    /// A spinner when `spinner` is set; plain lines otherwise unless `echo` is off
    pub fn new(spinner: bool, echo: bool) -> Self {
        let bar = if spinner && echo {
            ProgressBar::new_spinner()
        } else {
            ProgressBar::hidden()
        };
        bar.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar, echo }
    }

    fn line(&self, text: String) {
        if !self.echo {
            return;
        }
        if self.bar.is_hidden() {
            println!("{text}");
        } else {
            self.bar.println(text);
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressCallback for SpinnerProgress {
    fn on_item_start(&mut self, key: &ItemKey, description: &str) {
        log::debug!("starting {key}");
        self.bar.set_message(description.to_string());
    }

    fn on_operation(&mut self, operation: &Operation) {
        if operation.success {
            self.line(format!("  {} {}", "✓".green(), operation.description));
        } else {
            self.line(format!("  {} {}", "✗".red(), operation.description));
            if let Some(error) = &operation.error {
                self.line(format!("      {}", error.dimmed()));
            }
        }
    }

    fn on_attention(&mut self, message: &str) {
        self.line(format!("  {} {}", "⚠".yellow(), message));
    }
}
