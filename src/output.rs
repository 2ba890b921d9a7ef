//! Terminal rendering of a streaming turn.
//!
//! [`StdoutRenderer`] is the [`TurnSink`] used by the REPL and `ask`: text
//! fragments are printed as they arrive, tool calls are echoed dimmed.

use colored::Colorize;
use std::io::{self, Write};

use crate::message::ToolInvocationRequest;
use crate::run::{TurnFailure, TurnSink};

/// Renders streaming assistant output directly to stdout.
///
/// Each fragment is printed immediately with an explicit flush so the user
/// sees a "typing" effect.
pub struct StdoutRenderer {
    at_line_start: bool,
}

impl StdoutRenderer {
    pub fn new() -> Self {
        Self {
            at_line_start: true,
        }
    }

    fn break_line(&mut self) {
        if !self.at_line_start {
            println!();
            self.at_line_start = true;
        }
    }

    /// Called when the turn completed.
    pub fn render_done(&mut self) {
        self.break_line();
        println!();
    }

    /// Called when the turn failed or could not run.
    pub fn render_error(&mut self, err: &str) {
        self.break_line();
        eprintln!("{} {}", "error:".red().bold(), err);
    }

    pub fn render_failure(&mut self, failure: &TurnFailure) {
        self.render_error(&failure.to_string());
    }
}

impl Default for StdoutRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnSink for StdoutRenderer {
    fn segment_started(&mut self) {
        self.break_line();
        print!("{} ", "assistant >".cyan().bold());
        io::stdout().flush().ok();
        self.at_line_start = false;
    }

    fn text_delta(&mut self, fragment: &str) {
        print!("{}", fragment);
        // Flush immediately so each fragment appears as it arrives
        io::stdout().flush().ok();
        self.at_line_start = fragment.ends_with('\n');
    }

    fn tool_called(&mut self, request: &ToolInvocationRequest) {
        self.break_line();
        println!(
            "{}",
            format!(
                ">> called tool function: {} with arguments: {}",
                request.tool_name, request.arguments
            )
            .dimmed()
        );
    }

    fn submitting_outputs(&mut self, count: usize) {
        tracing::debug!(count, "submitting tool outputs");
    }
}
