//! Input classification for the chat REPL.
//!
//! Recognizes the exit words, slash commands and plain messages so the REPL
//! loop can decide how to proceed.

use colored::Colorize;

use crate::session::ChatSession;

/// What a line typed at the prompt means.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Input<'a> {
    Empty,
    Exit,
    Command(SlashCommand<'a>),
    Message(&'a str),
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SlashCommand<'a> {
    Help,
    Info,
    Unknown(&'a str),
}

pub(crate) fn classify(line: &str) -> Input<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    if matches!(line.to_lowercase().as_str(), "exit" | "quit" | "q") {
        return Input::Exit;
    }
    if line.starts_with('/') {
        return Input::Command(match line {
            "/help" => SlashCommand::Help,
            "/info" => SlashCommand::Info,
            other => SlashCommand::Unknown(other),
        });
    }
    Input::Message(line)
}

pub(crate) fn handle_slash_command(command: SlashCommand<'_>, session: &ChatSession) {
    match command {
        SlashCommand::Help => {
            println!("{}", "Commands:".bold());
            println!("  {} - show assistant and thread ids", "/info".cyan());
            println!("  {} - show this help", "/help".cyan());
            println!("  {} - cancel the running turn", "Ctrl+C".cyan());
            println!("  {} - exit", "exit, quit, q or Ctrl+D".cyan());
        }
        SlashCommand::Info => {
            let assistant = session.assistant();
            let origin = if assistant.created { "created" } else { "configured" };
            println!("{} {} ({})", "assistant:".bold(), assistant.id, origin);
            println!("{} {}", "thread:".bold(), session.thread_id());
        }
        SlashCommand::Unknown(cmd) => {
            println!("{} Unknown command: {}", "?".yellow(), cmd);
        }
    }
}
