//! Interactive chat REPL for entity-chat.
//!
//! Provides a multi-turn conversation loop using [`rustyline`] for readline
//! support (history, line editing). The conversation lives on the remote
//! thread, so each turn sends only the new user message.

mod commands;

use anyhow::Result;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::Config;
use crate::output::StdoutRenderer;
use crate::run::TurnResult;
use crate::session::{ChatSession, SessionError};
use commands::Input;

/// Runs one turn, cancelling it when Ctrl+C arrives.
pub async fn send_interruptible(
    session: &mut ChatSession,
    text: &str,
    renderer: &mut StdoutRenderer,
) -> Result<TurnResult, SessionError> {
    let cancel = CancellationToken::new();
    let turn = session.send(text, renderer, &cancel);
    tokio::pin!(turn);
    loop {
        tokio::select! {
            result = &mut turn => return result,
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(err = %e, "ctrl-c handler failed");
                }
                cancel.cancel();
            }
        }
    }
}

/// Runs the interactive chat REPL on an open session.
///
/// # Readline behavior
///
/// - **Ctrl+C** at the prompt: cancels current input, stays in REPL
/// - **Ctrl+C** during a turn: cancels the run
/// - **Ctrl+D**, `exit`, `quit`, `q`: closes the session and exits
/// - Readline history is persisted to `~/.cache/entity-chat/chat_history.txt`
///
/// The session is closed on every exit path, including setup errors.
pub async fn run_chat(mut session: ChatSession) -> Result<()> {
    let outcome = repl(&mut session).await;
    close_after(session, outcome).await
}

/// Closes the session, then reports `outcome`. A close error is only
/// returned when the REPL itself succeeded.
async fn close_after(session: ChatSession, outcome: Result<()>) -> Result<()> {
    let closed = session.close().await;
    match outcome {
        Err(e) => {
            if let Err(close_err) = closed {
                warn!(err = %close_err, "failed to close session");
            }
            Err(e)
        }
        Ok(()) => Ok(closed?),
    }
}

async fn repl(session: &mut ChatSession) -> Result<()> {
    println!(
        "{} [assistant: {}] (type 'exit' or Ctrl+D to quit)",
        "entity-chat".bold().cyan(),
        session.assistant().id.yellow(),
    );
    println!();

    // Set up readline with persistent history
    let mut rl = DefaultEditor::new()?;
    let history_path = Config::cache_dir()?.join(crate::constants::HISTORY_FILENAME);
    if history_path.exists() {
        let _ = rl.load_history(&history_path);
    }

    let mut fatal = None;
    loop {
        let readline = rl.readline(&format!("{} ", "you >".green().bold()));

        match readline {
            Ok(line) => match commands::classify(&line) {
                Input::Empty => continue,
                Input::Exit => {
                    println!("{}", "goodbye.".dimmed());
                    break;
                }
                Input::Command(cmd) => commands::handle_slash_command(cmd, session),
                Input::Message(text) => {
                    let _ = rl.add_history_entry(text);
                    println!();

                    let mut renderer = StdoutRenderer::new();
                    match send_interruptible(session, text, &mut renderer).await {
                        Ok(TurnResult::Completed { .. }) => renderer.render_done(),
                        Ok(TurnResult::Failed(failure)) => renderer.render_failure(&failure),
                        Err(SessionError::Turn(e)) => {
                            renderer.render_error(&e.to_string());
                            fatal = Some(e);
                            break;
                        }
                        Err(e) => renderer.render_error(&e.to_string()),
                    }
                    println!();
                }
            },
            Err(ReadlineError::Interrupted) => {
                println!("{}", "^C".dimmed());
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "goodbye.".dimmed());
                break;
            }
            Err(e) => {
                eprintln!("{} {}", "error:".red().bold(), e);
                break;
            }
        }
    }

    // Save readline history
    if let Some(parent) = history_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!(err = %e, "failed to create history directory");
        }
    }
    let _ = rl.save_history(&history_path);

    match fatal {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_registry, ScriptedTransport};
    use std::sync::Arc;

    async fn created_session(transport: Arc<ScriptedTransport>) -> ChatSession {
        let mut config = Config::default();
        config.assistant.model = Some("gpt-4o".into());
        let session = ChatSession::open(transport, Arc::new(test_registry()), &config)
            .await
            .unwrap();
        assert!(session.assistant().created);
        session
    }

    #[tokio::test]
    async fn test_failed_repl_still_deletes_created_assistant() {
        let transport = Arc::new(ScriptedTransport::new(Vec::new()));
        let session = created_session(transport.clone()).await;

        let err = close_after(session, Err(anyhow::anyhow!("no terminal available")))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "no terminal available");
        assert_eq!(transport.log.lock().unwrap().deleted, vec!["asst_new"]);
    }

    #[tokio::test]
    async fn test_clean_exit_closes_session() {
        let transport = Arc::new(ScriptedTransport::new(Vec::new()));
        let session = created_session(transport.clone()).await;

        close_after(session, Ok(())).await.unwrap();
        assert_eq!(transport.log.lock().unwrap().deleted, vec!["asst_new"]);
    }
}
