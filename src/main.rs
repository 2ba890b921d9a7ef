//! Entry point for entity-chat, a terminal chat front-end for OpenAI
//! assistants that answer questions from an entity catalog.
//!
//! This binary loads environment variables, sets up file logging, parses CLI
//! arguments via [`cli`], and dispatches to the appropriate subcommand handler.

mod chat;
mod cli;
mod config;
mod constants;
mod logging;
mod message;
mod output;
mod run;
mod session;
mod tools;
mod transport;

#[cfg(test)]
mod testing;

use anyhow::Result;

/// Runs the entity-chat CLI.
///
/// Loads `.env` files (silently ignored if absent), starts logging, parses
/// command-line arguments into a [`cli::Cli`] struct, and dispatches the
/// chosen subcommand via [`cli::run`].
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    if let Err(e) = logging::init_logging() {
        eprintln!("warning: logging disabled: {e:#}");
    }
    let cli = cli::parse();
    cli::run(cli).await
}
