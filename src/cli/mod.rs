//! Command-line interface definition and dispatch for entity-chat.
//!
//! Uses [`clap`] for argument parsing with derive macros. Each subcommand is
//! routed to its handler; assistant housekeeping lives in [`assistants`].

mod assistants;

use crate::{chat, config::Config, output::StdoutRenderer, run::TurnResult};
use crate::session::ChatSession;
use crate::tools::ToolRegistry;
use crate::transport::openai::AssistantsClient;
use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::sync::Arc;

/// Top-level CLI structure for entity-chat.
///
/// Without a subcommand, starts the interactive chat.
#[derive(Parser)]
#[command(
    name = "entity-chat",
    about = "Chat with an OpenAI assistant that can look up catalog entities"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands for the entity-chat CLI.
///
/// The `///` doc comments on variants double as `--help` text rendered by clap.
#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Use an existing assistant instead of creating one
        #[arg(long)]
        assistant: Option<String>,
    },
    /// Ask a one-shot question
    Ask {
        /// The question to ask
        prompt: Vec<String>,
        /// Use an existing assistant instead of creating one
        #[arg(long)]
        assistant: Option<String>,
    },
    /// Manage assistants on the service
    Assistants {
        #[command(subcommand)]
        action: AssistantsAction,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum AssistantsAction {
    /// List assistants
    List,
    /// Delete one assistant, or all of them
    Delete {
        /// Assistant id
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        id: Option<String>,
        /// Delete every assistant
        #[arg(long)]
        all: bool,
    },
}

/// Subcommands for the `config` command.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current config
    Show,
}

/// Parses command-line arguments into a [`Cli`] struct.
///
/// Delegates to [`clap::Parser::parse`], which exits the process on invalid input.
pub fn parse() -> Cli {
    Cli::parse()
}

/// Opens a session from config, optionally pinned to an existing assistant.
async fn open_session(mut config: Config, assistant: Option<String>) -> Result<ChatSession> {
    if assistant.is_some() {
        config.assistant.id = assistant;
    }
    let transport = Arc::new(AssistantsClient::from_config(&config)?);
    let catalog = config.catalog();
    tracing::debug!(path = %catalog.path().display(), "entity catalog");
    let registry = Arc::new(ToolRegistry::with_entity_tools(catalog)?);
    Ok(ChatSession::open(transport, registry, &config).await?)
}

/// Copy of `config` safe to print.
fn redacted(config: &Config) -> Config {
    let mut shown = config.clone();
    if shown.service.api_key.is_some() {
        shown.service.api_key = Some("********".into());
    }
    shown
}

/// Dispatches the parsed CLI command to its handler.
pub async fn run(cli: Cli) -> Result<()> {
    let command = cli.command.unwrap_or(Commands::Chat { assistant: None });
    match command {
        Commands::Chat { assistant } => {
            let config = Config::load()?;
            let session = open_session(config, assistant).await?;
            chat::run_chat(session).await
        }
        Commands::Ask { prompt, assistant } => {
            let prompt = prompt.join(" ");
            if prompt.trim().is_empty() {
                anyhow::bail!("No prompt provided. Usage: entity-chat ask \"your question here\"");
            }

            let config = Config::load()?;
            let mut session = open_session(config, assistant).await?;

            println!("{} {}", "you >".green().bold(), prompt);
            println!();

            let mut renderer = StdoutRenderer::new();
            let outcome = chat::send_interruptible(&mut session, &prompt, &mut renderer).await;
            session.close().await?;
            match outcome? {
                TurnResult::Completed { .. } => {
                    renderer.render_done();
                    Ok(())
                }
                TurnResult::Failed(failure) => {
                    renderer.render_failure(&failure);
                    anyhow::bail!("turn failed: {}", failure.reason)
                }
            }
        }
        Commands::Assistants { action } => {
            let config = Config::load()?;
            let client = AssistantsClient::from_config(&config)?;
            assistants::handle_assistants(&client, action).await
        }
        Commands::Config { action } => {
            let config = Config::load()?;
            match action {
                ConfigAction::Show => {
                    let path = Config::config_path()?;
                    println!("{} {}", "Config path:".bold(), path.display());
                    println!();
                    let toml_str = toml::to_string_pretty(&redacted(&config))?;
                    println!("{}", toml_str);
                }
            }
            Ok(())
        }
    }
}
