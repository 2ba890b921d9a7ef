//! One assistant plus one thread, for the lifetime of a conversation.
//!
//! A [`ChatSession`] creates (or retrieves) the configured assistant, opens a
//! thread, and runs turns on it one at a time. [`ChatSession::close`] deletes
//! the assistant only when this session created it.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::message::Role;
use crate::run::{run_turn, TurnError, TurnOptions, TurnResult, TurnSink};
use crate::tools::dispatch::ToolDispatcher;
use crate::tools::ToolRegistry;
use crate::transport::{AssistantHandle, SessionTransport, TransportError};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] anyhow::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Turn(#[from] TurnError),
}

pub struct ChatSession {
    transport: Arc<dyn SessionTransport>,
    dispatcher: ToolDispatcher,
    options: TurnOptions,
    assistant: AssistantHandle,
    thread_id: String,
}

impl ChatSession {
    /// Sets up the assistant and a fresh thread.
    ///
    /// An assistant created here is deleted again if the thread cannot be
    /// opened.
    pub async fn open(
        transport: Arc<dyn SessionTransport>,
        registry: Arc<ToolRegistry>,
        config: &Config,
    ) -> Result<Self, SessionError> {
        let spec = config.assistant_spec(registry.definitions())?;
        let assistant = transport.create_or_retrieve_assistant(&spec).await?;
        info!(
            assistant_id = %assistant.id,
            created = assistant.created,
            tools = registry.len(),
            "assistant ready"
        );

        let thread_id = match transport.create_thread().await {
            Ok(id) => id,
            Err(e) => {
                if assistant.created {
                    if let Err(del) = transport.delete_assistant(&assistant.id).await {
                        warn!(assistant_id = %assistant.id, err = %del, "failed to delete assistant");
                    }
                }
                return Err(e.into());
            }
        };
        info!(%thread_id, "thread created");

        Ok(Self {
            transport,
            dispatcher: ToolDispatcher::new(registry),
            options: TurnOptions {
                max_tool_rounds: config.max_tool_rounds(),
            },
            assistant,
            thread_id,
        })
    }

    pub fn assistant(&self) -> &AssistantHandle {
        &self.assistant
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Appends `text` as a user message and runs the turn it starts.
    pub async fn send(
        &mut self,
        text: &str,
        sink: &mut dyn TurnSink,
        cancel: &CancellationToken,
    ) -> Result<TurnResult, SessionError> {
        self.transport
            .create_message(&self.thread_id, Role::User, text)
            .await?;
        let result = run_turn(
            self.transport.as_ref(),
            &self.dispatcher,
            self.options,
            &self.thread_id,
            &self.assistant.id,
            sink,
            cancel,
        )
        .await?;
        Ok(result)
    }

    /// Releases what this session created.
    pub async fn close(self) -> Result<(), SessionError> {
        if self.assistant.created {
            self.transport.delete_assistant(&self.assistant.id).await?;
            info!(assistant_id = %self.assistant.id, "assistant deleted");
        }
        Ok(())
    }
}
