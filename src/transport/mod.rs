//! Session transport: the remote assistant service as seen by the run loop.
//!
//! [`SessionTransport`] is the seam between orchestration and the wire.
//! [`openai::AssistantsClient`] implements it over HTTP for OpenAI and Azure
//! OpenAI; tests implement it with scripted event sequences.

pub mod openai;
pub mod sse;

use futures::Stream;
use std::pin::Pin;

use crate::message::{Role, StreamEvent, ToolOutput};
use crate::tools::ToolDefinition;

/// A one-shot sequence of run events in arrival order.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, TransportError>> + Send>>;

/// Network or protocol failure talking to the service.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode {what}: {reason}")]
    Decode { what: String, reason: String },

    #[error("stream error: {0}")]
    Protocol(String),

    #[error("stream ended before the run reached a terminal state")]
    UnexpectedEnd,
}

/// Everything needed to create (or locate) an assistant.
#[derive(Debug, Clone)]
pub struct AssistantSpec {
    pub name: String,
    pub description: String,
    pub instructions: String,
    pub model: String,
    pub tools: Vec<ToolDefinition>,
    /// Retrieve this assistant instead of creating one.
    pub existing_id: Option<String>,
}

/// An assistant in use by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantHandle {
    pub id: String,
    /// True when this session created the assistant and must delete it.
    pub created: bool,
}

/// Listing entry for `assistants list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantSummary {
    pub id: String,
    pub name: Option<String>,
    pub model: String,
}

#[async_trait::async_trait]
pub trait SessionTransport: Send + Sync {
    async fn create_thread(&self) -> Result<String, TransportError>;

    async fn create_message(
        &self,
        thread_id: &str,
        role: Role,
        content: &str,
    ) -> Result<(), TransportError>;

    async fn create_or_retrieve_assistant(
        &self,
        spec: &AssistantSpec,
    ) -> Result<AssistantHandle, TransportError>;

    async fn delete_assistant(&self, assistant_id: &str) -> Result<(), TransportError>;

    async fn list_assistants(&self) -> Result<Vec<AssistantSummary>, TransportError>;

    /// Starts a run on the thread and streams its events.
    async fn open_stream(
        &self,
        thread_id: &str,
        assistant_id: &str,
    ) -> Result<EventStream, TransportError>;

    /// Answers a paused run and streams the continuation.
    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<EventStream, TransportError>;

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<(), TransportError>;
}
