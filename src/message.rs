//! Message and event types exchanged with the assistant service.
//!
//! These are entity-chat's internal types. The transport converts wire
//! payloads into them, and the run loop and tool dispatcher only ever see
//! these shapes.

use serde::{Deserialize, Serialize};

/// The role of a message appended to a thread.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocationRequest {
    /// Opaque id correlating this request with its [`ToolOutput`].
    pub call_id: String,
    /// Name of the tool to invoke.
    pub tool_name: String,
    /// Raw JSON text of the arguments, decoded by the dispatcher.
    pub arguments: String,
}

impl ToolInvocationRequest {
    pub fn new(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            arguments: arguments.into(),
        }
    }
}

/// The answer to one [`ToolInvocationRequest`], serialized in the shape
/// `submit_tool_outputs` expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    #[serde(rename = "tool_call_id")]
    pub call_id: String,
    pub output: String,
}

impl ToolOutput {
    pub fn new(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            output: output.into(),
        }
    }
}

/// A decoded event from a run stream, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The service assigned an id to the run.
    RunCreated { run_id: String },
    /// A new assistant message segment begins.
    TextCreated,
    /// A fragment of assistant text.
    TextDelta(String),
    /// The run paused and needs every listed call answered.
    ActionRequired {
        run_id: String,
        calls: Vec<ToolInvocationRequest>,
    },
    RunCompleted,
    /// The run reached a terminal failure state on the service side.
    RunFailed(String),
    /// Any event the run loop does not react to.
    Other(String),
}

impl StreamEvent {
    /// Short label for logs.
    pub fn kind(&self) -> &str {
        match self {
            StreamEvent::RunCreated { .. } => "run_created",
            StreamEvent::TextCreated => "text_created",
            StreamEvent::TextDelta(_) => "text_delta",
            StreamEvent::ActionRequired { .. } => "action_required",
            StreamEvent::RunCompleted => "run_completed",
            StreamEvent::RunFailed(_) => "run_failed",
            StreamEvent::Other(name) => name,
        }
    }
}
