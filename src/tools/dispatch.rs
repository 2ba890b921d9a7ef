//! Routes a model's tool invocation to its registered handler.
//!
//! [`ToolDispatcher`] owns no state beyond a shared [`ToolRegistry`]. Each
//! call decodes the raw argument text, resolves the tool, checks the decoded
//! arguments against the tool's schema, runs the handler, and encodes the
//! result into the string the output channel carries.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{ToolError, ToolRegistry};
use crate::message::{ToolInvocationRequest, ToolOutput};

#[derive(Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Dispatches one request and produces its output.
    ///
    /// # Errors
    ///
    /// - [`ToolError::ArgumentDecode`] when `arguments` is not valid JSON or
    ///   does not satisfy the tool's schema.
    /// - [`ToolError::UnknownTool`] when no tool has the requested name.
    /// - [`ToolError::HandlerExecution`] when the handler itself fails.
    pub async fn dispatch(&self, request: &ToolInvocationRequest) -> Result<ToolOutput, ToolError> {
        let input = decode_arguments(request)?;
        let entry = self.registry.resolve(&request.tool_name)?;
        entry
            .check_arguments(&input)
            .map_err(|reason| ToolError::ArgumentDecode {
                call_id: request.call_id.clone(),
                tool: request.tool_name.clone(),
                reason,
            })?;
        let tool = entry.tool();

        debug!(call_id = %request.call_id, tool = %request.tool_name, "dispatching tool call");
        let result = tool.execute(input).await.map_err(|e| {
            warn!(call_id = %request.call_id, tool = %request.tool_name, err = %e, "tool handler failed");
            ToolError::HandlerExecution {
                call_id: request.call_id.clone(),
                tool: request.tool_name.clone(),
                source: e.into(),
            }
        })?;

        Ok(ToolOutput::new(request.call_id.clone(), encode_output(result)))
    }
}

/// Decodes the raw argument text. Blank text means "no arguments".
fn decode_arguments(request: &ToolInvocationRequest) -> Result<Value, ToolError> {
    let raw = request.arguments.trim();
    if raw.is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(raw).map_err(|e| ToolError::ArgumentDecode {
        call_id: request.call_id.clone(),
        tool: request.tool_name.clone(),
        reason: e.to_string(),
    })
}

/// Encodes a handler result for the output channel. Strings pass through
/// verbatim; everything else (including null) is compact JSON.
pub fn encode_output(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}
