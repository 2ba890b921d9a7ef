pub mod catalog;
pub mod dispatch;
pub mod entity_tools;

use anyhow::Result;
use jsonschema::{Draft, JSONSchema};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use catalog::EntityCatalog;
use entity_tools::{FindEntitiesByKindTool, FindEntitiesOfKindsTool, GetAllEntitiesOfKindTool};

/// Errors raised while registering or dispatching tools.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("tool '{0}' is already registered")]
    DuplicateTool(String),

    #[error("tool '{tool}' has an invalid parameter schema: {reason}")]
    InvalidSchema { tool: String, reason: String },

    #[error("unsupported function call '{0}'")]
    UnknownTool(String),

    #[error("invalid arguments for '{tool}' (call {call_id}): {reason}")]
    ArgumentDecode {
        call_id: String,
        tool: String,
        reason: String,
    },

    #[error("tool '{tool}' failed (call {call_id}): {source}")]
    HandlerExecution {
        call_id: String,
        tool: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ToolError {
    /// Per-call errors are answered with an error-valued output; the rest
    /// abort the batch.
    pub fn is_per_call(&self) -> bool {
        matches!(
            self,
            ToolError::ArgumentDecode { .. } | ToolError::HandlerExecution { .. }
        )
    }
}

/// Definition sent to the service so the model knows what tools exist.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value, // JSON Schema
}

/// Every tool implements this trait.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Unique name the model uses to call this tool.
    fn name(&self) -> &str;

    /// Human-readable description sent with the schema.
    fn description(&self) -> &str;

    /// JSON Schema describing the tool's input parameters.
    fn schema(&self) -> Value;

    /// Execute the tool with decoded JSON input. `Value::Null` means the
    /// tool has nothing to report.
    async fn execute(&self, input: Value) -> Result<Value>;
}

/// A tool together with its compiled parameter schema.
pub struct RegisteredTool {
    tool: Arc<dyn Tool>,
    validator: JSONSchema,
}

impl RegisteredTool {
    pub fn tool(&self) -> Arc<dyn Tool> {
        Arc::clone(&self.tool)
    }

    /// Checks decoded arguments against the parameter schema. The error
    /// lists every violation, each prefixed with its JSON pointer.
    pub fn check_arguments(&self, input: &Value) -> Result<(), String> {
        self.validator.validate(input).map_err(|errors| {
            errors
                .map(|e| {
                    let path = e.instance_path.to_string();
                    if path.is_empty() {
                        e.to_string()
                    } else {
                        format!("{path}: {e}")
                    }
                })
                .collect::<Vec<_>>()
                .join("; ")
        })
    }
}

/// Holds all registered tools and resolves them by name.
///
/// Built once at startup, then shared read-only behind an `Arc`.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. Names must be unique and the parameter schema must
    /// compile as Draft 7.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> Result<(), ToolError> {
        if self.contains(tool.name()) {
            return Err(ToolError::DuplicateTool(tool.name().to_string()));
        }
        let schema = tool.schema();
        let validator = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&schema)
            .map_err(|e| ToolError::InvalidSchema {
                tool: tool.name().to_string(),
                reason: e.to_string(),
            })?;
        self.tools.push(RegisteredTool {
            tool: Arc::from(tool),
            validator,
        });
        Ok(())
    }

    /// Resolve a tool and its validator by name.
    pub fn resolve(&self, name: &str) -> Result<&RegisteredTool, ToolError> {
        self.tools
            .iter()
            .find(|t| t.tool.name() == name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }

    /// Look up a tool by name.
    pub fn lookup(&self, name: &str) -> Result<Arc<dyn Tool>, ToolError> {
        self.resolve(name).map(RegisteredTool::tool)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.tool.name() == name)
    }

    /// Produce definitions for the service, in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.tool.name().to_string(),
                description: t.tool.description().to_string(),
                parameters: t.tool.schema(),
            })
            .collect()
    }

    /// How many tools are registered.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl ToolRegistry {
    /// Create a registry with the entity catalog tools.
    pub fn with_entity_tools(catalog: EntityCatalog) -> Result<Self, ToolError> {
        let catalog = Arc::new(catalog);
        let mut registry = Self::new();
        registry.register(Box::new(FindEntitiesByKindTool::new(Arc::clone(&catalog))))?;
        registry.register(Box::new(FindEntitiesOfKindsTool::new(Arc::clone(&catalog))))?;
        registry.register(Box::new(GetAllEntitiesOfKindTool::new(catalog)))?;
        Ok(registry)
    }
}
