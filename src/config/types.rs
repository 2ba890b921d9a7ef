//! Struct definitions and serde defaults for entity-chat configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration, deserialized from `config.toml`.
///
/// Every field may be absent so the tool can run from environment variables
/// alone, and so a project file only overrides what it actually sets.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Which service to talk to and how to authenticate.
    #[serde(default)]
    pub service: ServiceConfig,
    /// Assistant creation settings.
    #[serde(default)]
    pub assistant: AssistantConfig,
    /// Location of the entity catalog.
    #[serde(default)]
    pub data: DataConfig,
    /// Upper bound on tool-call rounds in one turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tool_rounds: Option<usize>,
}

impl Config {
    pub fn max_tool_rounds(&self) -> usize {
        self.max_tool_rounds
            .unwrap_or(crate::constants::DEFAULT_MAX_TOOL_ROUNDS)
    }
}

/// Service flavour.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    /// Azure OpenAI (`api-key` header, `api-version` query).
    #[default]
    Azure,
    /// api.openai.com or a compatible endpoint.
    OpenAI,
}

/// Connection details for the assistant service.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ServiceConfig {
    pub kind: Option<ServiceKind>,
    /// Azure resource endpoint, or a custom OpenAI-compatible base URL.
    pub endpoint: Option<String>,
    /// API key. Can also be set via environment variables.
    pub api_key: Option<String>,
    /// Azure API version.
    pub api_version: Option<String>,
}

impl ServiceConfig {
    pub fn kind(&self) -> ServiceKind {
        self.kind.unwrap_or_default()
    }

    pub fn api_version(&self) -> &str {
        self.api_version
            .as_deref()
            .filter(|v| !v.is_empty())
            .unwrap_or(crate::constants::DEFAULT_AZURE_API_VERSION)
    }
}

/// How the session's assistant is created or located.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct AssistantConfig {
    /// Model (or Azure deployment) name. Required to create an assistant.
    pub model: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    /// File holding the assistant instructions.
    pub instructions_file: Option<PathBuf>,
    /// Reuse this assistant instead of creating one per session.
    pub id: Option<String>,
}

/// Where the entity tools read their data.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct DataConfig {
    pub dir: Option<PathBuf>,
    pub entities_file: Option<String>,
}

