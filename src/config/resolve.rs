//! Environment variable substitution, overrides, and derived settings.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::warn;

use super::types::{Config, ServiceKind};
use crate::tools::catalog::EntityCatalog;
use crate::tools::ToolDefinition;
use crate::transport::AssistantSpec;

impl Config {
    /// Resolve {env:VAR_NAME} patterns in string fields.
    pub(super) fn resolve_substitutions(&mut self) {
        let env = |name: &str| std::env::var(name).ok();
        for field in self.string_fields() {
            if let Some(value) = field.as_mut() {
                *value = Self::resolve_str(value, env);
            }
        }
    }

    fn string_fields(&mut self) -> [&mut Option<String>; 8] {
        [
            &mut self.service.endpoint,
            &mut self.service.api_key,
            &mut self.service.api_version,
            &mut self.assistant.model,
            &mut self.assistant.name,
            &mut self.assistant.description,
            &mut self.assistant.id,
            &mut self.data.entities_file,
        ]
    }

    /// Replace {env:VAR} with the environment variable value.
    fn resolve_str(s: &str, env: impl Fn(&str) -> Option<String>) -> String {
        let mut result = s.to_string();
        while let Some(start) = result.find("{env:") {
            if let Some(end) = result[start..].find('}') {
                let var_name = &result[start + 5..start + end];
                let value = env(var_name).unwrap_or_default();
                result = format!(
                    "{}{}{}",
                    &result[..start],
                    value,
                    &result[start + end + 1..]
                );
            } else {
                break;
            }
        }
        result
    }

    /// Applies the environment variables the assistant console has always
    /// honoured. Env values win over file values.
    pub(super) fn apply_env_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| env(name).filter(|v| !v.is_empty());

        if let Some(v) = get("OPENAI_ASSISTANT_MODEL") {
            self.assistant.model = Some(v);
        }
        if let Some(v) = get("OPENAI_ASSISTANT_NAME") {
            self.assistant.name = Some(v);
        }
        if let Some(v) = get("OPENAI_ASSISTANT_DESCRIPTION") {
            self.assistant.description = Some(v);
        }
        if let Some(v) = get("OPENAI_ASSISTANT_INSTRUCTIONS_FILE") {
            self.assistant.instructions_file = Some(PathBuf::from(v));
        }
        if let Some(v) = get("OPENAI_ASSISTANT_ID") {
            self.assistant.id = Some(v);
        }
        if let Some(v) = get("OPENAI_API_VERSION") {
            self.service.api_version = Some(v);
        }
        match self.service.kind() {
            ServiceKind::Azure => {
                if let Some(v) = get("AZURE_OPENAI_ENDPOINT") {
                    self.service.endpoint = Some(v);
                }
                if let Some(v) = get("AZURE_OPENAI_API_KEY") {
                    self.service.api_key = Some(v);
                }
            }
            ServiceKind::OpenAI => {
                if let Some(v) = get("OPENAI_API_KEY") {
                    self.service.api_key = Some(v);
                }
            }
        }
    }

    /// Unset placeholders resolve to empty strings; treat those as absent.
    pub(super) fn clear_empty(&mut self) {
        for field in self.string_fields() {
            if field.as_deref().is_some_and(|v| v.trim().is_empty()) {
                *field = None;
            }
        }
    }

    /// The model to create assistants with.
    ///
    /// # Errors
    ///
    /// Returns an error when no model is configured.
    pub fn model(&self) -> Result<&str> {
        self.assistant.model.as_deref().context(
            "No GPT model found. Please set the 'OPENAI_ASSISTANT_MODEL' environment variable \
or assistant.model in config.toml",
        )
    }

    /// Reads the instructions file, falling back to built-in instructions
    /// when it is missing.
    pub fn instructions(&self) -> String {
        let path = self
            .assistant
            .instructions_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(crate::constants::DEFAULT_INSTRUCTIONS_FILE));
        match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), err = %e, "instructions file unavailable, using defaults");
                crate::constants::DEFAULT_INSTRUCTIONS.to_string()
            }
        }
    }

    /// Builds the assistant description sent at session start.
    pub fn assistant_spec(&self, tools: Vec<ToolDefinition>) -> Result<AssistantSpec> {
        let model = match (&self.assistant.id, self.model()) {
            (_, Ok(model)) => model.to_string(),
            // An existing assistant already carries its model.
            (Some(_), Err(_)) => String::new(),
            (None, Err(e)) => return Err(e),
        };
        Ok(AssistantSpec {
            name: self
                .assistant
                .name
                .clone()
                .unwrap_or_else(|| crate::constants::DEFAULT_ASSISTANT_NAME.to_string()),
            description: self
                .assistant
                .description
                .clone()
                .unwrap_or_else(|| crate::constants::DEFAULT_ASSISTANT_DESCRIPTION.to_string()),
            instructions: self.instructions(),
            model,
            tools,
            existing_id: self.assistant.id.clone(),
        })
    }

    /// The entity catalog the tools read.
    pub fn catalog(&self) -> EntityCatalog {
        let dir = self
            .data
            .dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(crate::constants::DEFAULT_DATA_DIR));
        let file = self
            .data
            .entities_file
            .as_deref()
            .unwrap_or(crate::constants::ENTITIES_FILENAME);
        EntityCatalog::new(dir, file)
    }
}
