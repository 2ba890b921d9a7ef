//! File loading and merging for entity-chat configuration.

use anyhow::{Context, Result};
use std::fs;

use super::types::{AssistantConfig, Config, DataConfig, ServiceConfig};

/// Written to the global config path on first run.
const DEFAULT_CONFIG_TOML: &str = r#"max_tool_rounds = 8

[service]
kind = "azure"
endpoint = "{env:AZURE_OPENAI_ENDPOINT}"
api_key = "{env:AZURE_OPENAI_API_KEY}"

[assistant]
model = "{env:OPENAI_ASSISTANT_MODEL}"

[data]
dir = "data"
entities_file = "entities.json"
"#;

impl Config {
    /// Loads the global config from `~/.config/entity-chat/config.toml`.
    ///
    /// If no config file exists, creates one with sensible defaults
    /// (including `{env:VAR}` placeholders for credentials) and returns it.
    pub(super) fn load_global() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, DEFAULT_CONFIG_TOML)
                .with_context(|| format!("Failed to write default config to {:?}", path))?;
            let config: Config = toml::from_str(DEFAULT_CONFIG_TOML)
                .with_context(|| "Failed to parse default config".to_string())?;
            return Ok(config);
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config at {:?}", path))?;
        Ok(config)
    }

    /// Look for entity-chat.toml in current dir, then walk up to git root.
    pub(super) fn load_project() -> Result<Option<Config>> {
        let mut dir = std::env::current_dir()?;
        loop {
            let candidate = dir.join(crate::constants::PROJECT_CONFIG_FILENAME);
            if candidate.exists() {
                let contents = fs::read_to_string(&candidate)?;
                let config: Config = toml::from_str(&contents)
                    .with_context(|| format!("Failed to parse config at {:?}", candidate))?;
                return Ok(Some(config));
            }
            // Stop at git root or filesystem root
            if dir.join(".git").exists() || !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    /// Merge project config over global config.
    /// Project values win when present.
    pub(super) fn merge(global: Config, project: Config) -> Config {
        Config {
            service: ServiceConfig {
                kind: project.service.kind.or(global.service.kind),
                endpoint: project.service.endpoint.or(global.service.endpoint),
                api_key: project.service.api_key.or(global.service.api_key),
                api_version: project.service.api_version.or(global.service.api_version),
            },
            assistant: AssistantConfig {
                model: project.assistant.model.or(global.assistant.model),
                name: project.assistant.name.or(global.assistant.name),
                description: project.assistant.description.or(global.assistant.description),
                instructions_file: project
                    .assistant
                    .instructions_file
                    .or(global.assistant.instructions_file),
                id: project.assistant.id.or(global.assistant.id),
            },
            data: DataConfig {
                dir: project.data.dir.or(global.data.dir),
                entities_file: project.data.entities_file.or(global.data.entities_file),
            },
            max_tool_rounds: project.max_tool_rounds.or(global.max_tool_rounds),
        }
    }
}
