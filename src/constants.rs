//! Centralized constants for entity-chat.
//!
//! All magic numbers, default strings, and configuration constants live here
//! so they can be changed in one place.

/// Application name used in CLI output and directory paths.
pub const APP_NAME: &str = "entity-chat";

/// Configuration filename.
pub const CONFIG_FILENAME: &str = "config.toml";

/// Per-project configuration filename.
pub const PROJECT_CONFIG_FILENAME: &str = "entity-chat.toml";

/// Readline history filename.
pub const HISTORY_FILENAME: &str = "chat_history.txt";

/// Log file written by the tracing subscriber.
pub const LOG_FILENAME: &str = "entity-chat.log";

// --- Assistant defaults ---

/// Default assistant name when none is configured.
pub const DEFAULT_ASSISTANT_NAME: &str = "Helpful Assistant";

/// Default assistant description when none is configured.
pub const DEFAULT_ASSISTANT_DESCRIPTION: &str = "A helpful assistant.";

/// Default instructions file, relative to the working directory.
pub const DEFAULT_INSTRUCTIONS_FILE: &str = "instructions.sample.txt";

/// Instructions used when the instructions file cannot be read.
pub const DEFAULT_INSTRUCTIONS: &str =
    "You are a helpful assistant that answers questions about a catalog of \
entities. Use the provided functions to look entities up before answering.";

// --- Endpoints ---

/// Base URL for the public OpenAI API.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default Azure OpenAI API version (first version with Assistants v2).
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-05-01-preview";

/// Value of the `OpenAI-Beta` header required by the Assistants API.
pub const ASSISTANTS_BETA_HEADER: &str = "assistants=v2";

// --- Turn limits ---

/// Default cap on tool-call rounds within a single turn.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 8;

// --- Entity catalog ---

/// Default data directory holding the entity catalog.
pub const DEFAULT_DATA_DIR: &str = "data";

/// Catalog file read by the entity tools.
pub const ENTITIES_FILENAME: &str = "entities.json";

/// Namespace used for entities that do not declare one.
pub const DEFAULT_ENTITY_NAMESPACE: &str = "default";
