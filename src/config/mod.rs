//! Configuration types and path resolution for entity-chat.
//!
//! Settings are stored as TOML at the platform's XDG config path
//! (e.g. `~/.config/entity-chat/config.toml` on Linux), optionally overridden
//! by a project `entity-chat.toml`, and finally by the environment variables
//! the assistant console is configured with (`OPENAI_ASSISTANT_MODEL`,
//! `AZURE_OPENAI_ENDPOINT`, ...).

mod loader;
mod paths;
mod resolve;
mod types;

pub use types::{Config, ServiceKind};

use anyhow::Result;

impl Config {
    /// Load config with precedence: environment > project > global > defaults.
    /// Creates default config file if none exists.
    pub fn load() -> Result<Self> {
        let global = Self::load_global()?;
        let project = Self::load_project()?;

        let mut config = global;
        if let Some(proj) = project {
            config = Self::merge(config, proj);
        }

        config.resolve_substitutions();
        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.clear_empty();
        Ok(config)
    }
}
