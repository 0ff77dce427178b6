//! On-disk configuration
//!
//! The config file lives at `~/.config/aish/aish.toml`. A missing file is
//! reported as [`ConfigError::NotFound`] so the session can enter its
//! configuration phase and write one from the user's API key.

use crate::system::SystemInfo;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_TEMPERATURE: f64 = 0.2;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found at {0}")]
    NotFound(String),
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub proxy: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

/// User preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default = "default_prompt_mode")]
    pub default_prompt_mode: String,
    #[serde(default)]
    pub preferences: String,
}

// A missing `[user]` table must resolve the same as an empty one, so
// Default has to agree with the serde field defaults.
impl Default for UserConfig {
    fn default() -> Self {
        Self {
            default_prompt_mode: default_prompt_mode(),
            preferences: String::new(),
        }
    }
}

/// The persisted file shape
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    ai: AiConfig,
    #[serde(default)]
    user: UserConfig,
}

/// Fully resolved configuration: file sections plus the host snapshot.
#[derive(Debug, Clone)]
pub struct Config {
    pub ai: AiConfig,
    pub user: UserConfig,
    pub system: SystemInfo,
}

impl Config {
    /// Load from the host's config file. `OPENAI_API_KEY` overrides the
    /// persisted key when set.
    pub fn load(system: SystemInfo) -> Result<Self, ConfigError> {
        Self::load_from(&system.config_file.clone(), system)
    }

    pub fn load_from(path: &Path, system: SystemInfo) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let body = std::fs::read_to_string(path)?;
        let file: ConfigFile = toml::from_str(&body)?;

        let mut ai = file.ai;
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.is_empty() {
                ai.api_key = key;
            }
        }

        Ok(Self {
            ai,
            user: file.user,
            system,
        })
    }

    /// Write a fresh config file holding `api_key` and defaults, then
    /// load it back.
    pub fn write_initial(api_key: &str, system: SystemInfo) -> Result<Self, ConfigError> {
        let file = ConfigFile {
            ai: AiConfig {
                api_key: api_key.to_string(),
                model: default_model(),
                proxy: String::new(),
                temperature: default_temperature(),
                max_tokens: default_max_tokens(),
            },
            user: UserConfig {
                default_prompt_mode: default_prompt_mode(),
                preferences: String::new(),
            },
        };

        let path = system.config_file.clone();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, toml::to_string_pretty(&file)?)?;

        tracing::info!(path = %path.display(), "Wrote initial config");
        Self::load_from(&path, system)
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

fn default_prompt_mode() -> String {
    "exec".to_string()
}
