//! Configuration file support

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Configuration for almanac
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Primary model to use
    pub model: Option<String>,
    /// Fallback model tried when the primary is unavailable
    pub fallback_model: Option<String>,
    /// Whether to stream replies (false = one-shot retrieval)
    pub stream: Option<bool>,
    /// Whether to use TUI mode by default
    pub tui: Option<bool>,
    /// Per-attempt deadline in seconds
    pub request_timeout_secs: Option<u64>,
    /// Custom system instruction file path
    pub system_instruction_file: Option<String>,
    /// API keys (alternative to environment variables)
    #[serde(default)]
    pub api_keys: ApiKeys,
}

/// API key configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeys {
    pub google: Option<String>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("almanac")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("ALMANAC_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from file
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Save config to file
    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::config_path();
        let dir = path.parent().unwrap();
        fs::create_dir_all(dir)?;

        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            model: Some(almanac_ai::models::DEFAULT_MODEL.to_string()),
            fallback_model: Some(almanac_ai::models::DEFAULT_FALLBACK_MODEL.to_string()),
            stream: Some(true),
            tui: Some(true),
            request_timeout_secs: None,
            system_instruction_file: None,
            api_keys: ApiKeys::default(),
        };

        default_config.save()?;
        Ok(path)
    }

    /// Get the API key, checking config then environment variables
    pub fn get_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_keys.google {
            return Some(key.clone());
        }

        almanac_ai::providers::google::API_KEY_ENV_VARS
            .iter()
            .find_map(|var| std::env::var(var).ok())
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# almanac configuration file
# Place at ~/.config/almanac/config.toml (Linux/Mac) or %APPDATA%\almanac\config.toml (Windows)

# Primary model to use
model = "gemini-1.5-flash"

# Fallback model tried once if the primary is unavailable
fallback_model = "gemini-1.5-pro"

# Stream replies as they are generated (false = wait for the full reply)
stream = true

# Whether to use TUI mode by default (true by default)
# Set to false for simple stdin/stdout mode
tui = true

# Per-attempt deadline in seconds (default 120)
# request_timeout_secs = 120

# Custom system instruction file (optional)
# system_instruction_file = "~/.config/almanac/system_instruction.txt"

# API key (optional - the GOOGLE_API_KEY / GEMINI_API_KEY environment
# variables are checked when this is absent)
[api_keys]
# google = "..."
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_config_parses() {
        let config: Config = toml::from_str(example_config()).unwrap();
        assert_eq!(config.model.as_deref(), Some("gemini-1.5-flash"));
        assert_eq!(config.fallback_model.as_deref(), Some("gemini-1.5-pro"));
        assert_eq!(config.stream, Some(true));
        assert!(config.api_keys.google.is_none());
    }

    #[test]
    fn test_empty_config_is_valid() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.model.is_none());
        assert!(config.request_timeout_secs.is_none());
    }

    #[test]
    fn test_config_key_takes_priority() {
        let config = Config {
            api_keys: ApiKeys {
                google: Some("from-config".into()),
            },
            ..Default::default()
        };
        assert_eq!(config.get_api_key().as_deref(), Some("from-config"));
    }
}
