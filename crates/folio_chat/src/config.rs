use serde::{Deserialize, Serialize};

pub const DEFAULT_STORAGE_KEY: &str = "folio-chat-history";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Chat endpoint URL.
    pub endpoint: Option<String>,

    /// System directive sent ahead of every conversation.
    pub system: Option<String>,
    /// Assistant greeting shown when a session starts.
    #[serde(default = "default_greeting")]
    pub greeting: Option<String>,

    #[serde(default = "default_storage_key")]
    pub storage_key: Option<String>,
    /// Maximum size in bytes of the persisted history.
    pub quota: Option<usize>,
    /// Request timeout in seconds.
    pub timeout: Option<u64>,

    #[serde(default = "default_false")]
    pub quiet: Option<bool>,
}

impl Config {
    pub fn new() -> Self {
        Config {
            greeting: default_greeting(),
            storage_key: default_storage_key(),
            quiet: default_false(),
            ..Default::default()
        }
    }
}

fn default_greeting() -> Option<String> {
    Some("Hi! Ask me about my research, publications or talks.".to_string())
}

fn default_storage_key() -> Option<String> {
    Some(DEFAULT_STORAGE_KEY.to_string())
}

fn default_false() -> Option<bool> {
    Some(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gets_defaults() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let config: Config = toml::from_str("")?;

        assert_eq!(config.storage_key.as_deref(), Some(DEFAULT_STORAGE_KEY));
        assert_eq!(config.quiet, Some(false));
        assert!(config.greeting.is_some());
        assert_eq!(config.endpoint, None);

        Ok(())
    }

    #[test]
    fn new_config_serializes_to_toml() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let written = toml::to_string(&Config::new())?;
        let read: Config = toml::from_str(&written)?;

        assert_eq!(read.storage_key, Config::new().storage_key);
        assert_eq!(read.greeting, Config::new().greeting);

        Ok(())
    }
}
