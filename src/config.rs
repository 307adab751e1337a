use anyhow::{anyhow, Result};
use thiserror::Error;

/// This trait describes interaction with the configuration for talus.
pub trait Config: Send + Sync {
    /// Returns a value from the configuration by its key.
    fn get(&self, key: &str) -> Result<String>;
    /// Returns a value from the configuration by its key, with the source.
    fn get_with_source(&self, key: &str) -> Result<(String, String)>;
    /// Sets a value in the configuration by its key.
    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// Check if the key can be written to the configuration.
    fn check_writable(&self, key: &str) -> Result<()>;

    /// Write the configuration.
    fn write(&self) -> Result<()>;

    /// Return the string representation of the config.
    fn config_to_string(&self) -> Result<String>;
}

pub struct ConfigOption {
    pub key: String,
    pub description: String,
    pub default_value: String,
    pub allowed_values: Vec<String>,
}

pub fn config_options() -> Vec<ConfigOption> {
    vec![
        ConfigOption {
            key: "host".to_string(),
            description: "the root url of the talus web service".to_string(),
            default_value: "http://localhost:8001".to_string(),
            allowed_values: vec![],
        },
        ConfigOption {
            key: "user".to_string(),
            description: "tag your images are filtered by and new images are tagged with".to_string(),
            default_value: crate::config_file::get_env_var("USER"),
            allowed_values: vec![],
        },
        ConfigOption {
            key: "prompt".to_string(),
            description: "toggle interactive prompting in the terminal".to_string(),
            default_value: "enabled".to_string(),
            allowed_values: vec!["enabled".to_string(), "disabled".to_string()],
        },
    ]
}

/// The default for a known key.
pub fn default_value(key: &str) -> Option<String> {
    config_options()
        .into_iter()
        .find(|o| o.key == key)
        .map(|o| o.default_value)
}

pub fn validate_key(key: &str) -> Result<()> {
    for config_key in config_options() {
        if key == config_key.key {
            return Ok(());
        }
    }

    Err(anyhow!("invalid key"))
}

#[derive(Error, Debug)]
pub enum InvalidValueError {
    #[error("invalid values, valid values: {0:?}")]
    ValidValues(Vec<String>),
}

pub fn validate_value(key: &str, value: &str) -> Result<()> {
    let valid_values = config_options()
        .into_iter()
        .find(|o| o.key == key)
        .map(|o| o.allowed_values)
        .unwrap_or_default();

    if valid_values.is_empty() || valid_values.iter().any(|v| v == value) {
        return Ok(());
    }

    Err(InvalidValueError::ValidValues(valid_values).into())
}

/// An empty configuration; every key falls back to its default.
#[cfg(test)]
pub fn new_blank_config() -> Result<crate::config_from_file::FileConfig> {
    Ok(new_config(new_blank_root()?))
}

/// A commented out config listing every known key with its default.
pub fn new_blank_root() -> Result<toml_edit::Document> {
    let doc = config_options()
        .iter()
        .map(|o| format!("# {}: {}\n# {} = {:?}\n", o.key, o.description, o.key, o.default_value))
        .collect::<Vec<_>>()
        .join("\n");

    Ok(doc.parse::<toml_edit::Document>()?)
}

pub fn new_config(doc: toml_edit::Document) -> crate::config_from_file::FileConfig {
    crate::config_from_file::FileConfig {
        map: crate::config_map::ConfigMap {
            root: doc.as_table().clone(),
        },
        path: None,
    }
}
