//! Configuration file loading and persistence

use super::types::WrapperConfig;
use crate::error::{Error, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tracing::{debug, info};

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "gantry.json";

/// Serialization format, picked from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    /// `.yaml`/`.yml` are YAML, everything else is JSON
    pub fn from_path(path: &Utf8Path) -> Self {
        match path.extension() {
            Some("yaml") | Some("yml") => ConfigFormat::Yaml,
            _ => ConfigFormat::Json,
        }
    }
}

/// Loads and persists the wrapper configuration document
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: Utf8PathBuf,
    format: ConfigFormat,
}

impl ConfigStore {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        let path = path.into();
        let format = ConfigFormat::from_path(&path);
        Self { path, format }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn format(&self) -> ConfigFormat {
        self.format
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Load the configuration; a missing file is an error
    pub fn load(&self) -> Result<WrapperConfig> {
        debug!("Read {}", self.path);
        let content = fs::read_to_string(&self.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::config_not_found(self.path.as_str())
            } else {
                Error::io(self.path.as_str(), e)
            }
        })?;
        self.parse(&content)
    }

    /// Load the configuration, writing the default document first if the
    /// file does not exist yet
    pub fn load_or_create(&self) -> Result<WrapperConfig> {
        if !self.exists() {
            info!("Config file {} not found, writing defaults", self.path);
            let config = WrapperConfig::default();
            self.save(&config)?;
            return Ok(config);
        }
        self.load()
    }

    /// Parse a document in this store's format
    pub fn parse(&self, content: &str) -> Result<WrapperConfig> {
        let config = match self.format {
            ConfigFormat::Json => serde_json::from_str(content)?,
            ConfigFormat::Yaml => serde_yaml_ng::from_str(content)?,
        };
        Ok(config)
    }

    /// Serialize a configuration in this store's format
    pub fn render(&self, config: &WrapperConfig) -> Result<String> {
        let content = match self.format {
            ConfigFormat::Json => serde_json::to_string_pretty(config)?,
            ConfigFormat::Yaml => serde_yaml_ng::to_string(config)?,
        };
        Ok(content)
    }

    /// Save configuration to the store's path
    pub fn save(&self, config: &WrapperConfig) -> Result<()> {
        let content = self.render(config)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| Error::io(parent.as_str(), e))?;
            }
        }
        fs::write(&self.path, content).map_err(|e| Error::io(self.path.as_str(), e))?;
        Ok(())
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir, name: &str) -> ConfigStore {
        let path = Utf8PathBuf::from_path_buf(dir.path().join(name))
            .expect("path should be valid UTF-8");
        ConfigStore::new(path)
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_path(Utf8Path::new("gantry.yaml")),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigFormat::from_path(Utf8Path::new("gantry.yml")),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigFormat::from_path(Utf8Path::new("gantry.json")),
            ConfigFormat::Json
        );
        assert_eq!(
            ConfigFormat::from_path(Utf8Path::new("gantry")),
            ConfigFormat::Json
        );
    }

    #[test]
    fn test_load_nonexistent_file() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, "missing.json");
        let err = store.load().unwrap_err();
        assert!(
            matches!(err, Error::ConfigNotFound { .. }),
            "Expected ConfigNotFound, got: {:?}",
            err
        );
    }

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, "gantry.json");

        let config = store.load_or_create().unwrap();
        assert_eq!(config, WrapperConfig::default());
        assert!(store.exists());

        let reloaded = store.load().unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_save_and_load_yaml() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, "nested/gantry.yaml");

        let config = WrapperConfig {
            title: "Survival".to_string(),
            reconnect_count: 3,
            ..WrapperConfig::default()
        };
        store.save(&config).unwrap();

        let content = std::fs::read_to_string(store.path()).unwrap();
        assert!(content.contains("reconnectCount: 3"));
        assert_eq!(store.load().unwrap(), config);
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, "gantry.json");
        std::fs::write(store.path(), "{ \"title\": ").unwrap();

        let err = store.load().unwrap_err();
        assert!(
            matches!(err, Error::JsonParse(_)),
            "Expected JsonParse, got: {:?}",
            err
        );
    }

    #[test]
    fn test_load_wrong_env_variant() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, "gantry.json");
        std::fs::write(store.path(), r#"{"env":"staging"}"#).unwrap();

        let err = store.load().unwrap_err();
        assert!(
            err.to_string().contains("unknown variant"),
            "Expected 'unknown variant' in error, got: {}",
            err
        );
    }
}
