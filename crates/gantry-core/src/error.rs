//! Errors raised by gantry-core

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration file {path} does not exist")]
    ConfigNotFound { path: String },

    /// The document parsed but describes something unusable
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("malformed YAML configuration: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    #[error("malformed JSON configuration: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("cannot access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A lifecycle module rejected an event
    #[error("module {module} failed during {phase}: {message}")]
    Module {
        module: String,
        phase: String,
        message: String,
    },
}

impl Error {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn module(
        module: impl Into<String>,
        phase: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Module {
            module: module.into(),
            phase: phase.into(),
            message: message.into(),
        }
    }
}
