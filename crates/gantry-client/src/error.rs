//! Error types for gantry-client

use std::time::Duration;
use thiserror::Error;

/// Failures of the control channel itself
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("control channel is not connected")]
    NotConnected,

    #[error("failed to connect to {endpoint}: {message}")]
    Connect { endpoint: String, message: String },

    #[error("control channel link lost")]
    LinkLost,

    #[error("control channel closed")]
    Closed,

    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ChannelError {
    pub fn connect(endpoint: impl ToString, message: impl ToString) -> Self {
        Self::Connect {
            endpoint: endpoint.to_string(),
            message: message.to_string(),
        }
    }

    pub fn transport(message: impl ToString) -> Self {
        Self::Transport(message.to_string())
    }
}

impl From<serde_json::Error> for ChannelError {
    fn from(e: serde_json::Error) -> Self {
        Self::Protocol(e.to_string())
    }
}

/// Failures of a single login-and-resolve attempt
#[derive(Error, Debug)]
pub enum AuthError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// The launch service answered with an error
    #[error("{request} rejected by launch service: {message}")]
    Rejected {
        request: &'static str,
        message: String,
    },

    #[error("unexpected response to {request}: {response}")]
    UnexpectedResponse {
        request: &'static str,
        response: String,
    },
}

impl AuthError {
    pub fn rejected(request: &'static str, message: impl Into<String>) -> Self {
        Self::Rejected {
            request,
            message: message.into(),
        }
    }
}
