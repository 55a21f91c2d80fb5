//! Requests the orchestrator makes of the launch service

use crate::channel::ControlChannel;
use crate::error::{AuthError, ChannelError};
use crate::protocol::{Request, Response};
use async_trait::async_trait;
use gantry_core::types::{Credentials, Permissions, ProfileDescriptor};

/// Launch service operations used during authentication
#[async_trait]
pub trait LaunchService: Send + Sync {
    /// Make sure a link to the service exists
    async fn connect(&self) -> Result<(), ChannelError>;

    async fn login(&self, credentials: &Credentials) -> Result<Permissions, AuthError>;

    /// All profiles visible to the logged-in identity, in service order
    async fn profiles(&self) -> Result<Vec<ProfileDescriptor>, AuthError>;
}

/// `LaunchService` over the control channel
#[derive(Debug, Clone)]
pub struct ChannelLaunchService {
    channel: ControlChannel,
}

impl ChannelLaunchService {
    pub fn new(channel: ControlChannel) -> Self {
        Self { channel }
    }

    pub fn channel(&self) -> &ControlChannel {
        &self.channel
    }
}

#[async_trait]
impl LaunchService for ChannelLaunchService {
    async fn connect(&self) -> Result<(), ChannelError> {
        self.channel.reopen().await
    }

    async fn login(&self, credentials: &Credentials) -> Result<Permissions, AuthError> {
        match self.channel.call(Request::auth(credentials)).await? {
            Response::Auth { permissions } => Ok(permissions),
            Response::Error { error } => Err(AuthError::rejected("auth", error)),
            other => Err(AuthError::UnexpectedResponse {
                request: "auth",
                response: other.kind().to_string(),
            }),
        }
    }

    async fn profiles(&self) -> Result<Vec<ProfileDescriptor>, AuthError> {
        match self.channel.call(Request::Profiles).await? {
            Response::Profiles { profiles } => Ok(profiles),
            Response::Error { error } => Err(AuthError::rejected("profiles", error)),
            other => Err(AuthError::UnexpectedResponse {
                request: "profiles",
                response: other.kind().to_string(),
            }),
        }
    }
}
