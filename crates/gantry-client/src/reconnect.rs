//! Session recovery after the control channel drops

use crate::auth::AuthSupervisor;
use crate::channel::{ControlChannel, DisconnectHandler};
use anyhow::Context;
use async_trait::async_trait;

/// Reopens the channel, then logs in again and re-resolves the profile
#[derive(Debug, Clone)]
pub struct ReauthOnReconnect {
    channel: ControlChannel,
    supervisor: AuthSupervisor,
}

impl ReauthOnReconnect {
    pub fn new(channel: ControlChannel, supervisor: AuthSupervisor) -> Self {
        Self {
            channel,
            supervisor,
        }
    }

    async fn reauthenticate(&self) -> anyhow::Result<()> {
        let report = self
            .supervisor
            .authenticate_once()
            .await
            .context("re-authentication failed")?;
        tracing::info!(
            generation = report.generation,
            profile_missing = report.lookup.is_missing(),
            "session restored"
        );
        Ok(())
    }
}

#[async_trait]
impl DisconnectHandler for ReauthOnReconnect {
    async fn on_disconnect(&self) -> anyhow::Result<()> {
        tracing::info!("control channel dropped, re-authenticating");
        self.channel
            .reopen()
            .await
            .context("failed to reopen control channel")?;
        self.reauthenticate().await
    }

    async fn on_restored(&self) -> anyhow::Result<()> {
        tracing::info!("control channel back after reconnect, re-authenticating");
        self.reauthenticate().await
    }
}
