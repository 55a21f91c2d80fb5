//! Interactive setup wizard

use crate::output;
use anyhow::{Context, Result};
use dialoguer::{Confirm, Input, Password};
use gantry_client::{AuthSupervisor, ChannelLaunchService, ControlChannel, WsTransport};
use gantry_core::{ConfigStore, SessionCell, ShutdownToken, WrapperConfig};
use std::sync::Arc;

/// Ask for the essential settings, optionally test them, then save
pub async fn run(store: &ConfigStore) -> Result<()> {
    output::header("Gantry setup");

    let mut config = if store.exists() {
        store
            .load()
            .with_context(|| format!("failed to load {}", store.path()))?
    } else {
        WrapperConfig::default()
    };

    config.address = Input::new()
        .with_prompt("Launch service address")
        .default(config.address.clone())
        .validate_with(|value: &String| -> Result<(), String> {
            let probe = WrapperConfig {
                address: value.clone(),
                ..WrapperConfig::default()
            };
            probe.endpoint().map(|_| ()).map_err(|e| e.to_string())
        })
        .interact_text()?;

    let project: String = Input::new()
        .with_prompt("Project name")
        .default(config.projectname.clone().unwrap_or_default())
        .allow_empty(true)
        .interact_text()?;
    config.projectname = (!project.is_empty()).then_some(project);

    config.title = Input::new()
        .with_prompt("Profile title")
        .default(config.title.clone())
        .interact_text()?;

    config.login = Input::new()
        .with_prompt("Login")
        .default(config.login.clone())
        .interact_text()?;

    config.password = Password::new()
        .with_prompt("Password")
        .allow_empty_password(true)
        .interact()?;

    let entry: String = Input::new()
        .with_prompt("Entry point (empty: first command-line argument)")
        .default(config.entry_point().unwrap_or_default().to_string())
        .allow_empty(true)
        .interact_text()?;
    config.mainclass = Some(entry);

    config.sync_auth = Confirm::new()
        .with_prompt("Authenticate before launching?")
        .default(config.sync_auth)
        .interact()?;

    if Confirm::new()
        .with_prompt("Test the connection now?")
        .default(true)
        .interact()?
    {
        test_connection(&config).await;
    }

    store
        .save(&config)
        .with_context(|| format!("failed to save {}", store.path()))?;
    output::success(&format!("Configuration saved to {}", store.path()));
    Ok(())
}

/// One login attempt against the entered settings. Failure is reported, not fatal.
async fn test_connection(config: &WrapperConfig) {
    let endpoint = match config.endpoint() {
        Ok(endpoint) => endpoint,
        Err(e) => {
            output::error(&e.to_string());
            return;
        }
    };

    let session = SessionCell::new(config.credentials());
    let shutdown = ShutdownToken::new();
    let channel = ControlChannel::spawn(
        Arc::new(WsTransport),
        gantry_client::ChannelOptions {
            endpoint,
            request_timeout: config.request_timeout(),
            reconnect: config.retry_policy(),
        },
        session.clone(),
        shutdown.clone(),
    );
    let supervisor = AuthSupervisor::new(
        Arc::new(ChannelLaunchService::new(channel.clone())),
        session,
        config.title.clone(),
        shutdown,
    );

    let spinner = output::spinner("Connecting to launch service...");
    let result = supervisor.authenticate_once().await;
    spinner.finish_and_clear();
    channel.close().await;

    match result {
        Ok(report) => match report.lookup.profile() {
            Some(profile) => output::success(&format!(
                "Authenticated, profile '{}' version {}",
                profile.title,
                profile.version_or_unknown()
            )),
            None => output::warning(&format!(
                "Authenticated, but no profile titled '{}' exists",
                config.title
            )),
        },
        Err(e) => output::error(&format!("Connection test failed: {}", e)),
    }
}
