//! Gantry - bootstrap and supervise a server for a remote launch service
//!
//! This is the main entry point for the gantry command-line interface.

mod cli;
mod hooks;
mod orchestrator;
mod output;
mod setup;

use anyhow::{Context, Result};
use clap::Parser;
use gantry_client::WsTransport;
use gantry_core::modules::ModuleRegistry;
use gantry_core::{ConfigStore, ShutdownToken, WrapperConfig};
use gantry_runtime::{probe_agent, LoadContext, ProcessLauncher, ProgramResolver};
use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::Cli;
use orchestrator::{Collaborators, Orchestrator, FATAL_EXIT_CODE};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize rustls crypto provider (required for rustls 0.23+)
    // This must be done before any TLS operations
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let cli = Cli::parse();
    let store = ConfigStore::new(cli.config.clone());

    if cli.wants_setup() {
        init_tracing(cli.verbose, cli.quiet, "info", None)?;
        return setup::run(&store).await;
    }

    let code = match bootstrap(&cli, &store).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "startup failed");
            output::error(&format!("{:#}", e));
            FATAL_EXIT_CODE
        }
    };
    std::process::exit(code);
}

/// Load configuration and collaborators, then hand over to the orchestrator
async fn bootstrap(cli: &Cli, store: &ConfigStore) -> Result<i32> {
    let config = load_config(store)?;
    init_tracing(
        cli.verbose,
        cli.quiet,
        config.env.default_filter(),
        config.log_file.as_deref(),
    )?;
    tracing::debug!(path = %store.path(), "configuration loaded");

    let modules = match &cli.modules_dir {
        Some(dir) => hooks::load_modules(dir)?,
        None => ModuleRegistry::new(),
    };

    let inherited = LoadContext::inherited();
    let collaborators = Collaborators {
        transport: Arc::new(WsTransport),
        instrumentation: probe_agent(cli.agent, inherited.clone()),
        inherited,
        modules,
        launcher: ProcessLauncher::new(Box::new(ProgramResolver), cli.launch_mode()),
    };

    let shutdown = ShutdownToken::new();
    spawn_signal_listener(shutdown.clone());

    let orchestrator = Orchestrator::new(config, cli.args.clone(), collaborators, shutdown);
    Ok(orchestrator.run().await)
}

fn load_config(store: &ConfigStore) -> Result<WrapperConfig> {
    if !store.exists() {
        output::info(&format!(
            "No configuration at {}, writing defaults (run `gantry setup` to edit)",
            store.path()
        ));
    }
    let config = store
        .load_or_create()
        .with_context(|| format!("failed to load configuration from {}", store.path()))?;
    config.validate()?;
    Ok(config)
}

/// Cancel `shutdown` on Ctrl-C, and on SIGTERM where available
fn spawn_signal_listener(shutdown: ShutdownToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut term) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = term.recv() => {}
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "cannot listen for SIGTERM");
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        tracing::info!("shutdown requested");
        shutdown.cancel();
    });
}

/// Initialize tracing with appropriate verbosity
///
/// Logs go to stderr; stdout belongs to the wrapped program.
fn init_tracing(verbose: u8, quiet: bool, default: &str, log_file: Option<&str>) -> Result<()> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(file_layer)
        .with(filter)
        .init();
    Ok(())
}
