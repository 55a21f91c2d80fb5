//! Startup sequence and supervision
//!
//! One `Orchestrator` owns every collaborator for the lifetime of the
//! process. Components report typed errors; whether an error ends the
//! process is decided here, in `Orchestrator::fatality`, and nowhere else.

use crate::output;
use anyhow::anyhow;
use gantry_client::{
    AuthSupervisor, ChannelLaunchService, ChannelOptions, ControlChannel, ReauthOnReconnect,
    Transport,
};
use gantry_core::modules::{LifecycleEvent, ModuleRegistry};
use gantry_core::{SessionCell, ShutdownToken, WrapperConfig};
use gantry_runtime::{
    entry_point_name, select_arguments, EnvironmentBuilder, Instrumentation, LaunchPlan,
    LoadContext, PreparedEnvironment, ProcessLauncher, RuntimeEnvironmentSpec,
};
use std::fmt;
use std::sync::Arc;

/// Exit code for failures that stop startup
pub const FATAL_EXIT_CODE: i32 = -1;
/// Exit code when startup is interrupted by a signal
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Why startup could not proceed normally
#[derive(Debug)]
pub enum Failure {
    /// Configuration, environment or module errors; retrying cannot help
    Config(anyhow::Error),
    /// Authentication or network errors left over after the retry policy
    Auth(anyhow::Error),
    /// Logged in, but no profile carries the configured title
    ProfileMissing { title: String },
    /// The entry point could not be resolved or invoked
    Launch(anyhow::Error),
    Interrupted,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Config(e) => write!(f, "configuration error: {:#}", e),
            Failure::Auth(e) => write!(f, "authentication failed: {:#}", e),
            Failure::ProfileMissing { title } => write!(f, "profile '{}' not found", title),
            Failure::Launch(e) => write!(f, "launch failed: {:#}", e),
            Failure::Interrupted => f.write_str("interrupted"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fatality {
    Fatal,
    Continue,
}

/// Everything the orchestrator talks to, injectable for tests
pub struct Collaborators {
    pub transport: Arc<dyn Transport>,
    pub instrumentation: Option<Arc<dyn Instrumentation>>,
    pub inherited: LoadContext,
    pub modules: ModuleRegistry,
    pub launcher: ProcessLauncher,
}

pub struct Orchestrator {
    config: Arc<WrapperConfig>,
    cli_args: Vec<String>,
    session: SessionCell,
    shutdown: ShutdownToken,
    transport: Arc<dyn Transport>,
    modules: ModuleRegistry,
    environment: EnvironmentBuilder,
    launcher: ProcessLauncher,
}

impl Orchestrator {
    pub fn new(
        config: WrapperConfig,
        cli_args: Vec<String>,
        collaborators: Collaborators,
        shutdown: ShutdownToken,
    ) -> Self {
        let session = SessionCell::new(config.credentials());
        Self {
            config: Arc::new(config),
            cli_args,
            session,
            shutdown,
            transport: collaborators.transport,
            modules: collaborators.modules,
            environment: EnvironmentBuilder::new(
                collaborators.instrumentation,
                collaborators.inherited,
            ),
            launcher: collaborators.launcher,
        }
    }

    pub fn session(&self) -> &SessionCell {
        &self.session
    }

    /// Whether `failure` stops the process
    pub fn fatality(&self, failure: &Failure) -> Fatality {
        match failure {
            Failure::Config(_) | Failure::Launch(_) | Failure::Interrupted => Fatality::Fatal,
            Failure::Auth(_) | Failure::ProfileMissing { .. } => {
                if self.config.stop_on_error {
                    Fatality::Fatal
                } else {
                    Fatality::Continue
                }
            }
        }
    }

    /// Run startup and the wrapped program; returns the process exit code
    pub async fn run(self) -> i32 {
        let shutdown = self.shutdown.clone();
        let code = match self.start().await {
            Ok(code) => code,
            Err(Failure::Interrupted) => {
                output::info("Interrupted, shutting down");
                INTERRUPTED_EXIT_CODE
            }
            Err(failure) => {
                tracing::error!(error = %failure, "startup failed");
                output::error(&failure.to_string());
                FATAL_EXIT_CODE
            }
        };
        shutdown.cancel();
        code
    }

    /// Report a failure; `Err` when it is fatal
    fn check(&self, failure: Failure) -> Result<(), Failure> {
        match self.fatality(&failure) {
            Fatality::Fatal => Err(failure),
            Fatality::Continue => {
                tracing::warn!(error = %failure, "continuing despite error (stopOnError is off)");
                output::warning(&failure.to_string());
                Ok(())
            }
        }
    }

    async fn dispatch(&self, event: LifecycleEvent) -> Result<(), Failure> {
        self.modules
            .dispatch(event, self.config.clone(), self.session.snapshot())
            .await
            .map_err(|e| Failure::Config(e.into()))
    }

    async fn start(self) -> Result<i32, Failure> {
        let config = self.config.clone();
        tracing::info!(
            project = config.projectname.as_deref().unwrap_or(""),
            title = %config.title,
            sync_auth = config.sync_auth,
            "starting"
        );

        self.dispatch(LifecycleEvent::PreConfig).await?;

        let endpoint = config.endpoint().map_err(|e| Failure::Config(e.into()))?;
        let channel = ControlChannel::spawn(
            self.transport.clone(),
            ChannelOptions {
                endpoint,
                request_timeout: config.request_timeout(),
                reconnect: config.retry_policy(),
            },
            self.session.clone(),
            self.shutdown.clone(),
        );
        if let Err(e) = channel.open().await {
            // Each authentication attempt reconnects on its own
            tracing::warn!(error = %e, "initial connection failed");
        }

        let supervisor = AuthSupervisor::new(
            Arc::new(ChannelLaunchService::new(channel.clone())),
            self.session.clone(),
            config.title.clone(),
            self.shutdown.clone(),
        );
        let policy = config.retry_policy();

        if config.sync_auth {
            let spinner = output::spinner("Authenticating with launch service...");
            let result = supervisor.authenticate_with_retry(&policy).await;
            spinner.finish_and_clear();
            match result {
                Ok(report) => {
                    if let Some(title) = missing_title(&report.lookup) {
                        self.check(Failure::ProfileMissing { title })?;
                    }
                }
                Err(e) if e.is_cancelled() => return Err(Failure::Interrupted),
                Err(e) => self.check(Failure::Auth(anyhow!(e)))?,
            }
        } else {
            supervisor.spawn_background(policy);
        }

        self.dispatch(LifecycleEvent::Init).await?;

        let prepared = self.prepare_environment()?;

        self.dispatch(LifecycleEvent::PostInit).await?;

        channel
            .on_disconnect(Arc::new(ReauthOnReconnect::new(
                channel.clone(),
                supervisor.clone(),
            )))
            .await
            .map_err(|e| Failure::Config(e.into()))?;

        if !config.sync_auth && config.await_session {
            self.await_session().await?;
        }

        let snapshot = self.session.snapshot();
        output::banner(&config, &snapshot);

        let entry = entry_point_name(config.entry_point(), &self.cli_args)
            .map_err(|e| Failure::Config(e.into()))?;
        let args = select_arguments(config.args.as_deref(), &self.cli_args);
        let plan = LaunchPlan::new(entry, args, snapshot)
            .with_project(config.projectname.clone())
            .with_environment(prepared);

        let launcher = self.launcher;
        let code = tokio::task::spawn_blocking(move || launcher.launch(plan))
            .await
            .map_err(|e| Failure::Launch(e.into()))?
            .map_err(|e| Failure::Launch(e.into()))?;

        tracing::info!(code, "wrapped program exited");
        channel.close().await;
        Ok(code)
    }

    fn prepare_environment(&self) -> Result<PreparedEnvironment, Failure> {
        let spec = RuntimeEnvironmentSpec::from_config(
            &self.config,
            self.environment.has_instrumentation(),
        )
        .map_err(|e| Failure::Config(e.into()))?;
        self.environment
            .prepare(&spec)
            .map_err(|e| Failure::Config(e.into()))
    }

    async fn await_session(&self) -> Result<(), Failure> {
        let wait = self.session.wait_authenticated();
        let outcome = tokio::select! {
            _ = self.shutdown.cancelled() => return Err(Failure::Interrupted),
            outcome = async {
                match self.config.session_wait_timeout() {
                    Some(limit) => tokio::time::timeout(limit, wait).await.ok(),
                    None => Some(wait.await),
                }
            } => outcome,
        };

        match outcome {
            Some(state) => {
                if state.profile.is_none() {
                    self.check(Failure::ProfileMissing {
                        title: self.config.title.clone(),
                    })?;
                }
                Ok(())
            }
            None => self.check(Failure::Auth(anyhow!(
                "no session within {}ms",
                self.config.session_wait_timeout
            ))),
        }
    }
}

fn missing_title(lookup: &gantry_client::ProfileLookup) -> Option<String> {
    match lookup {
        gantry_client::ProfileLookup::Missing { title } => Some(title.clone()),
        gantry_client::ProfileLookup::Found(_) => None,
    }
}
