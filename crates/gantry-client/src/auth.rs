//! Authentication and profile resolution
//!
//! One attempt is login, then profile listing, then selection of the first
//! profile whose title equals the configured one. A missing profile is
//! reported, not raised: only the orchestrator decides whether it is fatal.

use crate::error::AuthError;
use crate::service::LaunchService;
use gantry_core::retry::{RetryError, RetryExecutorBuilder, RetryPolicy, TracingObserver};
use gantry_core::types::{Permissions, ProfileDescriptor};
use gantry_core::{SessionCell, ShutdownToken};
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Outcome of looking the configured title up in the service's profiles
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileLookup {
    Found(ProfileDescriptor),
    Missing { title: String },
}

impl ProfileLookup {
    pub fn profile(&self) -> Option<&ProfileDescriptor> {
        match self {
            ProfileLookup::Found(profile) => Some(profile),
            ProfileLookup::Missing { .. } => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, ProfileLookup::Missing { .. })
    }
}

/// Pick the first profile whose title matches exactly
pub fn resolve_profile(profiles: Vec<ProfileDescriptor>, title: &str) -> ProfileLookup {
    profiles
        .into_iter()
        .find(|p| p.title == title)
        .map(ProfileLookup::Found)
        .unwrap_or_else(|| ProfileLookup::Missing {
            title: title.to_string(),
        })
}

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct AuthReport {
    pub permissions: Permissions,
    pub lookup: ProfileLookup,
    /// Session generation published by this login
    pub generation: u64,
}

/// Runs logins against the launch service and publishes the results
#[derive(Clone)]
pub struct AuthSupervisor {
    service: Arc<dyn LaunchService>,
    session: SessionCell,
    title: String,
    shutdown: ShutdownToken,
}

impl AuthSupervisor {
    pub fn new(
        service: Arc<dyn LaunchService>,
        session: SessionCell,
        title: impl Into<String>,
        shutdown: ShutdownToken,
    ) -> Self {
        Self {
            service,
            session,
            title: title.into(),
            shutdown,
        }
    }

    pub fn session(&self) -> &SessionCell {
        &self.session
    }

    /// One login and profile resolution attempt
    pub async fn authenticate_once(&self) -> Result<AuthReport, AuthError> {
        self.service.connect().await?;

        let credentials = self.session.credentials();
        let permissions = self.service.login(&credentials).await?;
        tracing::debug!(login = credentials.login(), "login accepted");

        let profiles = self.service.profiles().await?;
        let available = profiles.len();
        let lookup = resolve_profile(profiles, &self.title);

        match &lookup {
            ProfileLookup::Found(profile) => tracing::info!(
                title = %profile.title,
                version = profile.version_or_unknown(),
                "profile selected"
            ),
            ProfileLookup::Missing { title } => tracing::warn!(
                title = %title,
                available,
                "profile not found"
            ),
        }

        let generation = self
            .session
            .publish_authenticated(permissions.clone(), lookup.profile().cloned());

        Ok(AuthReport {
            permissions,
            lookup,
            generation,
        })
    }

    /// Repeat `authenticate_once` under `policy`
    ///
    /// The shutdown token aborts the loop, including while it sleeps.
    pub async fn authenticate_with_retry(
        &self,
        policy: &RetryPolicy,
    ) -> Result<AuthReport, RetryError<AuthError>> {
        RetryExecutorBuilder::new()
            .with_policy(policy.clone())
            .with_observer(TracingObserver::new("authentication"))
            .with_shutdown(self.shutdown.clone())
            .build()
            .execute(|| self.authenticate_once())
            .await
    }

    /// Run `authenticate_with_retry` on a background task
    pub fn spawn_background(
        &self,
        policy: RetryPolicy,
    ) -> JoinHandle<Result<AuthReport, RetryError<AuthError>>> {
        let supervisor = self.clone();
        tokio::spawn(async move {
            let result = supervisor.authenticate_with_retry(&policy).await;
            match &result {
                Ok(report) => {
                    tracing::info!(generation = report.generation, "background authentication finished")
                }
                Err(e) if e.is_cancelled() => {
                    tracing::debug!("background authentication cancelled")
                }
                Err(e) => tracing::error!(error = %e, "background authentication failed"),
            }
            result
        })
    }
}

impl fmt::Debug for AuthSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSupervisor")
            .field("title", &self.title)
            .finish_non_exhaustive()
    }
}
