//! Lifecycle event dispatch to installed modules
//!
//! Modules are opaque extensions. The host only promises to call each of
//! them, in registration order, at three fixed points of startup.

use crate::config::WrapperConfig;
use crate::error::{Error, Result};
use crate::session::SessionState;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Fixed points at which modules are notified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// Configuration loaded, nothing connected yet
    PreConfig,
    /// Authentication finished (or was started in the background)
    Init,
    /// Runtime environment prepared, entry point not yet invoked
    PostInit,
}

impl LifecycleEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEvent::PreConfig => "pre-config",
            LifecycleEvent::Init => "init",
            LifecycleEvent::PostInit => "post-init",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a module sees when an event fires
#[derive(Debug, Clone)]
pub struct LifecycleContext {
    pub event: LifecycleEvent,
    pub config: Arc<WrapperConfig>,
    pub session: Arc<SessionState>,
}

/// An installed extension
#[async_trait]
pub trait Module: Send + Sync {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    /// Handle one lifecycle event. An error aborts startup.
    async fn on_event(&self, ctx: &LifecycleContext) -> anyhow::Result<()>;
}

/// Ordered set of modules
#[derive(Default)]
pub struct ModuleRegistry {
    modules: Vec<Box<dyn Module>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, module: Box<dyn Module>) {
        tracing::debug!(module = module.name(), "registered module");
        self.modules.push(module);
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name()).collect()
    }

    /// Notify every module of `event`, stopping at the first failure
    pub async fn dispatch(
        &self,
        event: LifecycleEvent,
        config: Arc<WrapperConfig>,
        session: Arc<SessionState>,
    ) -> Result<()> {
        let ctx = LifecycleContext {
            event,
            config,
            session,
        };
        for module in &self.modules {
            tracing::debug!(module = module.name(), phase = %event, "dispatching lifecycle event");
            module
                .on_event(&ctx)
                .await
                .map_err(|e| Error::module(module.name(), event.as_str(), format!("{:#}", e)))?;
        }
        Ok(())
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.names())
            .finish()
    }
}
