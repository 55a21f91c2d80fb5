//! The instrumentation capability
//!
//! When gantry runs as the process agent it owns the live default load
//! context and may extend it in place. Without that role the only way to
//! add locations is a separate, isolated context.

use crate::context::LoadContext;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// In-process facility that extends the live default load context
pub trait Instrumentation: Send + Sync {
    fn name(&self) -> &str;

    /// Append every entry in one step. Entries are already validated.
    fn append(&self, entries: &[PathBuf]);

    /// Snapshot of the live context
    fn current(&self) -> LoadContext;
}

/// The default load context, shared and extensible
#[derive(Debug, Default)]
pub struct LiveContext {
    context: RwLock<LoadContext>,
}

impl LiveContext {
    pub fn new(initial: LoadContext) -> Self {
        Self {
            context: RwLock::new(initial),
        }
    }
}

impl Instrumentation for LiveContext {
    fn name(&self) -> &str {
        "live-context"
    }

    fn append(&self, entries: &[PathBuf]) {
        // A poisoned lock still holds a whole context, never a partial one
        let mut guard = self.context.write().unwrap_or_else(|e| e.into_inner());
        let mut next = guard.clone();
        next.extend(entries.iter().cloned());
        *guard = next;
    }

    fn current(&self) -> LoadContext {
        self.context
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Probe for the capability: it exists only when gantry was started as the
/// process agent.
pub fn probe_agent(is_agent: bool, initial: LoadContext) -> Option<Arc<dyn Instrumentation>> {
    if is_agent {
        tracing::debug!("running as process agent, instrumentation available");
        Some(Arc::new(LiveContext::new(initial)))
    } else {
        tracing::debug!("not running as process agent, instrumentation unavailable");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_extends_live_context() {
        let live = LiveContext::new(LoadContext::new(vec![PathBuf::from("/usr/lib")]));
        live.append(&[PathBuf::from("/opt/a"), PathBuf::from("/opt/b")]);
        assert_eq!(
            live.current().dirs(),
            &[
                PathBuf::from("/usr/lib"),
                PathBuf::from("/opt/a"),
                PathBuf::from("/opt/b")
            ]
        );
    }

    #[test]
    fn test_probe_requires_agent_role() {
        assert!(probe_agent(false, LoadContext::default()).is_none());
        let capability = probe_agent(true, LoadContext::default()).unwrap();
        assert_eq!(capability.name(), "live-context");
    }
}
