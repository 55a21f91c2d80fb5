//! Lifecycle modules backed by executables in the modules directory

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use gantry_core::modules::{LifecycleContext, Module, ModuleRegistry};

/// A module implemented as an external executable.
///
/// It is run once per lifecycle event with the phase name as its only
/// argument; a non-zero exit rejects the event.
#[derive(Debug, Clone)]
pub struct HookModule {
    name: String,
    path: Utf8PathBuf,
}

impl HookModule {
    pub fn new(path: Utf8PathBuf) -> Self {
        let name = path.file_stem().unwrap_or(path.as_str()).to_string();
        Self { name, path }
    }
}

#[async_trait]
impl Module for HookModule {
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_event(&self, ctx: &LifecycleContext) -> Result<()> {
        let phase = ctx.event.as_str();
        let mut expression = duct::cmd(self.path.as_std_path(), [phase])
            .env("GANTRY_PHASE", phase)
            .env("GANTRY_TITLE", &ctx.config.title)
            .stdout_to_stderr()
            .unchecked();
        if let Some(profile) = &ctx.session.profile {
            expression = expression.env("GANTRY_PROFILE", &profile.title);
        }

        let output = tokio::task::spawn_blocking(move || expression.run())
            .await
            .context("module task failed")?
            .with_context(|| format!("failed to run {}", self.path))?;

        if !output.status.success() {
            bail!("{} exited with {}", self.path, output.status);
        }
        Ok(())
    }
}

/// Register every executable directly inside `dir`, in file-name order
pub fn load_modules(dir: &Utf8Path) -> Result<ModuleRegistry> {
    let mut paths = Vec::new();
    for entry in dir
        .read_dir_utf8()
        .with_context(|| format!("failed to read modules directory {}", dir))?
    {
        let entry = entry?;
        let path = entry.path().to_path_buf();
        if is_executable(&path) {
            paths.push(path);
        } else {
            tracing::debug!(path = %path, "skipping non-executable entry in modules directory");
        }
    }
    paths.sort();

    let mut registry = ModuleRegistry::new();
    for path in paths {
        registry.register(Box::new(HookModule::new(path)));
    }
    tracing::info!(count = registry.len(), dir = %dir, "loaded modules");
    Ok(registry)
}

#[cfg(unix)]
fn is_executable(path: &Utf8Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Utf8Path) -> bool {
    path.is_file()
}
