//! Runtime environment preparation
//!
//! A `RuntimeEnvironmentSpec` is derived from configuration and the probed
//! capability, then applied by `EnvironmentBuilder::prepare`. Preparation
//! validates every entry before touching anything and then applies all of
//! them in one write, so a failure leaves the live context exactly as it was.

use crate::context::LoadContext;
use crate::error::EnvironmentError;
use crate::instrumentation::Instrumentation;
use gantry_core::WrapperConfig;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// How additional locations reach the wrapped program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStrategy {
    /// Append to the live default context
    Instrumentation,
    /// Build a fresh context from exactly the configured entries
    IsolatedLoader,
}

impl fmt::Display for LoadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadStrategy::Instrumentation => f.write_str("instrumentation"),
            LoadStrategy::IsolatedLoader => f.write_str("isolated-loader"),
        }
    }
}

/// Pick the strategy for `config` given whether instrumentation is available.
///
/// `Ok(None)` means there is nothing to apply.
pub fn select_strategy(
    config: &WrapperConfig,
    instrumentation: bool,
) -> Result<Option<LoadStrategy>, EnvironmentError> {
    if config.autoload_libraries && !instrumentation {
        return Err(EnvironmentError::InstrumentationUnavailable {
            feature: "autoloadLibraries",
        });
    }

    if config.custom_class_path {
        if instrumentation {
            return Ok(Some(LoadStrategy::Instrumentation));
        }
        if config.isolated_loader {
            return Ok(Some(LoadStrategy::IsolatedLoader));
        }
        return Err(EnvironmentError::IsolatedLoaderNotAllowed);
    }

    if config.autoload_libraries {
        return Ok(Some(LoadStrategy::Instrumentation));
    }
    Ok(None)
}

/// What to add to the wrapped program's environment, and how
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeEnvironmentSpec {
    pub entries: Vec<PathBuf>,
    pub strategy: Option<LoadStrategy>,
    pub autoload_dir: Option<PathBuf>,
}

impl RuntimeEnvironmentSpec {
    /// Nothing to apply
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            strategy: None,
            autoload_dir: None,
        }
    }

    pub fn from_config(
        config: &WrapperConfig,
        instrumentation: bool,
    ) -> Result<Self, EnvironmentError> {
        let strategy = select_strategy(config, instrumentation)?;

        let entries = if config.custom_class_path {
            if config.classpath.is_none() {
                return Err(EnvironmentError::InvalidConfig(
                    "classpath is null, customClassPath not available".to_string(),
                ));
            }
            config.classpath_entries()
        } else {
            Vec::new()
        };

        let autoload_dir = if config.autoload_libraries {
            match &config.libraries_dir {
                Some(dir) => Some(PathBuf::from(dir)),
                None => {
                    return Err(EnvironmentError::InvalidConfig(
                        "librariesDir is null, autoloadLibraries not available".to_string(),
                    ))
                }
            }
        } else {
            None
        };

        Ok(Self {
            entries,
            strategy,
            autoload_dir,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.strategy.is_none()
    }
}

/// Proof that the environment was applied (or deliberately skipped).
///
/// Only `EnvironmentBuilder::prepare` creates one, and the launcher will not
/// run without it.
#[derive(Debug, Clone)]
pub struct PreparedEnvironment {
    strategy: Option<LoadStrategy>,
    context: LoadContext,
    applied: Vec<PathBuf>,
}

impl PreparedEnvironment {
    pub fn strategy(&self) -> Option<LoadStrategy> {
        self.strategy
    }

    /// Context the entry point is resolved in
    pub fn context(&self) -> &LoadContext {
        &self.context
    }

    /// Locations added by preparation, in order
    pub fn applied(&self) -> &[PathBuf] {
        &self.applied
    }
}

/// Applies a `RuntimeEnvironmentSpec`
pub struct EnvironmentBuilder {
    instrumentation: Option<Arc<dyn Instrumentation>>,
    inherited: LoadContext,
}

impl EnvironmentBuilder {
    pub fn new(instrumentation: Option<Arc<dyn Instrumentation>>, inherited: LoadContext) -> Self {
        Self {
            instrumentation,
            inherited,
        }
    }

    pub fn has_instrumentation(&self) -> bool {
        self.instrumentation.is_some()
    }

    /// The live default context
    pub fn default_context(&self) -> LoadContext {
        match &self.instrumentation {
            Some(instrumentation) => instrumentation.current(),
            None => self.inherited.clone(),
        }
    }

    pub fn prepare(
        &self,
        spec: &RuntimeEnvironmentSpec,
    ) -> Result<PreparedEnvironment, EnvironmentError> {
        let Some(strategy) = spec.strategy else {
            tracing::debug!("no runtime environment changes configured");
            return Ok(PreparedEnvironment {
                strategy: None,
                context: self.default_context(),
                applied: Vec::new(),
            });
        };

        // Validate everything first; nothing below may fail after the apply
        let mut entries = Vec::with_capacity(spec.entries.len());
        for entry in &spec.entries {
            entries.push(validate_entry(entry)?);
        }
        if let Some(dir) = &spec.autoload_dir {
            let dir = validate_entry(dir)?;
            let found = discover_library_dirs(&dir)?;
            tracing::info!(dir = %dir.display(), count = found.len(), "autoloaded library directories");
            entries.extend(found);
        }

        let context = match strategy {
            LoadStrategy::Instrumentation => {
                let instrumentation = self.instrumentation.as_ref().ok_or(
                    EnvironmentError::InstrumentationUnavailable {
                        feature: "customClassPath",
                    },
                )?;
                instrumentation.append(&entries);
                instrumentation.current()
            }
            LoadStrategy::IsolatedLoader => {
                // A child of the default context: inherited lookups still
                // work, and the default context itself is left alone
                let mut context = self.default_context();
                context.extend(entries.iter().cloned());
                context
            }
        };

        tracing::info!(
            strategy = %strategy,
            entries = entries.len(),
            "runtime environment prepared"
        );
        Ok(PreparedEnvironment {
            strategy: Some(strategy),
            context,
            applied: entries,
        })
    }
}

impl fmt::Debug for EnvironmentBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvironmentBuilder")
            .field("instrumentation", &self.has_instrumentation())
            .field("inherited", &self.inherited)
            .finish()
    }
}

fn validate_entry(path: &Path) -> Result<PathBuf, EnvironmentError> {
    let metadata = std::fs::metadata(path).map_err(|_| EnvironmentError::MissingEntry {
        path: path.to_path_buf(),
    })?;
    if !metadata.is_dir() {
        return Err(EnvironmentError::NotADirectory {
            path: path.to_path_buf(),
        });
    }
    Ok(path.to_path_buf())
}

fn is_shared_library(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.ends_with(".so")
        || name.contains(".so.")
        || name.ends_with(".dylib")
        || name.ends_with(".dll")
}

/// Directories under `root` holding shared libraries, in discovery order
pub fn discover_library_dirs(root: &Path) -> Result<Vec<PathBuf>, EnvironmentError> {
    let mut dirs: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| EnvironmentError::Autoload {
            dir: root.to_path_buf(),
            message: e.to_string(),
        })?;
        if !entry.file_type().is_file() || !is_shared_library(entry.path()) {
            continue;
        }
        if let Some(parent) = entry.path().parent() {
            if !dirs.iter().any(|d| d == parent) {
                tracing::debug!(dir = %parent.display(), "found library directory");
                dirs.push(parent.to_path_buf());
            }
        }
    }
    Ok(dirs)
}
