//! Error types for gantry-runtime

use std::path::PathBuf;
use thiserror::Error;

/// Failures while preparing the runtime environment. All of them are
/// configuration errors: retrying cannot fix them.
#[derive(Error, Debug)]
pub enum EnvironmentError {
    /// The strategy needs the instrumentation capability, which this process lacks
    #[error("{feature} requires instrumentation; start gantry as the process agent (--agent)")]
    InstrumentationUnavailable { feature: &'static str },

    #[error("customClassPath is set but no instrumentation is available and isolatedLoader is not allowed")]
    IsolatedLoaderNotAllowed,

    #[error("{0}")]
    InvalidConfig(String),

    #[error("environment entry not found: {}", .path.display())]
    MissingEntry { path: PathBuf },

    #[error("environment entry is not a directory: {}", .path.display())]
    NotADirectory { path: PathBuf },

    #[error("failed to scan libraries in {}: {message}", .dir.display())]
    Autoload { dir: PathBuf, message: String },
}

/// Failures while resolving or invoking the entry point
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("no entry point configured: set mainclass or pass the program as the first argument")]
    NoEntryPoint,

    #[error("entry point not found: {name}")]
    EntryPointNotFound { name: String },

    #[error("entry point is not an executable file: {}", .path.display())]
    NotExecutable { path: PathBuf },

    #[error("refusing to launch before the runtime environment is prepared")]
    EnvironmentNotPrepared,

    #[error("entry point was already launched")]
    AlreadyLaunched,

    #[error("failed to invoke {}: {source}", .path.display())]
    Invoke {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
