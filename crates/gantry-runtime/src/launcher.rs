//! Entry point resolution and the single, final invocation

use crate::context::{LoadContext, LIBRARY_PATH_VAR};
use crate::environment::PreparedEnvironment;
use crate::error::LaunchError;
use gantry_core::SessionState;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// How the wrapped program takes over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LaunchMode {
    /// Run as a child and return its exit code. The control channel stays
    /// up for as long as the child runs.
    #[default]
    Child,
    /// Replace the gantry process image; success never returns and the
    /// control channel goes away with the old image
    #[cfg(unix)]
    Replace,
}

/// A resolved, invocable entry point
pub trait EntryPoint: Send + fmt::Debug {
    fn path(&self) -> &Path;

    fn invoke(
        self: Box<Self>,
        args: &[String],
        env: &[(String, OsString)],
        mode: LaunchMode,
    ) -> Result<i32, LaunchError>;
}

/// Looks entry points up by name in a load context
pub trait EntryPointResolver: Send + Sync {
    fn resolve(&self, name: &str, context: &LoadContext) -> Result<Box<dyn EntryPoint>, LaunchError>;
}

/// An executable file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    path: PathBuf,
}

impl Program {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl EntryPoint for Program {
    fn path(&self) -> &Path {
        &self.path
    }

    fn invoke(
        self: Box<Self>,
        args: &[String],
        env: &[(String, OsString)],
        mode: LaunchMode,
    ) -> Result<i32, LaunchError> {
        match mode {
            #[cfg(unix)]
            LaunchMode::Replace => {
                use std::os::unix::process::CommandExt;
                let mut command = std::process::Command::new(&self.path);
                command.args(args);
                for (key, value) in env {
                    command.env(key, value);
                }
                // exec only returns on failure
                let source = command.exec();
                Err(LaunchError::Invoke {
                    path: self.path,
                    source,
                })
            }
            LaunchMode::Child => {
                let mut expression = duct::cmd(&self.path, args).unchecked();
                for (key, value) in env {
                    expression = expression.env(key, value);
                }
                let output = expression.run().map_err(|source| LaunchError::Invoke {
                    path: self.path.clone(),
                    source,
                })?;
                // Killed by a signal: report like a shell would
                Ok(output.status.code().unwrap_or(-1))
            }
        }
    }
}

/// Resolves names to executables, the way a shell would within the context
#[derive(Debug, Clone, Default)]
pub struct ProgramResolver;

impl EntryPointResolver for ProgramResolver {
    fn resolve(&self, name: &str, context: &LoadContext) -> Result<Box<dyn EntryPoint>, LaunchError> {
        let path = if name.contains(std::path::MAIN_SEPARATOR) || name.contains('/') {
            let path = PathBuf::from(name);
            if !path.exists() {
                return Err(LaunchError::EntryPointNotFound {
                    name: name.to_string(),
                });
            }
            path
        } else {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            which::which_in(name, Some(context.search_path()), cwd).map_err(|_| {
                LaunchError::EntryPointNotFound {
                    name: name.to_string(),
                }
            })?
        };

        if !is_executable(&path) {
            return Err(LaunchError::NotExecutable { path });
        }
        tracing::debug!(name, path = %path.display(), "resolved entry point");
        Ok(Box::new(Program::new(path)))
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Entry point name: configured one first, else the first command-line argument
pub fn entry_point_name(configured: Option<&str>, cli_args: &[String]) -> Result<String, LaunchError> {
    configured
        .or_else(|| cli_args.first().map(String::as_str))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or(LaunchError::NoEntryPoint)
}

/// Arguments for the wrapped program.
///
/// Configured arguments are used verbatim. Otherwise the leading command-line
/// argument is dropped and the rest forwarded, whether or not it named the
/// entry point.
pub fn select_arguments(configured: Option<&[String]>, cli_args: &[String]) -> Vec<String> {
    match configured {
        Some(args) => args.to_vec(),
        None => cli_args.iter().skip(1).cloned().collect(),
    }
}

/// Everything the launcher needs for the one invocation
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    pub entry_point: String,
    pub args: Vec<String>,
    pub project: Option<String>,
    /// Frozen snapshot; later session updates are not seen by the launch
    pub session: Arc<SessionState>,
    pub environment: Option<PreparedEnvironment>,
}

impl LaunchPlan {
    pub fn new(entry_point: impl Into<String>, args: Vec<String>, session: Arc<SessionState>) -> Self {
        Self {
            entry_point: entry_point.into(),
            args,
            project: None,
            session,
            environment: None,
        }
    }

    pub fn with_environment(mut self, environment: PreparedEnvironment) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn with_project(mut self, project: Option<String>) -> Self {
        self.project = project;
        self
    }

    /// Variables exported to the wrapped program
    pub fn exported_env(&self, context: &LoadContext) -> Vec<(String, OsString)> {
        let mut env = Vec::new();
        if let Some(project) = &self.project {
            env.push(("GANTRY_PROJECT".to_string(), OsString::from(project)));
        }
        if let Some(profile) = &self.session.profile {
            env.push(("GANTRY_PROFILE".to_string(), OsString::from(&profile.title)));
            env.push((
                "GANTRY_PROFILE_VERSION".to_string(),
                OsString::from(profile.version_or_unknown()),
            ));
        }
        env.push((LIBRARY_PATH_VAR.to_string(), context.library_path()));
        env
    }
}

/// Invokes the entry point at most once
pub struct ProcessLauncher {
    resolver: Box<dyn EntryPointResolver>,
    mode: LaunchMode,
    launched: AtomicBool,
}

impl ProcessLauncher {
    pub fn new(resolver: Box<dyn EntryPointResolver>, mode: LaunchMode) -> Self {
        Self {
            resolver,
            mode,
            launched: AtomicBool::new(false),
        }
    }

    pub fn has_launched(&self) -> bool {
        self.launched.load(Ordering::SeqCst)
    }

    /// Resolve and invoke the plan's entry point.
    ///
    /// In `Replace` mode this only returns on failure.
    pub fn launch(&self, plan: LaunchPlan) -> Result<i32, LaunchError> {
        let environment = plan
            .environment
            .as_ref()
            .ok_or(LaunchError::EnvironmentNotPrepared)?;
        if self.launched.swap(true, Ordering::SeqCst) {
            return Err(LaunchError::AlreadyLaunched);
        }

        let context = environment.context();
        let entry = self.resolver.resolve(&plan.entry_point, context)?;
        let env = plan.exported_env(context);

        tracing::info!(
            entry_point = %entry.path().display(),
            args = plan.args.len(),
            mode = ?self.mode,
            "launching"
        );
        entry.invoke(&plan.args, &env, self.mode)
    }
}

impl fmt::Debug for ProcessLauncher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessLauncher")
            .field("mode", &self.mode)
            .field("launched", &self.has_launched())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_configured_args_are_verbatim() {
        let configured = strings(&["--nogui"]);
        let args = select_arguments(Some(&configured), &strings(&["server", "--port", "1"]));
        assert_eq!(args, strings(&["--nogui"]));
    }

    #[test]
    fn test_leading_cli_arg_is_stripped() {
        let args = select_arguments(None, &strings(&["server", "--port", "1"]));
        assert_eq!(args, strings(&["--port", "1"]));
        assert!(select_arguments(None, &[]).is_empty());
    }

    #[test]
    fn test_entry_point_name_prefers_config() {
        let cli = strings(&["from-cli"]);
        assert_eq!(entry_point_name(Some("configured"), &cli).unwrap(), "configured");
        assert_eq!(entry_point_name(None, &cli).unwrap(), "from-cli");
        assert!(matches!(
            entry_point_name(None, &[]),
            Err(LaunchError::NoEntryPoint)
        ));
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    #[test]
    fn test_exported_library_path_leaves_out_program_dirs() {
        let session = gantry_core::SessionCell::new(gantry_core::types::Credentials::new(
            "srv", "pw", "",
        ))
        .snapshot();
        let plan = LaunchPlan::new("server-start", Vec::new(), session);
        let context = LoadContext::new(vec![PathBuf::from("/opt/lib"), PathBuf::from("/srv/native")])
            .with_program_dirs(vec![PathBuf::from("/usr/bin")]);

        let env = plan.exported_env(&context);
        let library_path = env
            .iter()
            .find(|(name, _)| name == LIBRARY_PATH_VAR)
            .map(|(_, value)| value.clone());

        assert_eq!(library_path, Some(OsString::from("/opt/lib:/srv/native")));
    }

    #[test]
    fn test_unknown_entry_point_is_config_error() {
        let context = LoadContext::new(vec![std::env::temp_dir()]);
        let err = ProgramResolver
            .resolve("definitely-not-a-real-program-xyz", &context)
            .unwrap_err();
        assert!(matches!(err, LaunchError::EntryPointNotFound { .. }));
    }
}
