//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::Parser;

/// Gantry - bootstrap and supervise a server for a remote launch service
#[derive(Parser, Debug)]
#[command(name = "gantry")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Path to the wrapper configuration (.json, .yaml or .yml)
    #[arg(short, long, env = "GANTRY_CONFIG", default_value = "gantry.json")]
    pub config: Utf8PathBuf,

    /// Directory of lifecycle module executables
    #[arg(long, env = "GANTRY_MODULES_DIR")]
    pub modules_dir: Option<Utf8PathBuf>,

    /// Run as the process agent, which makes instrumentation available
    #[arg(long, env = "GANTRY_AGENT")]
    pub agent: bool,

    /// Replace this process with the entry point instead of supervising it
    #[cfg(unix)]
    #[arg(long, env = "GANTRY_EXEC")]
    pub exec: bool,

    /// Treat a leading `setup` as an ordinary argument
    #[arg(long, env = "GANTRY_DISABLE_SETUP")]
    pub disable_setup: bool,

    /// Entry point (unless configured) followed by its arguments, or `setup`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl Cli {
    /// True when the interactive setup wizard was requested
    pub fn wants_setup(&self) -> bool {
        !self.disable_setup && self.args.first().is_some_and(|a| a == "setup")
    }

    #[cfg(unix)]
    pub fn launch_mode(&self) -> gantry_runtime::LaunchMode {
        if self.exec {
            gantry_runtime::LaunchMode::Replace
        } else {
            gantry_runtime::LaunchMode::Child
        }
    }

    #[cfg(not(unix))]
    pub fn launch_mode(&self) -> gantry_runtime::LaunchMode {
        gantry_runtime::LaunchMode::Child
    }
}
