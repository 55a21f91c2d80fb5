//! # gantry-runtime
//!
//! Everything between "identity is known" and "the wrapped program runs":
//! - `LoadContext`, the ordered directories programs and libraries resolve from
//! - `Instrumentation`, the in-process capability to extend the live context
//! - `EnvironmentBuilder`, which applies a `RuntimeEnvironmentSpec` all-or-nothing
//! - `ProcessLauncher`, which resolves and invokes the entry point exactly once

pub mod context;
pub mod environment;
pub mod error;
pub mod instrumentation;
pub mod launcher;

pub use context::LoadContext;
pub use environment::{
    discover_library_dirs, select_strategy, EnvironmentBuilder, LoadStrategy, PreparedEnvironment,
    RuntimeEnvironmentSpec,
};
pub use error::{EnvironmentError, LaunchError};
pub use instrumentation::{probe_agent, Instrumentation, LiveContext};
pub use launcher::{
    entry_point_name, select_arguments, EntryPoint, EntryPointResolver, LaunchMode, LaunchPlan,
    ProcessLauncher, Program, ProgramResolver,
};
