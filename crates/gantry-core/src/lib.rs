//! # gantry-core
//!
//! Core library for gantry providing:
//! - Wrapper configuration loading and persistence (JSON or YAML)
//! - Domain types for credentials, permissions and launch profiles
//! - The session cell shared by the auth supervisor and the control channel
//! - Retry execution engine with policy-based configuration
//! - Lifecycle event dispatch to installed modules

pub mod config;
pub mod error;
pub mod modules;
pub mod retry;
pub mod security;
pub mod session;
pub mod shutdown;
pub mod types;

pub use config::{ConfigStore, WrapperConfig};
pub use error::{Error, Result};
pub use session::{SessionCell, SessionState};
pub use shutdown::ShutdownToken;
