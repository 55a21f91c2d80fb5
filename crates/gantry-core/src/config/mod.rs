//! Configuration loading and management

mod loader;
mod types;

pub use loader::{ConfigFormat, ConfigStore};
pub use types::{LauncherEnv, WrapperConfig};
