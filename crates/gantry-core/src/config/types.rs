//! Wrapper configuration document

use crate::error::{Error, Result};
use crate::retry::{RetryPolicy, RetryStrategy};
use crate::types::Credentials;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Default launch service endpoint
const DEFAULT_ADDRESS: &str = "ws://localhost:9274/api";

/// Runtime environment flavour, controls the default log verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LauncherEnv {
    Dev,
    Debug,
    #[default]
    Std,
    Prod,
}

impl LauncherEnv {
    /// Default tracing filter directive for this environment
    pub fn default_filter(&self) -> &'static str {
        match self {
            LauncherEnv::Dev | LauncherEnv::Debug => "debug",
            LauncherEnv::Std => "info",
            LauncherEnv::Prod => "warn",
        }
    }
}

/// The on-disk wrapper configuration.
///
/// Field names follow the launch service's established configuration keys,
/// so most are renamed explicitly rather than through a blanket rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WrapperConfig {
    /// Profile title to select
    #[serde(default)]
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projectname: Option<String>,

    /// Control channel endpoint
    #[serde(default = "default_address")]
    pub address: String,

    #[serde(default)]
    pub login: String,

    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub auth_id: String,

    #[serde(rename = "syncAuth", default = "default_true")]
    pub sync_auth: bool,

    /// 0 retries forever
    #[serde(rename = "reconnectCount", default = "default_reconnect_count")]
    pub reconnect_count: u32,

    /// Milliseconds between attempts
    #[serde(rename = "reconnectSleep", default = "default_reconnect_sleep")]
    pub reconnect_sleep: u64,

    #[serde(rename = "reconnectBackoff", default)]
    pub reconnect_backoff: RetryStrategy,

    #[serde(rename = "reconnectMaxSleep", default = "default_reconnect_max_sleep")]
    pub reconnect_max_sleep: u64,

    #[serde(rename = "stopOnError", default = "default_true")]
    pub stop_on_error: bool,

    #[serde(rename = "customClassPath", default)]
    pub custom_class_path: bool,

    /// `:`-separated list of additional locations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classpath: Option<String>,

    /// Allow the isolated loader when no instrumentation is available
    #[serde(rename = "isolatedLoader", default)]
    pub isolated_loader: bool,

    #[serde(rename = "autoloadLibraries", default)]
    pub autoload_libraries: bool,

    #[serde(
        rename = "librariesDir",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub libraries_dir: Option<String>,

    /// Entry point name; falls back to the first command-line argument
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mainclass: Option<String>,

    /// Explicit argument list for the wrapped process
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,

    /// In async auth mode, wait for a session before launching
    #[serde(rename = "awaitSession", default)]
    pub await_session: bool,

    /// Milliseconds; 0 waits without limit
    #[serde(rename = "sessionWaitTimeout", default)]
    pub session_wait_timeout: u64,

    /// Milliseconds per control channel request
    #[serde(rename = "requestTimeout", default = "default_request_timeout")]
    pub request_timeout: u64,

    #[serde(rename = "logFile", default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,

    #[serde(default)]
    pub env: LauncherEnv,
}

fn default_address() -> String {
    DEFAULT_ADDRESS.to_string()
}
fn default_true() -> bool {
    true
}
fn default_reconnect_count() -> u32 {
    10
}
fn default_reconnect_sleep() -> u64 {
    1000
}
fn default_reconnect_max_sleep() -> u64 {
    30000
}
fn default_request_timeout() -> u64 {
    10000
}

impl Default for WrapperConfig {
    fn default() -> Self {
        Self {
            title: "Your profile title".to_string(),
            projectname: Some("MineCraft".to_string()),
            address: default_address(),
            login: "login".to_string(),
            password: "password".to_string(),
            auth_id: String::new(),
            sync_auth: true,
            reconnect_count: default_reconnect_count(),
            reconnect_sleep: default_reconnect_sleep(),
            reconnect_backoff: RetryStrategy::default(),
            reconnect_max_sleep: default_reconnect_max_sleep(),
            stop_on_error: true,
            custom_class_path: false,
            classpath: None,
            isolated_loader: false,
            autoload_libraries: false,
            libraries_dir: None,
            mainclass: Some(String::new()),
            args: None,
            await_session: false,
            session_wait_timeout: 0,
            request_timeout: default_request_timeout(),
            log_file: None,
            env: LauncherEnv::Std,
        }
    }
}

impl WrapperConfig {
    /// Check the parts of the document that serde cannot
    pub fn validate(&self) -> Result<()> {
        self.endpoint()?;
        if self.custom_class_path && self.classpath.is_none() {
            return Err(Error::invalid_config(
                "classpath is null, customClassPath not available",
            ));
        }
        if self.autoload_libraries && self.libraries_dir.is_none() {
            return Err(Error::invalid_config(
                "librariesDir is null, autoloadLibraries not available",
            ));
        }
        Ok(())
    }

    /// Parsed control channel endpoint
    pub fn endpoint(&self) -> Result<Url> {
        let url = Url::parse(&self.address).map_err(|e| {
            Error::invalid_config(format!("invalid address '{}': {}", self.address, e))
        })?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(Error::invalid_config(format!(
                "address must use ws:// or wss://, got {}://",
                other
            ))),
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(
            self.login.clone(),
            self.password.clone(),
            self.auth_id.clone(),
        )
    }

    /// Retry policy for authentication and channel reconnects
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.reconnect_count,
            strategy: self.reconnect_backoff,
            backoff_multiplier: 2.0,
            interval_ms: self.reconnect_sleep,
            max_delay_ms: self.reconnect_max_sleep.max(self.reconnect_sleep),
        }
    }

    /// Configured entry point, if any non-empty one is set
    pub fn entry_point(&self) -> Option<&str> {
        self.mainclass.as_deref().filter(|m| !m.is_empty())
    }

    /// Entries of the custom classpath, in order, empty segments dropped
    pub fn classpath_entries(&self) -> Vec<PathBuf> {
        self.classpath
            .as_deref()
            .map(|cp| {
                cp.split(':')
                    .filter(|s| !s.is_empty())
                    .map(PathBuf::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout)
    }

    /// `None` when the session wait has no limit
    pub fn session_wait_timeout(&self) -> Option<Duration> {
        (self.session_wait_timeout > 0).then(|| Duration::from_millis(self.session_wait_timeout))
    }
}
