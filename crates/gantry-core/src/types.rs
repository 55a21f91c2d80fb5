//! Domain types shared between the auth supervisor, the control channel and
//! the launcher.

use crate::security::SecureString;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Credentials presented to the launch service.
///
/// Immutable once constructed. The secret never appears in `Debug` output.
#[derive(Clone)]
pub struct Credentials {
    login: String,
    secret: SecureString,
    client_tag: String,
}

impl Credentials {
    pub fn new(
        login: impl Into<String>,
        secret: impl Into<SecureString>,
        client_tag: impl Into<String>,
    ) -> Self {
        Self {
            login: login.into(),
            secret: secret.into(),
            client_tag: client_tag.into(),
        }
    }

    pub fn login(&self) -> &str {
        &self.login
    }

    pub fn secret(&self) -> &SecureString {
        &self.secret
    }

    /// Client-instance tag (`auth_id` in the configuration file)
    pub fn client_tag(&self) -> &str {
        &self.client_tag
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("secret", &"[REDACTED]")
            .field("client_tag", &self.client_tag)
            .finish()
    }
}

/// Capability set granted by a successful login
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default)]
    capabilities: BTreeSet<String>,
}

impl Permissions {
    pub fn new<I, S>(capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            capabilities: capabilities.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.capabilities.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

/// A server configuration bundle published by the launch service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileDescriptor {
    pub title: String,

    #[serde(default)]
    pub version: Option<String>,

    /// Launch metadata the orchestrator passes through untouched
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl ProfileDescriptor {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            version: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Version for display, "unknown" when the service did not send one
    pub fn version_or_unknown(&self) -> &str {
        self.version.as_deref().unwrap_or("unknown")
    }
}
