//! Passwords in memory
//!
//! `SecureString` keeps the launch-service password out of logs and
//! `Debug` output and wipes it when dropped. Serialization writes the plain
//! value; the auth request is the only place that needs it.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct SecureString(String);

impl SecureString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The plain value
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for SecureString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SecureString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.0.is_empty() {
            "SecureString(<empty>)"
        } else {
            "SecureString(<redacted>)"
        })
    }
}

impl fmt::Display for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl Serialize for SecureString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SecureString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatting_never_shows_password() {
        let password = SecureString::from("hunter2");
        assert_eq!(password.to_string(), "<redacted>");
        assert_eq!(format!("{:?}", password), "SecureString(<redacted>)");
        assert_eq!(format!("{:?}", SecureString::default()), "SecureString(<empty>)");
    }

    #[test]
    fn test_serializes_plain_value_for_the_wire() {
        let password = SecureString::new("s3cret");
        assert_eq!(password.expose(), "s3cret");
        assert_eq!(serde_json::to_string(&password).unwrap(), "\"s3cret\"");
        let back: SecureString = serde_json::from_str("\"s3cret\"").unwrap();
        assert_eq!(back.expose(), "s3cret");
    }
}
