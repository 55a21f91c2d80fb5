//! JSON envelopes exchanged over the control channel
//!
//! Every frame is one JSON object tagged by `type`. Requests carry a
//! `requestUUID` that the matching response echoes; frames without a known
//! id are unsolicited and ignored by the client.

use gantry_core::security::SecureString;
use gantry_core::types::{Credentials, Permissions, ProfileDescriptor};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Authentication flavour understood by the launch service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuthType {
    Api,
    Client,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Request {
    Auth {
        login: String,
        password: SecureString,
        auth_id: String,
        #[serde(rename = "authType")]
        auth_type: AuthType,
    },
    Profiles,
}

impl Request {
    /// Server-side (API) login for the given credentials
    pub fn auth(credentials: &Credentials) -> Self {
        Request::Auth {
            login: credentials.login().to_string(),
            password: credentials.secret().clone(),
            auth_id: credentials.client_tag().to_string(),
            auth_type: AuthType::Api,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Request::Auth { .. } => "auth",
            Request::Profiles => "profiles",
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Auth {
                login,
                auth_id,
                auth_type,
                ..
            } => f
                .debug_struct("Auth")
                .field("login", login)
                .field("password", &"[REDACTED]")
                .field("auth_id", auth_id)
                .field("auth_type", auth_type)
                .finish(),
            Request::Profiles => f.write_str("Profiles"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Response {
    Auth {
        #[serde(default)]
        permissions: Permissions,
    },
    Profiles {
        #[serde(default)]
        profiles: Vec<ProfileDescriptor>,
    },
    Error {
        error: String,
    },
}

impl Response {
    pub fn kind(&self) -> &'static str {
        match self {
            Response::Auth { .. } => "auth",
            Response::Profiles { .. } => "profiles",
            Response::Error { .. } => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    #[serde(rename = "requestUUID")]
    pub request_uuid: Uuid,
    #[serde(flatten)]
    pub body: Request,
}

impl RequestEnvelope {
    pub fn new(body: Request) -> Self {
        Self {
            request_uuid: Uuid::new_v4(),
            body,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(rename = "requestUUID", default, skip_serializing_if = "Option::is_none")]
    pub request_uuid: Option<Uuid>,
    #[serde(flatten)]
    pub body: Response,
}

impl ResponseEnvelope {
    pub fn reply(request_uuid: Uuid, body: Response) -> Self {
        Self {
            request_uuid: Some(request_uuid),
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_request_wire_shape() {
        let creds = Credentials::new("srv", "pw", "std");
        let envelope = RequestEnvelope::new(Request::auth(&creds));
        let value: serde_json::Value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["type"], "auth");
        assert_eq!(value["login"], "srv");
        assert_eq!(value["password"], "pw");
        assert_eq!(value["auth_id"], "std");
        assert_eq!(value["authType"], "API");
        assert_eq!(value["requestUUID"], envelope.request_uuid.to_string());
    }

    #[test]
    fn test_request_debug_hides_password() {
        let creds = Credentials::new("srv", "hunter2", "");
        let debug = format!("{:?}", Request::auth(&creds));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_profiles_response_parses() {
        let frame = r#"{
            "type": "profiles",
            "requestUUID": "6b1c1a52-3b38-4cf1-9e67-1f2a86d3a2c5",
            "profiles": [{"title": "A"}, {"title": "B", "version": "1.20.1"}]
        }"#;
        let envelope: ResponseEnvelope = serde_json::from_str(frame).unwrap();
        assert!(envelope.request_uuid.is_some());
        match envelope.body {
            Response::Profiles { profiles } => {
                assert_eq!(profiles.len(), 2);
                assert_eq!(profiles[1].version_or_unknown(), "1.20.1");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unsolicited_frame_has_no_id() {
        let envelope: ResponseEnvelope =
            serde_json::from_str(r#"{"type":"error","error":"maintenance"}"#).unwrap();
        assert_eq!(envelope.request_uuid, None);
        assert_eq!(envelope.body.kind(), "error");
    }
}
