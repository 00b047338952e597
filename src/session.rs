//! Authentication and discovery state.
//!
//! [`Session`] is a plain value; every transition builds a new one so the
//! client can swap it in with a single assignment once a network step has
//! completed. A login or discovery future that is dropped half-way therefore
//! leaves the previous session untouched.

use std::fmt;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::protocol::{STATUS_OK, scalar_string, status_of};
use crate::{Error, Result};

#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Lowercase hex SHA-256 of the password; the only form sent on the wire.
    pub fn password_digest(&self) -> String {
        hex::encode(Sha256::digest(self.password.as_bytes()))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
}

/// Device ids harvested from the house listing, per family.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceIds {
    pub thermostats: Vec<String>,
    pub ventilation: Vec<String>,
}

/// Result of a house listing that contained at least one house.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    pub house_id: String,
    pub device_ids: DeviceIds,
}

#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    auth_token: Option<String>,
    user_id: Option<String>,
    house_id: Option<String>,
    device_ids: DeviceIds,
}

impl Session {
    pub fn state(&self) -> SessionState {
        if self.auth_token.is_some() && self.user_id.is_some() {
            SessionState::Authenticated
        } else {
            SessionState::Unauthenticated
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == SessionState::Authenticated
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn house_id(&self) -> Option<&str> {
        self.house_id.as_deref()
    }

    pub fn device_ids(&self) -> &DeviceIds {
        &self.device_ids
    }

    /// A fresh login drops whatever was discovered under the previous token.
    pub fn authenticated(token: String, user_id: String) -> Self {
        Self {
            auth_token: Some(token),
            user_id: Some(user_id),
            ..Self::default()
        }
    }

    /// Replaces house and id caches; `None` means the account has no house.
    pub fn with_discovery(self, discovery: Option<Discovery>) -> Self {
        match discovery {
            Some(d) => Self {
                house_id: Some(d.house_id),
                device_ids: d.device_ids,
                ..self
            },
            None => Self {
                house_id: None,
                device_ids: DeviceIds::default(),
                ..self
            },
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("user_id", &self.user_id)
            .field("house_id", &self.house_id)
            .field("device_ids", &self.device_ids)
            .finish()
    }
}

/// Extracts `(token, user_id)` from a login envelope.
pub fn parse_login(envelope: &Value) -> Result<(String, String)> {
    if status_of(envelope) != Some(STATUS_OK) {
        return Err(Error::AuthenticationFailed("invalid credentials".to_string()));
    }
    let token = non_empty(envelope.get("token"));
    // A numeric id of 0 counts as missing.
    let user_id = non_empty(envelope.get("id").filter(|id| id.as_f64() != Some(0.0)));
    match (token, user_id) {
        (Some(token), Some(user_id)) => Ok((token, user_id)),
        _ => Err(Error::AuthenticationFailed(
            "login response missing token or user id".to_string(),
        )),
    }
}

/// Reads the house listing. Only the first house is used; accounts are
/// single-house in practice.
pub fn parse_discovery(envelope: &Value) -> Option<Discovery> {
    let house_id = envelope
        .get("houses")
        .and_then(|v| v.as_object())
        .and_then(|houses| houses.keys().next())?
        .clone();

    Some(Discovery {
        house_id,
        device_ids: DeviceIds {
            thermostats: id_list(envelope.get("cronoIDs")),
            ventilation: id_list(envelope.get("ecoIDs")),
        },
    })
}

fn id_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(|v| non_empty(Some(v))).collect(),
        _ => Vec::new(),
    }
}

fn non_empty(value: Option<&Value>) -> Option<String> {
    value
        .and_then(scalar_string)
        .filter(|s| !s.is_empty())
}
