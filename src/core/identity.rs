//! Caller identities resolved per request.
use std::fmt;

use serde::{Deserialize, Serialize};

/// A signed-in application user, resolved from a session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// The owner of an API key presented on a public route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiPrincipal {
    /// Non-secret identifier of the key, safe to log.
    pub key_id: String,
    pub owner_id: String,
    #[serde(default)]
    pub revoked: bool,
}

/// Who is calling. Never stored on a route entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Identity {
    Session(SessionUser),
    ApiKey(ApiPrincipal),
}

impl Identity {
    /// Id of the account the request acts on behalf of.
    pub fn account_id(&self) -> &str {
        match self {
            Self::Session(user) => &user.id,
            Self::ApiKey(principal) => &principal.owner_id,
        }
    }

    pub fn session_user(&self) -> Option<&SessionUser> {
        match self {
            Self::Session(user) => Some(user),
            Self::ApiKey(_) => None,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session(user) => write!(f, "{}", user.email),
            Self::ApiKey(principal) => {
                write!(f, "api-key:{} ({})", principal.key_id, principal.owner_id)
            }
        }
    }
}
