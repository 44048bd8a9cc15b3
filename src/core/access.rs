//! Access control: resolving who is calling, per route visibility.
//!
//! * Private entries read the session cookie.
//! * Public entries read an API key from the configured header, an
//!   `Authorization: Bearer` header, or the configured query parameter.
//! * Public entries that replaced their private source in place accept an
//!   API key first and fall back to the session.
//!
//! Nothing is cached between requests; every call goes to the stores.
use std::{collections::HashMap, sync::Arc};

use http::{HeaderMap, Uri, header};

use crate::{
    config::models::AuthConfig,
    core::{
        error::AccessError,
        identity::Identity,
        route::{RouteEntry, Visibility},
    },
    ports::identity_store::{ApiKeyStore, IdentityStoreError, SessionStore},
};

/// Resolves identities for matched route entries.
pub struct AccessControl {
    sessions: Arc<dyn SessionStore>,
    api_keys: Arc<dyn ApiKeyStore>,
    session_cookie: String,
    api_key_header: String,
    api_key_query: Option<String>,
}

impl AccessControl {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        api_keys: Arc<dyn ApiKeyStore>,
        auth: &AuthConfig,
    ) -> Self {
        Self {
            sessions,
            api_keys,
            session_cookie: auth.session_cookie.clone(),
            api_key_header: auth.api_key_header.to_ascii_lowercase(),
            api_key_query: auth.api_key_query.clone(),
        }
    }

    /// Resolve the caller for `entry`.
    ///
    /// `Ok(None)` is only possible on private entries that do not require
    /// authentication.
    pub async fn resolve(
        &self,
        entry: &RouteEntry,
        uri: &Uri,
        headers: &HeaderMap,
    ) -> Result<Option<Identity>, AccessError> {
        match entry.visibility {
            Visibility::Private => self.resolve_private(entry.authenticated, headers).await,
            Visibility::Public => {
                if let Some(key) = self.extract_api_key(uri, headers) {
                    return self.resolve_api_key(&key).await.map(Some);
                }
                if entry.session_fallback {
                    return self.resolve_private(true, headers).await;
                }
                Err(AccessError::Unauthenticated {
                    scheme: Visibility::Public,
                })
            }
        }
    }

    async fn resolve_private(
        &self,
        required: bool,
        headers: &HeaderMap,
    ) -> Result<Option<Identity>, AccessError> {
        let user = match self.session_token(headers) {
            Some(token) => self
                .sessions
                .lookup_session(&token)
                .await
                .map_err(store_error)?,
            None => None,
        };

        match user {
            Some(user) if !user.active && required => Err(AccessError::Forbidden {
                reason: format!("account {} is deactivated", user.id),
            }),
            Some(user) if !user.active => Ok(None),
            Some(user) => Ok(Some(Identity::Session(user))),
            None if required => Err(AccessError::Unauthenticated {
                scheme: Visibility::Private,
            }),
            None => Ok(None),
        }
    }

    async fn resolve_api_key(&self, key: &str) -> Result<Identity, AccessError> {
        let principal = self
            .api_keys
            .lookup_key(key)
            .await
            .map_err(store_error)?
            .ok_or(AccessError::Unauthenticated {
                scheme: Visibility::Public,
            })?;

        if principal.revoked {
            return Err(AccessError::Forbidden {
                reason: format!("API key {} has been revoked", principal.key_id),
            });
        }
        Ok(Identity::ApiKey(principal))
    }

    fn session_token(&self, headers: &HeaderMap) -> Option<String> {
        parse_cookies(headers)
            .remove(&self.session_cookie)
            .filter(|token| !token.is_empty())
    }

    /// Named header first, then `Authorization: Bearer`, then the query string.
    pub fn extract_api_key(&self, uri: &Uri, headers: &HeaderMap) -> Option<String> {
        let from_header = headers
            .get(self.api_key_header.as_str())
            .and_then(|v| v.to_str().ok())
            .or_else(|| {
                headers
                    .get(header::AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.strip_prefix("Bearer "))
            })
            .map(|key| key.trim().to_string());

        from_header
            .or_else(|| {
                let name = self.api_key_query.as_deref()?;
                let query = uri.query()?;
                url::form_urlencoded::parse(query.as_bytes())
                    .find(|(key, _)| key == name)
                    .map(|(_, value)| value.into_owned())
            })
            .filter(|key| !key.is_empty())
    }
}

/// Cookie name → value pairs from every `Cookie` header.
pub fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| {
            let mut parts = pair.trim().splitn(2, '=');
            let name = parts.next()?.trim();
            if name.is_empty() {
                return None;
            }
            let value = parts.next().unwrap_or("").trim().trim_matches('"');
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

fn store_error(err: IdentityStoreError) -> AccessError {
    AccessError::Unavailable(err.to_string())
}
