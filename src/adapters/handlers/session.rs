//! Session and credential handlers: sign-in, sign-out, current user and API
//! key issuance.
use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use eyre::WrapErr;
use http::{HeaderValue, Method, StatusCode, header};
use serde::Deserialize;
use serde_json::json;

use super::{json_response, redirect_response};
use crate::{
    config::models::AuthConfig,
    core::access::parse_cookies,
    ports::{
        handler::{HandlerError, HandlerRequest, HandlerResult, RouteHandler},
        identity_store::{ApiKeyStore, CredentialVerifier, IdentityStoreError, SessionStore},
    },
};

fn store_failure(e: IdentityStoreError) -> HandlerError {
    HandlerError::Internal(eyre::Report::new(e))
}

/// Only same-site absolute paths are accepted as post sign-in targets.
fn safe_next(next: Option<String>) -> Option<String> {
    next.filter(|n| n.starts_with('/') && !n.starts_with("//") && !n.starts_with("/\\"))
}

fn session_cookie(auth: &AuthConfig, token: &str, max_age: Duration) -> String {
    let mut cookie = format!(
        "{}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        auth.session_cookie,
        max_age.as_secs()
    );
    if auth.secure_cookies {
        cookie.push_str("; Secure");
    }
    cookie
}

#[derive(Debug, Deserialize)]
struct Credentials {
    email: String,
    password: String,
}

/// `GET` describes the expected form; `POST {email, password}` opens a
/// session and sets the session cookie.
pub struct SignInHandler {
    credentials: Arc<dyn CredentialVerifier>,
    sessions: Arc<dyn SessionStore>,
    auth: AuthConfig,
}

impl SignInHandler {
    pub fn new(
        credentials: Arc<dyn CredentialVerifier>,
        sessions: Arc<dyn SessionStore>,
        auth: AuthConfig,
    ) -> Self {
        Self {
            credentials,
            sessions,
            auth,
        }
    }
}

#[async_trait]
impl RouteHandler for SignInHandler {
    fn methods(&self) -> &'static [Method] {
        &[Method::GET, Method::POST]
    }

    async fn handle(&self, req: HandlerRequest) -> HandlerResult {
        let next = safe_next(req.query_param("next"));

        if req.method == Method::GET {
            return json_response(
                StatusCode::OK,
                &json!({"fields": ["email", "password"], "next": next}),
            );
        }

        let credentials: Credentials = req.json()?;
        let user = self
            .credentials
            .verify_password(&credentials.email, &credentials.password)
            .await
            .map_err(store_failure)?
            .ok_or(HandlerError::Unauthenticated)?;
        if !user.active {
            return Err(HandlerError::Forbidden("account is deactivated".to_string()));
        }

        let token = self
            .sessions
            .create_session(&user)
            .await
            .map_err(store_failure)?;
        let ttl = humantime::parse_duration(&self.auth.session_ttl)
            .wrap_err("Invalid session TTL")?;
        let cookie = HeaderValue::from_str(&session_cookie(&self.auth, &token, ttl))
            .wrap_err("Invalid session cookie")?;

        tracing::info!(user = %user.email, "Signed in");

        let mut response = match next {
            Some(next) => redirect_response(StatusCode::FOUND, &next)?,
            None => json_response(StatusCode::OK, &json!({"user": user}))?,
        };
        response.headers_mut().insert(header::SET_COOKIE, cookie);
        Ok(response)
    }
}

/// Revokes the caller's session, clears the cookie and redirects home.
pub struct SignOutHandler {
    sessions: Arc<dyn SessionStore>,
    auth: AuthConfig,
}

impl SignOutHandler {
    pub fn new(sessions: Arc<dyn SessionStore>, auth: AuthConfig) -> Self {
        Self { sessions, auth }
    }
}

#[async_trait]
impl RouteHandler for SignOutHandler {
    fn methods(&self) -> &'static [Method] {
        &[Method::GET, Method::POST]
    }

    async fn handle(&self, req: HandlerRequest) -> HandlerResult {
        if let Some(token) = parse_cookies(&req.headers).remove(&self.auth.session_cookie) {
            self.sessions
                .revoke_session(&token)
                .await
                .map_err(store_failure)?;
        }

        let cleared = HeaderValue::from_str(&session_cookie(&self.auth, "", Duration::ZERO))
            .wrap_err("Invalid session cookie")?;
        let mut response = redirect_response(StatusCode::FOUND, "/")?;
        response.headers_mut().insert(header::SET_COOKIE, cleared);
        Ok(response)
    }
}

/// Returns the resolved identity of the caller.
pub struct UserHandler;

#[async_trait]
impl RouteHandler for UserHandler {
    fn methods(&self) -> &'static [Method] {
        &[Method::GET]
    }

    async fn handle(&self, req: HandlerRequest) -> HandlerResult {
        let identity = req.require_identity()?;
        json_response(StatusCode::OK, &json!({ "identity": identity }))
    }
}

/// Issues a new API key to the signed-in session user.
pub struct ApiKeyHandler {
    api_keys: Arc<dyn ApiKeyStore>,
}

impl ApiKeyHandler {
    pub fn new(api_keys: Arc<dyn ApiKeyStore>) -> Self {
        Self { api_keys }
    }
}

#[async_trait]
impl RouteHandler for ApiKeyHandler {
    fn methods(&self) -> &'static [Method] {
        &[Method::POST]
    }

    async fn handle(&self, req: HandlerRequest) -> HandlerResult {
        let owner = req.require_identity()?.session_user().ok_or_else(|| {
            HandlerError::Forbidden("API keys can only be issued to a signed-in user".to_string())
        })?;

        let (secret, principal) = self
            .api_keys
            .issue_key(owner)
            .await
            .map_err(store_failure)?;

        json_response(
            StatusCode::CREATED,
            &json!({
                "key": secret,
                "key_id": principal.key_id,
                "owner_id": principal.owner_id,
            }),
        )
    }
}
