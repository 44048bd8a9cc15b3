//! Built-in route handlers and the registry that names them.
//!
//! Route declarations refer to these by registry name (`handler = "documents"`).
//! Each handler is instantiated once here and shared by every entry naming it.
use std::{sync::Arc, time::Instant};

use axum::body::Body as AxumBody;
use eyre::{Result, WrapErr};
use http::{Response, StatusCode, header};

use crate::{
    adapters::{
        FileSystemAdapter, document_store::MemoryDocumentStore,
        identity_store::MemoryIdentityStore,
    },
    config::models::{AuthConfig, ServerConfig},
    core::{registry::HandlerRegistry, route::StaticConfig},
    ports::{
        document_store::DocumentStore,
        handler::HandlerResult,
        identity_store::{ApiKeyStore, CredentialVerifier, SessionStore},
    },
};

pub mod documents;
pub mod redirect;
pub mod session;
pub mod static_files;
pub mod status;

pub use documents::DocumentsHandler;
pub use redirect::RedirectHandler;
pub use session::{ApiKeyHandler, SignInHandler, SignOutHandler, UserHandler};
pub use static_files::StaticFilesHandler;
pub use status::{ConnectionTestHandler, HealthHandler};

/// Shared backing resources the built-in handlers are constructed with.
#[derive(Clone)]
pub struct BuiltinDeps {
    pub sessions: Arc<dyn SessionStore>,
    pub api_keys: Arc<dyn ApiKeyStore>,
    pub credentials: Arc<dyn CredentialVerifier>,
    pub documents: Arc<dyn DocumentStore>,
    pub auth: AuthConfig,
    /// Process identity reported by the health handler.
    pub identity: String,
}

impl BuiltinDeps {
    /// In-memory stores seeded from `config`.
    pub fn in_memory(config: &ServerConfig) -> Result<Self> {
        let identities = Arc::new(
            MemoryIdentityStore::from_config(config).wrap_err("Failed to build identity store")?,
        );
        let documents = Arc::new(
            MemoryDocumentStore::from_config(&config.datastore)
                .wrap_err("Failed to build document store")?,
        );

        Ok(Self {
            sessions: identities.clone(),
            api_keys: identities.clone(),
            credentials: identities,
            documents,
            auth: config.auth.clone(),
            identity: config
                .identity
                .clone()
                .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string()),
        })
    }
}

/// Registry with every built-in handler under its configuration name.
pub fn builtin_registry(deps: BuiltinDeps) -> HandlerRegistry {
    HandlerRegistry::new()
        .register("redirect", Arc::new(RedirectHandler))
        .register(
            "static_files",
            Arc::new(StaticFilesHandler::new(FileSystemAdapter::new())),
        )
        .register(
            "signin",
            Arc::new(SignInHandler::new(
                deps.credentials.clone(),
                deps.sessions.clone(),
                deps.auth.clone(),
            )),
        )
        .register(
            "signout",
            Arc::new(SignOutHandler::new(deps.sessions.clone(), deps.auth.clone())),
        )
        .register("user", Arc::new(UserHandler))
        .register("api_key", Arc::new(ApiKeyHandler::new(deps.api_keys.clone())))
        .register("documents", Arc::new(DocumentsHandler::new(deps.documents)))
        .register("connection_test", Arc::new(ConnectionTestHandler))
        .register(
            "health",
            Arc::new(HealthHandler::new(deps.identity, Instant::now())),
        )
}

/// JSON response with the given status.
pub(crate) fn json_response(status: StatusCode, body: &serde_json::Value) -> HandlerResult {
    let response = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(AxumBody::from(body.to_string()))
        .wrap_err("Failed to build JSON response")?;
    Ok(response)
}

/// Bare redirect to `location`.
pub(crate) fn redirect_response(status: StatusCode, location: &str) -> HandlerResult {
    let response = Response::builder()
        .status(status)
        .header(header::LOCATION, location)
        .body(AxumBody::empty())
        .wrap_err("Failed to build redirect response")?;
    Ok(response)
}

/// Required non-empty string entry of a static configuration.
pub(crate) fn require_str(config: &StaticConfig, key: &str) -> Result<(), String> {
    match config.get(key) {
        Some(serde_json::Value::String(value)) if !value.is_empty() => Ok(()),
        Some(_) => Err(format!("'{key}' must be a non-empty string")),
        None => Err(format!("missing required '{key}'")),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::body::Body;
    use bytes::Bytes;
    use http::{HeaderMap, Method, Response, Uri};
    use http_body_util::BodyExt;

    use crate::{
        core::{identity::Identity, pattern::CaptureSet, route::StaticConfig},
        ports::handler::HandlerRequest,
    };

    pub fn request(method: Method, uri: &str) -> HandlerRequest {
        HandlerRequest {
            method,
            uri: uri.parse::<Uri>().unwrap(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            captures: CaptureSet::empty(),
            config: Arc::new(StaticConfig::new()),
            identity: None,
        }
    }

    pub fn with_config(mut req: HandlerRequest, config: serde_json::Value) -> HandlerRequest {
        if let serde_json::Value::Object(map) = config {
            req.config = Arc::new(map);
        }
        req
    }

    pub fn with_identity(mut req: HandlerRequest, identity: Identity) -> HandlerRequest {
        req.identity = Some(identity);
        req
    }

    pub async fn body_json(response: Response<Body>) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }
}
