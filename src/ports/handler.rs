use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body as AxumBody;
use bytes::Bytes;
use http::{HeaderMap, Method, Response, StatusCode, Uri};
use thiserror::Error;

use crate::core::{identity::Identity, pattern::CaptureSet, route::StaticConfig};

/// Error type for route handler execution
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HandlerError {
    /// The request was understood but its content is unusable
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The addressed resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The resolved identity may not perform this operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The handler requires an identity and none was resolved
    #[error("Authentication required")]
    Unauthenticated,

    /// Anything else; surfaced to the caller as a bare 500
    #[error("Internal error: {0:#}")]
    Internal(eyre::Report),
}

impl From<eyre::Report> for HandlerError {
    fn from(report: eyre::Report) -> Self {
        Self::Internal(report)
    }
}

impl HandlerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Result type alias for handler invocations
pub type HandlerResult = Result<Response<AxumBody>, HandlerError>;

/// Everything a handler receives for one dispatched request.
#[derive(Debug)]
pub struct HandlerRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub captures: CaptureSet,
    pub config: Arc<StaticConfig>,
    pub identity: Option<Identity>,
}

impl HandlerRequest {
    /// The resolved identity, or [`HandlerError::Unauthenticated`].
    pub fn require_identity(&self) -> Result<&Identity, HandlerError> {
        self.identity.as_ref().ok_or(HandlerError::Unauthenticated)
    }

    /// Decode the buffered body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, HandlerError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| HandlerError::BadRequest(format!("invalid JSON body: {e}")))
    }

    /// First value of a query string parameter.
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.uri.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// String entry of the route's static configuration.
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(|value| value.as_str())
    }
}

/// RouteHandler defines the port a route table entry is bound to.
///
/// One handler instance is shared by every entry that names it, private and
/// public alike, and by every concurrent request. It must not keep
/// per-request state.
#[async_trait]
pub trait RouteHandler: Send + Sync + 'static {
    /// HTTP verbs this handler implements. Anything else is answered with
    /// 405 before access control runs.
    fn methods(&self) -> &'static [Method];

    /// Check a route's static configuration at table build time.
    fn validate_config(&self, _config: &StaticConfig) -> Result<(), String> {
        Ok(())
    }

    /// Handle one request. Only called with a method from [`Self::methods`].
    async fn handle(&self, req: HandlerRequest) -> HandlerResult;

    fn supports(&self, method: &Method) -> bool {
        self.methods().contains(method)
    }
}
