//! Error taxonomy for route table construction and request dispatch.
use axum::{
    body::Body,
    response::{IntoResponse, Response},
};
use http::{HeaderValue, Method, StatusCode, header};
use thiserror::Error;

use crate::core::{pattern::PatternError, route::Visibility};

/// Anything that makes the route table unbuildable. Always fatal at startup.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StartupConfigError {
    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error("route '{pattern}' references unknown handler '{handler}'")]
    UnknownHandler { pattern: String, handler: String },

    #[error("route '{pattern}' has invalid configuration for handler '{handler}': {message}")]
    InvalidStaticConfig {
        pattern: String,
        handler: String,
        message: String,
    },

    #[error("public route '{pattern}' uses positional captures; public patterns must name them")]
    PositionalPublicCaptures { pattern: String },

    #[error(
        "public route '{pattern}' exposes {public} captures but its source '{source_pattern}' exposes {private}"
    )]
    OverlayCaptureMismatch {
        pattern: String,
        source_pattern: String,
        public: usize,
        private: usize,
    },

    #[error("route '{pattern}' is already public and cannot carry public overlays")]
    OverlayOnPublicRoute { pattern: String },
}

/// Failure to resolve an identity for a matched route.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AccessError {
    #[error("{scheme} credential required")]
    Unauthenticated { scheme: Visibility },

    #[error("forbidden: {reason}")]
    Forbidden { reason: String },

    #[error("identity store unavailable: {0}")]
    Unavailable(String),
}

/// Terminal per-request outcomes produced by the dispatcher.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum DispatchError {
    #[error("no route matches {path}")]
    RouteNotFound { path: String },

    #[error("method {method} not supported")]
    MethodNotSupported { method: Method, allowed: Vec<Method> },

    #[error("authentication required")]
    Unauthenticated { scheme: Visibility },

    /// Browser-facing private route without a session.
    #[error("sign-in required")]
    LoginRedirect { location: String },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// Detail is logged by the dispatcher, never sent to the caller.
    #[error("handler failure: {0}")]
    HandlerFailure(String),
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            Self::MethodNotSupported { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Self::LoginRedirect { .. } => StatusCode::FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::HandlerFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::HandlerFailure(_) => "Internal Server Error".to_string(),
            Self::RouteNotFound { .. } => "Not Found".to_string(),
            other => other.to_string(),
        }
    }
}

/// JSON error body shared by every non-handler failure.
pub fn error_body(status: StatusCode, message: &str) -> Response {
    let body = serde_json::json!({
        "error": {
            "status": status.as_u16(),
            "message": message,
        }
    });

    let mut response = Response::new(Body::from(body.to_string()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = error_body(status, &self.public_message());

        match &self {
            Self::MethodNotSupported { allowed, .. } => {
                let allow = allowed
                    .iter()
                    .map(Method::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                if let Ok(value) = HeaderValue::from_str(&allow) {
                    response.headers_mut().insert(header::ALLOW, value);
                }
            }
            Self::LoginRedirect { location } => {
                if let Ok(value) = HeaderValue::from_str(location) {
                    response.headers_mut().insert(header::LOCATION, value);
                }
            }
            Self::Unauthenticated {
                scheme: Visibility::Public,
            } => {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("ApiKey"));
            }
            _ => {}
        }

        response
    }
}

impl From<AccessError> for DispatchError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::Unauthenticated { scheme } => Self::Unauthenticated { scheme },
            AccessError::Forbidden { reason } => Self::Forbidden(reason),
            AccessError::Unavailable(detail) => Self::HandlerFailure(detail),
        }
    }
}
