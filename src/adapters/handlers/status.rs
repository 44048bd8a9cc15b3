use std::time::Instant;

use async_trait::async_trait;
use axum::body::Body as AxumBody;
use eyre::WrapErr;
use http::{Method, Response, StatusCode, header};
use serde_json::json;

use super::json_response;
use crate::ports::handler::{HandlerRequest, HandlerResult, RouteHandler};

/// Liveness probe answering a plain `ok`.
pub struct ConnectionTestHandler;

#[async_trait]
impl RouteHandler for ConnectionTestHandler {
    fn methods(&self) -> &'static [Method] {
        &[Method::GET, Method::HEAD]
    }

    async fn handle(&self, _req: HandlerRequest) -> HandlerResult {
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(AxumBody::from("ok"))
            .wrap_err("Failed to build connection test response")?;
        Ok(response)
    }
}

/// Process status for operators.
pub struct HealthHandler {
    identity: String,
    started: Instant,
}

impl HealthHandler {
    pub fn new(identity: String, started: Instant) -> Self {
        Self { identity, started }
    }
}

#[async_trait]
impl RouteHandler for HealthHandler {
    fn methods(&self) -> &'static [Method] {
        &[Method::GET]
    }

    async fn handle(&self, _req: HandlerRequest) -> HandlerResult {
        json_response(
            StatusCode::OK,
            &json!({
                "status": "healthy",
                "identity": self.identity,
                "version": env!("CARGO_PKG_VERSION"),
                "uptime_secs": self.started.elapsed().as_secs(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }),
        )
    }
}
