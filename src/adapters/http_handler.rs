use std::{net::SocketAddr, sync::Arc, time::Instant};

use axum::{body::Body as AxumBody, response::Response};
use http::{HeaderMap, Method, Request, StatusCode, Uri};

use crate::core::{Dispatcher, Identity};

/// Axum-facing entry point: dispatches every request through the route
/// table and writes one log line per completed dispatch.
#[derive(Clone)]
pub struct HttpHandler {
    dispatcher: Arc<Dispatcher>,
}

impl HttpHandler {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Main request handler
    pub async fn handle_request(
        &self,
        req: Request<AxumBody>,
        client_addr: Option<SocketAddr>,
    ) -> Response {
        let start = Instant::now();
        let method = req.method().clone();
        let uri = req.uri().clone();
        let remote_ip = extract_client_ip(req.headers())
            .or_else(|| client_addr.map(|addr| addr.ip().to_string()))
            .unwrap_or_else(|| "-".to_string());

        let dispatched = self.dispatcher.dispatch(req).await;

        log_dispatch(
            dispatched.response.status(),
            &method,
            &uri,
            &remote_ip,
            dispatched.identity.as_ref(),
            dispatched.route.as_deref(),
            start.elapsed().as_secs_f64() * 1000.0,
        );

        dispatched.response
    }
}

/// `200 GET /api/v1/user (10.0.0.7) pilot@example.com 1.52ms`
fn summary_line(
    status: StatusCode,
    method: &Method,
    uri: &Uri,
    remote_ip: &str,
    identity: Option<&Identity>,
    elapsed_ms: f64,
) -> String {
    let identity = identity.map_or_else(|| "-".to_string(), ToString::to_string);
    format!(
        "{} {method} {uri} ({remote_ip}) {identity} {elapsed_ms:.2}ms",
        status.as_u16()
    )
}

fn log_dispatch(
    status: StatusCode,
    method: &Method,
    uri: &Uri,
    remote_ip: &str,
    identity: Option<&Identity>,
    route: Option<&str>,
    elapsed_ms: f64,
) {
    let line = summary_line(status, method, uri, remote_ip, identity, elapsed_ms);
    let route = route.unwrap_or("-");
    if status.is_server_error() {
        tracing::warn!(status = status.as_u16(), route, "{line}");
    } else {
        tracing::info!(status = status.as_u16(), route, "{line}");
    }
}

/// Client IP from forwarding headers, when a proxy in front supplied one.
fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    #[allow(clippy::collapsible_if)]
    if let Some(forwarded_for) = headers.get("X-Forwarded-For") {
        if let Ok(value) = forwarded_for.to_str() {
            // Get the first IP in the chain
            return value.split(',').next().map(|ip| ip.trim().to_string());
        }
    }

    #[allow(clippy::collapsible_if)]
    if let Some(real_ip) = headers.get("X-Real-IP") {
        if let Ok(value) = real_ip.to_str() {
            return Some(value.to_string());
        }
    }

    None
}
