use async_trait::async_trait;
use http::{Method, StatusCode};

use super::{redirect_response, require_str};
use crate::{
    core::{pattern::CaptureSet, route::StaticConfig},
    ports::handler::{HandlerRequest, HandlerResult, RouteHandler},
};

/// Redirects to the configured `url`.
///
/// `{0}`, `{1}`, … in the target are replaced by the matching captures and
/// the request's query string is carried over. `permanent = true` answers 301,
/// otherwise 302.
pub struct RedirectHandler;

impl RedirectHandler {
    fn target(template: &str, captures: &CaptureSet) -> String {
        let mut target = template.to_string();
        for (index, value) in captures.values().into_iter().enumerate() {
            target = target.replace(&format!("{{{index}}}"), value.unwrap_or_default());
        }
        target
    }
}

#[async_trait]
impl RouteHandler for RedirectHandler {
    fn methods(&self) -> &'static [Method] {
        &[Method::GET, Method::HEAD]
    }

    fn validate_config(&self, config: &StaticConfig) -> Result<(), String> {
        require_str(config, "url")?;
        match config.get("permanent") {
            None | Some(serde_json::Value::Bool(_)) => Ok(()),
            Some(_) => Err("'permanent' must be a boolean".to_string()),
        }
    }

    async fn handle(&self, req: HandlerRequest) -> HandlerResult {
        let template = req.config_str("url").unwrap_or("/");
        let mut target = Self::target(template, &req.captures);

        if let Some(query) = req.uri.query().filter(|q| !q.is_empty()) {
            target.push(if target.contains('?') { '&' } else { '?' });
            target.push_str(query);
        }

        let permanent = req
            .config
            .get("permanent")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let status = if permanent {
            StatusCode::MOVED_PERMANENTLY
        } else {
            StatusCode::FOUND
        };

        redirect_response(status, &target)
    }
}
