//! Request dispatch over the route table.
//!
//! For every request: first matching entry → verb check (405) → access
//! control (401/403 or sign-in redirect; skipped for OPTIONS) → body
//! buffering → handler. Errors
//! at any step are terminal for the request; nothing is retried through the
//! table. Handler errors and panics are contained here so one failing
//! request cannot affect others.
use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};

use axum::{
    body::Body,
    response::{IntoResponse, Response},
};
use futures_util::FutureExt;
use http::{Method, Request, header, request::Parts};
use http_body_util::LengthLimitError;

use crate::{
    config::models::AuthConfig,
    core::{
        access::AccessControl,
        error::{AccessError, DispatchError, error_body},
        identity::Identity,
        route::Visibility,
        route_table::{RouteMatch, RouteTable},
    },
    ports::handler::{HandlerError, HandlerRequest},
};

/// The response for one request plus what the log line needs to know.
#[derive(Debug)]
pub struct Dispatched {
    pub response: Response,
    pub identity: Option<Identity>,
    /// Pattern of the matched entry, if any.
    pub route: Option<String>,
}

/// Routes requests through an immutable [`RouteTable`].
pub struct Dispatcher {
    table: Arc<RouteTable>,
    access: Arc<AccessControl>,
    login_url: String,
    max_body_bytes: usize,
}

impl Dispatcher {
    pub fn new(
        table: Arc<RouteTable>,
        access: Arc<AccessControl>,
        auth: &AuthConfig,
        max_body_bytes: usize,
    ) -> Self {
        Self {
            table,
            access,
            login_url: auth.login_url.clone(),
            max_body_bytes,
        }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Dispatch one request. Never fails: every outcome is a response.
    pub async fn dispatch(&self, req: Request<Body>) -> Dispatched {
        let (parts, body) = req.into_parts();

        let Some(found) = self.table.resolve(parts.uri.path()) else {
            return Dispatched {
                response: DispatchError::RouteNotFound {
                    path: parts.uri.path().to_string(),
                }
                .into_response(),
                identity: None,
                route: None,
            };
        };

        let route = Some(found.entry.pattern.as_str().to_string());
        let mut identity = None;
        let response = match self.run(found, parts, body, &mut identity).await {
            Ok(response) => response,
            Err(err) => {
                if let DispatchError::HandlerFailure(detail) = &err {
                    tracing::error!(route = ?route, error = %detail, "Request failed");
                }
                err.into_response()
            }
        };

        Dispatched {
            response,
            identity,
            route,
        }
    }

    async fn run(
        &self,
        found: RouteMatch<'_>,
        parts: Parts,
        body: Body,
        identity_out: &mut Option<Identity>,
    ) -> Result<Response, DispatchError> {
        let entry = found.entry;

        if !entry.handler.supports(&parts.method) {
            return Err(DispatchError::MethodNotSupported {
                method: parts.method.clone(),
                allowed: entry.handler.methods().to_vec(),
            });
        }

        // Preflights never carry credentials; the handler answers them anonymously.
        let identity = if parts.method == Method::OPTIONS {
            None
        } else {
            match self.access.resolve(entry, &parts.uri, &parts.headers).await {
                Ok(identity) => identity,
                Err(AccessError::Unauthenticated {
                    scheme: Visibility::Private,
                }) if entry.browser && is_navigation(&parts.method) => {
                    return Err(DispatchError::LoginRedirect {
                        location: self.login_redirect(&parts),
                    });
                }
                Err(err) => return Err(err.into()),
            }
        };
        identity_out.clone_from(&identity);

        let body = self.read_body(&parts, body).await?;

        let request = HandlerRequest {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            captures: found.captures,
            config: entry.config.clone(),
            identity,
        };

        match AssertUnwindSafe(entry.handler.handle(request))
            .catch_unwind()
            .await
        {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(HandlerError::Internal(report))) => {
                Err(DispatchError::HandlerFailure(format!("{report:?}")))
            }
            Ok(Err(err)) => Ok(error_body(err.status(), &err.to_string())),
            Err(panic) => Err(DispatchError::HandlerFailure(format!(
                "handler panicked: {}",
                panic_message(panic.as_ref())
            ))),
        }
    }

    async fn read_body(&self, parts: &Parts, body: Body) -> Result<bytes::Bytes, DispatchError> {
        let declared = parts
            .headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared.is_some_and(|len| len > self.max_body_bytes) {
            return Err(DispatchError::PayloadTooLarge {
                limit: self.max_body_bytes,
            });
        }

        axum::body::to_bytes(body, self.max_body_bytes)
            .await
            .map_err(|e| {
                let over_limit = std::error::Error::source(&e)
                    .is_some_and(|source| source.is::<LengthLimitError>());
                if over_limit {
                    DispatchError::PayloadTooLarge {
                        limit: self.max_body_bytes,
                    }
                } else {
                    DispatchError::BadRequest(format!("unreadable request body: {e}"))
                }
            })
    }

    fn login_redirect(&self, parts: &Parts) -> String {
        let next = parts
            .uri
            .path_and_query()
            .map_or_else(|| parts.uri.path(), |pq| pq.as_str());
        let separator = if self.login_url.contains('?') { '&' } else { '?' };
        format!(
            "{}{separator}next={}",
            self.login_url,
            urlencoding::encode(next)
        )
    }
}

fn is_navigation(method: &Method) -> bool {
    method == Method::GET || method == Method::HEAD
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use http::{HeaderValue, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::json;

    use super::*;
    use crate::{
        core::{
            identity::{ApiPrincipal, SessionUser},
            registry::HandlerRegistry,
            route::RouteDeclaration,
        },
        ports::{
            handler::{HandlerResult, RouteHandler},
            identity_store::{ApiKeyStore, IdentityStoreResult, SessionStore},
        },
    };

    struct Stores;

    #[async_trait]
    impl SessionStore for Stores {
        async fn lookup_session(&self, token: &str) -> IdentityStoreResult<Option<SessionUser>> {
            Ok((token == "s1").then(|| SessionUser {
                id: "u1".to_string(),
                email: "pilot@example.com".to_string(),
                active: true,
            }))
        }

        async fn create_session(&self, _user: &SessionUser) -> IdentityStoreResult<String> {
            Ok("s2".to_string())
        }

        async fn revoke_session(&self, _token: &str) -> IdentityStoreResult<bool> {
            Ok(false)
        }
    }

    #[async_trait]
    impl ApiKeyStore for Stores {
        async fn lookup_key(&self, key: &str) -> IdentityStoreResult<Option<ApiPrincipal>> {
            Ok((key == "k1").then(|| ApiPrincipal {
                key_id: "key-1".to_string(),
                owner_id: "u1".to_string(),
                revoked: false,
            }))
        }

        async fn issue_key(
            &self,
            owner: &SessionUser,
        ) -> IdentityStoreResult<(String, ApiPrincipal)> {
            Ok((
                "k2".to_string(),
                ApiPrincipal {
                    key_id: "key-2".to_string(),
                    owner_id: owner.id.clone(),
                    revoked: false,
                },
            ))
        }
    }

    /// Echoes captures, static config and identity as JSON.
    struct Echo;

    #[async_trait]
    impl RouteHandler for Echo {
        fn methods(&self) -> &'static [Method] {
            &[Method::GET, Method::POST]
        }

        async fn handle(&self, req: HandlerRequest) -> HandlerResult {
            let body = json!({
                "captures": req.captures.to_json(),
                "config": req.config.as_ref(),
                "identity": req.identity.as_ref().map(|i| i.account_id().to_string()),
                "body_len": req.body.len(),
            });
            Ok(Response::new(Body::from(body.to_string())))
        }
    }

    struct Failing;

    #[async_trait]
    impl RouteHandler for Failing {
        fn methods(&self) -> &'static [Method] {
            &[Method::GET, Method::POST]
        }

        async fn handle(&self, req: HandlerRequest) -> HandlerResult {
            if req.method == Method::POST {
                panic!("boom");
            }
            Err(HandlerError::Internal(eyre::eyre!("connection refused")))
        }
    }

    /// Answers OPTIONS with 204 and GET with the caller's account id.
    struct Preflight;

    #[async_trait]
    impl RouteHandler for Preflight {
        fn methods(&self) -> &'static [Method] {
            &[Method::GET, Method::OPTIONS]
        }

        async fn handle(&self, req: HandlerRequest) -> HandlerResult {
            let mut response = Response::new(Body::empty());
            if req.method == Method::OPTIONS {
                *response.status_mut() = StatusCode::NO_CONTENT;
            } else if let Some(identity) = req.identity {
                *response.body_mut() = Body::from(identity.account_id().to_string());
            }
            Ok(response)
        }
    }

    fn dispatcher(declarations: &[RouteDeclaration]) -> Dispatcher {
        let registry = HandlerRegistry::new()
            .register("echo", Arc::new(Echo))
            .register("preflight", Arc::new(Preflight))
            .register("failing", Arc::new(Failing));
        let table = Arc::new(RouteTable::build(declarations, &registry).unwrap());
        let stores = Arc::new(Stores);
        let access = Arc::new(AccessControl::new(
            stores.clone(),
            stores,
            &AuthConfig::default(),
        ));
        Dispatcher::new(table, access, &AuthConfig::default(), 64)
    }

    fn request(method: Method, uri: &str) -> http::request::Builder {
        Request::builder().method(method).uri(uri)
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_dispatch_passes_captures_and_config() {
        let d = dispatcher(&[
            RouteDeclaration::new(r"/api/v1/plan/(\w+)", "echo")
                .with_config(json!({"collection": "plans"})),
            RouteDeclaration::new("/api/v1/plan/?", "echo"),
        ]);

        let out = d
            .dispatch(
                request(Method::GET, "/api/v1/plan/abc123")
                    .header(header::COOKIE, "user=s1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;

        assert_eq!(out.response.status(), StatusCode::OK);
        assert_eq!(out.route.as_deref(), Some(r"/api/v1/plan/(\w+)"));
        assert_eq!(out.identity.as_ref().unwrap().account_id(), "u1");
        let body = json_body(out.response).await;
        assert_eq!(body["captures"], json!(["abc123"]));
        assert_eq!(body["config"], json!({"collection": "plans"}));
    }

    #[tokio::test]
    async fn test_not_found_for_any_method() {
        let d = dispatcher(&[RouteDeclaration::new("/api/v1/user", "echo")]);
        for method in [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS] {
            let out = d
                .dispatch(request(method, "/nonexistent").body(Body::empty()).unwrap())
                .await;
            assert_eq!(out.response.status(), StatusCode::NOT_FOUND);
            assert!(out.route.is_none());
        }
    }

    #[tokio::test]
    async fn test_method_not_allowed_before_auth() {
        let d = dispatcher(&[RouteDeclaration::new("/api/v1/user", "echo")]);
        let out = d
            .dispatch(request(Method::DELETE, "/api/v1/user").body(Body::empty()).unwrap())
            .await;
        assert_eq!(out.response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(out.response.headers().get(header::ALLOW).unwrap(), "GET, POST");
    }

    #[tokio::test]
    async fn test_private_route_without_session() {
        let d = dispatcher(&[
            RouteDeclaration::new("/api/v1/user", "echo"),
            RouteDeclaration::new("/app/.*", "echo").browser(),
        ]);

        let out = d
            .dispatch(request(Method::GET, "/api/v1/user").body(Body::empty()).unwrap())
            .await;
        assert_eq!(out.response.status(), StatusCode::UNAUTHORIZED);

        let out = d
            .dispatch(request(Method::GET, "/app/dashboard?tab=1").body(Body::empty()).unwrap())
            .await;
        assert_eq!(out.response.status(), StatusCode::FOUND);
        assert_eq!(
            out.response.headers().get(header::LOCATION).unwrap(),
            "/signin?next=%2Fapp%2Fdashboard%3Ftab%3D1"
        );

        // Browser routes only redirect navigations.
        let out = d
            .dispatch(request(Method::POST, "/app/dashboard").body(Body::empty()).unwrap())
            .await;
        assert_eq!(out.response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_public_overlay_scenario() {
        let d = dispatcher(&[
            RouteDeclaration::new(r"/api/v1/plan/(\w+)", "echo"),
            RouteDeclaration::new(r"/api/v2/plan/(?P<id>\w+)", "echo")
                .publicize(r"/api/v2/plan/(?P<id>\w+)"),
        ]);

        let with_key = d
            .dispatch(
                request(Method::GET, "/api/v2/plan/p1")
                    .header("x-api-key", "k1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(with_key.response.status(), StatusCode::OK);
        assert!(matches!(with_key.identity, Some(Identity::ApiKey(_))));
        assert_eq!(json_body(with_key.response).await["captures"], json!({"id": "p1"}));

        let without_key = d
            .dispatch(request(Method::GET, "/api/v2/plan/p1").body(Body::empty()).unwrap())
            .await;
        assert_eq!(without_key.response.status(), StatusCode::UNAUTHORIZED);
        assert!(without_key.response.headers().get(header::LOCATION).is_none());

        let private_only = d
            .dispatch(
                request(Method::GET, "/api/v1/plan/p1")
                    .header(header::COOKIE, "user=s1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(private_only.response.status(), StatusCode::OK);
        assert!(matches!(private_only.identity, Some(Identity::Session(_))));
    }

    #[tokio::test]
    async fn test_options_skips_access_control() {
        let d = dispatcher(&[
            RouteDeclaration::new(r"/api/v1/plan/?(\w+)?", "preflight"),
            RouteDeclaration::new(r"/api/v2/plan/?(?P<id>\w+)?", "preflight")
                .publicize(r"/api/v2/plan/?(?P<id>\w+)?"),
        ]);

        for uri in ["/api/v1/plan/", "/api/v2/plan/"] {
            let out = d
                .dispatch(
                    request(Method::OPTIONS, uri)
                        .header(header::ORIGIN, "https://planner.example.com")
                        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await;
            assert_eq!(out.response.status(), StatusCode::NO_CONTENT, "{uri}");
            assert!(out.identity.is_none());

            let out = d
                .dispatch(request(Method::GET, uri).body(Body::empty()).unwrap())
                .await;
            assert_eq!(out.response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_handler_failure_is_contained() {
        let d = dispatcher(&[RouteDeclaration::new("/fail", "failing").anonymous()]);

        let out = d
            .dispatch(request(Method::GET, "/fail").body(Body::empty()).unwrap())
            .await;
        assert_eq!(out.response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(out.response).await;
        assert_eq!(body["error"]["message"], "Internal Server Error");

        let out = d
            .dispatch(request(Method::POST, "/fail").body(Body::empty()).unwrap())
            .await;
        assert_eq!(out.response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_body_limit() {
        let d = dispatcher(&[RouteDeclaration::new("/upload", "echo").anonymous()]);

        let out = d
            .dispatch(request(Method::POST, "/upload").body(Body::from(vec![b'x'; 65])).unwrap())
            .await;
        assert_eq!(out.response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let mut req = request(Method::POST, "/upload").body(Body::from("small")).unwrap();
        req.headers_mut()
            .insert(header::CONTENT_LENGTH, HeaderValue::from_static("5"));
        let out = d.dispatch(req).await;
        assert_eq!(out.response.status(), StatusCode::OK);
        assert_eq!(json_body(out.response).await["body_len"], 5);
    }
}
