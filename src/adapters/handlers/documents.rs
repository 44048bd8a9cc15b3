use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body as AxumBody;
use eyre::WrapErr;
use http::{Method, Response, StatusCode, header};
use serde_json::json;

use super::{json_response, require_str};
use crate::{
    core::route::StaticConfig,
    ports::{
        document_store::DocumentStore,
        handler::{HandlerError, HandlerRequest, HandlerResult, RouteHandler},
    },
};

/// JSON documents of one `collection`, scoped to the calling account.
///
/// `GET` lists the collection, or fetches one document when the route's
/// first capture holds an id. `POST` stores the JSON object body.
pub struct DocumentsHandler {
    store: Arc<dyn DocumentStore>,
}

impl DocumentsHandler {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl RouteHandler for DocumentsHandler {
    fn methods(&self) -> &'static [Method] {
        &[Method::GET, Method::POST, Method::OPTIONS]
    }

    fn validate_config(&self, config: &StaticConfig) -> Result<(), String> {
        require_str(config, "collection")
    }

    async fn handle(&self, req: HandlerRequest) -> HandlerResult {
        if req.method == Method::OPTIONS {
            let response: Response<AxumBody> = Response::builder()
                .status(StatusCode::NO_CONTENT)
                .header(header::ALLOW, "GET, POST, OPTIONS")
                .body(AxumBody::empty())
                .wrap_err("Failed to build preflight response")?;
            return Ok(response);
        }

        let collection = req.config_str("collection").unwrap_or_default();
        let owner = req.require_identity()?.account_id();

        if req.method == Method::POST {
            let body: serde_json::Value = req.json()?;
            if !body.is_object() {
                return Err(HandlerError::BadRequest(
                    "document body must be a JSON object".to_string(),
                ));
            }
            let document = self
                .store
                .insert(collection, owner, body)
                .await
                .map_err(eyre::Report::new)?;
            return json_response(StatusCode::CREATED, &json!(document));
        }

        match req.captures.get(0) {
            Some(id) => {
                let document = self
                    .store
                    .get(collection, owner, id)
                    .await
                    .map_err(eyre::Report::new)?
                    .ok_or_else(|| HandlerError::NotFound(format!("{collection}/{id}")))?;
                json_response(StatusCode::OK, &json!(document))
            }
            None => {
                let documents = self
                    .store
                    .list(collection, owner)
                    .await
                    .map_err(eyre::Report::new)?;
                json_response(StatusCode::OK, &json!({ "documents": documents }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        adapters::{
            document_store::MemoryDocumentStore,
            handlers::test_support::{body_json, request, with_config, with_identity},
        },
        core::{
            identity::{Identity, SessionUser},
            pattern::CaptureSet,
        },
    };

    fn pilot() -> Identity {
        Identity::Session(SessionUser {
            id: "u1".to_string(),
            email: "pilot@example.com".to_string(),
            active: true,
        })
    }

    fn plans(method: Method, uri: &str) -> HandlerRequest {
        with_identity(
            with_config(request(method, uri), json!({"collection": "plans"})),
            pilot(),
        )
    }

    #[tokio::test]
    async fn test_create_fetch_and_list() {
        let handler = DocumentsHandler::new(Arc::new(MemoryDocumentStore::new(
            2,
            Duration::from_secs(1),
        )));

        let mut create = plans(Method::POST, "/api/v1/plan");
        create.body = bytes::Bytes::from_static(br#"{"name":"Q3"}"#);
        let created = handler.handle(create).await.unwrap();
        assert_eq!(created.status(), StatusCode::CREATED);
        let created = body_json(created).await;
        let id = created["id"].as_str().unwrap().to_string();

        let mut fetch = plans(Method::GET, &format!("/api/v1/plan/{id}"));
        fetch.captures = CaptureSet::Positional(vec![Some(id.clone())]);
        let fetched = body_json(handler.handle(fetch).await.unwrap()).await;
        assert_eq!(fetched["body"], json!({"name": "Q3"}));

        // Optional id group that did not participate lists the collection.
        let mut list = plans(Method::GET, "/api/v1/plan/");
        list.captures = CaptureSet::Positional(vec![None]);
        let listed = body_json(handler.handle(list).await.unwrap()).await;
        assert_eq!(listed["documents"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_id_and_bad_body() {
        let handler = DocumentsHandler::new(Arc::new(MemoryDocumentStore::new(
            1,
            Duration::from_secs(1),
        )));

        let mut fetch = plans(Method::GET, "/api/v1/plan/missing");
        fetch.captures = CaptureSet::Positional(vec![Some("missing".to_string())]);
        let err = handler.handle(fetch).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let mut create = plans(Method::POST, "/api/v1/plan");
        create.body = bytes::Bytes::from_static(b"[1,2]");
        let err = handler.handle(create).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_options_preflight() {
        let handler = DocumentsHandler::new(Arc::new(MemoryDocumentStore::new(
            1,
            Duration::from_secs(1),
        )));
        // Preflights reach the handler without an identity.
        let response = handler
            .handle(with_config(
                request(Method::OPTIONS, "/api/v1/plan"),
                json!({"collection": "plans"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response.headers().get(header::ALLOW).unwrap(),
            "GET, POST, OPTIONS"
        );
    }
}
