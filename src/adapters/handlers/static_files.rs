use async_trait::async_trait;
use axum::body::Body as AxumBody;
use eyre::WrapErr;
use http::{Method, Request};

use super::require_str;
use crate::{
    core::route::StaticConfig,
    ports::{
        file_system::{FileSystem, FileSystemError},
        handler::{HandlerError, HandlerRequest, HandlerResult, RouteHandler},
    },
};

/// Serves files below the configured `path` directory.
///
/// The file is the first capture when the pattern has one, otherwise the
/// request path.
pub struct StaticFilesHandler<F> {
    fs: F,
}

impl<F: FileSystem> StaticFilesHandler<F> {
    pub fn new(fs: F) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl<F: FileSystem> RouteHandler for StaticFilesHandler<F> {
    fn methods(&self) -> &'static [Method] {
        &[Method::GET, Method::HEAD]
    }

    fn validate_config(&self, config: &StaticConfig) -> Result<(), String> {
        require_str(config, "path")
    }

    async fn handle(&self, req: HandlerRequest) -> HandlerResult {
        let root = req.config_str("path").unwrap_or(".").to_string();
        let file = req
            .captures
            .get(0)
            .map(str::to_string)
            .unwrap_or_else(|| req.uri.path().to_string());

        let mut file_req = Request::builder()
            .method(req.method)
            .uri(req.uri)
            .body(AxumBody::empty())
            .wrap_err("Failed to build static file request")?;
        *file_req.headers_mut() = req.headers;

        match self.fs.serve_file(&root, &file, file_req).await {
            Ok(response) => Ok(response),
            Err(FileSystemError::InvalidPath(reason)) => Err(HandlerError::BadRequest(reason)),
            Err(e) => Err(eyre::Report::new(e)
                .wrap_err(format!("Failed to serve '{file}' from '{root}'"))
                .into()),
        }
    }
}
