use std::convert::TryFrom;

use axum::body::Body as AxumBody;
use eyre::WrapErr;
use http::{Request, Response, Uri};
use http_body_util::BodyExt;
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::ports::file_system::{FileSystem, FileSystemError};

/// File system adapter using tower-http ServeDir for static file serving
#[derive(Debug, Default, Clone)]
pub struct FileSystemAdapter;

impl FileSystemAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for FileSystemAdapter {
    async fn serve_file(
        &self,
        root: &str,
        path: &str,
        req: Request<AxumBody>,
    ) -> Result<Response<AxumBody>, FileSystemError> {
        // Captures arrive percent-decoded; ServeDir decodes the URI itself.
        let encoded: Vec<_> = path
            .trim_start_matches('/')
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        let uri = Uri::try_from(format!("/{}", encoded.join("/")))
            .wrap_err("Failed to parse URI for file serving")
            .map_err(|e| FileSystemError::InvalidPath(e.to_string()))?;

        let (mut parts, body) = req.into_parts();
        parts.uri = uri;
        let request = Request::from_parts(parts, body);

        // ServeDir rejects `..` segments and answers 404 for anything outside root.
        let serve_dir = ServeDir::new(root).append_index_html_on_directories(true);

        let response = serve_dir
            .oneshot(request)
            .await
            .wrap_err("ServeDir failed to serve file")
            .map_err(|e| {
                FileSystemError::IoError(std::io::Error::other(format!("ServeDir error: {e}")))
            })?;

        let (parts, tower_body) = response.into_parts();
        let axum_body = AxumBody::new(tower_body.map_err(|e| {
            tracing::error!("Error reading static file body: {}", e);
            axum::Error::new(e)
        }));

        Ok(Response::from_parts(parts, axum_body))
    }
}
