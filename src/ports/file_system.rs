use axum::body::Body as AxumBody;
use http::{Request, Response};
use thiserror::Error;

/// Error type for file system operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FileSystemError {
    /// Error when encountering an IO issue
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error when path is invalid
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// Result type for file system operations
pub type FileSystemResult<T> = Result<T, FileSystemError>;

/// FileSystem defines the port (interface) for handling static files
pub trait FileSystem: Send + Sync + 'static {
    /// Serve a file from the file system
    ///
    /// # Arguments
    /// * `root` - The root directory to serve files from
    /// * `path` - The path to the file relative to the root
    /// * `req` - The request whose method and conditional headers apply
    fn serve_file(
        &self,
        root: &str,
        path: &str,
        req: Request<AxumBody>,
    ) -> impl std::future::Future<Output = FileSystemResult<Response<AxumBody>>> + Send;
}
