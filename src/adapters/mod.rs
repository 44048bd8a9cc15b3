pub mod document_store;
pub mod file_system;
pub mod handlers;
pub mod http_handler;
pub mod identity_store;
pub mod middleware;

/// Re-export commonly used types from adapters
pub use document_store::MemoryDocumentStore;
pub use file_system::FileSystemAdapter;
pub use handlers::{BuiltinDeps, builtin_registry};
pub use http_handler::HttpHandler;
pub use identity_store::MemoryIdentityStore;
pub use middleware::*;
