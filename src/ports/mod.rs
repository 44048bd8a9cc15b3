pub mod document_store;
pub mod file_system;
pub mod handler;
pub mod identity_store;
