//! Nado - the HTTP entry point of a multi-tenant planning service.
//!
//! Every request is matched against one ordered table of regular-expression
//! route patterns. The first matching entry wins; its handler is invoked with
//! the pattern's captures, the entry's static configuration and the identity
//! resolved for the entry's visibility:
//!
//! - **private** entries authenticate with a session cookie;
//! - **public** entries authenticate with an API key.
//!
//! Public entries are usually not written by hand. A private route lists
//! `public` overlay patterns and the table gains, right after it, public
//! entries bound to the same handler instance.
//!
//! # Quick Example
//! ```no_run
//! use nado::config::ServerConfig;
//!
//! # #[tokio::main] async fn main() -> eyre::Result<()> {
//! let cfg: ServerConfig = nado::config::loader::load_config("config.toml").await?;
//! let app = nado::build_app(&cfg)?;
//! for entry in app.table.entries() {
//!     println!("{} {}", entry.visibility, entry.pattern);
//! }
//! # Ok(()) }
//! ```
//!
//! # Architecture
//! The crate separates **ports** (traits) from **adapters** (implementations)
//! while keeping routing, access control and dispatch inside `core`.
//!
//! # Error Handling
//! Domain failures are `thiserror` enums; bootstrap code returns
//! `eyre::Result<T>` with `WrapErr` context attached.
//!
//! # Concurrency & Data Structures
//! The route table is immutable after startup and shared through `Arc`
//! without locks. Mutable in-memory stores use `scc::HashMap`.
pub mod config;
pub mod ports;
pub mod tracing_setup;
pub mod utils;

pub mod adapters;
pub mod core;

use std::{net::SocketAddr, sync::Arc};

use axum::{
    Router,
    extract::{ConnectInfo, Request},
    middleware,
    routing::any,
};
use eyre::{Result, WrapErr};
use tower_http::compression::CompressionLayer;

pub use crate::{
    adapters::{BuiltinDeps, HttpHandler, builtin_registry},
    config::ServerConfig,
    core::{Dispatcher, HandlerRegistry, RouteTable},
    utils::GracefulShutdown,
};
use crate::{
    adapters::{request_id_middleware, security_headers_middleware},
    core::AccessControl,
};

/// A fully wired server: the axum router and the table it dispatches over.
pub struct App {
    pub router: Router,
    pub table: Arc<RouteTable>,
}

/// Wire the built-in handlers over in-memory stores seeded from `config`.
pub fn build_app(config: &ServerConfig) -> Result<App> {
    let deps = BuiltinDeps::in_memory(config)?;
    let registry = builtin_registry(deps.clone());
    build_app_with(config, &deps, &registry)
}

/// Wire an app from explicit dependencies and handler registry.
///
/// Fails if any route declaration cannot be compiled or bound; nothing is
/// listening at that point.
pub fn build_app_with(
    config: &ServerConfig,
    deps: &BuiltinDeps,
    registry: &HandlerRegistry,
) -> Result<App> {
    let table = Arc::new(
        RouteTable::build(&config.routes, registry).wrap_err("Failed to build route table")?,
    );
    let access = Arc::new(AccessControl::new(
        deps.sessions.clone(),
        deps.api_keys.clone(),
        &config.auth,
    ));
    let dispatcher = Arc::new(Dispatcher::new(
        table.clone(),
        access,
        &config.auth,
        config.max_body_bytes,
    ));

    Ok(App {
        router: router(HttpHandler::new(dispatcher)),
        table,
    })
}

/// Axum router sending every path and method to `handler`.
pub fn router(handler: HttpHandler) -> Router {
    let route = |handler: HttpHandler| {
        any(move |req: Request| {
            let handler = handler.clone();
            async move {
                let client_addr = req
                    .extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| *addr);
                handler.handle_request(req, client_addr).await
            }
        })
    };

    Router::new()
        .route("/", route(handler.clone()))
        .route("/{*path}", route(handler))
        .layer(CompressionLayer::new())
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn(request_id_middleware))
}
