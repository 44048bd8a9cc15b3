//! Configuration data structures for nado.
//!
//! These types map directly to TOML (also JSON / YAML) configuration files and
//! include defaults so that minimal configs remain concise. `routes` is an
//! ordered array: its order is the route table's evaluation order.
use serde::{Deserialize, Serialize};

use crate::core::{identity::SessionUser, route::RouteDeclaration};

fn default_listen_addr() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Overrides the port of `listen_addr` when set.
    #[serde(default)]
    pub port: Option<u16>,
    /// Process identity used in operational logs; defaults to the host name.
    #[serde(default)]
    pub identity: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub datastore: DatastoreConfig,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Accounts seeded into the in-memory identity store.
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
    /// API keys seeded into the in-memory identity store.
    #[serde(default)]
    pub api_keys: Vec<ApiKeyConfig>,
    #[serde(default)]
    pub routes: Vec<RouteDeclaration>,
}

impl ServerConfig {
    /// Create a new server configuration builder
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Effective listen address after applying the `port` override.
    pub fn effective_listen_addr(&self) -> String {
        match self.port {
            Some(port) => match self.listen_addr.rsplit_once(':') {
                Some((host, _)) => format!("{host}:{port}"),
                None => format!("{}:{port}", self.listen_addr),
            },
            None => self.listen_addr.clone(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            port: None,
            identity: None,
            logging: LoggingConfig::default(),
            auth: AuthConfig::default(),
            datastore: DatastoreConfig::default(),
            max_body_bytes: default_max_body_bytes(),
            accounts: Vec::new(),
            api_keys: Vec::new(),
            routes: Vec::new(),
        }
    }
}

/// Builder for ServerConfig to allow for cleaner configuration creation
#[derive(Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Set the listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the process identity
    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.config.identity = Some(identity.into());
        self
    }

    pub fn auth(mut self, auth: AuthConfig) -> Self {
        self.config.auth = auth;
        self
    }

    pub fn datastore(mut self, datastore: DatastoreConfig) -> Self {
        self.config.datastore = datastore;
        self
    }

    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.config.max_body_bytes = limit;
        self
    }

    pub fn account(mut self, account: AccountConfig) -> Self {
        self.config.accounts.push(account);
        self
    }

    pub fn api_key(mut self, key: ApiKeyConfig) -> Self {
        self.config.api_keys.push(key);
        self
    }

    /// Append a route; evaluation order is append order.
    pub fn route(mut self, route: RouteDeclaration) -> Self {
        self.config.routes.push(route);
        self
    }

    /// Build the final ServerConfig
    pub fn build(self) -> Result<ServerConfig, String> {
        if self.config.routes.is_empty() {
            return Err("At least one route must be configured".to_string());
        }
        Ok(self.config)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive; `RUST_LOG` takes precedence.
    pub level: String,
    /// JSON lines (production) or pretty console output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AuthConfig {
    /// Cookie carrying the session token on private routes.
    pub session_cookie: String,
    /// Session lifetime, humantime syntax (e.g. "14d").
    pub session_ttl: String,
    /// Header carrying the API key on public routes.
    pub api_key_header: String,
    /// Query parameter accepted as an API key source, if any.
    pub api_key_query: Option<String>,
    /// Where browser-facing private routes send unauthenticated users.
    pub login_url: String,
    /// Mark the session cookie `Secure`.
    pub secure_cookies: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_cookie: "user".to_string(),
            session_ttl: "14d".to_string(),
            api_key_header: "x-api-key".to_string(),
            api_key_query: Some("api_key".to_string()),
            login_url: "/signin".to_string(),
            secure_cookies: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DatastoreConfig {
    /// Maximum concurrently checked-out datastore connections.
    pub pool_size: usize,
    /// How long a request waits for a connection, humantime syntax.
    pub acquire_timeout: String,
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            pool_size: 16,
            acquire_timeout: "5s".to_string(),
        }
    }
}

/// A development account for the in-memory identity store.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccountConfig {
    pub id: String,
    pub email: String,
    pub password: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl AccountConfig {
    pub fn user(&self) -> SessionUser {
        SessionUser {
            id: self.id.clone(),
            email: self.email.clone(),
            active: self.active,
        }
    }
}

/// A pre-issued API key for the in-memory identity store.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ApiKeyConfig {
    pub key: String,
    pub key_id: String,
    pub owner_id: String,
    #[serde(default)]
    pub revoked: bool,
}

fn default_true() -> bool {
    true
}
