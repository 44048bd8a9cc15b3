//! Route declarations and compiled route entries.
use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{core::pattern::CompiledPattern, ports::handler::RouteHandler};

/// Per-route static configuration handed to the handler on every call.
pub type StaticConfig = serde_json::Map<String, serde_json::Value>;

/// Which identity scheme a route requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Session cookie based identity (internal application routes).
    #[default]
    Private,
    /// API key based identity (external API surface).
    Public,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Private => f.write_str("private"),
            Self::Public => f.write_str("public"),
        }
    }
}

fn default_authenticated() -> bool {
    true
}

/// A route as written in configuration, before compilation.
///
/// `public` lists overlay patterns: each one yields an additional public
/// entry bound to the same handler (see [`crate::core::overlay`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDeclaration {
    pub pattern: String,
    /// Registry name of the handler.
    pub handler: String,
    #[serde(default)]
    pub config: StaticConfig,
    #[serde(default)]
    pub visibility: Visibility,
    /// Private routes only: whether an identity is required.
    #[serde(default = "default_authenticated")]
    pub authenticated: bool,
    /// Private routes only: redirect GET/HEAD auth failures to the login URL.
    #[serde(default)]
    pub browser: bool,
    #[serde(default)]
    pub public: Vec<String>,
    /// Set on overlay entries that replaced their source in place.
    #[serde(skip)]
    pub session_fallback: bool,
    /// Pattern of the private declaration an overlay entry was derived from.
    #[serde(skip)]
    pub derived_from: Option<String>,
}

impl RouteDeclaration {
    /// A private, authenticated route with empty static configuration.
    pub fn new(pattern: impl Into<String>, handler: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            handler: handler.into(),
            config: StaticConfig::new(),
            visibility: Visibility::Private,
            authenticated: true,
            browser: false,
            public: Vec::new(),
            session_fallback: false,
            derived_from: None,
        }
    }

    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        if let serde_json::Value::Object(map) = config {
            self.config = map;
        }
        self
    }

    pub fn anonymous(mut self) -> Self {
        self.authenticated = false;
        self
    }

    pub fn browser(mut self) -> Self {
        self.browser = true;
        self
    }

    /// Add a public overlay pattern.
    pub fn publicize(mut self, public_pattern: impl Into<String>) -> Self {
        self.public.push(public_pattern.into());
        self
    }

    pub fn public_only(mut self) -> Self {
        self.visibility = Visibility::Public;
        self
    }
}

/// One compiled, immutable row of the route table.
#[derive(Clone)]
pub struct RouteEntry {
    pub pattern: CompiledPattern,
    pub handler_name: String,
    pub handler: Arc<dyn RouteHandler>,
    pub config: Arc<StaticConfig>,
    pub visibility: Visibility,
    pub authenticated: bool,
    pub browser: bool,
    pub session_fallback: bool,
    pub derived_from: Option<String>,
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("pattern", &self.pattern.as_str())
            .field("handler", &self.handler_name)
            .field("visibility", &self.visibility)
            .field("authenticated", &self.authenticated)
            .field("session_fallback", &self.session_fallback)
            .finish()
    }
}
