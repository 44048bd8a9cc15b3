//! Explicit name → handler table consulted while building the route table.
use std::{collections::HashMap, sync::Arc};

use crate::ports::handler::RouteHandler;

/// Handlers available to route declarations, keyed by the name used in
/// configuration. Built in code before the route table; a declaration naming
/// a handler that is not registered fails the build.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn RouteHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any previous binding.
    pub fn register(mut self, name: impl Into<String>, handler: Arc<dyn RouteHandler>) -> Self {
        self.handlers.insert(name.into(), handler);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn RouteHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
