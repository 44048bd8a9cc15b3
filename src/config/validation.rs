#![allow(clippy::collapsible_if)]

use std::{collections::HashSet, net::SocketAddr};

use http::HeaderName;

use crate::{
    config::models::{AuthConfig, DatastoreConfig, ServerConfig},
    core::{
        pattern::{CaptureStyle, CompiledPattern},
        registry::HandlerRegistry,
        route::{RouteDeclaration, Visibility},
    },
};

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid listen address '{address}': {reason}")]
    InvalidListenAddress { address: String, reason: String },

    #[error("Invalid route #{index} '{pattern}': {message}")]
    InvalidRoute {
        index: usize,
        pattern: String,
        message: String,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Server configuration validator.
///
/// Collects every problem it can find so an operator sees them all at once.
/// The route table build repeats the route checks and is the final authority.
pub struct ServerConfigValidator;

impl ServerConfigValidator {
    /// Validate the entire server configuration against the handlers in `registry`.
    pub fn validate(config: &ServerConfig, registry: &HandlerRegistry) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_listen_address(&config.effective_listen_addr()) {
            errors.push(e);
        }

        if config.routes.is_empty() {
            errors.push(ValidationError::MissingField {
                field: "routes".to_string(),
            });
        }
        for (index, route) in config.routes.iter().enumerate() {
            errors.extend(Self::validate_route(index, route, registry));
        }

        errors.extend(Self::validate_auth(&config.auth));
        errors.extend(Self::validate_datastore(&config.datastore));

        if config.max_body_bytes == 0 {
            errors.push(ValidationError::InvalidField {
                field: "max_body_bytes".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        errors.extend(Self::validate_accounts(config));

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            })
        }
    }

    /// Validate listen address format
    fn validate_listen_address(address: &str) -> ValidationResult<()> {
        if address.parse::<SocketAddr>().is_err() {
            return Err(ValidationError::InvalidListenAddress {
                address: address.to_string(),
                reason: "Must be in format 'IP:PORT' (e.g., '127.0.0.1:5000' or '0.0.0.0:5000')"
                    .to_string(),
            });
        }
        Ok(())
    }

    /// Validate a single route declaration and its overlays
    fn validate_route(
        index: usize,
        route: &RouteDeclaration,
        registry: &HandlerRegistry,
    ) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let invalid = |message: String| ValidationError::InvalidRoute {
            index,
            pattern: route.pattern.clone(),
            message,
        };

        let compiled = match CompiledPattern::compile(&route.pattern) {
            Ok(compiled) => Some(compiled),
            Err(e) => {
                errors.push(invalid(e.to_string()));
                None
            }
        };

        match registry.get(&route.handler) {
            Some(handler) => {
                if let Err(message) = handler.validate_config(&route.config) {
                    errors.push(invalid(format!("handler '{}': {message}", route.handler)));
                }
            }
            None => errors.push(invalid(format!(
                "unknown handler '{}' (available: {})",
                route.handler,
                registry.names().join(", ")
            ))),
        }

        if route.visibility == Visibility::Public {
            if !route.public.is_empty() {
                errors.push(invalid("public routes cannot declare overlays".to_string()));
            }
            if let Some(compiled) = &compiled {
                if compiled.style() == CaptureStyle::Positional {
                    errors.push(invalid(
                        "public patterns must use named captures".to_string(),
                    ));
                }
            }
        }

        for public_pattern in &route.public {
            match CompiledPattern::compile(public_pattern) {
                Ok(public) => {
                    if public.style() == CaptureStyle::Positional {
                        errors.push(invalid(format!(
                            "overlay '{public_pattern}' must use named captures"
                        )));
                    }
                    if let Some(compiled) = &compiled {
                        if public.capture_count() != compiled.capture_count() {
                            errors.push(invalid(format!(
                                "overlay '{public_pattern}' has {} captures, route has {}",
                                public.capture_count(),
                                compiled.capture_count()
                            )));
                        }
                    }
                }
                Err(e) => errors.push(invalid(format!("overlay: {e}"))),
            }
        }

        errors
    }

    fn validate_auth(auth: &AuthConfig) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if auth.session_cookie.is_empty() {
            errors.push(ValidationError::MissingField {
                field: "auth.session_cookie".to_string(),
            });
        }
        if HeaderName::from_bytes(auth.api_key_header.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidField {
                field: "auth.api_key_header".to_string(),
                message: format!("'{}' is not a valid header name", auth.api_key_header),
            });
        }
        if !auth.login_url.starts_with('/') {
            errors.push(ValidationError::InvalidField {
                field: "auth.login_url".to_string(),
                message: "must be an absolute path starting with '/'".to_string(),
            });
        }
        if let Err(e) = humantime::parse_duration(&auth.session_ttl) {
            errors.push(ValidationError::InvalidField {
                field: "auth.session_ttl".to_string(),
                message: e.to_string(),
            });
        }

        errors
    }

    fn validate_datastore(datastore: &DatastoreConfig) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if datastore.pool_size == 0 {
            errors.push(ValidationError::InvalidField {
                field: "datastore.pool_size".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if let Err(e) = humantime::parse_duration(&datastore.acquire_timeout) {
            errors.push(ValidationError::InvalidField {
                field: "datastore.acquire_timeout".to_string(),
                message: e.to_string(),
            });
        }

        errors
    }

    fn validate_accounts(config: &ServerConfig) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut ids = HashSet::new();
        let mut emails = HashSet::new();

        for account in &config.accounts {
            if !ids.insert(account.id.as_str()) {
                errors.push(ValidationError::InvalidField {
                    field: format!("accounts.{}", account.id),
                    message: "duplicate account id".to_string(),
                });
            }
            if !emails.insert(account.email.to_ascii_lowercase()) {
                errors.push(ValidationError::InvalidField {
                    field: format!("accounts.{}", account.id),
                    message: format!("duplicate email '{}'", account.email),
                });
            }
        }

        for key in &config.api_keys {
            if !ids.contains(key.owner_id.as_str()) {
                errors.push(ValidationError::InvalidField {
                    field: format!("api_keys.{}", key.key_id),
                    message: format!("owner '{}' is not a configured account", key.owner_id),
                });
            }
        }

        errors
    }

    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        if errors.len() == 1 {
            return errors[0].to_string();
        }

        let mut message = format!("Found {} validation errors:\n", errors.len());
        for (i, error) in errors.iter().enumerate() {
            message.push_str(&format!("  {}. {}\n", i + 1, error));
        }
        message
    }
}
