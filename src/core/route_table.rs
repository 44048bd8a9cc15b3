//! The ordered, immutable route table.
//!
//! # Ordering contract
//!
//! Entries are evaluated strictly in declaration order (overlay entries sit
//! right after, or in place of, the declaration they came from) and the
//! **first** matching entry wins. Identical or overlapping patterns are
//! legal: a broad legacy pattern placed after specific ones acts as a
//! fallback, and a later exact duplicate is simply unreachable. Anyone adding
//! routes must place them with this in mind; there is no other
//! disambiguation.
use std::{collections::HashSet, sync::Arc};

use crate::core::{
    error::StartupConfigError,
    overlay,
    pattern::{CaptureSet, CaptureStyle, CompiledPattern},
    registry::HandlerRegistry,
    route::{RouteDeclaration, RouteEntry, Visibility},
};

/// A successful lookup: the winning entry, its position and its captures.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub index: usize,
    pub entry: &'a RouteEntry,
    pub captures: CaptureSet,
}

/// Route entries in evaluation order. Built once, shared read-only.
#[derive(Debug, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    /// Expand overlays, compile every pattern and bind every handler.
    ///
    /// Any malformed pattern, unknown handler, invalid static configuration
    /// or overlay capture mismatch fails the whole build.
    pub fn build(
        declarations: &[RouteDeclaration],
        registry: &HandlerRegistry,
    ) -> Result<Self, StartupConfigError> {
        let expanded = overlay::expand(declarations)?;
        let mut entries = Vec::with_capacity(expanded.len());

        for declaration in expanded {
            let pattern = CompiledPattern::compile(&declaration.pattern)?;

            let handler = registry.get(&declaration.handler).ok_or_else(|| {
                StartupConfigError::UnknownHandler {
                    pattern: declaration.pattern.clone(),
                    handler: declaration.handler.clone(),
                }
            })?;

            handler.validate_config(&declaration.config).map_err(|message| {
                StartupConfigError::InvalidStaticConfig {
                    pattern: declaration.pattern.clone(),
                    handler: declaration.handler.clone(),
                    message,
                }
            })?;

            if declaration.visibility == Visibility::Public {
                check_public_captures(&pattern, declaration.derived_from.as_deref())?;
            }

            entries.push(RouteEntry {
                pattern,
                handler_name: declaration.handler,
                handler,
                config: Arc::new(declaration.config),
                visibility: declaration.visibility,
                authenticated: declaration.authenticated,
                browser: declaration.browser,
                session_fallback: declaration.session_fallback,
                derived_from: declaration.derived_from,
            });
        }

        let table = Self { entries };
        for index in table.unreachable() {
            let entry = &table.entries[index];
            tracing::warn!(
                index,
                pattern = %entry.pattern,
                visibility = %entry.visibility,
                "Duplicate route pattern; only the first declaration is reachable"
            );
        }

        tracing::debug!("Route table built with {} entries", table.len());
        Ok(table)
    }

    /// Indexes of entries repeating the pattern and visibility of an earlier
    /// entry. First-match resolution never reaches them.
    pub fn unreachable(&self) -> Vec<usize> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| !seen.insert((entry.pattern.as_str(), entry.visibility)))
            .map(|(index, _)| index)
            .collect()
    }

    /// First entry, in table order, whose pattern matches the full `path`.
    pub fn resolve(&self, path: &str) -> Option<RouteMatch<'_>> {
        self.entries
            .iter()
            .enumerate()
            .find_map(|(index, entry)| {
                entry.pattern.matches(path).map(|captures| RouteMatch {
                    index,
                    entry,
                    captures,
                })
            })
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// Public patterns name their captures, and an overlay exposes exactly as
// many captures as its source so handlers can read them by position.
fn check_public_captures(
    pattern: &CompiledPattern,
    derived_from: Option<&str>,
) -> Result<(), StartupConfigError> {
    if pattern.style() == CaptureStyle::Positional {
        return Err(StartupConfigError::PositionalPublicCaptures {
            pattern: pattern.as_str().to_string(),
        });
    }

    if let Some(source) = derived_from {
        let source_pattern = CompiledPattern::compile(source)?;
        if source_pattern.capture_count() != pattern.capture_count() {
            return Err(StartupConfigError::OverlayCaptureMismatch {
                pattern: pattern.as_str().to_string(),
                source_pattern: source.to_string(),
                public: pattern.capture_count(),
                private: source_pattern.capture_count(),
            });
        }
    }

    Ok(())
}
