//! Public overlays: exposing private routes on the external API surface.
//!
//! An overlay never touches the handler. It produces another declaration
//! naming the same registry handler, with public visibility and a public
//! facing pattern. Placement rules used by [`expand`]:
//!
//! * derived entries follow their source, in the order the overlay patterns
//!   were listed;
//! * an overlay whose pattern is textually identical to the source replaces
//!   the source and accepts either credential (API key first, then session).
use crate::core::{
    error::StartupConfigError,
    route::{RouteDeclaration, Visibility},
};

/// Derive the public declaration for `public_pattern` from a private one.
pub fn derive(private: &RouteDeclaration, public_pattern: &str) -> RouteDeclaration {
    RouteDeclaration {
        pattern: public_pattern.to_string(),
        handler: private.handler.clone(),
        config: private.config.clone(),
        visibility: Visibility::Public,
        authenticated: true,
        browser: false,
        public: Vec::new(),
        session_fallback: public_pattern == private.pattern,
        derived_from: Some(private.pattern.clone()),
    }
}

/// Expand every declaration's overlays into concrete declarations, in
/// evaluation order.
pub fn expand(
    declarations: &[RouteDeclaration],
) -> Result<Vec<RouteDeclaration>, StartupConfigError> {
    let mut expanded = Vec::with_capacity(declarations.len());

    for declaration in declarations {
        if declaration.public.is_empty() {
            expanded.push(declaration.clone());
            continue;
        }

        if declaration.visibility == Visibility::Public {
            return Err(StartupConfigError::OverlayOnPublicRoute {
                pattern: declaration.pattern.clone(),
            });
        }

        let replaced_in_place = declaration
            .public
            .iter()
            .any(|public_pattern| *public_pattern == declaration.pattern);

        if !replaced_in_place {
            let mut source = declaration.clone();
            source.public.clear();
            expanded.push(source);
        }

        for public_pattern in &declaration.public {
            expanded.push(derive(declaration, public_pattern));
        }
    }

    Ok(expanded)
}
