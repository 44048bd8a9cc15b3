pub mod access;
pub mod dispatcher;
pub mod error;
pub mod identity;
pub mod overlay;
pub mod pattern;
pub mod registry;
pub mod route;
pub mod route_table;

pub use access::AccessControl;
pub use dispatcher::{Dispatched, Dispatcher};
pub use error::{AccessError, DispatchError, StartupConfigError};
pub use identity::{ApiPrincipal, Identity, SessionUser};
pub use registry::HandlerRegistry;
pub use route::{RouteDeclaration, RouteEntry, Visibility};
pub use route_table::{RouteMatch, RouteTable};
