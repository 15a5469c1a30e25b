//! # Wayline Core
//!
//! Core types for the wayline routing engine: the parsed route model fed
//! in by data-source adapters, the compiled route produced by the
//! compiler, the filter and custom-predicate registries, and the error
//! types shared across the workspace.
//!
//! The crate is deliberately free of async machinery: everything here is
//! plain data plus the trait seams the routing pipeline plugs into.
//!
//! ## Example
//!
//! ```
//! use wayline_core::definition::{Backend, RouteDefinition};
//!
//! let def = RouteDefinition::new("catalog", Backend::network("http", "catalog.svc:8080"))
//!     .with_predicate("Path", ["/catalog/:sku"])
//!     .with_filter("setRequestHeader", ["X-Origin", "edge"]);
//!
//! assert_eq!(def.id, "catalog");
//! assert_eq!(def.predicates.len(), 1);
//! ```

pub mod definition;
pub mod error;
pub mod print;
pub mod registry;
pub mod route;

// Re-export commonly used types for convenience
pub use definition::{Arg, Backend, Endpoint, Invocation, RouteDefinition};
pub use error::{CreateError, DataClientError, RouteFailure};
pub use registry::{
    Filter, FilterRegistry, FilterSpec, LookupRequest, Predicate, PredicateRegistry, PredicateSpec,
};
pub use route::{PathParams, PathPattern, PathSegment, Route, RouteFilter};
