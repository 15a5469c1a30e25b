//! Filter and custom-predicate registries
//!
//! Both registries map a name to a factory over a heterogeneous
//! argument vector. The routing core instantiates filters and stores
//! them on compiled routes for the proxy to invoke; it never executes
//! them itself. Custom predicates participate directly in matching.
//!
//! Registries are built before the routing instance starts and are
//! treated as immutable afterwards.

use crate::definition::Arg;
use crate::error::CreateError;
use http::{HeaderMap, Method};
use std::collections::HashMap;
use std::sync::Arc;

/// Borrowed view of an HTTP request, as seen by the matcher and by
/// custom predicates.
#[derive(Debug, Clone, Copy)]
pub struct LookupRequest<'a> {
    /// Request method
    pub method: &'a Method,
    /// URL path, percent-decoded by the caller
    pub path: &'a str,
    /// Host header value (may include a port)
    pub host: &'a str,
    /// All request headers
    pub headers: &'a HeaderMap,
}

impl<'a> LookupRequest<'a> {
    /// Create a request view from its parts.
    pub fn new(method: &'a Method, path: &'a str, host: &'a str, headers: &'a HeaderMap) -> Self {
        Self {
            method,
            path,
            host,
            headers,
        }
    }
}

/// A filter instance attached to a compiled route.
///
/// Instances are opaque to the routing core: the proxy layer defines
/// the execution contract and downcasts to its own filter types. The
/// core only instantiates them and carries them on the route.
pub trait Filter: Send + Sync + std::fmt::Debug {}

/// Factory for filter instances, registered by name.
pub trait FilterSpec: Send + Sync {
    /// Name of the filter as used in route definitions.
    fn name(&self) -> &str;

    /// Create a filter instance with concrete arguments.
    fn create(&self, args: &[Arg]) -> Result<Arc<dyn Filter>, CreateError>;
}

/// A custom route-matching predicate instance.
///
/// Implementations must be pure with respect to the request: the
/// matcher may evaluate them any number of times in any order.
pub trait Predicate: Send + Sync {
    /// Returns true if the request matches the predicate.
    fn matches(&self, req: &LookupRequest<'_>) -> bool;
}

/// Factory for custom predicate instances, registered by name.
pub trait PredicateSpec: Send + Sync {
    /// Name of the predicate as used in route definitions.
    fn name(&self) -> &str;

    /// Create a predicate instance with concrete arguments.
    fn create(&self, args: &[Arg]) -> Result<Arc<dyn Predicate>, CreateError>;
}

/// Read-only mapping from filter name to filter spec.
#[derive(Clone, Default)]
pub struct FilterRegistry {
    specs: HashMap<String, Arc<dyn FilterSpec>>,
}

impl FilterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a spec under its own name, replacing any previous
    /// registration.
    pub fn register(&mut self, spec: Arc<dyn FilterSpec>) {
        self.specs.insert(spec.name().to_string(), spec);
    }

    /// Look up a spec by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn FilterSpec>> {
        self.specs.get(name)
    }

    /// Number of registered specs.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// Read-only mapping from predicate name to predicate spec.
#[derive(Clone, Default)]
pub struct PredicateRegistry {
    specs: HashMap<String, Arc<dyn PredicateSpec>>,
}

impl PredicateRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from an ordered spec list.
    pub fn from_specs<I>(specs: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn PredicateSpec>>,
    {
        let mut registry = Self::new();
        for spec in specs {
            registry.register(spec);
        }
        registry
    }

    /// Register a spec under its own name, replacing any previous
    /// registration.
    pub fn register(&mut self, spec: Arc<dyn PredicateSpec>) {
        self.specs.insert(spec.name().to_string(), spec);
    }

    /// Look up a spec by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn PredicateSpec>> {
        self.specs.get(name)
    }

    /// Number of registered specs.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct NoopFilter;
    impl Filter for NoopFilter {}

    struct NoopFilterSpec;
    impl FilterSpec for NoopFilterSpec {
        fn name(&self) -> &str {
            "noop"
        }

        fn create(&self, args: &[Arg]) -> Result<Arc<dyn Filter>, CreateError> {
            if !args.is_empty() {
                return Err(CreateError::arg_count(0, args.len()));
            }
            Ok(Arc::new(NoopFilter))
        }
    }

    #[test]
    fn test_filter_registry_lookup() {
        let mut registry = FilterRegistry::new();
        registry.register(Arc::new(NoopFilterSpec));

        assert!(registry.get("noop").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_filter_spec_rejects_args() {
        let spec = NoopFilterSpec;
        let err = spec.create(&[Arg::from("x")]).unwrap_err();
        assert!(matches!(err, CreateError::ArgCount { expected: 0, got: 1 }));
    }
}
