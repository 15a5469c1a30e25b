//! Error types for the wayline routing core.
//!
//! The update pipeline never lets an error escape the lookup path: data
//! source failures are retried or isolate the source, and per-route
//! compilation failures exclude only the affected route. The types here
//! carry enough context for the aggregator to decide which of those
//! policies applies.

use thiserror::Error;

/// Failure of a registry factory while instantiating a filter or a
/// custom predicate from its argument list.
#[derive(Debug, Error)]
pub enum CreateError {
    /// The invocation carried the wrong number of arguments
    #[error("expected {expected} arguments, got {got}")]
    ArgCount { expected: usize, got: usize },

    /// The arguments had the wrong types or values
    #[error("invalid arguments: {reason}")]
    InvalidArgs { reason: String },
}

impl CreateError {
    /// Creates an argument-count mismatch error.
    pub fn arg_count(expected: usize, got: usize) -> Self {
        Self::ArgCount { expected, got }
    }

    /// Creates an invalid-arguments error.
    pub fn invalid_args(reason: impl Into<String>) -> Self {
        Self::InvalidArgs {
            reason: reason.into(),
        }
    }
}

/// Failure of a data-source adapter call.
///
/// Transient failures are retried on the next poll tick. Fatal failures
/// disable the source; the remaining sources keep serving.
#[derive(Debug, Error)]
pub enum DataClientError {
    /// The call failed but is expected to succeed on retry
    #[error("transient data source failure: {reason}")]
    Transient { reason: String },

    /// The source is misconfigured or produced an unusable payload
    #[error("fatal data source failure: {reason}")]
    Fatal { reason: String },
}

impl DataClientError {
    /// Creates a transient failure.
    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Transient {
            reason: reason.into(),
        }
    }

    /// Creates a fatal failure.
    pub fn fatal(reason: impl Into<String>) -> Self {
        Self::Fatal {
            reason: reason.into(),
        }
    }

    /// Whether the source should be disabled rather than retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }
}

/// Reason a single route failed to compile.
///
/// An invalid route is excluded from the matcher and counted; the other
/// routes of the same generation are unaffected.
#[derive(Debug, Error)]
pub enum RouteFailure {
    /// No filter spec registered under this name
    #[error("unknown filter {name:?}")]
    UnknownFilter { name: String },

    /// The filter spec rejected the invocation arguments
    #[error("filter {name:?}: {source}")]
    FilterCreate {
        name: String,
        #[source]
        source: CreateError,
    },

    /// No custom predicate spec registered under this name
    #[error("unknown predicate {name:?}")]
    UnknownPredicate { name: String },

    /// The predicate spec rejected the invocation arguments
    #[error("predicate {name:?}: {source}")]
    PredicateCreate {
        name: String,
        #[source]
        source: CreateError,
    },

    /// The path pattern could not be parsed
    #[error("malformed path pattern {pattern:?}: {reason}")]
    MalformedPath { pattern: String, reason: String },

    /// A route carried more than one path constraint
    #[error("conflicting path predicates")]
    ConflictingPaths,

    /// A singleton predicate (Host, Method) appeared twice
    #[error("duplicate {name} predicate")]
    DuplicatePredicate { name: &'static str },

    /// The host pattern is not a valid regular expression
    #[error("invalid host pattern {pattern:?}: {source}")]
    InvalidHostPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The header pattern is not a valid regular expression
    #[error("invalid header pattern {pattern:?}: {source}")]
    InvalidHeaderPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The header name is not a valid HTTP header name
    #[error("invalid header name {name:?}")]
    InvalidHeaderName { name: String },

    /// The method argument is not a valid HTTP method
    #[error("invalid method {method:?}")]
    InvalidMethod { method: String },

    /// A load-balanced backend declared no member endpoints
    #[error("load balancer backend with no endpoints")]
    EmptyLoadBalancerGroup,
}

impl RouteFailure {
    /// Creates a malformed-path error.
    pub fn malformed_path(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedPath {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }
}
