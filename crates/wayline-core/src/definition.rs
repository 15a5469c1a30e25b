//! Parsed route definitions
//!
//! This is the shape data-source adapters hand to the aggregator: an
//! identifier, ordered predicate and filter invocations, and a backend
//! descriptor. Definitions are plain serde values so the introspection
//! surface can render them as JSON with a stable key order.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A heterogeneous scalar argument of a predicate or filter invocation.
///
/// The untagged representation keeps the JSON form natural:
/// `["/users/:id", 30, true]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Arg {
    /// Boolean flag
    Bool(bool),
    /// Numeric argument
    Number(f64),
    /// String argument
    String(String),
}

impl Arg {
    /// Returns the string value, if this argument is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the numeric value, if this argument is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Arg::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the boolean value, if this argument is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Arg::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::String(s.to_string())
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Arg::String(s)
    }
}

impl From<f64> for Arg {
    fn from(n: f64) -> Self {
        Arg::Number(n)
    }
}

impl From<bool> for Arg {
    fn from(b: bool) -> Self {
        Arg::Bool(b)
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Bool(b) => write!(f, "{}", b),
            Arg::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Arg::String(s) => write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
        }
    }
}

/// A named predicate or filter invocation with its argument list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    /// Name as used in the route definition
    pub name: String,
    /// Ordered arguments
    #[serde(default)]
    pub args: Vec<Arg>,
}

impl Invocation {
    /// Create a new invocation.
    pub fn new<A>(name: impl Into<String>, args: A) -> Self
    where
        A: IntoIterator,
        A::Item: Into<Arg>,
    {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", arg)?;
        }
        write!(f, ")")
    }
}

/// A single backend endpoint of a load-balancer group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Backend scheme, e.g. `http`
    pub scheme: String,
    /// Backend host and optional port
    pub host: String,
}

/// Backend descriptor of a parsed route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Backend {
    /// A single network endpoint
    Network {
        /// Backend scheme, e.g. `http`
        scheme: String,
        /// Backend host and optional port
        host: String,
    },
    /// No backend; the proxy responds directly
    Shunt,
    /// The request is looped back to the proxy itself
    Loopback,
    /// The backend is chosen dynamically by the proxy
    Dynamic,
    /// A load-balancer group of member endpoints
    #[serde(rename = "loadbalanced")]
    LoadBalanced {
        /// Member endpoints, in declaration order
        endpoints: Vec<Endpoint>,
    },
}

impl Backend {
    /// Shorthand for a single network backend.
    pub fn network(scheme: impl Into<String>, host: impl Into<String>) -> Self {
        Backend::Network {
            scheme: scheme.into(),
            host: host.into(),
        }
    }

    /// Shorthand for a load-balancer group over `scheme://host` pairs.
    pub fn load_balanced<I>(endpoints: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Backend::LoadBalanced {
            endpoints: endpoints
                .into_iter()
                .map(|(scheme, host)| Endpoint { scheme, host })
                .collect(),
        }
    }
}

/// A parsed route definition as supplied by a data-source adapter.
///
/// Definitions are mutated only by the aggregator task that owns them;
/// everything downstream sees clones or compiled forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDefinition {
    /// Unique route identifier
    pub id: String,
    /// Ordered predicate invocations
    #[serde(default)]
    pub predicates: Vec<Invocation>,
    /// Ordered filter invocations
    #[serde(default)]
    pub filters: Vec<Invocation>,
    /// Backend descriptor
    pub backend: Backend,
}

impl RouteDefinition {
    /// Create a definition with no predicates or filters.
    pub fn new(id: impl Into<String>, backend: Backend) -> Self {
        Self {
            id: id.into(),
            predicates: Vec::new(),
            filters: Vec::new(),
            backend,
        }
    }

    /// Append a predicate invocation.
    pub fn with_predicate<A>(mut self, name: impl Into<String>, args: A) -> Self
    where
        A: IntoIterator,
        A::Item: Into<Arg>,
    {
        self.predicates.push(Invocation::new(name, args));
        self
    }

    /// Append a filter invocation.
    pub fn with_filter<A>(mut self, name: impl Into<String>, args: A) -> Self
    where
        A: IntoIterator,
        A::Item: Into<Arg>,
    {
        self.filters.push(Invocation::new(name, args));
        self
    }
}
