//! Compiled routes
//!
//! The compiler turns parsed definitions into `Route` values: predicate
//! constraints lifted into matcher-intrinsic form, filter instances
//! resolved, and load-balancer groups expanded. A compiled route is
//! immutable once constructed; a generation never mutates its routes.

use crate::definition::RouteDefinition;
use crate::error::RouteFailure;
use crate::registry::{Filter, Predicate};
use http::{HeaderName, Method};
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

/// Wildcard captures extracted from the winning path predicate.
pub type PathParams = HashMap<String, String>;

/// Conventional capture name holding the untrimmed remainder of a
/// subtree or tail-wildcard match.
pub const TAIL_PARAM: &str = "*";

/// One segment of an exact path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Must equal this segment literally
    Literal(String),
    /// Matches any single segment, capturing it under the name
    Wildcard(String),
    /// Matches the whole remainder, capturing it under the name;
    /// only valid as the last segment
    Tail(String),
}

/// An exact path pattern with optional named wildcards, e.g.
/// `/users/:id` or `/files/*rest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<PathSegment>,
    trailing_slash: bool,
}

impl PathPattern {
    /// Parse a pattern. The pattern must start with `/`; segments
    /// starting with `:` are single-segment wildcards and a final
    /// segment starting with `*` captures the remainder.
    pub fn parse(pattern: &str) -> Result<Self, RouteFailure> {
        let rest = pattern
            .strip_prefix('/')
            .ok_or_else(|| RouteFailure::malformed_path(pattern, "must start with '/'"))?;

        let mut segments = Vec::new();
        let mut trailing_slash = false;
        if !rest.is_empty() {
            let raw_segments: Vec<&str> = rest.split('/').collect();
            let last = raw_segments.len() - 1;
            for (i, seg) in raw_segments.into_iter().enumerate() {
                if seg.is_empty() {
                    // permit a single trailing slash; whether it is
                    // significant depends on the matching options
                    if i == last {
                        trailing_slash = true;
                        break;
                    }
                    return Err(RouteFailure::malformed_path(pattern, "empty segment"));
                }
                if let Some(name) = seg.strip_prefix(':') {
                    if name.is_empty() {
                        return Err(RouteFailure::malformed_path(pattern, "unnamed wildcard"));
                    }
                    segments.push(PathSegment::Wildcard(name.to_string()));
                } else if let Some(name) = seg.strip_prefix('*') {
                    if name.is_empty() {
                        return Err(RouteFailure::malformed_path(pattern, "unnamed wildcard"));
                    }
                    if i != last {
                        return Err(RouteFailure::malformed_path(
                            pattern,
                            "tail wildcard must be the last segment",
                        ));
                    }
                    segments.push(PathSegment::Tail(name.to_string()));
                } else {
                    segments.push(PathSegment::Literal(seg.to_string()));
                }
            }
        }

        Ok(Self {
            raw: pattern.to_string(),
            segments,
            trailing_slash,
        })
    }

    /// The pattern as written in the route definition.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The parsed segments.
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Whether the pattern contains no wildcards.
    pub fn is_literal(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, PathSegment::Literal(_)))
    }

    /// The literal form, valid only for wildcard-free patterns. Used
    /// as the exact-index key; preserves a declared trailing slash.
    pub fn literal(&self) -> String {
        let mut out = String::new();
        for seg in &self.segments {
            out.push('/');
            if let PathSegment::Literal(lit) = seg {
                out.push_str(lit);
            }
        }
        if self.trailing_slash && !out.is_empty() {
            out.push('/');
        }
        if out.is_empty() {
            out.push('/');
        }
        out
    }

    /// Number of literal characters; longer literals sort as more
    /// specific.
    pub fn literal_len(&self) -> usize {
        self.segments
            .iter()
            .map(|s| match s {
                PathSegment::Literal(lit) => lit.len() + 1,
                _ => 0,
            })
            .sum()
    }

    /// Extract wildcard captures from a path already known to match
    /// this pattern. With duplicate wildcard names, the latest binding
    /// wins.
    pub fn captures(&self, path: &str) -> PathParams {
        let mut params = PathParams::new();
        let path_segments: Vec<&str> =
            path.split('/').filter(|s| !s.is_empty()).collect();

        for (i, seg) in self.segments.iter().enumerate() {
            match seg {
                PathSegment::Literal(_) => {}
                PathSegment::Wildcard(name) => {
                    if let Some(value) = path_segments.get(i) {
                        params.insert(name.clone(), (*value).to_string());
                    }
                }
                PathSegment::Tail(name) => {
                    let rest = if i < path_segments.len() {
                        format!("/{}", path_segments[i..].join("/"))
                    } else {
                        "/".to_string()
                    };
                    params.insert(name.clone(), rest);
                }
            }
        }

        params
    }
}

/// A filter instance attached to a route, with the name and position
/// it was declared under. Kept for logging and monitoring by the proxy.
#[derive(Clone)]
pub struct RouteFilter {
    /// Filter name from the route definition
    pub name: String,
    /// Position in the declared filter chain
    pub index: usize,
    /// The resolved instance
    pub filter: Arc<dyn Filter>,
}

/// A compiled route as stored in a generation.
///
/// All constraint fields are in matcher-intrinsic form; custom
/// predicates remain as opaque instances. None of the fields are
/// mutated after construction.
#[derive(Clone)]
pub struct Route {
    /// Unique identifier; for load-balancer members this is the group
    /// id suffixed with the member ordinal
    pub id: String,
    /// The parsed definition this route was compiled from
    pub definition: RouteDefinition,
    /// Exact path pattern, if the route has a `Path` predicate
    pub path: Option<PathPattern>,
    /// Subtree prefix (normalized, no trailing slash except root), if
    /// the route has a `PathSubtree` predicate
    pub path_subtree: Option<String>,
    /// Host regex constraint
    pub host: Option<Regex>,
    /// Method constraint
    pub method: Option<Method>,
    /// Header exact-value constraints
    pub headers: Vec<(HeaderName, String)>,
    /// Header regex constraints
    pub header_regexps: Vec<(HeaderName, Regex)>,
    /// Resolved custom predicate instances
    pub predicates: Vec<Arc<dyn Predicate>>,
    /// Resolved filter instances in declaration order
    pub filters: Vec<RouteFilter>,
    /// Backend scheme; empty for shunt, loopback and dynamic backends
    pub scheme: String,
    /// Backend host; empty for shunt, loopback and dynamic backends
    pub host_addr: String,
    /// Load-balancer group identifier, equal for all members
    pub group: Option<String>,
    /// Member ordinal within the group
    pub lb_index: usize,
    /// Whether this route is a member of a load-balanced group
    pub is_load_balanced: bool,
}

impl Route {
    /// Total number of matching constraints, used for specificity
    /// ordering: more predicates sort as more specific.
    pub fn predicate_count(&self) -> usize {
        usize::from(self.path.is_some())
            + usize::from(self.path_subtree.is_some())
            + usize::from(self.host.is_some())
            + usize::from(self.method.is_some())
            + self.headers.len()
            + self.header_regexps.len()
            + self.predicates.len()
    }
}

impl PartialEq for Route {
    // route identity is the identifier
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Route {}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("id", &self.id)
            .field("path", &self.path.as_ref().map(PathPattern::raw))
            .field("path_subtree", &self.path_subtree)
            .field("group", &self.group)
            .field("is_load_balanced", &self.is_load_balanced)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_literal_pattern() {
        let p = PathPattern::parse("/api/v1/users").unwrap();
        assert!(p.is_literal());
        assert_eq!(p.literal(), "/api/v1/users");
        assert_eq!(p.segments().len(), 3);
    }

    #[test]
    fn test_parse_root() {
        let p = PathPattern::parse("/").unwrap();
        assert!(p.is_literal());
        assert_eq!(p.literal(), "/");
        assert!(p.segments().is_empty());
    }

    #[test]
    fn test_parse_wildcards() {
        let p = PathPattern::parse("/users/:id/orders/:oid").unwrap();
        assert!(!p.is_literal());
        assert_eq!(
            p.segments()[1],
            PathSegment::Wildcard("id".to_string())
        );
    }

    #[test]
    fn test_parse_tail() {
        let p = PathPattern::parse("/files/*rest").unwrap();
        assert_eq!(p.segments()[1], PathSegment::Tail("rest".to_string()));

        // tail must be last
        assert!(PathPattern::parse("/files/*rest/x").is_err());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(PathPattern::parse("users").is_err());
        assert!(PathPattern::parse("/a//b").is_err());
        assert!(PathPattern::parse("/a/:").is_err());
        assert!(PathPattern::parse("/a/*").is_err());
    }

    #[test]
    fn test_captures_single_wildcard() {
        let p = PathPattern::parse("/users/:id").unwrap();
        let params = p.captures("/users/42");
        assert_eq!(params.get("id").map(String::as_str), Some("42"));
    }

    #[test]
    fn test_captures_tail() {
        let p = PathPattern::parse("/files/*rest").unwrap();
        let params = p.captures("/files/a/b.txt");
        assert_eq!(params.get("rest").map(String::as_str), Some("/a/b.txt"));

        let params = p.captures("/files");
        assert_eq!(params.get("rest").map(String::as_str), Some("/"));
    }

    #[test]
    fn test_captures_duplicate_name_latest_wins() {
        let p = PathPattern::parse("/a/:x/b/:x").unwrap();
        let params = p.captures("/a/1/b/2");
        assert_eq!(params.get("x").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_literal_len_orders_specificity() {
        let long = PathPattern::parse("/api/v1/users").unwrap();
        let short = PathPattern::parse("/api").unwrap();
        assert!(long.literal_len() > short.literal_len());
    }
}
