//! Route compilation
//!
//! Turns the merged set of parsed definitions into a matcher: filter
//! and custom-predicate invocations are resolved against their
//! registries, built-in predicates are lifted into matcher-intrinsic
//! form, load-balancer groups are expanded into linked member routes,
//! post-processors run, and the result is sorted by specificity and
//! indexed.
//!
//! Compilation of a single route can fail; that route is excluded and
//! reported, and the rest of the generation is unaffected.

use crate::matcher::Matcher;
use crate::options::MatchingOptions;
use http::{HeaderName, Method};
use regex::Regex;
use std::cmp::Ordering;
use std::sync::Arc;
use wayline_core::definition::{Arg, Backend, Invocation, RouteDefinition};
use wayline_core::error::RouteFailure;
use wayline_core::registry::{FilterRegistry, PredicateRegistry};
use wayline_core::route::{PathPattern, Route, RouteFilter};

/// Name of the built-in exact path predicate.
pub const PATH_NAME: &str = "Path";

/// Name of the built-in path subtree predicate.
pub const PATH_SUBTREE_NAME: &str = "PathSubtree";

const HOST_NAME: &str = "Host";
const METHOD_NAME: &str = "Method";
const HEADER_NAME: &str = "Header";
const HEADER_REGEXP_NAME: &str = "HeaderRegexp";

/// Custom route transformer applied to the compiled-route vector after
/// load-balancer expansion and before the matcher is materialized.
///
/// Post-processors must be pure functions of their input and may not
/// retain route references across generations.
pub trait PostProcessor: Send + Sync {
    /// Transform the compiled routes of one generation.
    fn process(&self, routes: Vec<Route>) -> Vec<Route>;
}

/// Outcome of compiling one generation.
pub(crate) struct CompileResult {
    pub matcher: Matcher,
    /// Definitions that compiled successfully, in input order
    pub valid: Vec<RouteDefinition>,
    /// Per-route failures, excluded from the matcher
    pub invalid: Vec<(String, RouteFailure)>,
}

pub(crate) fn compile(
    defs: &[RouteDefinition],
    filters: &FilterRegistry,
    predicates: &PredicateRegistry,
    options: MatchingOptions,
    post_processors: &[Arc<dyn PostProcessor>],
) -> CompileResult {
    let mut compiled = Vec::new();
    let mut valid = Vec::new();
    let mut invalid = Vec::new();

    for def in defs {
        match compile_one(def, filters, predicates) {
            Ok(routes) => {
                compiled.extend(routes);
                valid.push(def.clone());
            }
            Err(failure) => invalid.push((def.id.clone(), failure)),
        }
    }

    for processor in post_processors {
        compiled = processor.process(compiled);
    }

    compiled.sort_by(specificity);
    let routes = compiled.into_iter().map(Arc::new).collect();

    CompileResult {
        matcher: Matcher::build(routes, options),
        valid,
        invalid,
    }
}

/// Compile one definition; a load-balanced backend expands into one
/// route per member endpoint.
fn compile_one(
    def: &RouteDefinition,
    filters: &FilterRegistry,
    predicates: &PredicateRegistry,
) -> Result<Vec<Route>, RouteFailure> {
    let route_filters = resolve_filters(def, filters)?;
    let constraints = resolve_predicates(def, predicates)?;

    let base = Route {
        id: def.id.clone(),
        definition: def.clone(),
        path: constraints.path,
        path_subtree: constraints.path_subtree,
        host: constraints.host,
        method: constraints.method,
        headers: constraints.headers,
        header_regexps: constraints.header_regexps,
        predicates: constraints.custom,
        filters: route_filters,
        scheme: String::new(),
        host_addr: String::new(),
        group: None,
        lb_index: 0,
        is_load_balanced: false,
    };

    match &def.backend {
        Backend::Network { scheme, host } => Ok(vec![Route {
            scheme: scheme.clone(),
            host_addr: host.clone(),
            ..base
        }]),
        Backend::Shunt | Backend::Loopback | Backend::Dynamic => Ok(vec![base]),
        Backend::LoadBalanced { endpoints } => {
            if endpoints.is_empty() {
                return Err(RouteFailure::EmptyLoadBalancerGroup);
            }
            Ok(endpoints
                .iter()
                .enumerate()
                .map(|(i, ep)| Route {
                    id: format!("{}__{}", def.id, i),
                    scheme: ep.scheme.clone(),
                    host_addr: ep.host.clone(),
                    group: Some(def.id.clone()),
                    lb_index: i,
                    is_load_balanced: true,
                    ..base.clone()
                })
                .collect())
        }
    }
}

fn resolve_filters(
    def: &RouteDefinition,
    registry: &FilterRegistry,
) -> Result<Vec<RouteFilter>, RouteFailure> {
    let mut resolved = Vec::with_capacity(def.filters.len());
    for (index, invocation) in def.filters.iter().enumerate() {
        let spec = registry
            .get(&invocation.name)
            .ok_or_else(|| RouteFailure::UnknownFilter {
                name: invocation.name.clone(),
            })?;
        let filter =
            spec.create(&invocation.args)
                .map_err(|source| RouteFailure::FilterCreate {
                    name: invocation.name.clone(),
                    source,
                })?;
        resolved.push(RouteFilter {
            name: invocation.name.clone(),
            index,
            filter,
        });
    }
    Ok(resolved)
}

#[derive(Default)]
struct Constraints {
    path: Option<PathPattern>,
    path_subtree: Option<String>,
    host: Option<Regex>,
    method: Option<Method>,
    headers: Vec<(HeaderName, String)>,
    header_regexps: Vec<(HeaderName, Regex)>,
    custom: Vec<Arc<dyn wayline_core::registry::Predicate>>,
}

/// Lift built-in predicates into intrinsic constraint fields and
/// resolve the rest against the custom predicate registry.
fn resolve_predicates(
    def: &RouteDefinition,
    registry: &PredicateRegistry,
) -> Result<Constraints, RouteFailure> {
    let mut c = Constraints::default();

    for invocation in &def.predicates {
        match invocation.name.as_str() {
            PATH_NAME => {
                if c.path.is_some() || c.path_subtree.is_some() {
                    return Err(RouteFailure::ConflictingPaths);
                }
                let pattern = single_string(invocation)?;
                c.path = Some(PathPattern::parse(pattern)?);
            }
            PATH_SUBTREE_NAME => {
                if c.path.is_some() || c.path_subtree.is_some() {
                    return Err(RouteFailure::ConflictingPaths);
                }
                let prefix = single_string(invocation)?;
                if !prefix.starts_with('/') {
                    return Err(RouteFailure::malformed_path(prefix, "must start with '/'"));
                }
                c.path_subtree = Some(normalize_prefix(prefix));
            }
            HOST_NAME => {
                if c.host.is_some() {
                    return Err(RouteFailure::DuplicatePredicate { name: "Host" });
                }
                let pattern = single_string(invocation)?;
                c.host = Some(Regex::new(pattern).map_err(|source| {
                    RouteFailure::InvalidHostPattern {
                        pattern: pattern.to_string(),
                        source,
                    }
                })?);
            }
            METHOD_NAME => {
                if c.method.is_some() {
                    return Err(RouteFailure::DuplicatePredicate { name: "Method" });
                }
                let method = single_string(invocation)?;
                c.method = Some(
                    Method::from_bytes(method.to_uppercase().as_bytes()).map_err(|_| {
                        RouteFailure::InvalidMethod {
                            method: method.to_string(),
                        }
                    })?,
                );
            }
            HEADER_NAME => {
                let (name, value) = string_pair(invocation)?;
                c.headers.push((header_name(name)?, value.to_string()));
            }
            HEADER_REGEXP_NAME => {
                let (name, pattern) = string_pair(invocation)?;
                let regex =
                    Regex::new(pattern).map_err(|source| RouteFailure::InvalidHeaderPattern {
                        pattern: pattern.to_string(),
                        source,
                    })?;
                c.header_regexps.push((header_name(name)?, regex));
            }
            name => {
                let spec =
                    registry
                        .get(name)
                        .ok_or_else(|| RouteFailure::UnknownPredicate {
                            name: name.to_string(),
                        })?;
                let predicate = spec.create(&invocation.args).map_err(|source| {
                    RouteFailure::PredicateCreate {
                        name: name.to_string(),
                        source,
                    }
                })?;
                c.custom.push(predicate);
            }
        }
    }

    Ok(c)
}

fn single_string(invocation: &Invocation) -> Result<&str, RouteFailure> {
    match invocation.args.as_slice() {
        [Arg::String(s)] => Ok(s),
        _ => Err(RouteFailure::PredicateCreate {
            name: invocation.name.clone(),
            source: wayline_core::error::CreateError::invalid_args(
                "expected a single string argument",
            ),
        }),
    }
}

fn string_pair(invocation: &Invocation) -> Result<(&str, &str), RouteFailure> {
    match invocation.args.as_slice() {
        [Arg::String(a), Arg::String(b)] => Ok((a, b)),
        _ => Err(RouteFailure::PredicateCreate {
            name: invocation.name.clone(),
            source: wayline_core::error::CreateError::invalid_args(
                "expected two string arguments",
            ),
        }),
    }
}

fn header_name(name: &str) -> Result<HeaderName, RouteFailure> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|_| RouteFailure::InvalidHeaderName {
        name: name.to_string(),
    })
}

/// Strip one trailing slash from a subtree prefix; the root prefix
/// stays `/`.
fn normalize_prefix(prefix: &str) -> String {
    if prefix.len() > 1 {
        prefix.strip_suffix('/').unwrap_or(prefix).to_string()
    } else {
        prefix.to_string()
    }
}

/// Compile-time specificity order: exact path before subtree before
/// unconstrained, longer path literal before shorter, more predicates
/// before fewer, then identifier.
fn specificity(a: &Route, b: &Route) -> Ordering {
    path_rank(a)
        .cmp(&path_rank(b))
        .then_with(|| path_literal_len(b).cmp(&path_literal_len(a)))
        .then_with(|| b.predicate_count().cmp(&a.predicate_count()))
        .then_with(|| a.id.cmp(&b.id))
}

fn path_rank(route: &Route) -> u8 {
    if route.path.is_some() {
        0
    } else if route.path_subtree.is_some() {
        1
    } else {
        2
    }
}

fn path_literal_len(route: &Route) -> usize {
    if let Some(pattern) = &route.path {
        pattern.literal_len()
    } else if let Some(prefix) = &route.path_subtree {
        prefix.len()
    } else {
        0
    }
}
