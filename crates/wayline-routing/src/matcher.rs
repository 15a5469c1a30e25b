//! Per-request route lookup
//!
//! A matcher is an immutable index over one generation of compiled
//! routes. Lookups never block, never perform I/O, and allocate only
//! the returned parameter map. Candidates are kept in compile-time
//! specificity order, so evaluating them front to back makes the
//! winner deterministic.

use crate::options::MatchingOptions;
use crate::trie::PathTrie;
use std::collections::HashMap;
use std::sync::Arc;
use wayline_core::registry::LookupRequest;
use wayline_core::route::{PathParams, Route, TAIL_PARAM};

/// Immutable request-matching index over a set of compiled routes.
pub struct Matcher {
    options: MatchingOptions,
    /// Compiled routes in specificity order; all index vectors below
    /// refer to slots in this arena
    routes: Vec<Arc<Route>>,
    /// Wildcard-free exact paths, keyed by normalized literal
    exact: HashMap<String, Vec<usize>>,
    /// Subtree prefixes and wildcard patterns
    trie: PathTrie,
    /// Routes with no path constraint
    fallback: Vec<usize>,
    /// Load-balancer group members in declaration order
    groups: HashMap<String, Vec<Arc<Route>>>,
}

impl Matcher {
    /// An empty matcher; matches nothing.
    pub fn empty(options: MatchingOptions) -> Self {
        Self::build(Vec::new(), options)
    }

    /// Index a specificity-sorted vector of compiled routes.
    pub(crate) fn build(routes: Vec<Arc<Route>>, options: MatchingOptions) -> Self {
        let mut exact: HashMap<String, Vec<usize>> = HashMap::new();
        let mut trie = PathTrie::new();
        let mut fallback = Vec::new();
        let mut group_slots: HashMap<String, Vec<usize>> = HashMap::new();

        for (slot, route) in routes.iter().enumerate() {
            if let Some(pattern) = &route.path {
                if pattern.is_literal() {
                    let key = normalize(&pattern.literal(), options).to_string();
                    exact.entry(key).or_default().push(slot);
                } else {
                    trie.insert_pattern(pattern.segments(), slot);
                }
            } else if let Some(prefix) = &route.path_subtree {
                let segments: Vec<&str> =
                    prefix.split('/').filter(|s| !s.is_empty()).collect();
                trie.insert_subtree(&segments, slot);
            } else {
                fallback.push(slot);
            }

            if let Some(group) = &route.group {
                group_slots.entry(group.clone()).or_default().push(slot);
            }
        }

        let groups = group_slots
            .into_iter()
            .map(|(group, slots)| {
                let mut members: Vec<Arc<Route>> =
                    slots.into_iter().map(|s| Arc::clone(&routes[s])).collect();
                members.sort_by_key(|r| r.lb_index);
                (group, members)
            })
            .collect();

        Self {
            options,
            routes,
            exact,
            trie,
            fallback,
            groups,
        }
    }

    /// Number of compiled routes in the index.
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Match a request. Returns the winning route and the wildcard
    /// captures of its path predicate, or `None` if no route matches.
    pub fn lookup(&self, req: &LookupRequest<'_>) -> Option<(Arc<Route>, PathParams)> {
        let path = normalize(req.path, self.options);

        if let Some(candidates) = self.exact.get(path) {
            return self.eval(candidates.iter().copied(), req, path);
        }

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let walk = self.trie.walk(&segments);
        if !walk.is_empty() {
            let candidates = walk
                .exact
                .iter()
                .chain(walk.tail)
                .chain(walk.subtree)
                .copied();
            return self.eval(candidates, req, path);
        }

        self.eval(self.fallback.iter().copied(), req, path)
    }

    fn eval<I>(&self, candidates: I, req: &LookupRequest<'_>, path: &str) -> Option<(Arc<Route>, PathParams)>
    where
        I: IntoIterator<Item = usize>,
    {
        for slot in candidates {
            let route = &self.routes[slot];
            if self.accepts(route, req) {
                return Some((Arc::clone(route), captures(route, path)));
            }
        }
        None
    }

    /// Evaluate the non-path constraints of a route in fixed order,
    /// short-circuiting on the first failure.
    fn accepts(&self, route: &Route, req: &LookupRequest<'_>) -> bool {
        if let Some(method) = &route.method {
            if method != req.method {
                return false;
            }
        }

        if let Some(host) = &route.host {
            if !host.is_match(req.host) {
                return false;
            }
        }

        for (name, value) in &route.headers {
            let matched = req
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v == value)
                .unwrap_or(false);
            if !matched {
                return false;
            }
        }

        for (name, pattern) in &route.header_regexps {
            let matched = req
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| pattern.is_match(v))
                .unwrap_or(false);
            if !matched {
                return false;
            }
        }

        route.predicates.iter().all(|p| p.matches(req))
    }

    /// Members of a load-balancer group, head first.
    pub fn lb_members(&self, group: &str) -> Option<&[Arc<Route>]> {
        self.groups.get(group).map(Vec::as_slice)
    }

    /// Head of the group the route belongs to.
    pub fn lb_head(&self, route: &Route) -> Option<Arc<Route>> {
        let members = self.groups.get(route.group.as_deref()?)?;
        members.first().cloned()
    }

    /// The next member after `route` in its group, wrapping at the
    /// end, so repeated calls traverse the whole group cyclically.
    pub fn lb_next(&self, route: &Route) -> Option<Arc<Route>> {
        let members = self.groups.get(route.group.as_deref()?)?;
        if members.is_empty() {
            return None;
        }
        Some(Arc::clone(&members[(route.lb_index + 1) % members.len()]))
    }
}

/// Strip one trailing slash when the options ask for it; the root path
/// is left untouched.
fn normalize(path: &str, options: MatchingOptions) -> &str {
    if options.ignore_trailing_slash() && path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

/// Wildcard captures of the winning route's path predicate.
fn captures(route: &Route, path: &str) -> PathParams {
    if let Some(pattern) = &route.path {
        return pattern.captures(path);
    }

    if let Some(prefix) = &route.path_subtree {
        let rest = if prefix == "/" {
            path
        } else {
            &path[prefix.len().min(path.len())..]
        };
        let rest = if rest.is_empty() { "/" } else { rest };
        let mut params = PathParams::new();
        params.insert(TAIL_PARAM.to_string(), rest.to_string());
        return params;
    }

    PathParams::new()
}
