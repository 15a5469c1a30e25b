//! Generation publication
//!
//! The route table of a generation is immutable; the only shared
//! mutable state in the whole pipeline is the atomic cell holding the
//! current table. The aggregator task stores new generations, readers
//! load the pointer without locking, and pinned handles keep a chosen
//! generation alive until dropped.

use crate::matcher::Matcher;
use crate::options::MatchingOptions;
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use wayline_core::definition::RouteDefinition;
use wayline_core::registry::LookupRequest;
use wayline_core::route::{PathParams, Route};

/// One published generation: the matcher, its creation instant and the
/// definitions that compiled into it.
pub struct RouteTable {
    matcher: Matcher,
    created: DateTime<Utc>,
    generation: u64,
    valid_routes: Vec<RouteDefinition>,
}

impl RouteTable {
    pub(crate) fn new(
        matcher: Matcher,
        valid_routes: Vec<RouteDefinition>,
        generation: u64,
    ) -> Self {
        Self {
            matcher,
            created: Utc::now(),
            generation,
            valid_routes,
        }
    }

    /// The empty generation a routing instance starts with.
    pub(crate) fn empty(options: MatchingOptions) -> Self {
        Self::new(Matcher::empty(options), Vec::new(), 0)
    }

    /// The request-matching index of this generation.
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Creation instant, UTC.
    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    /// Strictly increasing generation number; orders publications.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The valid route definitions of this generation, for
    /// introspection.
    pub fn valid_routes(&self) -> &[RouteDefinition] {
        &self.valid_routes
    }

    /// Match a request against this generation.
    pub fn lookup(&self, req: &LookupRequest<'_>) -> Option<(Arc<Route>, PathParams)> {
        self.matcher.lookup(req)
    }
}

/// The atomically readable cell holding the current generation.
pub(crate) struct Publisher {
    cell: ArcSwap<RouteTable>,
}

impl Publisher {
    pub fn new(initial: RouteTable) -> Self {
        Self {
            cell: ArcSwap::from_pointee(initial),
        }
    }

    /// Store a new generation. Readers that already loaded the old
    /// pointer keep it alive until they drop it.
    pub fn publish(&self, table: RouteTable) {
        self.cell.store(Arc::new(table));
    }

    /// The current generation.
    pub fn current(&self) -> Arc<RouteTable> {
        self.cell.load_full()
    }
}

/// A captured generation of the lookup table, allowing many lookups
/// against the same version regardless of concurrent publications.
///
/// The handle keeps its generation alive; long-held handles under
/// rapid updates retain one table per overlapping generation, so
/// callers should hold them only for the span of a logical operation.
pub struct RouteLookup {
    table: Arc<RouteTable>,
}

impl RouteLookup {
    pub(crate) fn new(table: Arc<RouteTable>) -> Self {
        Self { table }
    }

    /// Match a request against the pinned generation. Equivalent to
    /// [`Routing::route`](crate::Routing::route) evaluated at pin time.
    pub fn lookup(&self, req: &LookupRequest<'_>) -> Option<(Arc<Route>, PathParams)> {
        self.table.lookup(req)
    }

    /// The pinned generation.
    pub fn table(&self) -> &RouteTable {
        &self.table
    }
}
