//! # Wayline Routing
//!
//! Live-updatable request matching for an HTTP reverse proxy: data
//! sources feed route definitions, a background task aggregates and
//! compiles them, and lookups run lock-free against immutable
//! generations of the routing table.
//!
//! # Architecture
//!
//! ```text
//!   ┌──────────────┐   ┌──────────────┐
//!   │ data client 0│   │ data client 1│   ...
//!   └──────┬───────┘   └──────┬───────┘
//!          │ load_all /       │
//!          │ load_update      │
//!          ▼                  ▼
//!   ┌─────────────────────────────────┐
//!   │  Aggregator (one tokio task)    │
//!   │  - per-source partitions        │
//!   │  - conflict resolution          │
//!   │  - change coalescing            │
//!   └───────────────┬─────────────────┘
//!                   │ merged definitions
//!                   ▼
//!   ┌─────────────────────────────────┐
//!   │  Compiler                       │
//!   │  - registries, built-ins        │
//!   │  - load-balancer expansion      │
//!   │  - post-processors, sorting     │
//!   └───────────────┬─────────────────┘
//!                   │ immutable RouteTable
//!                   ▼
//!   ┌─────────────────────────────────┐      lookups (any task)
//!   │  Publisher (ArcSwap cell)       │◄──── Routing::route
//!   └─────────────────────────────────┘◄──── RouteLookup (pinned)
//! ```
//!
//! Lookups never block and observe exactly one generation; a
//! [`RouteLookup`] handle pins a generation across many lookups.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wayline_core::definition::{Backend, RouteDefinition};
//! use wayline_routing::{Options, Routing, StaticDataClient};
//!
//! # async fn example() {
//! let routes = vec![
//!     RouteDefinition::new("hello", Backend::network("http", "hello.svc:8080"))
//!         .with_predicate("Path", ["/hello/:name"]),
//! ];
//!
//! let routing = Routing::new(Options {
//!     data_clients: vec![Arc::new(StaticDataClient::new(routes))],
//!     ..Options::default()
//! });
//! # let _ = routing;
//! # }
//! ```

mod aggregator;
pub mod compiler;
pub mod datasource;
pub mod matcher;
pub mod metrics;
pub mod options;
pub mod publisher;
mod trie;

pub use compiler::{PostProcessor, PATH_NAME, PATH_SUBTREE_NAME};
pub use datasource::{DataClient, FileDataClient, RouteUpdate, StaticDataClient};
pub use matcher::Matcher;
pub use metrics::RoutingMetrics;
pub use options::{MatchingOptions, Options};
pub use publisher::{RouteLookup, RouteTable};

use crate::aggregator::Aggregator;
use crate::publisher::Publisher;
use std::sync::Arc;
use tokio::sync::watch;
use wayline_core::registry::LookupRequest;
use wayline_core::route::{PathParams, Route};

/// A routing instance: starts the update task on construction and
/// answers per-request lookups against the current generation.
///
/// Must be created within a tokio runtime. Dropping the instance (or
/// calling [`close`](Self::close)) stops the update task; lookups in
/// flight run to completion against the generation they loaded.
pub struct Routing {
    publisher: Arc<Publisher>,
    metrics: Arc<RoutingMetrics>,
    shutdown: watch::Sender<bool>,
}

impl Routing {
    /// Initialize a routing instance and start listening for route
    /// definition updates.
    pub fn new(options: Options) -> Self {
        let metrics = Arc::new(RoutingMetrics::new());
        let publisher = Arc::new(Publisher::new(RouteTable::empty(options.matching_options)));
        let (shutdown, shutdown_rx) = watch::channel(false);

        let aggregator = Aggregator::new(options, Arc::clone(&metrics));
        tokio::spawn(aggregator.run(Arc::clone(&publisher), shutdown_rx));

        Self {
            publisher,
            metrics,
            shutdown,
        }
    }

    /// Match a request in the current routing table.
    ///
    /// Returns the winning route and the wildcard captures of its path
    /// predicate, or `None` if no route matches.
    pub fn route(&self, req: &LookupRequest<'_>) -> Option<(Arc<Route>, PathParams)> {
        self.publisher.current().lookup(req)
    }

    /// The current generation, for introspection.
    pub fn current(&self) -> Arc<RouteTable> {
        self.publisher.current()
    }

    /// Capture the current generation for repeated lookups.
    ///
    /// The handle sees a single generation regardless of intervening
    /// updates and keeps that generation alive until dropped.
    pub fn pinned(&self) -> RouteLookup {
        RouteLookup::new(self.publisher.current())
    }

    /// Update-pipeline metrics.
    pub fn metrics(&self) -> Arc<RoutingMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Stop receiving route updates. The update task finishes its
    /// current source round and exits without publishing it. Dropping
    /// the instance has the same effect.
    pub fn close(&self) {
        let _ = self.shutdown.send(true);
    }
}
