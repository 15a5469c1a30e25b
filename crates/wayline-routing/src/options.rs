//! Routing options
//!
//! Configuration for a [`Routing`](crate::Routing) instance. The data
//! client order matters: it defines conflict-resolution priority when
//! two sources emit the same route identifier.

use crate::compiler::PostProcessor;
use crate::datasource::DataClient;
use std::ops::BitOr;
use std::sync::Arc;
use std::time::Duration;
use wayline_core::registry::{FilterRegistry, PredicateSpec};

/// Flags controlling route matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchingOptions(u32);

impl MatchingOptions {
    /// All options at their defaults.
    pub const NONE: MatchingOptions = MatchingOptions(0);

    /// Trailing slashes in request and route paths are ignored.
    pub const IGNORE_TRAILING_SLASH: MatchingOptions = MatchingOptions(1);

    /// Whether all flags in `other` are set.
    pub fn contains(self, other: MatchingOptions) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether trailing slashes are ignored.
    pub fn ignore_trailing_slash(self) -> bool {
        self.contains(Self::IGNORE_TRAILING_SLASH)
    }
}

impl BitOr for MatchingOptions {
    type Output = MatchingOptions;

    fn bitor(self, rhs: Self) -> Self {
        MatchingOptions(self.0 | rhs.0)
    }
}

/// Options for initializing a routing instance.
pub struct Options {
    /// Registry of the available filter specs used while processing
    /// the filter chains of the route definitions.
    pub filter_registry: FilterRegistry,

    /// Flags controlling route matching.
    pub matching_options: MatchingOptions,

    /// Interval between update polls of the data clients. Zero
    /// disables periodic polling; only the initial load runs.
    pub poll_timeout: Duration,

    /// Data sources for route definitions, in priority order.
    pub data_clients: Vec<Arc<dyn DataClient>>,

    /// Specs of custom, user defined predicates.
    pub predicates: Vec<Arc<dyn PredicateSpec>>,

    /// Route transformers applied after compilation, in order.
    pub post_processors: Vec<Arc<dyn PostProcessor>>,

    /// Reserved for future batching of publications; treated as 0.
    pub update_buffer: usize,

    /// Log only summary counts of route changes.
    pub suppress_logs: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            filter_registry: FilterRegistry::new(),
            matching_options: MatchingOptions::NONE,
            poll_timeout: Duration::from_secs(3),
            data_clients: Vec::new(),
            predicates: Vec::new(),
            post_processors: Vec::new(),
            update_buffer: 0,
            suppress_logs: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_options_flags() {
        let opts = MatchingOptions::NONE;
        assert!(!opts.ignore_trailing_slash());

        let opts = opts | MatchingOptions::IGNORE_TRAILING_SLASH;
        assert!(opts.ignore_trailing_slash());
        assert!(opts.contains(MatchingOptions::IGNORE_TRAILING_SLASH));
    }
}
