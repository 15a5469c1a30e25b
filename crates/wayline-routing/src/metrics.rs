//! Update-pipeline metrics
//!
//! Counters are exported through the `metrics` facade and mirrored in
//! atomics so tests and embedders can read them without an exporter.

use metrics::{counter, describe_counter, describe_gauge, gauge};
use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics of the routing update pipeline.
#[derive(Debug)]
pub struct RoutingMetrics {
    generations_published: AtomicU64,
    routes_valid: AtomicU64,
    routes_invalid: AtomicU64,
    source_errors: AtomicU64,
    id_conflicts: AtomicU64,
}

impl RoutingMetrics {
    pub fn new() -> Self {
        describe_counter!(
            "wayline_generations_published_total",
            "Total route table generations published"
        );
        describe_gauge!(
            "wayline_routes_valid",
            "Valid routes in the current generation"
        );
        describe_gauge!(
            "wayline_routes_invalid",
            "Routes excluded from the current generation"
        );
        describe_counter!(
            "wayline_source_errors_total",
            "Failed data source calls"
        );
        describe_counter!(
            "wayline_id_conflicts_total",
            "Route ids dropped due to cross-source conflicts"
        );

        Self {
            generations_published: AtomicU64::new(0),
            routes_valid: AtomicU64::new(0),
            routes_invalid: AtomicU64::new(0),
            source_errors: AtomicU64::new(0),
            id_conflicts: AtomicU64::new(0),
        }
    }

    pub fn record_generation(&self, valid: usize, invalid: usize) {
        self.generations_published.fetch_add(1, Ordering::Relaxed);
        self.routes_valid.store(valid as u64, Ordering::Relaxed);
        self.routes_invalid.store(invalid as u64, Ordering::Relaxed);
        counter!("wayline_generations_published_total").increment(1);
        gauge!("wayline_routes_valid").set(valid as f64);
        gauge!("wayline_routes_invalid").set(invalid as f64);
    }

    pub fn record_source_error(&self) {
        self.source_errors.fetch_add(1, Ordering::Relaxed);
        counter!("wayline_source_errors_total").increment(1);
    }

    pub fn record_id_conflict(&self) {
        self.id_conflicts.fetch_add(1, Ordering::Relaxed);
        counter!("wayline_id_conflicts_total").increment(1);
    }

    pub fn generations_published(&self) -> u64 {
        self.generations_published.load(Ordering::Relaxed)
    }

    pub fn routes_valid(&self) -> u64 {
        self.routes_valid.load(Ordering::Relaxed)
    }

    pub fn routes_invalid(&self) -> u64 {
        self.routes_invalid.load(Ordering::Relaxed)
    }

    pub fn source_errors(&self) -> u64 {
        self.source_errors.load(Ordering::Relaxed)
    }

    pub fn id_conflicts(&self) -> u64 {
        self.id_conflicts.load(Ordering::Relaxed)
    }
}

impl Default for RoutingMetrics {
    fn default() -> Self {
        Self::new()
    }
}
