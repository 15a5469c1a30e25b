//! Route aggregation
//!
//! A single background task owns the canonical route set: it loads
//! every data source once at startup, then polls each source for
//! incremental updates on a configurable interval, merges the
//! per-source partitions, and hands changed sets to the compiler for
//! publication.
//!
//! Sources fail independently. A transient failure is retried on the
//! next tick and defers publication; a fatal failure disables the
//! source while the others keep serving. Identifier collisions across
//! sources are resolved in favor of the earliest-declared source.

use crate::compiler::{self, PostProcessor};
use crate::datasource::DataClient;
use crate::metrics::RoutingMetrics;
use crate::options::{MatchingOptions, Options};
use crate::publisher::{Publisher, RouteTable};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use wayline_core::definition::RouteDefinition;
use wayline_core::registry::{FilterRegistry, PredicateRegistry};

/// Retry interval for initial loads when periodic polling is disabled.
const INITIAL_RETRY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourcePhase {
    /// Initial load has not succeeded yet
    Pending,
    /// Initial load done; polled for updates
    Ready,
    /// Fatally failed; never called again
    Disabled,
}

struct SourceState {
    client: Arc<dyn DataClient>,
    phase: SourcePhase,
    partition: HashMap<String, RouteDefinition>,
}

/// Outcome of one polling round over all sources.
struct Round {
    /// Any partition changed
    changed: bool,
    /// No ready source failed transiently; publication may proceed
    clean: bool,
}

pub(crate) struct Aggregator {
    sources: Vec<SourceState>,
    poll_timeout: Duration,
    suppress_logs: bool,
    filters: FilterRegistry,
    predicates: PredicateRegistry,
    matching: MatchingOptions,
    post_processors: Vec<Arc<dyn PostProcessor>>,
    metrics: Arc<RoutingMetrics>,
    next_generation: u64,
    /// Changes applied but not yet published, e.g. because another
    /// source failed transiently in the same round
    dirty: bool,
}

impl Aggregator {
    pub fn new(options: Options, metrics: Arc<RoutingMetrics>) -> Self {
        let sources = options
            .data_clients
            .into_iter()
            .map(|client| SourceState {
                client,
                phase: SourcePhase::Pending,
                partition: HashMap::new(),
            })
            .collect();

        Self {
            sources,
            poll_timeout: options.poll_timeout,
            suppress_logs: options.suppress_logs,
            filters: options.filter_registry,
            predicates: PredicateRegistry::from_specs(options.predicates),
            matching: options.matching_options,
            post_processors: options.post_processors,
            metrics,
            next_generation: 0,
            dirty: false,
        }
    }

    /// The update task. Runs until the shutdown flag flips or the
    /// sender is dropped; a round in progress always completes, so a
    /// partial generation is never published.
    pub async fn run(mut self, publisher: Arc<Publisher>, mut shutdown: watch::Receiver<bool>) {
        info!(sources = self.sources.len(), "routing update task started");

        let round = self.round().await;
        self.apply(round, &publisher);

        loop {
            let has_pending = self
                .sources
                .iter()
                .any(|s| s.phase == SourcePhase::Pending);

            // with polling disabled, keep retrying only while initial
            // loads are outstanding
            let interval = if !self.poll_timeout.is_zero() {
                self.poll_timeout
            } else if has_pending {
                INITIAL_RETRY
            } else {
                let _ = shutdown.changed().await;
                break;
            };

            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(interval) => {
                    let round = self.round().await;
                    self.apply(round, &publisher);
                }
            }
        }

        info!("routing update task stopped");
    }

    /// Publish pending changes once a round completed without
    /// transient failures. Changes survive deferred rounds.
    fn apply(&mut self, round: Round, publisher: &Publisher) {
        self.dirty |= round.changed;
        if self.dirty && round.clean {
            self.publish(publisher);
            self.dirty = false;
        }
    }

    /// Poll every source once, in declaration order.
    async fn round(&mut self) -> Round {
        let mut round = Round {
            changed: false,
            clean: true,
        };

        for (index, source) in self.sources.iter_mut().enumerate() {
            match source.phase {
                SourcePhase::Disabled => {}
                SourcePhase::Pending => match source.client.load_all().await {
                    Ok(routes) => {
                        info!(source = index, count = routes.len(), "initial route set loaded");
                        source.partition =
                            routes.into_iter().map(|r| (r.id.clone(), r)).collect();
                        source.phase = SourcePhase::Ready;
                        round.changed = true;
                    }
                    Err(err) if err.is_fatal() => {
                        error!(source = index, error = %err, "data source disabled");
                        source.phase = SourcePhase::Disabled;
                    }
                    Err(err) => {
                        warn!(source = index, error = %err, "initial route load failed, will retry");
                        self.metrics.record_source_error();
                    }
                },
                SourcePhase::Ready => match source.client.load_update().await {
                    Ok(update) => {
                        if update.is_empty() {
                            continue;
                        }
                        round.changed = true;
                        if self.suppress_logs {
                            info!(
                                source = index,
                                upserts = update.upserts.len(),
                                deletes = update.deleted_ids.len(),
                                "route update received"
                            );
                        }
                        for def in update.upserts {
                            if !self.suppress_logs {
                                info!(source = index, id = %def.id, "route upserted");
                            }
                            source.partition.insert(def.id.clone(), def);
                        }
                        for id in update.deleted_ids {
                            if !self.suppress_logs {
                                info!(source = index, id = %id, "route deleted");
                            }
                            source.partition.remove(&id);
                        }
                    }
                    Err(err) if err.is_fatal() => {
                        // keep serving the source's last known routes
                        error!(source = index, error = %err, "data source disabled");
                        source.phase = SourcePhase::Disabled;
                    }
                    Err(err) => {
                        warn!(source = index, error = %err, "route update failed, will retry");
                        self.metrics.record_source_error();
                        round.clean = false;
                    }
                },
            }
        }

        round
    }

    /// Merge the per-source partitions into one canonical set. The
    /// earliest-declared source wins identifier conflicts.
    fn merge(&self) -> Vec<RouteDefinition> {
        let mut seen: HashMap<&str, usize> = HashMap::new();
        let mut merged: Vec<RouteDefinition> = Vec::new();

        for (index, source) in self.sources.iter().enumerate() {
            for (id, def) in &source.partition {
                if let Some(&kept) = seen.get(id.as_str()) {
                    warn!(
                        id = %id,
                        kept_source = kept,
                        dropped_source = index,
                        "conflicting route id across data sources"
                    );
                    self.metrics.record_id_conflict();
                    continue;
                }
                seen.insert(id.as_str(), index);
                merged.push(def.clone());
            }
        }

        merged.sort_by(|a, b| a.id.cmp(&b.id));
        merged
    }

    fn publish(&mut self, publisher: &Publisher) {
        let merged = self.merge();
        let result = compiler::compile(
            &merged,
            &self.filters,
            &self.predicates,
            self.matching,
            &self.post_processors,
        );

        for (id, failure) in &result.invalid {
            warn!(id = %id, error = %failure, "route failed to compile, excluded");
        }

        let valid = result.valid.len();
        let invalid = result.invalid.len();
        self.next_generation += 1;
        self.metrics.record_generation(valid, invalid);

        let table = RouteTable::new(result.matcher, result.valid, self.next_generation);
        let generation = table.generation();
        publisher.publish(table);

        info!(generation, valid, invalid, "route settings applied");
        debug!(
            sources = self.sources.len(),
            merged = merged.len(),
            "generation published"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::{RouteUpdate, StaticDataClient};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use wayline_core::definition::Backend;
    use wayline_core::error::DataClientError;

    fn options_with(clients: Vec<Arc<dyn DataClient>>) -> Options {
        Options {
            data_clients: clients,
            ..Options::default()
        }
    }

    fn aggregator_with(clients: Vec<Arc<dyn DataClient>>) -> Aggregator {
        Aggregator::new(options_with(clients), Arc::new(RoutingMetrics::new()))
    }

    fn shunt(id: &str) -> RouteDefinition {
        RouteDefinition::new(id, Backend::Shunt).with_predicate("Path", [format!("/{}", id)])
    }

    struct FailingClient;

    #[async_trait]
    impl DataClient for FailingClient {
        async fn load_all(&self) -> Result<Vec<RouteDefinition>, DataClientError> {
            Err(DataClientError::fatal("bad payload"))
        }

        async fn load_update(&self) -> Result<RouteUpdate, DataClientError> {
            Err(DataClientError::transient("unreachable"))
        }
    }

    #[tokio::test]
    async fn test_initial_round_loads_all_sources() {
        let mut agg = aggregator_with(vec![
            Arc::new(StaticDataClient::new(vec![shunt("a")])),
            Arc::new(StaticDataClient::new(vec![shunt("b")])),
        ]);

        let round = agg.round().await;
        assert!(round.changed);
        assert!(round.clean);

        let merged = agg.merge();
        let ids: Vec<&str> = merged.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_conflict_earliest_source_wins() {
        let from_first = RouteDefinition::new("dup", Backend::Shunt).with_predicate("Path", ["/first"]);
        let from_second =
            RouteDefinition::new("dup", Backend::Loopback).with_predicate("Path", ["/second"]);

        let mut agg = aggregator_with(vec![
            Arc::new(StaticDataClient::new(vec![from_first.clone()])),
            Arc::new(StaticDataClient::new(vec![from_second])),
        ]);
        agg.round().await;

        let merged = agg.merge();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0], from_first);
        assert_eq!(agg.metrics.id_conflicts(), 1);
    }

    #[tokio::test]
    async fn test_fatal_source_is_disabled_others_serve() {
        let mut agg = aggregator_with(vec![
            Arc::new(FailingClient),
            Arc::new(StaticDataClient::new(vec![shunt("ok")])),
        ]);

        let round = agg.round().await;
        assert!(round.changed);
        assert_eq!(agg.sources[0].phase, SourcePhase::Disabled);
        assert_eq!(agg.merge().len(), 1);

        // disabled sources are not called again
        let round = agg.round().await;
        assert!(!round.changed);
    }

    struct OneShotUpdateClient {
        update: Mutex<Option<RouteUpdate>>,
    }

    #[async_trait]
    impl DataClient for OneShotUpdateClient {
        async fn load_all(&self) -> Result<Vec<RouteDefinition>, DataClientError> {
            Ok(Vec::new())
        }

        async fn load_update(&self) -> Result<RouteUpdate, DataClientError> {
            Ok(self.update.lock().unwrap().take().unwrap_or_default())
        }
    }

    /// Fails `load_update` a fixed number of times, then recovers.
    struct FlakyClient {
        failures_left: Mutex<u32>,
    }

    #[async_trait]
    impl DataClient for FlakyClient {
        async fn load_all(&self) -> Result<Vec<RouteDefinition>, DataClientError> {
            Ok(Vec::new())
        }

        async fn load_update(&self) -> Result<RouteUpdate, DataClientError> {
            let mut left = self.failures_left.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(DataClientError::transient("flaky"));
            }
            Ok(RouteUpdate::default())
        }
    }

    #[tokio::test]
    async fn test_transient_failure_defers_publication() {
        let updater = Arc::new(OneShotUpdateClient {
            update: Mutex::new(Some(RouteUpdate {
                upserts: vec![shunt("late")],
                deleted_ids: Vec::new(),
            })),
        });
        let flaky = Arc::new(FlakyClient {
            failures_left: Mutex::new(1),
        });

        let mut agg = aggregator_with(vec![
            updater as Arc<dyn DataClient>,
            flaky as Arc<dyn DataClient>,
        ]);
        let publisher = Publisher::new(RouteTable::empty(MatchingOptions::NONE));

        // initial loads succeed and publish the (empty) first set
        let round = agg.round().await;
        agg.apply(round, &publisher);
        assert_eq!(publisher.current().generation(), 1);

        // the upsert arrives in the same round as the transient
        // failure: the change is retained but not published
        let round = agg.round().await;
        agg.apply(round, &publisher);
        assert_eq!(publisher.current().generation(), 1);
        assert!(agg.dirty);

        // the next clean round publishes the pending change, even
        // though its own deltas are empty
        let round = agg.round().await;
        agg.apply(round, &publisher);
        assert_eq!(publisher.current().generation(), 2);
        assert_eq!(publisher.current().valid_routes().len(), 1);
        assert!(!agg.dirty);
    }

    #[tokio::test]
    async fn test_empty_deltas_produce_no_change() {
        let mut agg = aggregator_with(vec![Arc::new(StaticDataClient::new(vec![shunt("a")]))]);
        agg.round().await;

        let round = agg.round().await;
        assert!(!round.changed);
        assert!(round.clean);
    }
}
