//! End-to-end tests of the update pipeline: a scripted data source
//! drives generation changes while lookups observe either the latest
//! or a pinned generation.

use async_trait::async_trait;
use http::{HeaderMap, Method};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wayline_core::definition::{Backend, RouteDefinition};
use wayline_core::error::DataClientError;
use wayline_core::registry::LookupRequest;
use wayline_routing::{DataClient, Options, RouteUpdate, Routing};

/// Serves a fixed initial set, then replays queued deltas one per
/// poll tick.
struct ScriptedClient {
    initial: Vec<RouteDefinition>,
    updates: Mutex<VecDeque<RouteUpdate>>,
}

impl ScriptedClient {
    fn new(initial: Vec<RouteDefinition>) -> Self {
        Self {
            initial,
            updates: Mutex::new(VecDeque::new()),
        }
    }

    fn push_update(&self, update: RouteUpdate) {
        self.updates.lock().unwrap().push_back(update);
    }
}

#[async_trait]
impl DataClient for ScriptedClient {
    async fn load_all(&self) -> Result<Vec<RouteDefinition>, DataClientError> {
        Ok(self.initial.clone())
    }

    async fn load_update(&self) -> Result<RouteUpdate, DataClientError> {
        Ok(self
            .updates
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }
}

fn path_route(id: &str, path: &str) -> RouteDefinition {
    RouteDefinition::new(id, Backend::network("http", "backend:8080"))
        .with_predicate("Path", [path])
}

async fn wait_for_generation(routing: &Routing, at_least: u64) {
    for _ in 0..400 {
        if routing.current().generation() >= at_least {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!(
        "generation {} not reached, current {}",
        at_least,
        routing.current().generation()
    );
}

fn match_id(routing: &Routing, path: &str) -> Option<String> {
    let headers = HeaderMap::new();
    let method = Method::GET;
    routing
        .route(&LookupRequest::new(&method, path, "example.org", &headers))
        .map(|(route, _)| route.id.clone())
}

#[tokio::test]
async fn test_live_update_replaces_routes() {
    let client = Arc::new(ScriptedClient::new(vec![path_route("r1", "/a")]));
    let routing = Routing::new(Options {
        data_clients: vec![Arc::clone(&client) as Arc<dyn DataClient>],
        poll_timeout: Duration::from_millis(10),
        ..Options::default()
    });

    wait_for_generation(&routing, 1).await;
    let first = routing.current();
    assert_eq!(first.valid_routes().len(), 1);
    assert_eq!(match_id(&routing, "/a").as_deref(), Some("r1"));
    assert_eq!(match_id(&routing, "/b"), None);

    // one poll cycle later: r1 deleted, r2 upserted
    client.push_update(RouteUpdate {
        upserts: vec![path_route("r2", "/b")],
        deleted_ids: vec!["r1".to_string()],
    });

    wait_for_generation(&routing, 2).await;
    let second = routing.current();
    assert!(second.generation() > first.generation());
    assert!(second.created() >= first.created());
    assert_eq!(second.valid_routes().len(), 1);
    assert_eq!(second.valid_routes()[0].id, "r2");

    assert_eq!(match_id(&routing, "/b").as_deref(), Some("r2"));
    assert_eq!(match_id(&routing, "/a"), None);

    routing.close();
}

#[tokio::test]
async fn test_empty_deltas_publish_nothing() {
    let client = Arc::new(ScriptedClient::new(vec![path_route("r1", "/a")]));
    let routing = Routing::new(Options {
        data_clients: vec![Arc::clone(&client) as Arc<dyn DataClient>],
        poll_timeout: Duration::from_millis(10),
        ..Options::default()
    });

    wait_for_generation(&routing, 1).await;

    // several empty poll cycles later the generation is unchanged
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(routing.current().generation(), 1);
    assert_eq!(routing.metrics().generations_published(), 1);

    routing.close();
}

#[tokio::test]
async fn test_pinned_handle_observes_one_generation() {
    let client = Arc::new(ScriptedClient::new(vec![path_route("r1", "/a")]));
    let routing = Routing::new(Options {
        data_clients: vec![Arc::clone(&client) as Arc<dyn DataClient>],
        poll_timeout: Duration::from_millis(10),
        ..Options::default()
    });

    wait_for_generation(&routing, 1).await;
    let pinned = routing.pinned();

    client.push_update(RouteUpdate {
        upserts: vec![path_route("r2", "/b")],
        deleted_ids: vec!["r1".to_string()],
    });
    wait_for_generation(&routing, 2).await;

    // the pinned handle still answers from the old generation
    let headers = HeaderMap::new();
    let method = Method::GET;
    let pinned_match = pinned.lookup(&LookupRequest::new(&method, "/a", "h", &headers));
    assert_eq!(pinned_match.map(|(r, _)| r.id.clone()).as_deref(), Some("r1"));
    assert!(pinned
        .lookup(&LookupRequest::new(&method, "/b", "h", &headers))
        .is_none());
    assert_eq!(pinned.table().generation(), 1);

    // while the live view already moved on
    assert_eq!(match_id(&routing, "/b").as_deref(), Some("r2"));

    routing.close();
}

#[tokio::test]
async fn test_load_balancer_group_traversal() {
    let lb = RouteDefinition::new(
        "api",
        Backend::load_balanced(vec![
            ("http".to_string(), "a:80".to_string()),
            ("http".to_string(), "b:80".to_string()),
            ("http".to_string(), "c:80".to_string()),
        ]),
    )
    .with_predicate("Path", ["/api"]);

    let client = Arc::new(ScriptedClient::new(vec![lb]));
    let routing = Routing::new(Options {
        data_clients: vec![client as Arc<dyn DataClient>],
        poll_timeout: Duration::from_millis(10),
        ..Options::default()
    });

    wait_for_generation(&routing, 1).await;

    let table = routing.current();
    let headers = HeaderMap::new();
    let method = Method::GET;
    let (winner, _) = table
        .lookup(&LookupRequest::new(&method, "/api", "h", &headers))
        .unwrap();
    assert!(winner.is_load_balanced);
    assert_eq!(winner.group.as_deref(), Some("api"));

    // walking next from the winner traverses the other members, then
    // returns to the winner
    let matcher = table.matcher();
    let second = matcher.lb_next(&winner).unwrap();
    let third = matcher.lb_next(&second).unwrap();
    let back = matcher.lb_next(&third).unwrap();
    assert_ne!(winner.id, second.id);
    assert_ne!(second.id, third.id);
    assert_eq!(back.id, winner.id);

    // every member reports the same head
    let head = matcher.lb_head(&third).unwrap();
    assert_eq!(head.id, matcher.lb_head(&winner).unwrap().id);

    routing.close();
}

#[tokio::test]
async fn test_conflicting_sources_resolve_by_declaration_order() {
    let first = Arc::new(ScriptedClient::new(vec![path_route("dup", "/first")]));
    let second = Arc::new(ScriptedClient::new(vec![path_route("dup", "/second")]));

    let routing = Routing::new(Options {
        data_clients: vec![
            Arc::clone(&first) as Arc<dyn DataClient>,
            Arc::clone(&second) as Arc<dyn DataClient>,
        ],
        poll_timeout: Duration::from_millis(10),
        ..Options::default()
    });

    wait_for_generation(&routing, 1).await;

    assert_eq!(match_id(&routing, "/first").as_deref(), Some("dup"));
    assert_eq!(match_id(&routing, "/second"), None);
    assert!(routing.metrics().id_conflicts() >= 1);

    routing.close();
}
