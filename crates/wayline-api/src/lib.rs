//! Read-only introspection surface for the route table
//!
//! Serves the current generation of compiled routes over HTTP:
//!
//! - `GET /routes` renders the paginated route list, as JSON when the
//!   `Accept` header contains `application/json` and in the textual
//!   route syntax otherwise
//! - `HEAD /routes` returns only the headers
//! - anything else is answered with 405
//!
//! Both methods carry `X-Timestamp` (the generation's creation instant
//! as a Unix second) and `X-Count` (the number of valid routes), so
//! clients can poll cheaply and detect generation changes. A
//! `timestamp` query parameter asserts the expected generation and is
//! answered with 400 on mismatch.

use axum::extract::{Query, State};
use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use wayline_core::definition::RouteDefinition;
use wayline_core::print;
use wayline_routing::Routing;

/// Response header carrying the generation timestamp (Unix seconds).
pub const TIMESTAMP_HEADER: &str = "x-timestamp";

/// Response header carrying the number of valid routes.
pub const COUNT_HEADER: &str = "x-count";

/// Default page size of the route listing.
pub const DEFAULT_LISTING_LIMIT: usize = 1024;

/// Introspection request failures, surfaced to the HTTP caller only.
#[derive(Debug, Error)]
pub enum IntrospectError {
    /// The `timestamp` parameter does not match the current generation
    #[error("invalid timestamp")]
    TimestampMismatch,

    /// A pagination parameter is not a non-negative integer
    #[error("invalid {param}")]
    BadParam { param: &'static str },

    /// The route list could not be encoded
    #[error("encoding failed")]
    Encoding,
}

impl IntoResponse for IntrospectError {
    fn into_response(self) -> Response {
        match self {
            IntrospectError::TimestampMismatch | IntrospectError::BadParam { .. } => {
                (StatusCode::BAD_REQUEST, format!("{}\n", self)).into_response()
            }
            IntrospectError::Encoding => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error\n").into_response()
            }
        }
    }
}

#[derive(Clone)]
struct RoutesState {
    routing: Arc<Routing>,
}

/// Build the introspection router serving `/routes`.
pub fn routes_router(routing: Arc<Routing>) -> Router {
    Router::new()
        .route("/routes", get(serve_routes))
        .with_state(RoutesState { routing })
}

#[derive(Debug, Deserialize)]
struct ListingQuery {
    offset: Option<String>,
    limit: Option<String>,
    timestamp: Option<String>,
    nopretty: Option<String>,
}

async fn serve_routes(
    State(state): State<RoutesState>,
    method: Method,
    headers: HeaderMap,
    Query(query): Query<ListingQuery>,
) -> Response {
    match render(&state, &method, &headers, &query) {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

fn render(
    state: &RoutesState,
    method: &Method,
    headers: &HeaderMap,
    query: &ListingQuery,
) -> Result<Response, IntrospectError> {
    let table = state.routing.current();
    let created_unix = table.created().timestamp().to_string();

    if let Some(expected) = &query.timestamp {
        if *expected != created_unix {
            return Err(IntrospectError::TimestampMismatch);
        }
    }

    let json = headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("application/json"))
        .unwrap_or(false);

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        HeaderName::from_static(TIMESTAMP_HEADER),
        header_value(&created_unix)?,
    );
    response_headers.insert(
        HeaderName::from_static(COUNT_HEADER),
        header_value(&table.valid_routes().len().to_string())?,
    );
    let content_type = if json { "application/json" } else { "text/plain" };
    response_headers.insert(CONTENT_TYPE, header_value(content_type)?);

    if method == Method::HEAD {
        return Ok((StatusCode::OK, response_headers, String::new()).into_response());
    }

    let offset = parse_param(query.offset.as_deref(), 0, "offset")?;
    let limit = parse_param(query.limit.as_deref(), DEFAULT_LISTING_LIMIT, "limit")?;
    let page = paginate(table.valid_routes(), offset, limit);

    debug!(
        generation = table.generation(),
        offset,
        limit,
        returned = page.len(),
        json,
        "route listing served"
    );

    let body = if json {
        let mut body =
            serde_json::to_string(page).map_err(|_| IntrospectError::Encoding)?;
        body.push('\n');
        body
    } else {
        print::routes_to_string(page, pretty(query.nopretty.as_deref()))
    };

    Ok((StatusCode::OK, response_headers, body).into_response())
}

fn header_value(value: &str) -> Result<HeaderValue, IntrospectError> {
    HeaderValue::from_str(value).map_err(|_| IntrospectError::Encoding)
}

/// Parse a non-negative integer parameter, rejecting anything else.
fn parse_param(
    value: Option<&str>,
    default: usize,
    param: &'static str,
) -> Result<usize, IntrospectError> {
    match value {
        None | Some("") => Ok(default),
        Some(raw) => {
            let parsed: i64 = raw.parse().map_err(|_| IntrospectError::BadParam { param })?;
            usize::try_from(parsed).map_err(|_| IntrospectError::BadParam { param })
        }
    }
}

/// Page semantics: an offset past the end is an empty page, and the
/// end of the page clamps to the end of the list.
fn paginate(routes: &[RouteDefinition], offset: usize, limit: usize) -> &[RouteDefinition] {
    let start = offset.min(routes.len());
    let end = start.saturating_add(limit).min(routes.len());
    &routes[start..end]
}

/// Pretty output is the default; any `nopretty` value other than `0`
/// or `false` disables it.
fn pretty(nopretty: Option<&str>) -> bool {
    match nopretty {
        None => true,
        Some("0") | Some("false") => true,
        Some(_) => false,
    }
}
