//! HTTP layers wrapped around the action routes.
//!
//! Every request carries an `x-request-id`; the action handler adopts it as
//! the trace id of the action, so a log line from the orchestrator can be
//! matched to the HTTP exchange that caused it.

use std::time::Duration;

use axum::body::Body;
use axum::http::header::HeaderName;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info_span, Span};

use super::config::NetworkConfig;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Time left to render and write the response after the action deadline.
pub const RESPONSE_SLACK: Duration = Duration::from_secs(5);

/// HTTP deadline for one exchange.
///
/// Never shorter than the action timeout plus [`RESPONSE_SLACK`]: an action
/// must be able to report its own timeout before the connection gives up.
#[must_use]
pub fn http_deadline(config: &NetworkConfig, action_timeout: Duration) -> Duration {
    config
        .request_timeout
        .max(action_timeout.saturating_add(RESPONSE_SLACK))
}

/// Request id set by [`with_http_layers`], if present and printable.
#[must_use]
pub fn request_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

fn action_http_span(req: &Request<Body>) -> Span {
    info_span!(
        "http",
        method = %req.method(),
        path = %req.uri().path(),
        request_id = request_id(req.headers()).unwrap_or_default(),
    )
}

/// Wraps `router` in the HTTP layers, outermost first:
/// request id assignment, the `http` span, the deadline, then copying the
/// request id onto the response.
pub fn with_http_layers<S>(
    router: Router<S>,
    config: &NetworkConfig,
    action_timeout: Duration,
) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let header = HeaderName::from_static(REQUEST_ID_HEADER);
    router
        .layer(PropagateRequestIdLayer::new(header.clone()))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            http_deadline(config, action_timeout),
        ))
        .layer(TraceLayer::new_for_http().make_span_with(action_http_span))
        .layer(SetRequestIdLayer::new(header, MakeRequestUuid))
}
