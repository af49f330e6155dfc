//! `POST /action`: runs one service action and returns its response.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use super::AppState;
use crate::network::middleware::request_id;
use crate::service::action::FAILURE_PREFIX;
use crate::service::ActionResponse;

/// Inbound action invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionBody {
    pub service_name: String,
    pub operation_id: String,
    /// Caller identity the transaction is opened as.
    pub caller: String,
}

/// Runs the action and answers `{"success": ...}` or `{"failure": ...}`.
///
/// Failures of the action itself are still 200; the body carries the outcome.
/// 503 is reserved for a server that is not accepting actions.
/// The `x-request-id` header becomes the action's trace id.
pub async fn action_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ActionBody>,
) -> (StatusCode, Json<ActionResponse>) {
    let Some(_admitted) = state.shutdown.admit() else {
        warn!(service = %body.service_name, "rejecting action, server not ready");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ActionResponse::Failure(format!(
                "{FAILURE_PREFIX}: server is {}",
                state.shutdown.health_state().as_str()
            ))),
        );
    };

    let trace_id = request_id(&headers)
        .map_or_else(|| Uuid::new_v4().to_string(), str::to_string);
    let response = state
        .entry
        .handle_traced(&body.service_name, &body.operation_id, &body.caller, trace_id)
        .await;
    (StatusCode::OK, Json(response))
}
