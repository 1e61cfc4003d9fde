//! Events API endpoints.
//!
//! Listing, point reads and cancel requests on the event log, each gated by
//! the per-target-kind authorizers.

use std::future::Future;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use evauth_events::EventFilter;
use evauth_id::EventId;
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::api::authz;
use crate::api::error::ApiError;
use crate::api::request_context::RequestContext;
use crate::authz::{allowed_targets, cancel_event, check_event_access, AccessMode, CancelError};
use crate::state::AppState;
use crate::store::StoreError;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_events))
        .route("/kinds", get(list_kinds))
        .route("/{event_id}", get(get_event))
        .route("/{event_id}/cancel", post(cancel))
}

// =============================================================================
// Request Types
// =============================================================================

/// Body of a cancel request.
#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: String,
}

// =============================================================================
// Helpers
// =============================================================================

fn store_failure(err: StoreError, request_id: &str, action: &'static str) -> ApiError {
    if let StoreError::NotFound { kind, name } = &err {
        debug!(request_id = %request_id, kind, name = %name, "Referenced resource not found");
        return ApiError::not_found("not_found", err.to_string())
            .with_request_id(request_id.to_string());
    }
    error!(error = %err, request_id = %request_id, action, "Store call failed");
    ApiError::internal("internal_error", format!("Failed to {action}"))
        .with_request_id(request_id.to_string())
}

fn authz_timeout(request_id: &str) -> ApiError {
    error!(request_id = %request_id, "Authorization deadline exceeded");
    ApiError::gateway_timeout("authorization_timeout", "Authorization did not complete in time")
        .with_request_id(request_id.to_string())
}

/// Runs an authorization step under the configured deadline. Dropping the
/// step on timeout drops every store lookup it still has in flight.
async fn with_deadline<T, E>(
    state: &AppState,
    request_id: &str,
    step: impl Future<Output = Result<T, E>>,
) -> Result<Result<T, E>, ApiError> {
    tokio::time::timeout(state.authz_timeout(), step)
        .await
        .map_err(|_| authz_timeout(request_id))
}

// =============================================================================
// Handlers
// =============================================================================

/// List events visible to the caller.
///
/// GET /v1/events
async fn list_events(
    State(state): State<AppState>,
    ctx: RequestContext,
    query: Result<Query<EventFilter>, QueryRejection>,
) -> Result<Response, ApiError> {
    let request_id = ctx.request_id.clone();
    authz::require_authenticated(&ctx)?;

    let Query(filter) = query.map_err(|e| {
        ApiError::bad_request("invalid_filter", format!("Unable to parse event filters: {e}"))
            .with_request_id(request_id.clone())
    })?;

    let actor = authz::load_actor(&state, &ctx).await?;
    let allowed = with_deadline(&state, &request_id, allowed_targets(state.registry(), &actor))
        .await?
        .map_err(|e| store_failure(e, &request_id, "resolve listing permissions"))?;

    let events = state
        .events()
        .list(&filter, &allowed)
        .await
        .map_err(|e| store_failure(e, &request_id, "list events"))?;

    debug!(
        request_id = %request_id,
        actor = %actor.name,
        visible_kinds = allowed.len(),
        count = events.len(),
        "Listed events"
    );

    if events.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(Json(events).into_response())
}

/// List the distinct event kinds.
///
/// GET /v1/events/kinds
async fn list_kinds(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Response, ApiError> {
    authz::require_authenticated(&ctx)?;

    let kinds = state
        .events()
        .kinds()
        .await
        .map_err(|e| store_failure(e, &ctx.request_id, "list event kinds"))?;

    if kinds.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(Json(kinds).into_response())
}

/// Fetch one event.
///
/// GET /v1/events/{event_id}
async fn get_event(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(event_id): Path<String>,
) -> Result<Response, ApiError> {
    let request_id = ctx.request_id.clone();
    authz::require_authenticated(&ctx)?;

    let not_found = || {
        ApiError::not_found("event_not_found", format!("Event not found: {event_id}"))
            .with_request_id(request_id.clone())
    };

    let Ok(id) = event_id.parse::<EventId>() else {
        return Err(not_found());
    };

    let actor = authz::load_actor(&state, &ctx).await?;
    let event = state
        .events()
        .get(id)
        .await
        .map_err(|e| store_failure(e, &request_id, "fetch event"))?
        .ok_or_else(not_found)?;

    let allowed = with_deadline(
        &state,
        &request_id,
        check_event_access(state.registry(), &actor, &event, AccessMode::Read),
    )
    .await?
    .map_err(|e| store_failure(e, &request_id, "authorize event access"))?;

    if !allowed {
        info!(
            request_id = %request_id,
            actor = %actor.name,
            event_id = %id,
            target_type = %event.target.kind,
            "Event read denied"
        );
        return Err(
            ApiError::unauthorized("unauthorized", "You don't have permission to do this action")
                .with_request_id(request_id),
        );
    }

    Ok(Json(event).into_response())
}

/// Request cancellation of a running event.
///
/// POST /v1/events/{event_id}/cancel
async fn cancel(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(event_id): Path<String>,
    body: Result<Json<CancelRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request_id = ctx.request_id.clone();
    authz::require_authenticated(&ctx)?;

    let id: EventId = event_id.parse().map_err(|_| {
        ApiError::bad_request("invalid_event_id", format!("Invalid event id: {event_id}"))
            .with_request_id(request_id.clone())
    })?;

    let Json(req) = body.map_err(|e| {
        ApiError::bad_request("invalid_request", format!("Invalid cancel request: {e}"))
            .with_request_id(request_id.clone())
    })?;

    let actor = authz::load_actor(&state, &ctx).await?;
    let result = with_deadline(
        &state,
        &request_id,
        cancel_event(state.events(), state.registry(), &actor, id, &req.reason),
    )
    .await?;

    match result {
        Ok(()) => Ok(StatusCode::NO_CONTENT.into_response()),
        Err(CancelError::NotFound) => Err(ApiError::not_found(
            "event_not_found",
            format!("Event not found: {id}"),
        )
        .with_request_id(request_id)),
        Err(CancelError::MissingReason) => Err(ApiError::bad_request(
            "reason_required",
            "reason is mandatory",
        )
        .with_request_id(request_id)),
        Err(CancelError::Unauthorized) => {
            info!(
                request_id = %request_id,
                actor = %actor.name,
                event_id = %id,
                "Event cancel denied"
            );
            Err(
                ApiError::unauthorized("unauthorized", "You don't have permission to do this action")
                    .with_request_id(request_id),
            )
        }
        Err(CancelError::NotCancelable) => Err(ApiError::bad_request(
            "event_not_cancelable",
            "event is not cancelable",
        )
        .with_request_id(request_id)),
        Err(CancelError::Store(e)) => Err(store_failure(e, &request_id, "cancel event")),
    }
}
