//! Authentication helpers shared by the v1 handlers.

use crate::api::error::ApiError;
use crate::api::request_context::{ActorType, RequestContext};
use crate::permission::Actor;
use crate::state::AppState;

pub fn require_authenticated(ctx: &RequestContext) -> Result<(), ApiError> {
    if ctx.actor_type == ActorType::Anonymous {
        return Err(ApiError::unauthorized(
            "unauthorized",
            "Missing or invalid Authorization token",
        )
        .with_request_id(ctx.request_id.clone()));
    }
    Ok(())
}

/// Resolves the authenticated caller and the grants it currently holds.
pub async fn load_actor(state: &AppState, ctx: &RequestContext) -> Result<Actor, ApiError> {
    require_authenticated(ctx)?;

    let request_id = &ctx.request_id;
    let grants = state
        .grants()
        .grants_for(&ctx.actor_id)
        .await
        .map_err(|e| {
            tracing::error!(
                error = %e,
                request_id = %request_id,
                actor = %ctx.actor_id,
                "Failed to load grants"
            );
            ApiError::internal("internal_error", "Failed to authorize request")
                .with_request_id(request_id.clone())
        })?;

    Ok(Actor::new(ctx.actor_id.clone(), grants))
}
