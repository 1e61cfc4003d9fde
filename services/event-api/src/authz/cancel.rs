//! Cancel requests on running events.

use evauth_events::EventError;
use evauth_id::EventId;
use thiserror::Error;
use tracing::info;

use super::{check_event_access, AccessMode, Registry};
use crate::permission::Actor;
use crate::store::{EventStore, StoreError};

#[derive(Debug, Error)]
pub enum CancelError {
    #[error("event not found")]
    NotFound,

    #[error("reason is required")]
    MissingReason,

    #[error("not allowed to cancel this event")]
    Unauthorized,

    /// The event already finished or already has a cancel request.
    #[error("event is not cancelable")]
    NotCancelable,

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for CancelError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Event(EventError::NotCancelable) => CancelError::NotCancelable,
            other => CancelError::Store(other),
        }
    }
}

/// Asks a running event to cancel on behalf of `actor`.
///
/// The reason is validated before any permission lookup, so an empty reason
/// is rejected even for actors who could not cancel the event anyway.
pub async fn cancel_event(
    events: &dyn EventStore,
    registry: &Registry,
    actor: &Actor,
    id: EventId,
    reason: &str,
) -> Result<(), CancelError> {
    let event = events.get(id).await?.ok_or(CancelError::NotFound)?;

    let reason = reason.trim();
    if reason.is_empty() {
        return Err(CancelError::MissingReason);
    }

    if !check_event_access(registry, actor, &event, AccessMode::Update).await? {
        return Err(CancelError::Unauthorized);
    }

    events.try_cancel(id, reason, &actor.name).await?;
    info!(
        event_id = %id,
        actor = %actor.name,
        target_type = %event.target.kind,
        "Event cancel requested"
    );
    Ok(())
}
