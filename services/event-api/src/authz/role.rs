//! Role events.

use async_trait::async_trait;
use evauth_events::{Event, TargetKind};

use super::{AccessMode, ListingScope, SchemePair, TargetAuthorizer};
use crate::permission::{schemes, Actor, ContextKind, PermissionContext};
use crate::store::StoreError;

const ROLE_SCHEMES: SchemePair =
    SchemePair::new(schemes::ROLE_READ_EVENTS, schemes::ROLE_UPDATE_EVENTS);

pub struct RoleAuthorizer;

#[async_trait]
impl TargetAuthorizer for RoleAuthorizer {
    fn kind(&self) -> TargetKind {
        TargetKind::Role
    }

    async fn listing_scope(&self, actor: &Actor) -> Result<ListingScope, StoreError> {
        let contexts = actor.contexts_for(ROLE_SCHEMES.read);
        Ok(ListingScope::from_contexts(&contexts, ContextKind::Role))
    }

    async fn check(
        &self,
        actor: &Actor,
        event: &Event,
        mode: AccessMode,
    ) -> Result<bool, StoreError> {
        Ok(actor.check(
            ROLE_SCHEMES.for_mode(mode),
            &[PermissionContext::new(ContextKind::Role, &event.target.value)],
        ))
    }
}
