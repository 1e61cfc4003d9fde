//! IaaS events. The target value is the IaaS name, matched directly
//! against IaaS contexts of the machine schemes.

use async_trait::async_trait;
use evauth_events::{Event, TargetKind};

use super::{AccessMode, ListingScope, SchemePair, TargetAuthorizer};
use crate::permission::{schemes, Actor, ContextKind, PermissionContext};
use crate::store::StoreError;

const MACHINE_SCHEMES: SchemePair =
    SchemePair::new(schemes::MACHINE_READ_EVENTS, schemes::MACHINE_UPDATE_EVENTS);

pub struct IaasAuthorizer;

#[async_trait]
impl TargetAuthorizer for IaasAuthorizer {
    fn kind(&self) -> TargetKind {
        TargetKind::Iaas
    }

    async fn listing_scope(&self, actor: &Actor) -> Result<ListingScope, StoreError> {
        let contexts = actor.contexts_for(MACHINE_SCHEMES.read);
        Ok(ListingScope::from_contexts(&contexts, ContextKind::Iaas))
    }

    async fn check(
        &self,
        actor: &Actor,
        event: &Event,
        mode: AccessMode,
    ) -> Result<bool, StoreError> {
        Ok(actor.check(
            MACHINE_SCHEMES.for_mode(mode),
            &[PermissionContext::new(ContextKind::Iaas, &event.target.value)],
        ))
    }
}
