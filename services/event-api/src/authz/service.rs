//! Service events, resolved through the service registry.

use std::sync::Arc;

use async_trait::async_trait;
use evauth_events::{Event, TargetKind};
use tracing::instrument;

use super::{AccessMode, ListingScope, SchemePair, TargetAuthorizer};
use crate::permission::{schemes, Actor, ContextKind, PermissionContext};
use crate::store::{ContextFilter, ServiceStore, StoreError};

const SERVICE_SCHEMES: SchemePair =
    SchemePair::new(schemes::SERVICE_READ_EVENTS, schemes::SERVICE_UPDATE_EVENTS);

pub struct ServiceAuthorizer {
    services: Arc<dyn ServiceStore>,
}

impl ServiceAuthorizer {
    pub fn new(services: Arc<dyn ServiceStore>) -> Self {
        Self { services }
    }
}

#[async_trait]
impl TargetAuthorizer for ServiceAuthorizer {
    fn kind(&self) -> TargetKind {
        TargetKind::Service
    }

    #[instrument(skip_all, fields(actor = %actor.name))]
    async fn listing_scope(&self, actor: &Actor) -> Result<ListingScope, StoreError> {
        let contexts = actor.contexts_for(SERVICE_SCHEMES.read);
        if contexts.is_empty() {
            return Ok(ListingScope::Absent);
        }
        if contexts.iter().any(PermissionContext::is_global) {
            return Ok(ListingScope::Unrestricted);
        }
        let filter = ContextFilter::from_contexts(&contexts, ContextKind::Service);
        let services = self.services.list(&filter).await?;
        Ok(ListingScope::resolved(
            services.into_iter().map(|s| s.name).collect(),
        ))
    }

    async fn check(
        &self,
        actor: &Actor,
        event: &Event,
        mode: AccessMode,
    ) -> Result<bool, StoreError> {
        let service = self.services.get(&event.target.value).await?;
        let mut contexts = PermissionContext::many(ContextKind::Team, service.owner_teams);
        contexts.push(PermissionContext::new(ContextKind::Service, service.name));
        Ok(actor.check(SERVICE_SCHEMES.for_mode(mode), &contexts))
    }
}
