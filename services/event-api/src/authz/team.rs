//! Team events.

use std::sync::Arc;

use async_trait::async_trait;
use evauth_events::{Event, TargetKind};

use super::{AccessMode, ListingScope, SchemePair, TargetAuthorizer};
use crate::permission::{schemes, Actor, ContextKind, PermissionContext};
use crate::store::{StoreError, TeamStore};

const TEAM_SCHEMES: SchemePair =
    SchemePair::new(schemes::TEAM_READ_EVENTS, schemes::TEAM_UPDATE_EVENTS);

pub struct TeamAuthorizer {
    teams: Arc<dyn TeamStore>,
}

impl TeamAuthorizer {
    pub fn new(teams: Arc<dyn TeamStore>) -> Self {
        Self { teams }
    }
}

#[async_trait]
impl TargetAuthorizer for TeamAuthorizer {
    fn kind(&self) -> TargetKind {
        TargetKind::Team
    }

    async fn listing_scope(&self, actor: &Actor) -> Result<ListingScope, StoreError> {
        let contexts = actor.contexts_for(TEAM_SCHEMES.read);
        Ok(ListingScope::from_contexts(&contexts, ContextKind::Team))
    }

    async fn check(
        &self,
        actor: &Actor,
        event: &Event,
        mode: AccessMode,
    ) -> Result<bool, StoreError> {
        let team = self.teams.get(&event.target.value).await?;
        Ok(actor.check(
            TEAM_SCHEMES.for_mode(mode),
            &[PermissionContext::new(ContextKind::Team, team.name)],
        ))
    }
}
