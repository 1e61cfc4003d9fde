//! Pool events.

use std::sync::Arc;

use async_trait::async_trait;
use evauth_events::{Event, TargetKind};

use super::{AccessMode, ListingScope, SchemePair, TargetAuthorizer};
use crate::permission::{schemes, Actor, ContextKind, PermissionContext};
use crate::store::{PoolStore, StoreError};

/// Also guards node events, which are scoped by the node's pool.
pub(super) const POOL_SCHEMES: SchemePair =
    SchemePair::new(schemes::POOL_READ_EVENTS, schemes::POOL_UPDATE_EVENTS);

pub struct PoolAuthorizer {
    pools: Arc<dyn PoolStore>,
}

impl PoolAuthorizer {
    pub fn new(pools: Arc<dyn PoolStore>) -> Self {
        Self { pools }
    }
}

#[async_trait]
impl TargetAuthorizer for PoolAuthorizer {
    fn kind(&self) -> TargetKind {
        TargetKind::Pool
    }

    async fn listing_scope(&self, actor: &Actor) -> Result<ListingScope, StoreError> {
        let contexts = actor.contexts_for(POOL_SCHEMES.read);
        Ok(ListingScope::from_contexts(&contexts, ContextKind::Pool))
    }

    async fn check(
        &self,
        actor: &Actor,
        event: &Event,
        mode: AccessMode,
    ) -> Result<bool, StoreError> {
        let pool = self.pools.get(&event.target.value).await?;
        Ok(actor.check(
            POOL_SCHEMES.for_mode(mode),
            &[PermissionContext::new(ContextKind::Pool, pool.name)],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::fixtures::{actor, ctx, event, world};

    #[tokio::test]
    async fn test_team_context_alone_gives_empty_restriction() {
        let alice = actor("alice", &[("pool.read.events", ctx(ContextKind::Team, "alpha"))]);
        let scope = PoolAuthorizer::new(world())
            .listing_scope(&alice)
            .await
            .unwrap();
        assert_eq!(scope, ListingScope::Restricted(Vec::new()));
    }

    #[tokio::test]
    async fn test_global_short_circuits_narrower_contexts() {
        let root = actor(
            "root",
            &[
                ("pool", ctx(ContextKind::Pool, "prod")),
                ("pool", PermissionContext::global()),
                ("pool", ctx(ContextKind::Pool, "dev")),
            ],
        );
        let scope = PoolAuthorizer::new(world())
            .listing_scope(&root)
            .await
            .unwrap();
        assert_eq!(scope, ListingScope::Unrestricted);
    }

    #[tokio::test]
    async fn test_check_uses_pool_context() {
        let authorizer = PoolAuthorizer::new(world());
        let ops = actor("ops", &[("pool.update.events", ctx(ContextKind::Pool, "prod"))]);

        let prod = event(TargetKind::Pool, "prod");
        assert!(authorizer.check(&ops, &prod, AccessMode::Update).await.unwrap());
        assert!(!authorizer.check(&ops, &prod, AccessMode::Read).await.unwrap());

        let dev = event(TargetKind::Pool, "dev");
        assert!(!authorizer.check(&ops, &dev, AccessMode::Update).await.unwrap());
    }
}
