//! Service instance events. Target values are `service/instance`.

use std::sync::Arc;

use async_trait::async_trait;
use evauth_events::{Event, ServiceInstanceRef, TargetKind};
use tracing::{debug, instrument};

use super::{AccessMode, ListingScope, SchemePair, TargetAuthorizer};
use crate::permission::{schemes, Actor, ContextKind, PermissionContext};
use crate::store::{ContextFilter, ServiceInstanceStore, StoreError};

const SERVICE_INSTANCE_SCHEMES: SchemePair = SchemePair::new(
    schemes::SERVICE_INSTANCE_READ_EVENTS,
    schemes::SERVICE_INSTANCE_UPDATE_EVENTS,
);

pub struct ServiceInstanceAuthorizer {
    instances: Arc<dyn ServiceInstanceStore>,
}

impl ServiceInstanceAuthorizer {
    pub fn new(instances: Arc<dyn ServiceInstanceStore>) -> Self {
        Self { instances }
    }
}

#[async_trait]
impl TargetAuthorizer for ServiceInstanceAuthorizer {
    fn kind(&self) -> TargetKind {
        TargetKind::ServiceInstance
    }

    #[instrument(skip_all, fields(actor = %actor.name))]
    async fn listing_scope(&self, actor: &Actor) -> Result<ListingScope, StoreError> {
        let contexts = actor.contexts_for(SERVICE_INSTANCE_SCHEMES.read);
        if contexts.is_empty() {
            return Ok(ListingScope::Absent);
        }
        if contexts.iter().any(PermissionContext::is_global) {
            return Ok(ListingScope::Unrestricted);
        }
        let filter = ContextFilter::from_contexts(&contexts, ContextKind::ServiceInstance);
        let instances = self.instances.list(&filter).await?;
        Ok(ListingScope::resolved(
            instances.iter().map(|si| si.identity()).collect(),
        ))
    }

    async fn check(
        &self,
        actor: &Actor,
        event: &Event,
        mode: AccessMode,
    ) -> Result<bool, StoreError> {
        let Ok(id) = event.target.value.parse::<ServiceInstanceRef>() else {
            debug!(target_value = %event.target.value, "Malformed service instance target");
            return Ok(false);
        };
        let instance = self.instances.get(&id).await?;
        let mut contexts = PermissionContext::many(ContextKind::Team, instance.teams);
        contexts.push(PermissionContext::new(
            ContextKind::ServiceInstance,
            &event.target.value,
        ));
        Ok(actor.check(SERVICE_INSTANCE_SCHEMES.for_mode(mode), &contexts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::fixtures::{actor, ctx, event, world};
    use rstest::rstest;

    #[tokio::test]
    async fn test_listing_uses_composite_identity() {
        let alice = actor(
            "alice",
            &[
                ("service-instance", ctx(ContextKind::Team, "alpha")),
                ("service-instance", ctx(ContextKind::ServiceInstance, "redis/cache")),
            ],
        );
        let scope = ServiceInstanceAuthorizer::new(world())
            .listing_scope(&alice)
            .await
            .unwrap();
        assert_eq!(
            scope,
            ListingScope::Restricted(vec!["mysql/db1".to_string(), "redis/cache".to_string()])
        );
    }

    #[tokio::test]
    async fn test_global_context_is_unrestricted() {
        let root = actor(
            "root",
            &[
                ("service-instance", ctx(ContextKind::Team, "beta")),
                ("service-instance", PermissionContext::global()),
            ],
        );
        let scope = ServiceInstanceAuthorizer::new(world())
            .listing_scope(&root)
            .await
            .unwrap();
        assert_eq!(scope, ListingScope::Unrestricted);
    }

    #[rstest]
    #[case::no_separator("mysql")]
    #[case::empty_instance("mysql/")]
    #[case::empty_service("/db1")]
    #[tokio::test]
    async fn test_malformed_target_is_denied_not_failed(#[case] value: &str) {
        let root = actor("root", &[("*", PermissionContext::global())]);
        let allowed = ServiceInstanceAuthorizer::new(world())
            .check(&root, &event(TargetKind::ServiceInstance, value), AccessMode::Read)
            .await
            .unwrap();
        assert!(!allowed);
    }

    #[tokio::test]
    async fn test_check_by_team_and_identity() {
        let authorizer = ServiceInstanceAuthorizer::new(world());
        let bob = actor("bob", &[("service-instance", ctx(ContextKind::Team, "beta"))]);

        let db2 = event(TargetKind::ServiceInstance, "mysql/db2");
        assert!(authorizer.check(&bob, &db2, AccessMode::Update).await.unwrap());

        let db1 = event(TargetKind::ServiceInstance, "mysql/db1");
        assert!(!authorizer.check(&bob, &db1, AccessMode::Read).await.unwrap());

        let missing = event(TargetKind::ServiceInstance, "mysql/db9");
        let err = authorizer
            .check(&bob, &missing, AccessMode::Read)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
