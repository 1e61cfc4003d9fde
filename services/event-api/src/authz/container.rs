//! Container events, authorized through the application owning the unit.

use std::sync::Arc;

use async_trait::async_trait;
use evauth_events::{Event, TargetKind};
use tracing::instrument;

use super::app::{app_contexts, visible_apps, VisibleApps, APP_SCHEMES};
use super::{AccessMode, ListingScope, TargetAuthorizer};
use crate::permission::Actor;
use crate::store::{ApplicationStore, StoreError};

pub struct ContainerAuthorizer {
    apps: Arc<dyn ApplicationStore>,
}

impl ContainerAuthorizer {
    pub fn new(apps: Arc<dyn ApplicationStore>) -> Self {
        Self { apps }
    }
}

#[async_trait]
impl TargetAuthorizer for ContainerAuthorizer {
    fn kind(&self) -> TargetKind {
        TargetKind::Container
    }

    #[instrument(skip_all, fields(actor = %actor.name))]
    async fn listing_scope(&self, actor: &Actor) -> Result<ListingScope, StoreError> {
        let apps = match visible_apps(self.apps.as_ref(), actor).await? {
            VisibleApps::Hidden => return Ok(ListingScope::Absent),
            VisibleApps::All => return Ok(ListingScope::Unrestricted),
            VisibleApps::Listed(apps) => apps,
        };
        let mut units = Vec::new();
        for app in &apps {
            units.extend(self.apps.units(&app.name).await?.into_iter().map(|u| u.id));
        }
        Ok(ListingScope::Restricted(units))
    }

    async fn check(
        &self,
        actor: &Actor,
        event: &Event,
        mode: AccessMode,
    ) -> Result<bool, StoreError> {
        let app = self.apps.app_for_unit(&event.target.value).await?;
        Ok(actor.check(APP_SCHEMES.for_mode(mode), &app_contexts(&app)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::fixtures::{actor, ctx, event, world};
    use crate::permission::{ContextKind, PermissionContext};

    #[tokio::test]
    async fn test_listing_collects_units_of_visible_apps() {
        let bob = actor("bob", &[("app.read.events", ctx(ContextKind::Team, "beta"))]);
        let scope = ContainerAuthorizer::new(world())
            .listing_scope(&bob)
            .await
            .unwrap();
        assert_eq!(scope, ListingScope::Restricted(vec!["api-1".to_string()]));
    }

    #[tokio::test]
    async fn test_visible_apps_without_units_give_empty_restriction() {
        let alice = actor("alice", &[("app.read.events", ctx(ContextKind::App, "batch"))]);
        let scope = ContainerAuthorizer::new(world())
            .listing_scope(&alice)
            .await
            .unwrap();
        assert_eq!(scope, ListingScope::Restricted(Vec::new()));
    }

    #[tokio::test]
    async fn test_global_context_is_unrestricted() {
        let root = actor("root", &[("*", PermissionContext::global())]);
        let scope = ContainerAuthorizer::new(world())
            .listing_scope(&root)
            .await
            .unwrap();
        assert_eq!(scope, ListingScope::Unrestricted);
    }

    #[tokio::test]
    async fn test_check_follows_owning_app() {
        let authorizer = ContainerAuthorizer::new(world());
        let alice = actor("alice", &[("app.update", ctx(ContextKind::Pool, "prod"))]);

        let web = event(TargetKind::Container, "web-2");
        assert!(authorizer.check(&alice, &web, AccessMode::Update).await.unwrap());

        let api = event(TargetKind::Container, "api-1");
        assert!(!authorizer.check(&alice, &api, AccessMode::Update).await.unwrap());
    }

    #[tokio::test]
    async fn test_check_on_unknown_unit_is_not_found() {
        let alice = actor("alice", &[("app", ctx(ContextKind::Pool, "prod"))]);
        let err = ContainerAuthorizer::new(world())
            .check(&alice, &event(TargetKind::Container, "zzz-9"), AccessMode::Read)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
