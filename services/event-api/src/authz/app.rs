//! Application events.
//!
//! Contexts only say that some applications are visible; the application
//! registry resolves which ones.

use std::sync::Arc;

use async_trait::async_trait;
use evauth_events::{Event, TargetKind};
use tracing::instrument;

use super::{AccessMode, ListingScope, SchemePair, TargetAuthorizer};
use crate::permission::{schemes, Actor, ContextKind, PermissionContext};
use crate::store::{Application, ApplicationStore, ContextFilter, StoreError};

pub(super) const APP_SCHEMES: SchemePair =
    SchemePair::new(schemes::APP_READ_EVENTS, schemes::APP_UPDATE_EVENTS);

/// Contexts that cover one application: its teams, its own name, its pool.
pub(super) fn app_contexts(app: &Application) -> Vec<PermissionContext> {
    let mut contexts = PermissionContext::many(ContextKind::Team, app.teams.iter().cloned());
    contexts.push(PermissionContext::new(ContextKind::App, &app.name));
    contexts.push(PermissionContext::new(ContextKind::Pool, &app.pool));
    contexts
}

/// Which applications an actor may read events for.
pub(super) enum VisibleApps {
    /// No applicable context.
    Hidden,
    /// A Global context: every application, past or present.
    All,
    /// The applications the registry resolved from the actor's contexts.
    Listed(Vec<Application>),
}

/// Resolves the actor's application visibility. A Global context
/// short-circuits before the registry is consulted.
pub(super) async fn visible_apps(
    apps: &dyn ApplicationStore,
    actor: &Actor,
) -> Result<VisibleApps, StoreError> {
    let contexts = actor.contexts_for(APP_SCHEMES.read);
    if contexts.is_empty() {
        return Ok(VisibleApps::Hidden);
    }
    if contexts.iter().any(PermissionContext::is_global) {
        return Ok(VisibleApps::All);
    }
    let filter = ContextFilter::from_contexts(&contexts, ContextKind::App);
    apps.list(&filter).await.map(VisibleApps::Listed)
}

pub struct AppAuthorizer {
    apps: Arc<dyn ApplicationStore>,
}

impl AppAuthorizer {
    pub fn new(apps: Arc<dyn ApplicationStore>) -> Self {
        Self { apps }
    }
}

#[async_trait]
impl TargetAuthorizer for AppAuthorizer {
    fn kind(&self) -> TargetKind {
        TargetKind::App
    }

    #[instrument(skip_all, fields(actor = %actor.name))]
    async fn listing_scope(&self, actor: &Actor) -> Result<ListingScope, StoreError> {
        match visible_apps(self.apps.as_ref(), actor).await? {
            VisibleApps::Hidden => Ok(ListingScope::Absent),
            VisibleApps::All => Ok(ListingScope::Unrestricted),
            VisibleApps::Listed(apps) => Ok(ListingScope::resolved(
                apps.into_iter().map(|app| app.name).collect(),
            )),
        }
    }

    async fn check(
        &self,
        actor: &Actor,
        event: &Event,
        mode: AccessMode,
    ) -> Result<bool, StoreError> {
        let app = self.apps.get(&event.target.value).await?;
        Ok(actor.check(APP_SCHEMES.for_mode(mode), &app_contexts(&app)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::fixtures::{actor, ctx, event, world};
    use rstest::rstest;

    fn authorizer() -> AppAuthorizer {
        AppAuthorizer::new(world())
    }

    #[tokio::test]
    async fn test_listing_resolves_apps_through_registry() {
        let alice = actor("alice", &[("app.read.events", ctx(ContextKind::Team, "alpha"))]);
        let scope = authorizer().listing_scope(&alice).await.unwrap();
        assert_eq!(
            scope,
            ListingScope::Restricted(vec!["batch".to_string(), "web".to_string()])
        );
    }

    #[tokio::test]
    async fn test_listing_without_contexts_is_absent() {
        let nobody = actor("nobody", &[("team.read.events", ctx(ContextKind::Team, "alpha"))]);
        let scope = authorizer().listing_scope(&nobody).await.unwrap();
        assert_eq!(scope, ListingScope::Absent);
    }

    #[tokio::test]
    async fn test_listing_with_contexts_matching_no_app_is_absent() {
        let carol = actor("carol", &[("app", ctx(ContextKind::Pool, "staging"))]);
        let scope = authorizer().listing_scope(&carol).await.unwrap();
        assert_eq!(scope, ListingScope::Absent);
    }

    #[tokio::test]
    async fn test_global_context_is_unrestricted() {
        let root = actor(
            "root",
            &[
                ("app.read.events", ctx(ContextKind::Team, "alpha")),
                ("*", PermissionContext::global()),
            ],
        );
        let scope = authorizer().listing_scope(&root).await.unwrap();
        assert_eq!(scope, ListingScope::Unrestricted);
    }

    #[tokio::test]
    async fn test_global_context_skips_the_registry() {
        let catalog = world();
        catalog.set_unavailable(true);
        let root = actor("root", &[("*", PermissionContext::global())]);
        let scope = AppAuthorizer::new(catalog).listing_scope(&root).await.unwrap();
        assert_eq!(scope, ListingScope::Unrestricted);
    }

    #[rstest]
    #[case::by_team(ctx(ContextKind::Team, "alpha"), "web", true)]
    #[case::other_team(ctx(ContextKind::Team, "beta"), "web", false)]
    #[case::by_name(ctx(ContextKind::App, "api"), "api", true)]
    #[case::by_pool(ctx(ContextKind::Pool, "dev"), "batch", true)]
    #[case::other_pool(ctx(ContextKind::Pool, "dev"), "web", false)]
    #[tokio::test]
    async fn test_check_read(
        #[case] context: PermissionContext,
        #[case] app: &str,
        #[case] expected: bool,
    ) {
        let alice = actor("alice", &[("app.read.events", context)]);
        let allowed = authorizer()
            .check(&alice, &event(TargetKind::App, app), AccessMode::Read)
            .await
            .unwrap();
        assert_eq!(allowed, expected);
    }

    #[tokio::test]
    async fn test_read_grant_does_not_allow_update() {
        let alice = actor("alice", &[("app.read", ctx(ContextKind::Team, "alpha"))]);
        let allowed = authorizer()
            .check(&alice, &event(TargetKind::App, "web"), AccessMode::Update)
            .await
            .unwrap();
        assert!(!allowed);
    }

    #[tokio::test]
    async fn test_check_on_deleted_app_is_not_found() {
        let root = actor("root", &[("*", PermissionContext::global())]);
        let err = authorizer()
            .check(&root, &event(TargetKind::App, "gone"), AccessMode::Read)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
