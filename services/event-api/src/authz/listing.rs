//! Combined listing filter for one actor.

use evauth_events::AllowedTargets;
use futures_util::future::try_join_all;
use tracing::{debug, instrument};

use super::{ListingScope, Registry};
use crate::permission::Actor;
use crate::store::StoreError;

/// Resolves every registered authorizer's scope and folds them into the
/// filter handed to the event store.
///
/// Authorizers run concurrently. The first failure aborts the whole
/// resolution and drops the lookups still in flight; a partial filter is
/// never returned. Kinds without an authorizer never appear in the filter,
/// so their events are never listed.
#[instrument(skip_all, fields(actor = %actor.name))]
pub async fn allowed_targets(
    registry: &Registry,
    actor: &Actor,
) -> Result<AllowedTargets, StoreError> {
    let scopes = try_join_all(registry.iter().map(|authorizer| async move {
        let scope = authorizer.listing_scope(actor).await?;
        Ok::<_, StoreError>((authorizer.kind(), scope))
    }))
    .await?;

    let mut allowed = AllowedTargets::none();
    for (kind, scope) in scopes {
        match scope {
            ListingScope::Absent => {}
            ListingScope::Unrestricted => allowed.allow_all(kind),
            // An empty restriction folds into absence.
            ListingScope::Restricted(values) => allowed.allow_only(kind, values),
        }
    }
    debug!(kinds = allowed.len(), "Resolved listing filter");
    Ok(allowed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::fixtures::{actor, ctx, world};
    use crate::authz::{IaasAuthorizer, RoleAuthorizer};
    use crate::permission::{ContextKind, PermissionContext};
    use evauth_events::{Target, TargetFilter, TargetKind, TargetValues};

    fn only(values: &[&str]) -> TargetValues {
        TargetValues::Only(values.iter().map(|v| v.to_string()).collect())
    }

    #[tokio::test]
    async fn test_team_context_on_pool_and_team_schemes() {
        let registry = Registry::standard(&world().catalog(true));
        let alice = actor(
            "alice",
            &[
                ("pool.read.events", ctx(ContextKind::Team, "alpha")),
                ("team.read.events", ctx(ContextKind::Team, "alpha")),
            ],
        );

        let allowed = allowed_targets(&registry, &alice).await.unwrap();
        let filters: Vec<&TargetFilter> = allowed.iter().collect();
        assert_eq!(filters.len(), 2);
        assert_eq!(allowed.get(TargetKind::Team).unwrap().values, only(&["alpha"]));
        assert_eq!(allowed.get(TargetKind::User).unwrap().values, only(&["alice"]));
        assert!(allowed.get(TargetKind::Pool).is_none());
        assert!(allowed.get(TargetKind::Node).is_none());
        assert!(allowed.get(TargetKind::App).is_none());
    }

    #[tokio::test]
    async fn test_global_actor_sees_every_kind() {
        let registry = Registry::standard(&world().catalog(true));
        let root = actor("root", &[("*", PermissionContext::global())]);

        let allowed = allowed_targets(&registry, &root).await.unwrap();
        for kind in TargetKind::ALL {
            let filter = allowed.get(kind).unwrap_or_else(|| panic!("{kind} missing"));
            assert_eq!(filter.values, TargetValues::Any, "{kind}");
        }
    }

    #[tokio::test]
    async fn test_global_actor_sees_targets_gone_from_the_catalog() {
        let registry = Registry::standard(&world().catalog(true));
        let root = actor("root", &[("*", PermissionContext::global())]);

        let allowed = allowed_targets(&registry, &root).await.unwrap();
        for (kind, value) in [
            (TargetKind::App, "deleted-app"),
            (TargetKind::Container, "old-unit"),
            (TargetKind::Service, "retired"),
            (TargetKind::ServiceInstance, "mysql/gone"),
            (TargetKind::Node, "10.9.9.9"),
        ] {
            assert!(allowed.permits(&Target::new(kind, value)), "{kind}:{value}");
        }
    }

    #[tokio::test]
    async fn test_actor_without_grants_only_sees_self() {
        let registry = Registry::standard(&world().catalog(true));
        let nobody = actor("nobody", &[]);

        let allowed = allowed_targets(&registry, &nobody).await.unwrap();
        assert_eq!(allowed.len(), 1);
        assert_eq!(allowed.get(TargetKind::User).unwrap().values, only(&["nobody"]));
    }

    #[tokio::test]
    async fn test_one_failing_store_fails_the_whole_listing() {
        let catalog = world();
        let registry = Registry::standard(&catalog.catalog(true));
        catalog.set_unavailable(true);
        let alice = actor("alice", &[("app.read.events", ctx(ContextKind::Team, "alpha"))]);

        let err = allowed_targets(&registry, &alice).await.unwrap_err();
        assert!(err.is_upstream());
    }

    #[tokio::test]
    async fn test_unregistered_kinds_are_skipped() {
        let registry = Registry::builder()
            .register(IaasAuthorizer)
            .register(RoleAuthorizer)
            .build();
        let root = actor("root", &[("*", PermissionContext::global())]);

        let allowed = allowed_targets(&registry, &root).await.unwrap();
        let kinds: Vec<TargetKind> = allowed.iter().map(|f| f.kind).collect();
        assert_eq!(kinds.len(), 2);
        assert!(kinds.contains(&TargetKind::Iaas));
        assert!(kinds.contains(&TargetKind::Role));
    }
}
