//! Point access checks on single events.

use evauth_events::Event;
use tracing::debug;

use super::{AccessMode, Registry};
use crate::permission::Actor;
use crate::store::StoreError;

/// Dispatches to the authorizer registered for the event's target kind.
///
/// An event whose kind has no authorizer is denied.
pub async fn check_event_access(
    registry: &Registry,
    actor: &Actor,
    event: &Event,
    mode: AccessMode,
) -> Result<bool, StoreError> {
    let Some(authorizer) = registry.get(event.target.kind) else {
        debug!(
            target_type = %event.target.kind,
            event_id = %event.id,
            "No authorizer registered for target kind"
        );
        return Ok(false);
    };

    let allowed = authorizer.check(actor, event, mode).await?;
    debug!(
        actor = %actor.name,
        event_id = %event.id,
        target_type = %event.target.kind,
        mode = mode.as_str(),
        allowed,
        "Checked event access"
    );
    Ok(allowed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::fixtures::{actor, ctx, event, world};
    use crate::authz::{allowed_targets, ListingScope, TeamAuthorizer};
    use crate::permission::{ContextKind, PermissionContext};
    use evauth_events::{TargetKind, TargetValues};

    #[tokio::test]
    async fn test_unregistered_kind_is_denied() {
        let registry = Registry::builder().register(TeamAuthorizer::new(world())).build();
        let root = actor("root", &[("*", PermissionContext::global())]);

        let evt = event(TargetKind::App, "web");
        assert!(!check_event_access(&registry, &root, &evt, AccessMode::Read)
            .await
            .unwrap());

        let team = event(TargetKind::Team, "alpha");
        assert!(check_event_access(&registry, &root, &team, AccessMode::Read)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_global_actor_reads_every_kind() {
        let registry = Registry::standard(&world().catalog(true));
        let root = actor("root", &[("*", PermissionContext::global())]);

        for (kind, value) in [
            (TargetKind::App, "web"),
            (TargetKind::Team, "alpha"),
            (TargetKind::Service, "mysql"),
            (TargetKind::ServiceInstance, "redis/cache"),
            (TargetKind::Pool, "dev"),
            (TargetKind::User, "someone"),
            (TargetKind::Container, "api-1"),
            (TargetKind::Node, "10.0.0.2"),
            (TargetKind::Iaas, "ec2"),
            (TargetKind::Role, "admin"),
        ] {
            let evt = event(kind, value);
            assert!(
                check_event_access(&registry, &root, &evt, AccessMode::Update)
                    .await
                    .unwrap(),
                "{kind} denied"
            );
        }
    }

    #[tokio::test]
    async fn test_no_app_contexts_denies_app_events() {
        let registry = Registry::standard(&world().catalog(true));
        let alice = actor("alice", &[("team", ctx(ContextKind::Team, "alpha"))]);
        let evt = event(TargetKind::App, "web");
        assert!(!check_event_access(&registry, &alice, &evt, AccessMode::Read)
            .await
            .unwrap());
    }

    /// Whatever a restricted listing admits, a read check admits too.
    #[tokio::test]
    async fn test_listing_and_access_are_consistent() {
        let registry = Registry::standard(&world().catalog(true));
        let actors = [
            actor("alice", &[("app", ctx(ContextKind::Team, "alpha"))]),
            actor("bob", &[("service-instance", ctx(ContextKind::Team, "beta"))]),
            actor(
                "carol",
                &[
                    ("pool", ctx(ContextKind::Pool, "dev")),
                    ("app.read.events", ctx(ContextKind::Pool, "prod")),
                    ("service", ctx(ContextKind::Service, "redis")),
                    ("machine", ctx(ContextKind::Iaas, "ec2")),
                    ("user", ctx(ContextKind::User, "dave")),
                    ("role", ctx(ContextKind::Role, "deployer")),
                ],
            ),
        ];

        for actor in &actors {
            let allowed = allowed_targets(&registry, actor).await.unwrap();
            for filter in allowed.iter() {
                let TargetValues::Only(values) = &filter.values else {
                    continue;
                };
                for value in values {
                    let evt = event(filter.kind, value);
                    let ok = check_event_access(&registry, actor, &evt, AccessMode::Read)
                        .await
                        .unwrap();
                    assert!(ok, "{} listed {}:{} but cannot read it", actor.name, filter.kind, value);
                }
            }

            for authorizer in registry.iter() {
                if let ListingScope::Restricted(values) =
                    authorizer.listing_scope(actor).await.unwrap()
                {
                    for value in values {
                        let evt = event(authorizer.kind(), &value);
                        assert!(authorizer.check(actor, &evt, AccessMode::Read).await.unwrap());
                    }
                }
            }
        }
    }
}
