//! User events.
//!
//! Every actor sees the events targeting their own user, whatever grants
//! they hold. Updating them still requires a grant.

use async_trait::async_trait;
use evauth_events::{Event, TargetKind};

use super::{AccessMode, ListingScope, SchemePair, TargetAuthorizer};
use crate::permission::{schemes, Actor, ContextKind, PermissionContext};
use crate::store::StoreError;

const USER_SCHEMES: SchemePair =
    SchemePair::new(schemes::USER_READ_EVENTS, schemes::USER_UPDATE_EVENTS);

pub struct UserAuthorizer;

#[async_trait]
impl TargetAuthorizer for UserAuthorizer {
    fn kind(&self) -> TargetKind {
        TargetKind::User
    }

    async fn listing_scope(&self, actor: &Actor) -> Result<ListingScope, StoreError> {
        let contexts = actor.contexts_for(USER_SCHEMES.read);
        let mut values = vec![actor.name.clone()];
        match ListingScope::from_contexts(&contexts, ContextKind::User) {
            ListingScope::Unrestricted => return Ok(ListingScope::Unrestricted),
            ListingScope::Restricted(granted) => {
                values.extend(granted.into_iter().filter(|v| *v != actor.name));
            }
            ListingScope::Absent => {}
        }
        Ok(ListingScope::Restricted(values))
    }

    async fn check(
        &self,
        actor: &Actor,
        event: &Event,
        mode: AccessMode,
    ) -> Result<bool, StoreError> {
        if mode == AccessMode::Read && event.target.value == actor.name {
            return Ok(true);
        }
        Ok(actor.check(
            USER_SCHEMES.for_mode(mode),
            &[PermissionContext::new(ContextKind::User, &event.target.value)],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::fixtures::{actor, ctx, event};
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_user_contexts_extend_self_scope() {
        let alice = actor(
            "alice",
            &[
                ("user.read.events", ctx(ContextKind::User, "bob")),
                ("user.read.events", ctx(ContextKind::User, "alice")),
            ],
        );
        assert_eq!(
            UserAuthorizer.listing_scope(&alice).await.unwrap(),
            ListingScope::Restricted(vec!["alice".to_string(), "bob".to_string()])
        );
        let bob = event(TargetKind::User, "bob");
        assert!(UserAuthorizer.check(&alice, &bob, AccessMode::Read).await.unwrap());
        assert!(!UserAuthorizer.check(&alice, &bob, AccessMode::Update).await.unwrap());
    }

    #[tokio::test]
    async fn test_global_user_grant_is_unrestricted() {
        let root = actor("root", &[("user", PermissionContext::global())]);
        assert_eq!(
            UserAuthorizer.listing_scope(&root).await.unwrap(),
            ListingScope::Unrestricted
        );
    }

    proptest! {
        #[test]
        fn every_actor_sees_own_user_events(name in "[a-z][a-z0-9.@-]{0,16}") {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let nobody = actor(&name, &[]);

            let scope = rt.block_on(UserAuthorizer.listing_scope(&nobody)).unwrap();
            prop_assert_eq!(scope, ListingScope::Restricted(vec![name.clone()]));

            let own = event(TargetKind::User, &name);
            let allowed = rt
                .block_on(UserAuthorizer.check(&nobody, &own, AccessMode::Read))
                .unwrap();
            prop_assert!(allowed);
        }
    }
}
