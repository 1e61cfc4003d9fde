//! Node events.
//!
//! Nodes carry no contexts of their own; they are scoped by the pool they
//! belong to, under the pool schemes. Only provisioners that can list nodes
//! make node events visible at all.

use std::sync::Arc;

use async_trait::async_trait;
use evauth_events::{Event, TargetKind};
use tracing::instrument;

use super::pool::POOL_SCHEMES;
use super::{AccessMode, ListingScope, TargetAuthorizer};
use crate::permission::{Actor, ContextKind, PermissionContext};
use crate::store::{NodeProvisioner, StoreError};

pub struct NodeAuthorizer {
    nodes: Option<Arc<dyn NodeProvisioner>>,
}

impl NodeAuthorizer {
    pub fn new(nodes: Option<Arc<dyn NodeProvisioner>>) -> Self {
        Self { nodes }
    }
}

#[async_trait]
impl TargetAuthorizer for NodeAuthorizer {
    fn kind(&self) -> TargetKind {
        TargetKind::Node
    }

    #[instrument(skip_all, fields(actor = %actor.name))]
    async fn listing_scope(&self, actor: &Actor) -> Result<ListingScope, StoreError> {
        let Some(provisioner) = &self.nodes else {
            return Ok(ListingScope::Absent);
        };
        let contexts = actor.contexts_for(POOL_SCHEMES.read);
        if contexts.is_empty() {
            return Ok(ListingScope::Absent);
        }
        if contexts.iter().any(PermissionContext::is_global) {
            return Ok(ListingScope::Unrestricted);
        }

        let pools: Vec<&str> = contexts
            .iter()
            .filter(|ctx| ctx.kind == ContextKind::Pool)
            .map(|ctx| ctx.value.as_str())
            .collect();
        if pools.is_empty() {
            return Ok(ListingScope::Restricted(Vec::new()));
        }

        let addresses = provisioner
            .list_nodes(None)
            .await?
            .into_iter()
            .filter(|node| pools.contains(&node.pool.as_str()))
            .map(|node| node.address)
            .collect();
        Ok(ListingScope::Restricted(addresses))
    }

    async fn check(
        &self,
        actor: &Actor,
        event: &Event,
        mode: AccessMode,
    ) -> Result<bool, StoreError> {
        let Some(provisioner) = &self.nodes else {
            return Ok(false);
        };
        let address = std::slice::from_ref(&event.target.value);
        let node = provisioner
            .list_nodes(Some(address))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::not_found("node", &event.target.value))?;
        Ok(actor.check(
            POOL_SCHEMES.for_mode(mode),
            &[PermissionContext::new(ContextKind::Pool, node.pool)],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::fixtures::{actor, ctx, event, world};
    use crate::store::memory::MemoryCatalog;

    fn with_provisioner() -> NodeAuthorizer {
        let nodes: Arc<dyn NodeProvisioner> = world();
        NodeAuthorizer::new(Some(nodes))
    }

    #[tokio::test]
    async fn test_listing_keeps_nodes_of_allowed_pools() {
        let ops = actor("ops", &[("pool.read.events", ctx(ContextKind::Pool, "dev"))]);
        assert_eq!(
            with_provisioner().listing_scope(&ops).await.unwrap(),
            ListingScope::Restricted(vec!["10.0.0.2".to_string()])
        );
    }

    #[tokio::test]
    async fn test_global_pool_context_is_unrestricted() {
        let root = actor("root", &[("pool", PermissionContext::global())]);
        assert_eq!(
            with_provisioner().listing_scope(&root).await.unwrap(),
            ListingScope::Unrestricted
        );
    }

    #[tokio::test]
    async fn test_without_node_listing_nothing_is_visible() {
        let authorizer = NodeAuthorizer::new(None);
        let root = actor("root", &[("*", PermissionContext::global())]);
        assert_eq!(
            authorizer.listing_scope(&root).await.unwrap(),
            ListingScope::Absent
        );
        let evt = event(TargetKind::Node, "10.0.0.1");
        assert!(!authorizer.check(&root, &evt, AccessMode::Read).await.unwrap());
    }

    #[tokio::test]
    async fn test_check_resolves_node_pool() {
        let authorizer = with_provisioner();
        let ops = actor("ops", &[("pool.update", ctx(ContextKind::Pool, "prod"))]);

        let prod_node = event(TargetKind::Node, "10.0.0.1");
        assert!(authorizer.check(&ops, &prod_node, AccessMode::Update).await.unwrap());

        let dev_node = event(TargetKind::Node, "10.0.0.2");
        assert!(!authorizer.check(&ops, &dev_node, AccessMode::Update).await.unwrap());

        let unknown = event(TargetKind::Node, "10.9.9.9");
        let err = authorizer
            .check(&ops, &unknown, AccessMode::Update)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_unreachable_provisioner_fails_listing() {
        let catalog = MemoryCatalog::new();
        catalog.set_unavailable(true);
        let nodes: Arc<dyn NodeProvisioner> = Arc::new(catalog);
        let authorizer = NodeAuthorizer::new(Some(nodes));
        let ops = actor("ops", &[("pool", ctx(ContextKind::Pool, "prod"))]);
        let err = authorizer.listing_scope(&ops).await.unwrap_err();
        assert!(err.is_upstream());
    }
}
