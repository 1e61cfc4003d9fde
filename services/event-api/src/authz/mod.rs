//! Event authorization.
//!
//! Every target kind has one [`TargetAuthorizer`] that knows how to bridge
//! an actor's permission contexts to concrete resources of that kind. It
//! answers two questions:
//!
//! - Which targets of this kind may the actor list? ([`ListingScope`])
//! - May the actor read or update one given event?
//!
//! Authorizers are collected in a [`Registry`] built once at startup and
//! shared read-only by every request.

mod access;
mod app;
mod cancel;
mod container;
mod iaas;
mod listing;
mod node;
mod pool;
mod role;
mod service;
mod service_instance;
mod team;
mod user;

#[cfg(test)]
pub(crate) mod fixtures;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use evauth_events::{Event, TargetKind};

use crate::permission::{Actor, ContextKind, PermissionContext, Scheme};
use crate::store::{Catalog, StoreError};

pub use access::check_event_access;
pub use app::AppAuthorizer;
pub use cancel::{cancel_event, CancelError};
pub use container::ContainerAuthorizer;
pub use iaas::IaasAuthorizer;
pub use listing::allowed_targets;
pub use node::NodeAuthorizer;
pub use pool::PoolAuthorizer;
pub use role::RoleAuthorizer;
pub use service::ServiceAuthorizer;
pub use service_instance::ServiceInstanceAuthorizer;
pub use team::TeamAuthorizer;
pub use user::UserAuthorizer;

/// Whether an event is being looked at or acted upon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Update,
}

impl AccessMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMode::Read => "read",
            AccessMode::Update => "update",
        }
    }
}

/// What an actor may list for one target kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingScope {
    /// No visibility into the kind at all.
    Absent,
    /// Every target of the kind.
    Unrestricted,
    /// Only the listed target values. May be empty.
    Restricted(Vec<String>),
}

impl ListingScope {
    /// Scope for kinds whose target values are the context values
    /// themselves: Global wins outright, otherwise the values of every
    /// `own` context are collected. No contexts at all means `Absent`.
    pub fn from_contexts(contexts: &[PermissionContext], own: ContextKind) -> Self {
        if contexts.is_empty() {
            return ListingScope::Absent;
        }
        let mut values = Vec::new();
        for ctx in contexts {
            if ctx.is_global() {
                return ListingScope::Unrestricted;
            }
            if ctx.kind == own {
                values.push(ctx.value.clone());
            }
        }
        ListingScope::Restricted(values)
    }

    /// Scope for kinds resolved through an owning store: an empty
    /// resolution is `Absent` even when contexts existed.
    pub fn resolved(values: Vec<String>) -> Self {
        if values.is_empty() {
            ListingScope::Absent
        } else {
            ListingScope::Restricted(values)
        }
    }
}

/// The read and update schemes guarding one target kind.
#[derive(Debug, Clone, Copy)]
pub struct SchemePair {
    pub read: Scheme,
    pub update: Scheme,
}

impl SchemePair {
    pub const fn new(read: Scheme, update: Scheme) -> Self {
        Self { read, update }
    }

    pub fn for_mode(&self, mode: AccessMode) -> Scheme {
        match mode {
            AccessMode::Read => self.read,
            AccessMode::Update => self.update,
        }
    }
}

/// Authorization logic for events targeting one kind of resource.
#[async_trait]
pub trait TargetAuthorizer: Send + Sync {
    /// The target kind this authorizer handles.
    fn kind(&self) -> TargetKind;

    /// Resolves which targets of this kind the actor may list.
    async fn listing_scope(&self, actor: &Actor) -> Result<ListingScope, StoreError>;

    /// Decides whether the actor may access one event of this kind.
    ///
    /// The event's target is re-resolved against its owning store, so a
    /// target that no longer exists fails with [`StoreError::NotFound`].
    async fn check(
        &self,
        actor: &Actor,
        event: &Event,
        mode: AccessMode,
    ) -> Result<bool, StoreError>;
}

/// Immutable mapping from target kind to its authorizer.
pub struct Registry {
    authorizers: BTreeMap<TargetKind, Arc<dyn TargetAuthorizer>>,
}

impl Registry {
    /// A registry with one authorizer per target kind, resolving against
    /// `catalog`.
    pub fn standard(catalog: &Catalog) -> Self {
        Self::builder()
            .register(AppAuthorizer::new(catalog.apps.clone()))
            .register(TeamAuthorizer::new(catalog.teams.clone()))
            .register(ServiceAuthorizer::new(catalog.services.clone()))
            .register(ServiceInstanceAuthorizer::new(
                catalog.service_instances.clone(),
            ))
            .register(PoolAuthorizer::new(catalog.pools.clone()))
            .register(UserAuthorizer)
            .register(ContainerAuthorizer::new(catalog.apps.clone()))
            .register(NodeAuthorizer::new(catalog.nodes.clone()))
            .register(IaasAuthorizer)
            .register(RoleAuthorizer)
            .build()
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// The authorizer for `kind`, if one is registered.
    pub fn get(&self, kind: TargetKind) -> Option<&Arc<dyn TargetAuthorizer>> {
        self.authorizers.get(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn TargetAuthorizer>> {
        self.authorizers.values()
    }

    pub fn kinds(&self) -> Vec<TargetKind> {
        self.authorizers.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.authorizers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.authorizers.is_empty()
    }
}

#[derive(Default)]
pub struct RegistryBuilder {
    authorizers: BTreeMap<TargetKind, Arc<dyn TargetAuthorizer>>,
}

impl RegistryBuilder {
    /// Adds an authorizer, replacing any earlier one for the same kind.
    pub fn register(mut self, authorizer: impl TargetAuthorizer + 'static) -> Self {
        self.authorizers.insert(authorizer.kind(), Arc::new(authorizer));
        self
    }

    pub fn build(self) -> Registry {
        Registry {
            authorizers: self.authorizers,
        }
    }
}
