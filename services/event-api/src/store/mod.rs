//! Interfaces onto the stores this service reads from.
//!
//! The authorization core never talks to a database directly. Each resource
//! kind it must resolve is reached through one injected trait object, so the
//! core can be exercised against [`memory`] stores and deployed against the
//! Postgres implementations in [`crate::db`].

mod error;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use evauth_events::{AllowedTargets, Event, EventFilter, ServiceInstanceRef};
use evauth_id::EventId;
use serde::{Deserialize, Serialize};

use crate::permission::{ContextKind, Grant, PermissionContext};

pub use error::StoreError;

/// An application: a named workload owned by teams and placed in one pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub name: String,
    pub pool: String,
    #[serde(default)]
    pub teams: Vec<String>,
}

/// One execution unit (container) of an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: String,
    pub app: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub name: String,
    #[serde(default)]
    pub teams: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    #[serde(default)]
    pub owner_teams: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub service: String,
    pub name: String,
    #[serde(default)]
    pub teams: Vec<String>,
}

impl ServiceInstance {
    /// Composite `service/instance` identity used as an event target value.
    pub fn identity(&self) -> String {
        ServiceInstanceRef::new(&self.service, &self.name).to_string()
    }
}

/// A provisioner node, addressed by its endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub address: String,
    pub pool: String,
}

/// Listing restriction derived from a set of permission contexts.
///
/// An entity is admitted when the filter is unrestricted, when one of its
/// teams or its pool is listed, or when its own identity is listed. Point
/// checks evaluate the same three scopes, which keeps listing and access
/// decisions consistent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextFilter {
    pub unrestricted: bool,
    pub teams: Vec<String>,
    pub pools: Vec<String>,
    pub names: Vec<String>,
}

impl ContextFilter {
    /// Builds a filter where `own` is the context kind naming the entity
    /// itself (App for applications, Service for services, ...).
    pub fn from_contexts(contexts: &[PermissionContext], own: ContextKind) -> Self {
        let mut filter = Self::default();
        for ctx in contexts {
            match ctx.kind {
                ContextKind::Global => {
                    return Self {
                        unrestricted: true,
                        ..Self::default()
                    };
                }
                ContextKind::Team => filter.teams.push(ctx.value.clone()),
                ContextKind::Pool => filter.pools.push(ctx.value.clone()),
                kind if kind == own => filter.names.push(ctx.value.clone()),
                _ => {}
            }
        }
        filter
    }

    pub fn admits(&self, name: &str, teams: &[String], pool: Option<&str>) -> bool {
        self.unrestricted
            || self.names.iter().any(|n| n == name)
            || teams.iter().any(|t| self.teams.contains(t))
            || pool.is_some_and(|p| self.pools.iter().any(|allowed| allowed == p))
    }
}

#[async_trait]
pub trait ApplicationStore: Send + Sync {
    async fn list(&self, filter: &ContextFilter) -> Result<Vec<Application>, StoreError>;

    async fn get(&self, name: &str) -> Result<Application, StoreError>;

    /// Current execution units of one application.
    async fn units(&self, app: &str) -> Result<Vec<Unit>, StoreError>;

    /// The application owning a unit.
    async fn app_for_unit(&self, unit_id: &str) -> Result<Application, StoreError>;
}

#[async_trait]
pub trait TeamStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<Team, StoreError>;
}

#[async_trait]
pub trait PoolStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<Pool, StoreError>;
}

#[async_trait]
pub trait ServiceStore: Send + Sync {
    async fn list(&self, filter: &ContextFilter) -> Result<Vec<Service>, StoreError>;

    async fn get(&self, name: &str) -> Result<Service, StoreError>;
}

#[async_trait]
pub trait ServiceInstanceStore: Send + Sync {
    async fn list(&self, filter: &ContextFilter) -> Result<Vec<ServiceInstance>, StoreError>;

    async fn get(&self, id: &ServiceInstanceRef) -> Result<ServiceInstance, StoreError>;
}

/// Node listing, offered only by provisioners that manage nodes.
#[async_trait]
pub trait NodeProvisioner: Send + Sync {
    /// Lists nodes, optionally restricted to the given addresses.
    async fn list_nodes(&self, addresses: Option<&[String]>) -> Result<Vec<Node>, StoreError>;
}

/// Source of the grants an actor holds.
#[async_trait]
pub trait GrantStore: Send + Sync {
    async fn grants_for(&self, actor: &str) -> Result<Vec<Grant>, StoreError>;
}

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Events matching `filter` whose target is admitted by `allowed`,
    /// newest first.
    async fn list(
        &self,
        filter: &EventFilter,
        allowed: &AllowedTargets,
    ) -> Result<Vec<Event>, StoreError>;

    async fn get(&self, id: EventId) -> Result<Option<Event>, StoreError>;

    /// Records a cancel request on a running event.
    ///
    /// Fails with `StoreError::Event(EventError::NotCancelable)` when the
    /// event no longer accepts one.
    async fn try_cancel(
        &self,
        id: EventId,
        reason: &str,
        requested_by: &str,
    ) -> Result<(), StoreError>;

    /// Distinct event kind names present in the store.
    async fn kinds(&self) -> Result<Vec<String>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// The resource stores the authorization plugins resolve against.
#[derive(Clone)]
pub struct Catalog {
    pub apps: Arc<dyn ApplicationStore>,
    pub teams: Arc<dyn TeamStore>,
    pub pools: Arc<dyn PoolStore>,
    pub services: Arc<dyn ServiceStore>,
    pub service_instances: Arc<dyn ServiceInstanceStore>,
    /// `None` when the provisioner cannot list nodes.
    pub nodes: Option<Arc<dyn NodeProvisioner>>,
}
