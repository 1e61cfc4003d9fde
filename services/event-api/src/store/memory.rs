//! In-process store implementations.
//!
//! Backs the `memory` store mode of the binary (seeded from a JSON file) and
//! the test suites. Every resource kind lives in one [`MemoryCatalog`]; events
//! live in a [`MemoryEventStore`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::Context as _;
use async_trait::async_trait;
use chrono::Utc;
use evauth_events::{AllowedTargets, Event, EventFilter, ServiceInstanceRef};
use evauth_id::EventId;
use serde::Deserialize;
use tracing::debug;

use super::{
    Application, ApplicationStore, Catalog, ContextFilter, EventStore, GrantStore, Node,
    NodeProvisioner, Pool, PoolStore, Service, ServiceInstance, ServiceInstanceStore,
    ServiceStore, StoreError, Team, TeamStore, Unit,
};
use crate::permission::Grant;

/// Initial content for the memory stores.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Seed {
    pub apps: Vec<Application>,
    pub units: Vec<Unit>,
    pub teams: Vec<Team>,
    pub pools: Vec<Pool>,
    pub services: Vec<Service>,
    pub service_instances: Vec<ServiceInstance>,
    pub nodes: Vec<Node>,
    /// Grants keyed by actor name.
    pub grants: BTreeMap<String, Vec<Grant>>,
    pub events: Vec<Event>,
}

impl Seed {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read seed file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse seed file {}", path.display()))
    }
}

#[derive(Default)]
struct CatalogData {
    apps: BTreeMap<String, Application>,
    units: Vec<Unit>,
    teams: BTreeMap<String, Team>,
    pools: BTreeMap<String, Pool>,
    services: BTreeMap<String, Service>,
    instances: Vec<ServiceInstance>,
    nodes: Vec<Node>,
    grants: HashMap<String, Vec<Grant>>,
}

/// Every resource store, held in memory.
#[derive(Default)]
pub struct MemoryCatalog {
    data: RwLock<CatalogData>,
    unavailable: AtomicBool,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: &Seed) -> Self {
        let catalog = Self::new();
        for app in &seed.apps {
            catalog.add_app(app.clone());
        }
        for unit in &seed.units {
            catalog.add_unit(unit.clone());
        }
        for team in &seed.teams {
            catalog.add_team(&team.name);
        }
        for pool in &seed.pools {
            catalog.add_pool(pool.clone());
        }
        for service in &seed.services {
            catalog.add_service(service.clone());
        }
        for si in &seed.service_instances {
            catalog.add_service_instance(si.clone());
        }
        for node in &seed.nodes {
            catalog.add_node(node.clone());
        }
        for (actor, grants) in &seed.grants {
            for grant in grants {
                catalog.grant(actor, grant.clone());
            }
        }
        catalog
    }

    /// Makes every subsequent call fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn add_app(&self, app: Application) {
        self.write(|data| {
            data.apps.insert(app.name.clone(), app);
        });
    }

    pub fn add_unit(&self, unit: Unit) {
        self.write(|data| data.units.push(unit));
    }

    pub fn add_team(&self, name: &str) {
        self.write(|data| {
            data.teams.insert(
                name.to_string(),
                Team {
                    name: name.to_string(),
                },
            );
        });
    }

    pub fn add_pool(&self, pool: Pool) {
        self.write(|data| {
            data.pools.insert(pool.name.clone(), pool);
        });
    }

    pub fn add_service(&self, service: Service) {
        self.write(|data| {
            data.services.insert(service.name.clone(), service);
        });
    }

    pub fn add_service_instance(&self, instance: ServiceInstance) {
        self.write(|data| data.instances.push(instance));
    }

    pub fn add_node(&self, node: Node) {
        self.write(|data| data.nodes.push(node));
    }

    pub fn grant(&self, actor: &str, grant: Grant) {
        self.write(|data| {
            data.grants.entry(actor.to_string()).or_default().push(grant);
        });
    }

    /// A [`Catalog`] whose stores are all backed by this instance.
    pub fn catalog(self: &Arc<Self>, node_listing: bool) -> Catalog {
        Catalog {
            apps: self.clone(),
            teams: self.clone(),
            pools: self.clone(),
            services: self.clone(),
            service_instances: self.clone(),
            nodes: node_listing.then(|| self.clone() as Arc<dyn NodeProvisioner>),
        }
    }

    fn write(&self, f: impl FnOnce(&mut CatalogData)) {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut data);
    }

    fn read<T>(&self, f: impl FnOnce(&CatalogData) -> T) -> Result<T, StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "memory catalog marked unavailable".to_string(),
            ));
        }
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        Ok(f(&data))
    }
}

#[async_trait]
impl ApplicationStore for MemoryCatalog {
    async fn list(&self, filter: &ContextFilter) -> Result<Vec<Application>, StoreError> {
        self.read(|data| {
            data.apps
                .values()
                .filter(|app| filter.admits(&app.name, &app.teams, Some(&app.pool)))
                .cloned()
                .collect()
        })
    }

    async fn get(&self, name: &str) -> Result<Application, StoreError> {
        self.read(|data| data.apps.get(name).cloned())?
            .ok_or_else(|| StoreError::not_found("app", name))
    }

    async fn units(&self, app: &str) -> Result<Vec<Unit>, StoreError> {
        self.read(|data| {
            data.units
                .iter()
                .filter(|unit| unit.app == app)
                .cloned()
                .collect()
        })
    }

    async fn app_for_unit(&self, unit_id: &str) -> Result<Application, StoreError> {
        self.read(|data| {
            data.units
                .iter()
                .find(|unit| unit.id == unit_id)
                .and_then(|unit| data.apps.get(&unit.app).cloned())
        })?
        .ok_or_else(|| StoreError::not_found("unit", unit_id))
    }
}

#[async_trait]
impl TeamStore for MemoryCatalog {
    async fn get(&self, name: &str) -> Result<Team, StoreError> {
        self.read(|data| data.teams.get(name).cloned())?
            .ok_or_else(|| StoreError::not_found("team", name))
    }
}

#[async_trait]
impl PoolStore for MemoryCatalog {
    async fn get(&self, name: &str) -> Result<Pool, StoreError> {
        self.read(|data| data.pools.get(name).cloned())?
            .ok_or_else(|| StoreError::not_found("pool", name))
    }
}

#[async_trait]
impl ServiceStore for MemoryCatalog {
    async fn list(&self, filter: &ContextFilter) -> Result<Vec<Service>, StoreError> {
        self.read(|data| {
            data.services
                .values()
                .filter(|s| filter.admits(&s.name, &s.owner_teams, None))
                .cloned()
                .collect()
        })
    }

    async fn get(&self, name: &str) -> Result<Service, StoreError> {
        self.read(|data| data.services.get(name).cloned())?
            .ok_or_else(|| StoreError::not_found("service", name))
    }
}

#[async_trait]
impl ServiceInstanceStore for MemoryCatalog {
    async fn list(&self, filter: &ContextFilter) -> Result<Vec<ServiceInstance>, StoreError> {
        self.read(|data| {
            data.instances
                .iter()
                .filter(|si| filter.admits(&si.identity(), &si.teams, None))
                .cloned()
                .collect()
        })
    }

    async fn get(&self, id: &ServiceInstanceRef) -> Result<ServiceInstance, StoreError> {
        self.read(|data| {
            data.instances
                .iter()
                .find(|si| si.service == id.service && si.name == id.instance)
                .cloned()
        })?
        .ok_or_else(|| StoreError::not_found("service instance", id.to_string()))
    }
}

#[async_trait]
impl NodeProvisioner for MemoryCatalog {
    async fn list_nodes(&self, addresses: Option<&[String]>) -> Result<Vec<Node>, StoreError> {
        self.read(|data| {
            data.nodes
                .iter()
                .filter(|node| addresses.is_none_or(|wanted| wanted.contains(&node.address)))
                .cloned()
                .collect()
        })
    }
}

#[async_trait]
impl GrantStore for MemoryCatalog {
    async fn grants_for(&self, actor: &str) -> Result<Vec<Grant>, StoreError> {
        self.read(|data| data.grants.get(actor).cloned().unwrap_or_default())
    }
}

/// Event log held in memory.
#[derive(Default)]
pub struct MemoryEventStore {
    events: RwLock<Vec<Event>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: impl IntoIterator<Item = Event>) -> Self {
        let store = Self::new();
        for event in events {
            store.insert(event);
        }
        store
    }

    pub fn insert(&self, event: Event) {
        self.events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    /// Marks a stored event as finished.
    pub fn finish(&self, id: EventId) {
        let mut events = self.events.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(event) = events.iter_mut().find(|e| e.id == id) {
            event.finish(Utc::now(), None);
        }
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn list(
        &self,
        filter: &EventFilter,
        allowed: &AllowedTargets,
    ) -> Result<Vec<Event>, StoreError> {
        let events = self.events.read().unwrap_or_else(PoisonError::into_inner);
        let mut matched: Vec<Event> = events
            .iter()
            .filter(|e| allowed.permits(&e.target) && filter.matches(e))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.start_time.cmp(&a.start_time).then(b.id.cmp(&a.id)));
        Ok(matched
            .into_iter()
            .skip(filter.effective_skip() as usize)
            .take(filter.effective_limit() as usize)
            .collect())
    }

    async fn get(&self, id: EventId) -> Result<Option<Event>, StoreError> {
        let events = self.events.read().unwrap_or_else(PoisonError::into_inner);
        Ok(events.iter().find(|e| e.id == id).cloned())
    }

    async fn try_cancel(
        &self,
        id: EventId,
        reason: &str,
        requested_by: &str,
    ) -> Result<(), StoreError> {
        let mut events = self.events.write().unwrap_or_else(PoisonError::into_inner);
        let event = events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| StoreError::not_found("event", id.to_string()))?;
        event.try_cancel(reason, requested_by, Utc::now())?;
        debug!(event_id = %id, requested_by = %requested_by, "Cancel requested");
        Ok(())
    }

    async fn kinds(&self) -> Result<Vec<String>, StoreError> {
        let events = self.events.read().unwrap_or_else(PoisonError::into_inner);
        let kinds: BTreeSet<&str> = events.iter().map(|e| e.kind.as_str()).collect();
        Ok(kinds.into_iter().map(str::to_string).collect())
    }
}
