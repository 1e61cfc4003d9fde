//! Shared test world for the authorizer tests.

use std::sync::Arc;

use evauth_events::{Event, Target, TargetKind};

use crate::permission::{Actor, ContextKind, Grant, PermissionContext};
use crate::store::memory::MemoryCatalog;
use crate::store::{Application, Node, Pool, Service, ServiceInstance, Unit};

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

pub fn ctx(kind: ContextKind, value: &str) -> PermissionContext {
    PermissionContext::new(kind, value)
}

pub fn actor(name: &str, grants: &[(&str, PermissionContext)]) -> Actor {
    Actor::new(
        name,
        grants
            .iter()
            .map(|(permission, context)| Grant::new(*permission, context.clone()))
            .collect(),
    )
}

pub fn event(kind: TargetKind, value: &str) -> Event {
    Event::start(Target::new(kind, value), "test.action", "tester")
}

/// Teams `alpha` and `beta`; pools `prod` (alpha) and `dev` (beta);
/// apps `web` (prod, alpha), `api` (dev, beta), `batch` (dev, alpha);
/// units `web-1`, `web-2`, `api-1`; services `mysql` (alpha) and `redis`
/// (beta); instances `mysql/db1` (alpha), `mysql/db2` (beta),
/// `redis/cache` (beta); nodes `10.0.0.1` (prod) and `10.0.0.2` (dev).
pub fn world() -> Arc<MemoryCatalog> {
    let catalog = MemoryCatalog::new();
    catalog.add_team("alpha");
    catalog.add_team("beta");

    for (name, teams) in [("prod", ["alpha"]), ("dev", ["beta"])] {
        catalog.add_pool(Pool {
            name: name.to_string(),
            teams: strings(&teams),
        });
    }

    for (name, pool, team) in [
        ("web", "prod", "alpha"),
        ("api", "dev", "beta"),
        ("batch", "dev", "alpha"),
    ] {
        catalog.add_app(Application {
            name: name.to_string(),
            pool: pool.to_string(),
            teams: strings(&[team]),
        });
    }

    for (id, app) in [("web-1", "web"), ("web-2", "web"), ("api-1", "api")] {
        catalog.add_unit(Unit {
            id: id.to_string(),
            app: app.to_string(),
        });
    }

    for (name, team) in [("mysql", "alpha"), ("redis", "beta")] {
        catalog.add_service(Service {
            name: name.to_string(),
            owner_teams: strings(&[team]),
        });
    }

    for (service, name, team) in [
        ("mysql", "db1", "alpha"),
        ("mysql", "db2", "beta"),
        ("redis", "cache", "beta"),
    ] {
        catalog.add_service_instance(ServiceInstance {
            service: service.to_string(),
            name: name.to_string(),
            teams: strings(&[team]),
        });
    }

    for (address, pool) in [("10.0.0.1", "prod"), ("10.0.0.2", "dev")] {
        catalog.add_node(Node {
            address: address.to_string(),
            pool: pool.to_string(),
        });
    }

    Arc::new(catalog)
}
