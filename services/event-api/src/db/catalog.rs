//! Resource catalog and grant store over the platform's registry tables.

use async_trait::async_trait;
use evauth_events::ServiceInstanceRef;
use sqlx::postgres::PgPool;
use tracing::warn;

use super::DbError;
use crate::permission::{ContextKind, Grant, PermissionContext};
use crate::store::{
    Application, ApplicationStore, ContextFilter, GrantStore, Node, NodeProvisioner, Pool,
    PoolStore, Service, ServiceInstance, ServiceInstanceStore, ServiceStore, StoreError, Team,
    TeamStore, Unit,
};

/// Read-only view over the `apps`, `app_units`, `teams`, `pools`,
/// `services`, `service_instances`, `nodes` and `grants` tables.
#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn app_from_row((name, pool, teams): (String, String, Vec<String>)) -> Application {
    Application { name, pool, teams }
}

#[async_trait]
impl ApplicationStore for PgCatalog {
    async fn list(&self, filter: &ContextFilter) -> Result<Vec<Application>, StoreError> {
        let rows: Vec<(String, String, Vec<String>)> = sqlx::query_as(
            r#"
            SELECT name, pool, teams
            FROM apps
            WHERE $1 OR name = ANY($2) OR pool = ANY($3) OR teams && $4
            ORDER BY name
            "#,
        )
        .bind(filter.unrestricted)
        .bind(&filter.names)
        .bind(&filter.pools)
        .bind(&filter.teams)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)?;

        Ok(rows.into_iter().map(app_from_row).collect())
    }

    async fn get(&self, name: &str) -> Result<Application, StoreError> {
        let row: Option<(String, String, Vec<String>)> =
            sqlx::query_as("SELECT name, pool, teams FROM apps WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await
                .map_err(DbError::Query)?;

        row.map(app_from_row)
            .ok_or_else(|| StoreError::not_found("app", name))
    }

    async fn units(&self, app: &str) -> Result<Vec<Unit>, StoreError> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT unit_id FROM app_units WHERE app_name = $1 ORDER BY unit_id")
                .bind(app)
                .fetch_all(&self.pool)
                .await
                .map_err(DbError::Query)?;

        Ok(ids
            .into_iter()
            .map(|id| Unit {
                id,
                app: app.to_string(),
            })
            .collect())
    }

    async fn app_for_unit(&self, unit_id: &str) -> Result<Application, StoreError> {
        let row: Option<(String, String, Vec<String>)> = sqlx::query_as(
            r#"
            SELECT a.name, a.pool, a.teams
            FROM app_units u
            JOIN apps a ON a.name = u.app_name
            WHERE u.unit_id = $1
            "#,
        )
        .bind(unit_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::Query)?;

        row.map(app_from_row)
            .ok_or_else(|| StoreError::not_found("unit", unit_id))
    }
}

#[async_trait]
impl TeamStore for PgCatalog {
    async fn get(&self, name: &str) -> Result<Team, StoreError> {
        let found: Option<String> = sqlx::query_scalar("SELECT name FROM teams WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::Query)?;

        found
            .map(|name| Team { name })
            .ok_or_else(|| StoreError::not_found("team", name))
    }
}

#[async_trait]
impl PoolStore for PgCatalog {
    async fn get(&self, name: &str) -> Result<Pool, StoreError> {
        let row: Option<(String, Vec<String>)> =
            sqlx::query_as("SELECT name, teams FROM pools WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await
                .map_err(DbError::Query)?;

        row.map(|(name, teams)| Pool { name, teams })
            .ok_or_else(|| StoreError::not_found("pool", name))
    }
}

#[async_trait]
impl ServiceStore for PgCatalog {
    async fn list(&self, filter: &ContextFilter) -> Result<Vec<Service>, StoreError> {
        let rows: Vec<(String, Vec<String>)> = sqlx::query_as(
            r#"
            SELECT name, owner_teams
            FROM services
            WHERE $1 OR name = ANY($2) OR owner_teams && $3
            ORDER BY name
            "#,
        )
        .bind(filter.unrestricted)
        .bind(&filter.names)
        .bind(&filter.teams)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)?;

        Ok(rows
            .into_iter()
            .map(|(name, owner_teams)| Service { name, owner_teams })
            .collect())
    }

    async fn get(&self, name: &str) -> Result<Service, StoreError> {
        let row: Option<(String, Vec<String>)> =
            sqlx::query_as("SELECT name, owner_teams FROM services WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await
                .map_err(DbError::Query)?;

        row.map(|(name, owner_teams)| Service { name, owner_teams })
            .ok_or_else(|| StoreError::not_found("service", name))
    }
}

#[async_trait]
impl ServiceInstanceStore for PgCatalog {
    async fn list(&self, filter: &ContextFilter) -> Result<Vec<ServiceInstance>, StoreError> {
        let rows: Vec<(String, String, Vec<String>)> = sqlx::query_as(
            r#"
            SELECT service_name, name, teams
            FROM service_instances
            WHERE $1 OR (service_name || '/' || name) = ANY($2) OR teams && $3
            ORDER BY service_name, name
            "#,
        )
        .bind(filter.unrestricted)
        .bind(&filter.names)
        .bind(&filter.teams)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)?;

        Ok(rows
            .into_iter()
            .map(|(service, name, teams)| ServiceInstance {
                service,
                name,
                teams,
            })
            .collect())
    }

    async fn get(&self, id: &ServiceInstanceRef) -> Result<ServiceInstance, StoreError> {
        let row: Option<(String, String, Vec<String>)> = sqlx::query_as(
            r#"
            SELECT service_name, name, teams
            FROM service_instances
            WHERE service_name = $1 AND name = $2
            "#,
        )
        .bind(&id.service)
        .bind(&id.instance)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::Query)?;

        row.map(|(service, name, teams)| ServiceInstance {
            service,
            name,
            teams,
        })
        .ok_or_else(|| StoreError::not_found("service instance", id.to_string()))
    }
}

#[async_trait]
impl NodeProvisioner for PgCatalog {
    async fn list_nodes(&self, addresses: Option<&[String]>) -> Result<Vec<Node>, StoreError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT address, pool
            FROM nodes
            WHERE $1::text[] IS NULL OR address = ANY($1)
            ORDER BY address
            "#,
        )
        .bind(addresses.map(<[String]>::to_vec))
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)?;

        Ok(rows
            .into_iter()
            .map(|(address, pool)| Node { address, pool })
            .collect())
    }
}

#[async_trait]
impl GrantStore for PgCatalog {
    async fn grants_for(&self, actor: &str) -> Result<Vec<Grant>, StoreError> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            r#"
            SELECT permission, context_kind, context_value
            FROM grants
            WHERE actor = $1
            ORDER BY grant_id
            "#,
        )
        .bind(actor)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)?;

        let mut grants = Vec::with_capacity(rows.len());
        for (permission, kind, value) in rows {
            let Some(kind) = ContextKind::parse(&kind) else {
                warn!(actor = %actor, context_kind = %kind, "Skipping grant with unknown context kind");
                continue;
            };
            grants.push(Grant::new(permission, PermissionContext::new(kind, value)));
        }
        Ok(grants)
    }
}
