//! Postgres event store.
//!
//! The event store provides:
//! - Listing under a caller filter and a permission-derived target filter
//! - Point reads by event id
//! - Cancel requests as a single conditional update
//! - The distinct set of event kinds

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use evauth_events::{
    AllowedTargets, CancelInfo, Event, EventError, EventFilter, Target, TargetKind, TargetValues,
};
use evauth_id::EventId;
use sqlx::{
    postgres::{PgPool, PgRow},
    Postgres, QueryBuilder, Row,
};

use super::DbError;
use crate::store::{EventStore, StoreError};

const EVENT_COLUMNS: &str = "id, target_type, target_value, kind, owner, start_time, end_time, \
     running, cancelable, cancel_reason, cancel_requested_by, cancel_requested_at, \
     custom_data, error";

/// A row from the events table.
#[derive(Debug, Clone)]
pub struct EventRow {
    pub id: String,
    pub target_type: String,
    pub target_value: String,
    pub kind: String,
    pub owner: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub running: bool,
    pub cancelable: bool,
    pub cancel_reason: Option<String>,
    pub cancel_requested_by: Option<String>,
    pub cancel_requested_at: Option<DateTime<Utc>>,
    pub custom_data: serde_json::Value,
    pub error: Option<String>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for EventRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            target_type: row.try_get("target_type")?,
            target_value: row.try_get("target_value")?,
            kind: row.try_get("kind")?,
            owner: row.try_get("owner")?,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
            running: row.try_get("running")?,
            cancelable: row.try_get("cancelable")?,
            cancel_reason: row.try_get("cancel_reason")?,
            cancel_requested_by: row.try_get("cancel_requested_by")?,
            cancel_requested_at: row.try_get("cancel_requested_at")?,
            custom_data: row.try_get("custom_data")?,
            error: row.try_get("error")?,
        })
    }
}

impl TryFrom<EventRow> for Event {
    type Error = DbError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let id = row.id.parse::<EventId>().map_err(|e| DbError::Decode {
            column: "id",
            message: e.to_string(),
        })?;
        let kind = row
            .target_type
            .parse::<TargetKind>()
            .map_err(|e| DbError::Decode {
                column: "target_type",
                message: e.to_string(),
            })?;
        let cancel_info = match (
            row.cancel_reason,
            row.cancel_requested_by,
            row.cancel_requested_at,
        ) {
            (Some(reason), Some(requested_by), Some(requested_at)) => Some(CancelInfo {
                reason,
                requested_by,
                requested_at,
            }),
            _ => None,
        };

        Ok(Event {
            id,
            target: Target::new(kind, row.target_value),
            kind: row.kind,
            owner: row.owner,
            start_time: row.start_time,
            end_time: row.end_time,
            running: row.running,
            cancelable: row.cancelable,
            cancel_info,
            custom_data: row.custom_data,
            error: row.error,
        })
    }
}

/// Event store over the `events` table.
#[derive(Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persists a new event. Events are written by the components performing
    /// actions; this is exposed for seeding and tests.
    pub async fn insert(&self, event: &Event) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO events (
                id, target_type, target_value, kind, owner, start_time, end_time,
                running, cancelable, custom_data, error
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(event.id.to_string())
        .bind(event.target.kind.as_str())
        .bind(&event.target.value)
        .bind(&event.kind)
        .bind(&event.owner)
        .bind(event.start_time)
        .bind(event.end_time)
        .bind(event.running)
        .bind(event.cancelable)
        .bind(&event.custom_data)
        .bind(&event.error)
        .execute(&self.pool)
        .await
        .map_err(DbError::Query)?;
        Ok(())
    }
}

/// Builds the listing query for a caller filter under a permission filter.
fn list_query<'a>(
    filter: &'a EventFilter,
    allowed: &'a AllowedTargets,
) -> QueryBuilder<'a, Postgres> {
    let mut builder = QueryBuilder::new(format!("SELECT {EVENT_COLUMNS} FROM events WHERE "));
    push_allowed_targets(&mut builder, allowed);

    if let Some(kind) = filter.target_type {
        builder.push(" AND target_type = ").push_bind(kind.as_str());
    }
    if let Some(value) = filter.target_value.as_deref() {
        builder.push(" AND target_value = ").push_bind(value);
    }
    if let Some(kind) = filter.kind.as_deref() {
        builder.push(" AND kind = ").push_bind(kind);
    }
    if let Some(owner) = filter.owner.as_deref() {
        builder.push(" AND owner = ").push_bind(owner);
    }
    if let Some(running) = filter.running {
        builder.push(" AND running = ").push_bind(running);
    }
    if let Some(since) = filter.since {
        builder.push(" AND start_time >= ").push_bind(since);
    }
    if let Some(until) = filter.until {
        builder.push(" AND start_time <= ").push_bind(until);
    }

    builder
        .push(" ORDER BY start_time DESC, id DESC LIMIT ")
        .push_bind(i64::from(filter.effective_limit()))
        .push(" OFFSET ")
        .push_bind(i64::from(filter.effective_skip()));
    builder
}

/// Renders the permission filter as a parenthesised disjunction.
///
/// An empty filter renders as `FALSE`: no visible kinds means no events.
fn push_allowed_targets<'a>(
    builder: &mut QueryBuilder<'a, Postgres>,
    allowed: &'a AllowedTargets,
) {
    if allowed.is_empty() {
        builder.push("FALSE");
        return;
    }

    builder.push("(");
    for (i, target) in allowed.iter().enumerate() {
        if i > 0 {
            builder.push(" OR ");
        }
        builder
            .push("(target_type = ")
            .push_bind(target.kind.as_str());
        if let TargetValues::Only(values) = &target.values {
            builder.push(" AND target_value = ANY(").push_bind(values).push(")");
        }
        builder.push(")");
    }
    builder.push(")");
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn list(
        &self,
        filter: &EventFilter,
        allowed: &AllowedTargets,
    ) -> Result<Vec<Event>, StoreError> {
        let mut query = list_query(filter, allowed);
        let rows = query
            .build_query_as::<EventRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::Query)?;

        let events = rows
            .into_iter()
            .map(Event::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    async fn get(&self, id: EventId) -> Result<Option<Event>, StoreError> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::Query)?;

        Ok(row.map(Event::try_from).transpose()?)
    }

    async fn try_cancel(
        &self,
        id: EventId,
        reason: &str,
        requested_by: &str,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE events
            SET cancel_reason = $2,
                cancel_requested_by = $3,
                cancel_requested_at = now()
            WHERE id = $1
              AND cancelable
              AND running
              AND cancel_requested_at IS NULL
            "#,
        )
        .bind(id.to_string())
        .bind(reason)
        .bind(requested_by)
        .execute(&self.pool)
        .await
        .map_err(DbError::Query)?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM events WHERE id = $1)")
                .bind(id.to_string())
                .fetch_one(&self.pool)
                .await
                .map_err(DbError::Query)?;

        if exists {
            Err(EventError::NotCancelable.into())
        } else {
            Err(StoreError::not_found("event", id.to_string()))
        }
    }

    async fn kinds(&self) -> Result<Vec<String>, StoreError> {
        let kinds: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT kind FROM events ORDER BY kind")
                .fetch_all(&self.pool)
                .await
                .map_err(DbError::Query)?;
        Ok(kinds)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(DbError::Query)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_allowed_targets_render_false() {
        let filter = EventFilter::default();
        let allowed = AllowedTargets::none();
        let query = list_query(&filter, &allowed);
        assert!(query.sql().contains("WHERE FALSE ORDER BY"));
    }

    #[test]
    fn allowed_targets_render_one_clause_per_kind() {
        let filter = EventFilter {
            owner: Some("alice".to_string()),
            ..Default::default()
        };
        let mut allowed = AllowedTargets::none();
        allowed.allow_all(TargetKind::Team);
        allowed.allow_only(TargetKind::App, vec!["web".to_string()]);

        let query = list_query(&filter, &allowed);
        let sql = query.sql();
        assert!(sql.contains(
            "((target_type = $1 AND target_value = ANY($2)) OR (target_type = $3))"
        ));
        assert!(sql.contains("AND owner = $4"));
        assert!(sql.ends_with("LIMIT $5 OFFSET $6"));
    }

    #[test]
    fn row_with_unknown_target_type_fails_to_decode() {
        let row = EventRow {
            id: EventId::new().to_string(),
            target_type: "cluster".to_string(),
            target_value: "c1".to_string(),
            kind: "cluster.create".to_string(),
            owner: "root".to_string(),
            start_time: Utc::now(),
            end_time: None,
            running: false,
            cancelable: false,
            cancel_reason: None,
            cancel_requested_by: None,
            cancel_requested_at: None,
            custom_data: serde_json::Value::Null,
            error: None,
        };
        let err = Event::try_from(row).unwrap_err();
        assert!(matches!(err, DbError::Decode { column: "target_type", .. }));
    }

    #[test]
    fn row_with_cancel_columns_carries_cancel_info() {
        let now = Utc::now();
        let row = EventRow {
            id: EventId::new().to_string(),
            target_type: "app".to_string(),
            target_value: "web".to_string(),
            kind: "app.deploy".to_string(),
            owner: "alice".to_string(),
            start_time: now,
            end_time: None,
            running: true,
            cancelable: true,
            cancel_reason: Some("stuck".to_string()),
            cancel_requested_by: Some("bob".to_string()),
            cancel_requested_at: Some(now),
            custom_data: serde_json::json!({ "image": "web:v2" }),
            error: None,
        };
        let event = Event::try_from(row).unwrap();
        assert!(!event.accepts_cancel());
        assert_eq!(event.cancel_info.unwrap().requested_by, "bob");
    }
}
