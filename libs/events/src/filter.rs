//! Listing filters: caller-supplied criteria and permission-derived targets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Event, Target, TargetKind};

/// Caller-supplied listing criteria.
///
/// Decoded straight from query strings. Allowed targets are not part of it;
/// the server attaches them, so a caller can only narrow the result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EventFilter {
    pub target_type: Option<TargetKind>,
    pub target_value: Option<String>,
    /// Exact event kind name.
    pub kind: Option<String>,
    pub owner: Option<String>,
    pub running: Option<bool>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub skip: Option<u32>,
}

impl EventFilter {
    pub const DEFAULT_LIMIT: u32 = 100;
    pub const MAX_LIMIT: u32 = 500;

    /// Page size after applying the default and clamping.
    pub fn effective_limit(&self) -> u32 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    pub fn effective_skip(&self) -> u32 {
        self.skip.unwrap_or(0)
    }

    /// Whether `event` satisfies every non-pagination criterion.
    pub fn matches(&self, event: &Event) -> bool {
        if self.target_type.is_some_and(|kind| kind != event.target.kind) {
            return false;
        }
        if self
            .target_value
            .as_deref()
            .is_some_and(|value| value != event.target.value)
        {
            return false;
        }
        if self.kind.as_deref().is_some_and(|kind| kind != event.kind) {
            return false;
        }
        if self.owner.as_deref().is_some_and(|owner| owner != event.owner) {
            return false;
        }
        if self.running.is_some_and(|running| running != event.running) {
            return false;
        }
        if self.since.is_some_and(|since| event.start_time < since) {
            return false;
        }
        if self.until.is_some_and(|until| event.start_time > until) {
            return false;
        }
        true
    }
}

/// Which instances of one target kind are visible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetValues {
    /// Every instance of the kind.
    Any,
    /// Only the listed instances. Never empty inside [`AllowedTargets`].
    Only(Vec<String>),
}

/// Visibility for one target kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetFilter {
    pub kind: TargetKind,
    pub values: TargetValues,
}

impl TargetFilter {
    pub fn permits(&self, target: &Target) -> bool {
        if target.kind != self.kind {
            return false;
        }
        match &self.values {
            TargetValues::Any => true,
            TargetValues::Only(values) => values.iter().any(|v| *v == target.value),
        }
    }
}

/// The union of per-kind visibility for one actor.
///
/// A kind without an entry is entirely hidden. An empty set therefore hides
/// every event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AllowedTargets {
    filters: Vec<TargetFilter>,
}

impl AllowedTargets {
    /// A filter that admits nothing.
    pub fn none() -> Self {
        Self::default()
    }

    /// Grants visibility on every instance of `kind`.
    pub fn allow_all(&mut self, kind: TargetKind) {
        self.insert(TargetFilter {
            kind,
            values: TargetValues::Any,
        });
    }

    /// Grants visibility on the listed instances of `kind`.
    ///
    /// An empty list leaves the kind hidden; it never produces an entry.
    pub fn allow_only(&mut self, kind: TargetKind, values: Vec<String>) {
        if values.is_empty() {
            return;
        }
        self.insert(TargetFilter {
            kind,
            values: TargetValues::Only(values),
        });
    }

    fn insert(&mut self, filter: TargetFilter) {
        self.filters.retain(|f| f.kind != filter.kind);
        self.filters.push(filter);
        self.filters.sort_by_key(|f| f.kind);
    }

    pub fn get(&self, kind: TargetKind) -> Option<&TargetFilter> {
        self.filters.iter().find(|f| f.kind == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetFilter> {
        self.filters.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn permits(&self, target: &Target) -> bool {
        self.filters.iter().any(|f| f.permits(target))
    }
}
