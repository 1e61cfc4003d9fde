//! Store error types.

use evauth_events::EventError;
use thiserror::Error;

use crate::db::DbError;

/// Errors returned by any store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced resource does not exist.
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// The store could not be reached or refused the call.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Database(#[from] DbError),

    /// The event model rejected a state transition.
    #[error(transparent)]
    Event(#[from] EventError),
}

impl StoreError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        StoreError::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// True for infrastructural failures, as opposed to domain outcomes.
    pub fn is_upstream(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Database(_))
    }
}
