//! Error types for event handling.

use thiserror::Error;

/// Errors raised by the event model.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    /// The event already finished, is not cancelable, or a cancel was
    /// already requested.
    #[error("event is not cancelable")]
    NotCancelable,

    /// The target kind is not one of the known kinds.
    #[error("unknown target type: {0}")]
    UnknownTargetKind(String),

    /// A service instance identity is not of the form `service/instance`.
    #[error("invalid service instance identity: {0:?}")]
    InvalidServiceInstance(String),
}
