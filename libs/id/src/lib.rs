//! # evauth-id
//!
//! Identifier types for the event authorization service.
//!
//! Every identifier is a ULID wrapped in a typed newtype and rendered as
//! `{prefix}_{ulid}`:
//!
//! - `evt_01HV4Z2WQXKJNM8GPQY6VBKC3D` for audit events
//! - `req_01HV4Z3MXNKPQR9HSTZ7WCLD4E` for request correlation
//!
//! Parsing is strict. A value with the wrong prefix is rejected even if the
//! ULID part is valid, so an event id can never be confused with a request id.

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

/// Re-export ulid for consumers that need raw ULID operations
pub use ulid::Ulid;
