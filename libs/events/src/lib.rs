//! # evauth-events
//!
//! The audit event model shared by the event store and the authorization
//! layer.
//!
//! ## Design Principles
//!
//! - Every event acted upon exactly one [`Target`], a typed resource reference
//! - Target kinds form a closed set; adding one is a compile-time change
//! - The event owns its cancel transition ([`Event::try_cancel`])
//! - Listing filters keep "every instance" and "these instances" apart
//!   ([`TargetValues`]) instead of overloading an empty list
//!
//! ## Filters
//!
//! Two filters travel with a listing request:
//! - [`EventFilter`] is decoded from caller input (kind, owner, time range, ...)
//! - [`AllowedTargets`] is computed by the server from the caller's
//!   permissions and is never caller-controlled

mod error;
mod event;
mod filter;
mod target;

pub use error::EventError;
pub use event::*;
pub use filter::*;
pub use target::*;
