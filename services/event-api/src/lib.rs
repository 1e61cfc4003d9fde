//! evauth event API library.
//!
//! This crate primarily ships an `event-api` binary, but we expose a small
//! library surface to enable integration testing and reuse.

pub mod api;
pub mod authz;
pub mod config;
pub mod db;
pub mod permission;
pub mod state;
pub mod store;
