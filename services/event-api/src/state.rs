//! Application state shared across request handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::authz::Registry;
use crate::store::{Catalog, EventStore, GrantStore};

/// Shared application state.
///
/// This is passed to all request handlers via Axum's state extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    events: Arc<dyn EventStore>,
    grants: Arc<dyn GrantStore>,
    registry: Registry,
    authz_timeout: Duration,
}

impl AppState {
    /// Create a new application state. The authorizer registry is built
    /// here, once, over `catalog`.
    pub fn new(
        events: Arc<dyn EventStore>,
        grants: Arc<dyn GrantStore>,
        catalog: &Catalog,
        authz_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                events,
                grants,
                registry: Registry::standard(catalog),
                authz_timeout,
            }),
        }
    }

    pub fn events(&self) -> &dyn EventStore {
        self.inner.events.as_ref()
    }

    pub fn grants(&self) -> &dyn GrantStore {
        self.inner.grants.as_ref()
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// Upper bound on the authorization step of one request.
    pub fn authz_timeout(&self) -> Duration {
        self.inner.authz_timeout
    }
}
