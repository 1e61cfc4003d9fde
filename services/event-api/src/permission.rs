//! Permission contexts, schemes, and the grant predicate.
//!
//! An actor holds grants: a permission name bound to one context. A grant on
//! `app` covers `app.read.events`, `app.update.events`, and every other scheme
//! under `app.`; the root permission `*` covers everything. A Global context
//! subsumes every other context.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of scope a permission is granted over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContextKind {
    Global,
    Team,
    Pool,
    App,
    Service,
    ServiceInstance,
    Iaas,
    User,
    Role,
}

impl ContextKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextKind::Global => "global",
            ContextKind::Team => "team",
            ContextKind::Pool => "pool",
            ContextKind::App => "app",
            ContextKind::Service => "service",
            ContextKind::ServiceInstance => "service-instance",
            ContextKind::Iaas => "iaas",
            ContextKind::User => "user",
            ContextKind::Role => "role",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "global" => ContextKind::Global,
            "team" => ContextKind::Team,
            "pool" => ContextKind::Pool,
            "app" => ContextKind::App,
            "service" => ContextKind::Service,
            "service-instance" => ContextKind::ServiceInstance,
            "iaas" => ContextKind::Iaas,
            "user" => ContextKind::User,
            "role" => ContextKind::Role,
            _ => return None,
        })
    }
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scope over which a permission is held.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionContext {
    pub kind: ContextKind,
    /// Empty for Global.
    #[serde(default)]
    pub value: String,
}

impl PermissionContext {
    pub fn new(kind: ContextKind, value: impl Into<String>) -> Self {
        let value = match kind {
            ContextKind::Global => String::new(),
            _ => value.into(),
        };
        Self { kind, value }
    }

    pub fn global() -> Self {
        Self::new(ContextKind::Global, "")
    }

    pub fn is_global(&self) -> bool {
        self.kind == ContextKind::Global
    }

    /// One context of `kind` per value.
    pub fn many<I, S>(kind: ContextKind, values: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        values.into_iter().map(|v| Self::new(kind, v)).collect()
    }
}

impl fmt::Display for PermissionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_global() {
            f.write_str("global")
        } else {
            write!(f, "{}:{}", self.kind, self.value)
        }
    }
}

/// A named capability, e.g. `app.read.events`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Scheme(&'static str);

impl Scheme {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }

    /// Whether a grant on `permission` covers this scheme.
    pub fn is_covered_by(&self, permission: &str) -> bool {
        if permission == ROOT_PERMISSION || permission == self.0 {
            return true;
        }
        self.0
            .strip_prefix(permission)
            .is_some_and(|rest| rest.starts_with('.'))
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Permission name that covers every scheme.
pub const ROOT_PERMISSION: &str = "*";

pub mod schemes {
    use super::Scheme;

    pub const APP_READ_EVENTS: Scheme = Scheme::new("app.read.events");
    pub const APP_UPDATE_EVENTS: Scheme = Scheme::new("app.update.events");
    pub const TEAM_READ_EVENTS: Scheme = Scheme::new("team.read.events");
    pub const TEAM_UPDATE_EVENTS: Scheme = Scheme::new("team.update.events");
    pub const SERVICE_READ_EVENTS: Scheme = Scheme::new("service.read.events");
    pub const SERVICE_UPDATE_EVENTS: Scheme = Scheme::new("service.update.events");
    pub const SERVICE_INSTANCE_READ_EVENTS: Scheme =
        Scheme::new("service-instance.read.events");
    pub const SERVICE_INSTANCE_UPDATE_EVENTS: Scheme =
        Scheme::new("service-instance.update.events");
    pub const POOL_READ_EVENTS: Scheme = Scheme::new("pool.read.events");
    pub const POOL_UPDATE_EVENTS: Scheme = Scheme::new("pool.update.events");
    pub const USER_READ_EVENTS: Scheme = Scheme::new("user.read.events");
    pub const USER_UPDATE_EVENTS: Scheme = Scheme::new("user.update.events");
    pub const MACHINE_READ_EVENTS: Scheme = Scheme::new("machine.read.events");
    pub const MACHINE_UPDATE_EVENTS: Scheme = Scheme::new("machine.update.events");
    pub const ROLE_READ_EVENTS: Scheme = Scheme::new("role.read.events");
    pub const ROLE_UPDATE_EVENTS: Scheme = Scheme::new("role.update.events");
}

/// One permission bound to one context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub permission: String,
    pub context: PermissionContext,
}

impl Grant {
    pub fn new(permission: impl Into<String>, context: PermissionContext) -> Self {
        Self {
            permission: permission.into(),
            context,
        }
    }
}

/// The authenticated identity making a request, with its resolved grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub name: String,
    pub grants: Vec<Grant>,
}

impl Actor {
    pub fn new(name: impl Into<String>, grants: Vec<Grant>) -> Self {
        Self {
            name: name.into(),
            grants,
        }
    }

    /// Contexts in which the actor holds `scheme`, in grant order.
    pub fn contexts_for(&self, scheme: Scheme) -> Vec<PermissionContext> {
        let mut contexts: Vec<PermissionContext> = Vec::new();
        for grant in &self.grants {
            if scheme.is_covered_by(&grant.permission) && !contexts.contains(&grant.context) {
                contexts.push(grant.context.clone());
            }
        }
        contexts
    }

    /// Whether the actor holds `scheme` in any of `contexts`.
    ///
    /// A Global grant satisfies every check, including one with no contexts.
    pub fn check(&self, scheme: Scheme, contexts: &[PermissionContext]) -> bool {
        self.grants
            .iter()
            .filter(|grant| scheme.is_covered_by(&grant.permission))
            .any(|grant| grant.context.is_global() || contexts.contains(&grant.context))
    }
}
