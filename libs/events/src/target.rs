//! Event targets: the typed resource an event acted upon.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::EventError;

/// Kind of resource an event targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TargetKind {
    #[serde(rename = "app")]
    App,
    #[serde(rename = "team")]
    Team,
    #[serde(rename = "service")]
    Service,
    #[serde(rename = "service-instance")]
    ServiceInstance,
    #[serde(rename = "pool")]
    Pool,
    #[serde(rename = "user")]
    User,
    #[serde(rename = "container")]
    Container,
    #[serde(rename = "node")]
    Node,
    #[serde(rename = "iaas")]
    Iaas,
    #[serde(rename = "role")]
    Role,
}

impl TargetKind {
    /// Every target kind, in a stable order.
    pub const ALL: [TargetKind; 10] = [
        TargetKind::App,
        TargetKind::Team,
        TargetKind::Service,
        TargetKind::ServiceInstance,
        TargetKind::Pool,
        TargetKind::User,
        TargetKind::Container,
        TargetKind::Node,
        TargetKind::Iaas,
        TargetKind::Role,
    ];

    /// Wire name of the kind, as stored and as accepted in query strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::App => "app",
            TargetKind::Team => "team",
            TargetKind::Service => "service",
            TargetKind::ServiceInstance => "service-instance",
            TargetKind::Pool => "pool",
            TargetKind::User => "user",
            TargetKind::Container => "container",
            TargetKind::Node => "node",
            TargetKind::Iaas => "iaas",
            TargetKind::Role => "role",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetKind {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TargetKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| EventError::UnknownTargetKind(s.to_string()))
    }
}

/// The resource an event acted upon.
///
/// `value` is kind-specific: an app name, a pool name, a node address, a
/// container (unit) id, or `service/instance` for service instances.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    #[serde(rename = "type")]
    pub kind: TargetKind,
    pub value: String,
}

impl Target {
    pub fn new(kind: TargetKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.value)
    }
}

/// Composite identity of a service instance: `service/instance`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceInstanceRef {
    pub service: String,
    pub instance: String,
}

impl ServiceInstanceRef {
    pub fn new(service: impl Into<String>, instance: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            instance: instance.into(),
        }
    }
}

impl fmt::Display for ServiceInstanceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service, self.instance)
    }
}

impl FromStr for ServiceInstanceRef {
    type Err = EventError;

    /// Splits on the first `/`; the instance part may itself contain `/`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((service, instance)) if !service.is_empty() && !instance.is_empty() => {
                Ok(Self::new(service, instance))
            }
            _ => Err(EventError::InvalidServiceInstance(s.to_string())),
        }
    }
}
