//! Core service records.
//!
//! A [`Service`] is owned by exactly one store at a time. Other services
//! refer to it only through a [`Dependency`], a handle naming the provider's
//! topic and id. The provider's liveness is read on demand (see
//! [`Registry::dependency_liveness`](crate::Registry::dependency_liveness)),
//! so a consumer's view follows the provider without ever holding a
//! reference into the provider's store.

use airfone_common::{Metadata, ServiceId, ServiceStatus};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::Instant;

/// A registered service instance.
#[derive(Debug, Clone)]
pub struct Service {
    /// Registry-wide identifier; `UNASSIGNED` until registration.
    pub id: ServiceId,

    /// Topic this service provides.
    pub topic: String,

    pub ip: String,
    pub port: u16,
    pub metadata: Vec<Metadata>,

    /// Providers chosen for the dependency topics, one per resolved topic.
    pub dependencies: Vec<Dependency>,

    /// Topics this service declared it depends on.
    ///
    /// A declared topic without an entry in `dependencies` is unresolved and
    /// is retried by discovery on every heartbeat.
    pub dependency_topics: Vec<String>,

    pub status: ServiceStatus,

    /// Wall-clock registration time, informational only.
    pub registered_at: DateTime<Utc>,

    keepalive: Instant,
}

impl Service {
    /// Creates an unregistered service record for the given address.
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self {
            id: ServiceId::UNASSIGNED,
            topic: String::new(),
            ip: ip.into(),
            port,
            metadata: Vec::new(),
            dependencies: Vec::new(),
            dependency_topics: Vec::new(),
            status: ServiceStatus::Running,
            registered_at: Utc::now(),
            keepalive: Instant::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: Vec<Metadata>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_status(mut self, status: ServiceStatus) -> Self {
        self.status = status;
        self
    }

    /// Time of the last heartbeat (or insert) seen for this service.
    pub fn keepalive(&self) -> Instant {
        self.keepalive
    }

    pub(crate) fn refresh(&mut self, now: Instant) {
        self.keepalive = now;
    }

    /// Time elapsed since the last heartbeat.
    pub fn heartbeat_age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.keepalive)
    }

    /// Returns true if the last heartbeat is older than `max_age`.
    pub fn is_expired(&self, now: Instant, max_age: Duration) -> bool {
        self.heartbeat_age(now) > max_age
    }

    /// Returns the chosen provider for a dependency topic.
    pub fn dependency(&self, topic: &str) -> Option<&Dependency> {
        self.dependencies.iter().find(|d| d.topic == topic)
    }

    /// Declared dependency topics that have no chosen provider yet.
    pub fn unresolved_topics(&self) -> Vec<String> {
        self.dependency_topics
            .iter()
            .filter(|topic| self.dependency(topic).is_none())
            .cloned()
            .collect()
    }

    /// Replaces dependencies by topic key; new topics are appended.
    pub(crate) fn merge_dependencies(&mut self, refreshed: &[Dependency]) {
        for dependency in refreshed {
            match self
                .dependencies
                .iter_mut()
                .find(|d| d.topic == dependency.topic)
            {
                Some(existing) => *existing = dependency.clone(),
                None => self.dependencies.push(dependency.clone()),
            }
        }
    }
}

/// Handle to the provider chosen for one dependency topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub topic: String,
    pub id: ServiceId,
    pub ip: String,
    pub port: u16,
}

impl Dependency {
    pub(crate) fn from_provider(provider: &Service) -> Self {
        Self {
            topic: provider.topic.clone(),
            id: provider.id,
            ip: provider.ip.clone(),
            port: provider.port,
        }
    }
}

/// Provider liveness as read through a [`Dependency`] handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Liveness {
    pub status: ServiceStatus,
    pub keepalive: Instant,
}

impl Liveness {
    /// A provider is usable while it is `Running` and has heartbeated
    /// within `pending_threshold`.
    pub fn is_healthy(&self, now: Instant, pending_threshold: Duration) -> bool {
        self.status == ServiceStatus::Running
            && now.saturating_duration_since(self.keepalive) < pending_threshold
    }
}

/// Partial update applied to a stored record.
///
/// `None` leaves a field unchanged. An empty `ip` or a zero `port` also
/// leave the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ServicePatch {
    pub ip: Option<String>,
    pub port: Option<u16>,
    pub metadata: Option<Vec<Metadata>>,
    pub dependencies: Option<Vec<Dependency>>,
    pub dependency_topics: Option<Vec<String>>,
}

impl ServicePatch {
    pub(crate) fn apply(&self, service: &mut Service) {
        if let Some(ip) = self.ip.as_ref().filter(|ip| !ip.is_empty()) {
            service.ip = ip.clone();
        }
        if let Some(port) = self.port.filter(|port| *port != 0) {
            service.port = port;
        }
        if let Some(metadata) = &self.metadata {
            service.metadata = metadata.clone();
        }
        if let Some(dependencies) = &self.dependencies {
            service.dependencies = dependencies.clone();
        }
        if let Some(topics) = &self.dependency_topics {
            service.dependency_topics = topics.clone();
        }
    }
}

/// Update request for a registered service.
///
/// When `dependency_topics` is present, discovery runs again over those
/// topics and the result replaces the service's dependencies.
#[derive(Debug, Clone, Default)]
pub struct ServiceUpdate {
    pub id: ServiceId,
    pub ip: Option<String>,
    pub port: Option<u16>,
    pub metadata: Option<Vec<Metadata>>,
    pub dependency_topics: Option<Vec<String>>,
}

impl ServiceUpdate {
    pub fn new(id: ServiceId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }
}

/// Heartbeat sent by a registered service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heartbeat {
    pub topic: String,
    pub id: ServiceId,
}

impl Heartbeat {
    pub fn new(topic: impl Into<String>, id: ServiceId) -> Self {
        Self {
            topic: topic.into(),
            id,
        }
    }
}

/// Result of processing one heartbeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatOutcome {
    /// Dependencies refreshed by this heartbeat; empty when nothing changed.
    pub dependencies: Vec<Dependency>,
    pub status: ServiceStatus,
}

impl HeartbeatOutcome {
    pub fn dropped() -> Self {
        Self {
            dependencies: Vec::new(),
            status: ServiceStatus::Dropped,
        }
    }
}
