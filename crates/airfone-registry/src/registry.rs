//! The registry: topic namespace, id allocation and the top-level operations.
//!
//! # Rust Learning Note
//!
//! The topic map is a `DashMap<String, Arc<Topic>>`. A DashMap guard locks a
//! shard of the map, so it must never be held while calling into a topic
//! (a topic operation may run discovery, which reads the map again):
//!
//! ```rust,ignore
//! // Clone the Arc out; the shard guard is dropped at the end of the statement.
//! let topic = self.topics.get(name).map(|t| Arc::clone(t.value()));
//! ```
//!
//! Every public operation takes `now` explicitly. The registry never reads
//! the clock on its own, which keeps the heartbeat state machine testable
//! with plain `Instant` arithmetic.

use crate::config::RegistryConfig;
use crate::discovery::{self, Discovery, ProviderPool};
use crate::service::{
    Dependency, Heartbeat, HeartbeatOutcome, Liveness, Service, ServicePatch, ServiceUpdate,
};
use crate::sweep::SweepScheduler;
use crate::topic::{Topic, TopicSnapshot};
use airfone_common::{Error, Result, ResultExt, ServiceId, ServiceStatus};
use dashmap::mapref::entry::{Entry, VacantEntry};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info};

/// Process-wide service registry.
#[derive(Debug)]
pub struct Registry {
    topics: DashMap<String, Arc<Topic>>,
    next_id: AtomicU32,
    config: RegistryConfig,
    scheduler: SweepScheduler,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl Registry {
    /// Creates an empty registry. Topic sweeps run on the tokio runtime the
    /// topics are first referenced from.
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            topics: DashMap::new(),
            next_id: AtomicU32::new(1),
            config,
            scheduler: SweepScheduler::new(config.heartbeat_interval),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Hands out the next identifier. Zero is never produced and the counter
    /// never wraps; once `u32::MAX` is reached registration fails.
    fn allocate_id(&self) -> Result<ServiceId> {
        self.next_id
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |next| next.checked_add(1))
            .map(ServiceId::new)
            .map_err(|_| Error::Internal("service identifiers exhausted".to_string()))
    }

    /// Looks up an existing topic.
    pub fn topic(&self, name: &str) -> Result<Arc<Topic>> {
        self.topics
            .get(name)
            .map(|topic| Arc::clone(topic.value()))
            .ok_or_else(|| Error::topic_not_found(name))
    }

    /// Looks up a topic, creating it and starting its sweep if absent.
    pub fn topic_or_create(&self, name: &str) -> Arc<Topic> {
        if let Some(topic) = self.topics.get(name) {
            return Arc::clone(topic.value());
        }

        let created = match self.topics.entry(name.to_string()) {
            Entry::Occupied(entry) => return Arc::clone(entry.get()),
            Entry::Vacant(entry) => self.insert_topic(entry, name),
        };

        debug!(topic = %name, "Created topic");
        created
    }

    /// Creates a topic explicitly; fails if it already exists.
    pub fn add_topic(&self, name: &str) -> Result<Arc<Topic>> {
        match self.topics.entry(name.to_string()) {
            Entry::Occupied(_) => Err(Error::already_exists(format!("topic {}", name))),
            Entry::Vacant(entry) => Ok(self.insert_topic(entry, name)),
        }
    }

    /// Inserts a new topic and starts its sweep while the map shard is still
    /// locked, so a concurrent `remove_topic` sees both or neither.
    fn insert_topic(&self, entry: VacantEntry<'_, String, Arc<Topic>>, name: &str) -> Arc<Topic> {
        let topic = Arc::new(Topic::new(name, self.config));
        let _shard = entry.insert(Arc::clone(&topic));
        self.scheduler.schedule(Arc::clone(&topic));
        topic
    }

    /// Deletes a topic with all its services and stops its sweep.
    pub fn remove_topic(&self, name: &str) -> Result<()> {
        let (_, removed) = self
            .topics
            .remove(name)
            .ok_or_else(|| Error::topic_not_found(name))?;
        self.scheduler.cancel(&removed);
        info!(topic = %name, "Removed topic");
        Ok(())
    }

    /// Names of all topics, sorted.
    pub fn topics(&self) -> Vec<String> {
        let mut names: Vec<String> = self.topics.iter().map(|t| t.key().clone()).collect();
        names.sort();
        names
    }

    pub fn snapshot(&self, name: &str) -> Result<TopicSnapshot> {
        Ok(self.topic(name)?.snapshot())
    }

    /// Registers a service under `topic`.
    ///
    /// The service lands in `pending` if any dependency topic has no healthy
    /// provider, otherwise in `running`.
    pub fn register(
        &self,
        topic: &str,
        now: Instant,
        mut service: Service,
        dependency_topics: &[String],
    ) -> Result<Service> {
        if service.status == ServiceStatus::Dropped {
            return Err(Error::already_dropped(topic));
        }
        if topic.is_empty() {
            return Err(Error::validation("topic name must not be empty"));
        }

        let target = self.topic_or_create(topic);
        service.topic = topic.to_string();
        service.dependency_topics = dependency_topics.to_vec();
        self.discover(now, &mut service, dependency_topics);
        service.id = self.allocate_id()?;

        let registered = if service.status.is_running_placement() {
            target.add_running(now, service)?
        } else {
            target.add_pending(now, service)?
        };

        info!(
            topic = %topic,
            id = %registered.id,
            status = %registered.status,
            "Registered service"
        );
        Ok(registered)
    }

    /// Applies a partial update to a registered service.
    ///
    /// A pending service is resurrected and the update retried once. New
    /// dependency topics are resolved before the update is applied.
    pub fn update(&self, topic: &str, now: Instant, update: ServiceUpdate) -> Result<Service> {
        let target = self.topic_or_create(topic);
        let id = update.id;

        let mut patch = ServicePatch {
            ip: update.ip,
            port: update.port,
            metadata: update.metadata,
            ..ServicePatch::default()
        };
        let rediscovered = update.dependency_topics.map(|topics| {
            let found = discovery::discover(self, now, &topics);
            patch.dependencies = Some(found.dependencies.clone());
            patch.dependency_topics = Some(topics);
            found
        });

        let invalid = || Error::invalid_update(topic, id, "service is not registered");
        let mut service = match target.update_running(now, id, &patch) {
            Ok(service) => service,
            Err(e) if e.is_not_found() => {
                target.resurrect(now, id).map_err(|_| invalid())?;
                target.update_running(now, id, &patch).map_err(|_| invalid())?
            }
            Err(e) => return Err(e),
        };

        if let Some(found) = rediscovered {
            target
                .modify(id, |s| s.status = found.status)
                .ok_or_else(invalid)?;
            service = self.place(&target, now, id, found.status)?;
        }

        info!(topic = %topic, id = %id, status = %service.status, "Updated service");
        Ok(service)
    }

    /// Removes a service from its topic for good.
    pub fn logout(&self, topic: &str, now: Instant, id: ServiceId) -> Result<Service> {
        let removed = self
            .topic(topic)?
            .remove(now, id)
            .map_err(|_| Error::invalid_delete(topic, id))?;

        info!(topic = %topic, id = %id, "Logged out service");
        Ok(removed)
    }

    /// Resolves `dependency_topics` and writes the result onto `service`.
    pub fn discover(&self, now: Instant, service: &mut Service, dependency_topics: &[String]) {
        let Discovery {
            dependencies,
            status,
        } = discovery::discover(self, now, dependency_topics);
        service.dependencies = dependencies;
        service.status = status;
    }

    /// Processes one heartbeat.
    ///
    /// A service that is no longer registered is reported as `Dropped`. Stale
    /// or unresolved dependencies are rediscovered and returned; the service
    /// is then placed according to the resulting status.
    pub fn check(&self, now: Instant, heartbeat: &Heartbeat) -> Result<HeartbeatOutcome> {
        let topic = self.topic(&heartbeat.topic)?;
        let id = heartbeat.id;

        let Some(service) = topic.touch(now, id) else {
            debug!(topic = %heartbeat.topic, id = %id, "Heartbeat from unknown service");
            return Ok(HeartbeatOutcome::dropped());
        };

        let mut stale: Vec<String> = service
            .dependencies
            .iter()
            .filter(|dependency| self.is_dependency_stale(now, dependency))
            .map(|dependency| dependency.topic.clone())
            .collect();
        stale.extend(service.unresolved_topics());

        let (refreshed, status) = if stale.is_empty() {
            (Vec::new(), ServiceStatus::Running)
        } else {
            let found = discovery::discover(self, now, &stale);
            (found.dependencies, found.status)
        };

        let written = topic.modify(id, |s| {
            s.status = status;
            s.merge_dependencies(&refreshed);
        });
        if written.is_none() {
            return Ok(HeartbeatOutcome::dropped());
        }

        match self.place(&topic, now, id, status) {
            Ok(_) => {}
            Err(e) if e.is_not_found() => return Ok(HeartbeatOutcome::dropped()),
            Err(e) => return Err(e),
        }

        if status == ServiceStatus::Running {
            debug!(topic = %heartbeat.topic, id = %id, "Heartbeat");
        } else {
            info!(
                topic = %heartbeat.topic,
                id = %id,
                status = %status,
                refreshed = refreshed.len(),
                "Heartbeat changed dependencies"
            );
        }

        Ok(HeartbeatOutcome {
            dependencies: refreshed,
            status,
        })
    }

    /// Acknowledges a `Changed` dependency set.
    pub fn conform(&self, now: Instant, topic: &str, id: ServiceId) -> Result<Service> {
        let service = self
            .topic(topic)?
            .conform(now, id)
            .context(format!("Conform rejected for topic {}", topic))?;
        info!(topic = %topic, id = %id, "Conformed service");
        Ok(service)
    }

    /// Reads the current liveness of a dependency's provider.
    pub fn dependency_liveness(&self, dependency: &Dependency) -> Option<Liveness> {
        let topic = self
            .topics
            .get(&dependency.topic)
            .map(|t| Arc::clone(t.value()))?;
        topic.liveness(dependency.id)
    }

    /// A dependency is stale when its provider is gone, not `Running`, or
    /// silent for at least the pending threshold.
    pub fn is_dependency_stale(&self, now: Instant, dependency: &Dependency) -> bool {
        !self
            .dependency_liveness(dependency)
            .is_some_and(|liveness| liveness.is_healthy(now, self.config.pending_threshold))
    }

    /// Number of topics with a running sweep timer.
    pub fn active_sweeps(&self) -> usize {
        self.scheduler.active()
    }

    /// Stops every topic sweep.
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
        info!(topics = self.topics.len(), "Registry shut down");
    }

    fn place(&self, topic: &Topic, now: Instant, id: ServiceId, status: ServiceStatus) -> Result<Service> {
        if status.is_running_placement() {
            topic.resurrect_if_needed(now, id)
        } else {
            topic.pend_if_needed(now, id)
        }
    }
}

impl ProviderPool for Registry {
    fn healthy_providers(&self, topic: &str, now: Instant) -> Vec<Service> {
        self.topic_or_create(topic).healthy_running(now)
    }
}
