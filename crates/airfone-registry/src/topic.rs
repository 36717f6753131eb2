//! A topic and the placement of its services.
//!
//! Every service of a topic lives in exactly one of two stores:
//! - `running`: the service and its dependencies are healthy
//! - `pending`: the service is waiting on a dependency, or has gone quiet
//!
//! Moves between the stores (`pend`, `resurrect`, the sweep's demote pass)
//! take the topic's placement lock and then both store write locks, always
//! in the order placement → running → pending. Lookups that span both
//! stores hold both read locks, so a service that is being moved is never
//! seen twice or missed.

use crate::config::RegistryConfig;
use crate::service::{Liveness, Service, ServicePatch};
use crate::storage::{ServiceMap, ServiceStore};
use airfone_common::{Error, Result, ServiceId, ServiceStatus};
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info};

/// A named group of interchangeable service providers.
#[derive(Debug)]
pub struct Topic {
    name: String,
    config: RegistryConfig,
    placement: Mutex<()>,
    running: ServiceStore,
    pending: ServiceStore,
    modified: Mutex<Instant>,
}

/// Copies of a topic's stores at one instant.
#[derive(Debug, Clone)]
pub struct TopicSnapshot {
    pub name: String,
    pub running: Vec<Service>,
    pub pending: Vec<Service>,
    pub modified: Instant,
}

/// Number of services moved by one sweep tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub demoted: usize,
    pub evicted: usize,
}

impl Topic {
    pub fn new(name: impl Into<String>, config: RegistryConfig) -> Self {
        Self {
            name: name.into(),
            config,
            placement: Mutex::new(()),
            running: ServiceStore::new(),
            pending: ServiceStore::new(),
            modified: Mutex::new(Instant::now()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn running(&self) -> &ServiceStore {
        &self.running
    }

    pub fn pending(&self) -> &ServiceStore {
        &self.pending
    }

    /// Time of the last successful placement change or record mutation.
    pub fn modified(&self) -> Instant {
        *self.modified.lock()
    }

    fn mark_modified(&self, now: Instant) {
        let mut modified = self.modified.lock();
        if now > *modified {
            *modified = now;
        }
    }

    /// Inserts into `running`. A `Changed` status is kept, anything else
    /// becomes `Running`.
    pub fn add_running(&self, now: Instant, mut service: Service) -> Result<Service> {
        if service.status != ServiceStatus::Changed {
            service.status = ServiceStatus::Running;
        }
        let added = self.running.add(now, service)?;
        self.mark_modified(now);
        Ok(added)
    }

    /// Inserts into `pending` with status `Pending`.
    pub fn add_pending(&self, now: Instant, mut service: Service) -> Result<Service> {
        service.status = ServiceStatus::Pending;
        let added = self.pending.add(now, service)?;
        self.mark_modified(now);
        Ok(added)
    }

    /// Moves a service from `pending` to `running`.
    pub fn resurrect(&self, now: Instant, id: ServiceId) -> Result<Service> {
        let _placement = self.placement.lock();
        let mut running = self.running.write();
        let mut pending = self.pending.write();

        let service = Self::move_to_running(&mut running, &mut pending, now, id)?;
        self.mark_modified(now);
        Ok(service)
    }

    /// Like [`resurrect`](Self::resurrect), but a service that is already
    /// running only gets its heartbeat refreshed and its status normalized.
    pub fn resurrect_if_needed(&self, now: Instant, id: ServiceId) -> Result<Service> {
        let _placement = self.placement.lock();
        let mut running = self.running.write();
        let mut pending = self.pending.write();

        if let Some(service) = running.get_mut(id) {
            if service.status != ServiceStatus::Changed {
                service.status = ServiceStatus::Running;
            }
            service.refresh(now);
            return Ok(service.clone());
        }

        let service = Self::move_to_running(&mut running, &mut pending, now, id)?;
        self.mark_modified(now);
        Ok(service)
    }

    /// Moves a service from `running` to `pending` and marks it `Pending`.
    pub fn pend(&self, now: Instant, id: ServiceId) -> Result<Service> {
        let _placement = self.placement.lock();
        let mut running = self.running.write();
        let mut pending = self.pending.write();

        let service = Self::move_to_pending(&mut running, &mut pending, now, id)?;
        self.mark_modified(now);
        Ok(service)
    }

    /// Like [`pend`](Self::pend), but a no-op for a service already pending.
    pub fn pend_if_needed(&self, now: Instant, id: ServiceId) -> Result<Service> {
        let _placement = self.placement.lock();
        let mut running = self.running.write();
        let mut pending = self.pending.write();

        if let Some(service) = pending.get(id) {
            return Ok(service.clone());
        }

        let service = Self::move_to_pending(&mut running, &mut pending, now, id)?;
        self.mark_modified(now);
        Ok(service)
    }

    fn move_to_running(
        running: &mut ServiceMap,
        pending: &mut ServiceMap,
        now: Instant,
        id: ServiceId,
    ) -> Result<Service> {
        let mut service = pending.take(id).ok_or_else(|| Error::service_not_found(id))?;
        if service.status != ServiceStatus::Changed {
            service.status = ServiceStatus::Running;
        }
        running.insert(now, service).map(|s| s.clone())
    }

    fn move_to_pending(
        running: &mut ServiceMap,
        pending: &mut ServiceMap,
        now: Instant,
        id: ServiceId,
    ) -> Result<Service> {
        let mut service = running.take(id).ok_or_else(|| Error::service_not_found(id))?;
        service.status = ServiceStatus::Pending;
        pending.insert(now, service).map(|s| s.clone())
    }

    /// Acknowledges a `Changed` dependency set: the running service goes
    /// back to `Running` and its heartbeat is refreshed.
    pub fn conform(&self, now: Instant, id: ServiceId) -> Result<Service> {
        let service = {
            let mut running = self.running.write();
            let service = running
                .get_mut(id)
                .ok_or_else(|| Error::service_not_found(id))?;
            service.status = ServiceStatus::Running;
            service.refresh(now);
            service.clone()
        };
        self.mark_modified(now);
        Ok(service)
    }

    /// Copies of the running services that discovery may hand out.
    pub fn healthy_running(&self, now: Instant) -> Vec<Service> {
        self.running.read().healthy(now, self.config.valid_window)
    }

    /// Returns a copy of a service from whichever store holds it.
    pub fn get(&self, id: ServiceId) -> Result<Service> {
        let running = self.running.read();
        let pending = self.pending.read();

        running
            .get(id)
            .or_else(|| pending.get(id))
            .cloned()
            .ok_or_else(|| Error::service_not_found(id))
    }

    pub fn contains(&self, id: ServiceId) -> bool {
        let running = self.running.read();
        let pending = self.pending.read();
        running.contains(id) || pending.contains(id)
    }

    /// Status and last heartbeat of a service, if it is still registered.
    pub fn liveness(&self, id: ServiceId) -> Option<Liveness> {
        let running = self.running.read();
        let pending = self.pending.read();

        running.get(id).or_else(|| pending.get(id)).map(|s| Liveness {
            status: s.status,
            keepalive: s.keepalive(),
        })
    }

    /// Refreshes the heartbeat of a service wherever it is.
    ///
    /// Returns `None` if the service is in neither store.
    pub fn touch(&self, now: Instant, id: ServiceId) -> Option<Service> {
        self.modify(id, |service| {
            service.refresh(now);
            service.clone()
        })
    }

    /// Runs `f` on a service wherever it is, without moving it.
    pub fn modify<R>(&self, id: ServiceId, f: impl FnOnce(&mut Service) -> R) -> Option<R> {
        let mut running = self.running.write();
        let mut pending = self.pending.write();

        match running.get_mut(id) {
            Some(service) => Some(f(service)),
            None => pending.get_mut(id).map(f),
        }
    }

    /// Applies a partial update to a running service.
    pub fn update_running(&self, now: Instant, id: ServiceId, patch: &ServicePatch) -> Result<Service> {
        let service = self.running.update(now, id, patch)?;
        self.mark_modified(now);
        Ok(service)
    }

    /// Deletes a service from `running`, or else from `pending`.
    pub fn remove(&self, now: Instant, id: ServiceId) -> Result<Service> {
        let service = {
            let mut running = self.running.write();
            let mut pending = self.pending.write();
            match running.delete(now, id) {
                Ok(service) => service,
                Err(_) => pending.delete(now, id)?,
            }
        };
        self.mark_modified(now);
        Ok(service)
    }

    /// Runs one sweep tick.
    ///
    /// The demote pass holds the placement lock and both store locks; the
    /// evict pass holds only the `pending` lock.
    pub fn sweep(&self, now: Instant) -> SweepReport {
        let demoted = {
            let _placement = self.placement.lock();
            let mut running = self.running.write();
            let mut pending = self.pending.write();

            let expired = running.batch_expire(now, self.config.pending_threshold);
            let (collided, mut demote): (Vec<Service>, Vec<Service>) = expired
                .into_iter()
                .partition(|service| pending.contains(service.id));

            if !collided.is_empty() {
                error!(
                    topic = %self.name,
                    count = collided.len(),
                    "Expired services already pending, leaving them in running"
                );
                if let Err(e) = running.batch_add(collided) {
                    error!(topic = %self.name, error = %e, "Failed to restore expired services");
                }
            }

            for service in &mut demote {
                service.status = ServiceStatus::Pending;
            }
            let count = demote.len();
            if let Err(e) = pending.batch_add(demote) {
                error!(topic = %self.name, error = %e, "Failed to demote expired services");
            }
            count
        };

        let evicted = self
            .pending
            .write()
            .batch_expire(now, self.config.dropped_threshold)
            .len();

        let report = SweepReport { demoted, evicted };
        if demoted > 0 || evicted > 0 {
            self.mark_modified(now);
            info!(topic = %self.name, demoted, evicted, "Swept expired services");
        } else {
            debug!(topic = %self.name, "Sweep found nothing to move");
        }
        report
    }

    pub fn snapshot(&self) -> TopicSnapshot {
        let running = self.running.read();
        let pending = self.pending.read();

        TopicSnapshot {
            name: self.name.clone(),
            running: running.snapshot(),
            pending: pending.snapshot(),
            modified: self.modified(),
        }
    }
}
