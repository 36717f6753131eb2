//! Per-topic service record storage.
//!
//! # Rust Learning Note
//!
//! This module demonstrates **encoding a locking contract in types**.
//!
//! A [`ServiceStore`] wraps a [`ServiceMap`] in a `parking_lot::RwLock`.
//! Single-record operations (`add`, `update`, `get`, `delete`) lock for
//! themselves. Batch operations used by the sweep (`batch_expire`,
//! `batch_add`) must run inside a larger transaction that already holds the
//! lock, so they only exist on `ServiceMap`:
//!
//! ```rust,ignore
//! let mut running = topic.running().write();   // RwLockWriteGuard<ServiceMap>
//! let expired = running.batch_expire(now, max_age);
//! ```
//!
//! A store's map is only reachable through the store's guard, so running a
//! batch operation on a store without holding its lock does not compile.
//! Outside this crate a `ServiceMap` cannot be built at all:
//!
//! ```compile_fail
//! use airfone_registry::storage::ServiceMap;
//!
//! let detached = ServiceMap::default();
//! ```
//!
//! ## Why not DashMap here?
//!
//! DashMap shards its locks, which is great for independent keys (the topic
//! namespace uses it). A sweep pass needs one consistent view of the whole
//! store, so each store is a single `RwLock<HashMap>`.

use crate::service::{Service, ServicePatch};
use airfone_common::{Error, Result, ServiceId, ServiceStatus};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Unsynchronized keyed collection of service records.
#[derive(Debug)]
pub struct ServiceMap {
    services: HashMap<ServiceId, Service>,
}

impl ServiceMap {
    pub(crate) fn new() -> Self {
        Self {
            services: HashMap::new(),
        }
    }

    /// Inserts a record and stamps its heartbeat with `now`.
    pub fn insert(&mut self, now: Instant, mut service: Service) -> Result<&mut Service> {
        if self.services.contains_key(&service.id) {
            return Err(Error::already_exists(format!("service {}", service.id)));
        }
        service.refresh(now);
        Ok(self.services.entry(service.id).or_insert(service))
    }

    /// Applies a partial update and refreshes the heartbeat.
    pub fn update(&mut self, now: Instant, id: ServiceId, patch: &ServicePatch) -> Result<&mut Service> {
        let service = self
            .services
            .get_mut(&id)
            .ok_or_else(|| Error::service_not_found(id))?;
        patch.apply(service);
        service.refresh(now);
        Ok(service)
    }

    pub fn get(&self, id: ServiceId) -> Option<&Service> {
        self.services.get(&id)
    }

    pub fn get_mut(&mut self, id: ServiceId) -> Option<&mut Service> {
        self.services.get_mut(&id)
    }

    pub fn contains(&self, id: ServiceId) -> bool {
        self.services.contains_key(&id)
    }

    /// Takes a record out unchanged, for moving it to another store.
    pub fn take(&mut self, id: ServiceId) -> Option<Service> {
        self.services.remove(&id)
    }

    /// Removes a record for good and marks it `Dropped`.
    pub fn delete(&mut self, now: Instant, id: ServiceId) -> Result<Service> {
        let mut service = self
            .services
            .remove(&id)
            .ok_or_else(|| Error::service_not_found(id))?;
        service.refresh(now);
        service.status = ServiceStatus::Dropped;
        Ok(service)
    }

    /// Removes and returns every record whose heartbeat is older than `max_age`.
    pub fn batch_expire(&mut self, now: Instant, max_age: Duration) -> Vec<Service> {
        let expired: Vec<ServiceId> = self
            .services
            .values()
            .filter(|s| s.is_expired(now, max_age))
            .map(|s| s.id)
            .collect();

        expired
            .into_iter()
            .filter_map(|id| self.services.remove(&id))
            .collect()
    }

    /// Inserts records as they are, heartbeat untouched.
    ///
    /// Stops at the first collision; records before it stay inserted.
    pub fn batch_add(&mut self, services: impl IntoIterator<Item = Service>) -> Result<()> {
        for service in services {
            if self.services.contains_key(&service.id) {
                return Err(Error::already_exists(format!("service {}", service.id)));
            }
            self.services.insert(service.id, service);
        }
        Ok(())
    }

    /// Copies of the `Running` records that heartbeated within `valid_window`.
    pub fn healthy(&self, now: Instant, valid_window: Duration) -> Vec<Service> {
        self.services
            .values()
            .filter(|s| s.status == ServiceStatus::Running && s.heartbeat_age(now) < valid_window)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Copies of all records, ordered by id.
    pub fn snapshot(&self) -> Vec<Service> {
        let mut services: Vec<Service> = self.services.values().cloned().collect();
        services.sort_by_key(|s| s.id);
        services
    }
}

/// Thread-safe store of service records.
#[derive(Debug)]
pub struct ServiceStore {
    map: RwLock<ServiceMap>,
}

impl Default for ServiceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceStore {
    pub fn new() -> Self {
        Self {
            map: RwLock::new(ServiceMap::new()),
        }
    }

    /// Adds a record; fails with `AlreadyExists` if the id is taken.
    pub fn add(&self, now: Instant, service: Service) -> Result<Service> {
        self.map.write().insert(now, service).map(|s| s.clone())
    }

    /// Partially updates a record; fails with `NotFound` if absent.
    pub fn update(&self, now: Instant, id: ServiceId, patch: &ServicePatch) -> Result<Service> {
        self.map.write().update(now, id, patch).map(|s| s.clone())
    }

    /// Returns a copy of a record; fails with `NotFound` if absent.
    pub fn get(&self, id: ServiceId) -> Result<Service> {
        self.map
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::service_not_found(id))
    }

    /// Removes a record, returning it marked `Dropped`.
    pub fn delete(&self, now: Instant, id: ServiceId) -> Result<Service> {
        self.map.write().delete(now, id)
    }

    pub fn contains(&self, id: ServiceId) -> bool {
        self.map.read().contains(id)
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }

    /// Acquires the store's read lock.
    pub fn read(&self) -> RwLockReadGuard<'_, ServiceMap> {
        self.map.read()
    }

    /// Acquires the store's write lock.
    pub fn write(&self) -> RwLockWriteGuard<'_, ServiceMap> {
        self.map.write()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(id: u32) -> Service {
        let mut service = Service::new("127.0.0.1", 9000 + id as u16);
        service.id = ServiceId::new(id);
        service.topic = "payments".to_string();
        service
    }

    #[test]
    fn test_add_and_get() {
        let store = ServiceStore::new();
        let now = Instant::now();

        let added = store.add(now, service(1)).unwrap();
        assert_eq!(added.keepalive(), now);

        let fetched = store.get(ServiceId::new(1)).unwrap();
        assert_eq!(fetched.port, 9001);
    }

    #[test]
    fn test_add_duplicate_fails() {
        let store = ServiceStore::new();
        let now = Instant::now();
        store.add(now, service(1)).unwrap();

        let err = store.add(now, service(1)).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { .. }));
    }

    #[test]
    fn test_update_missing_fails() {
        let store = ServiceStore::new();
        let err = store
            .update(Instant::now(), ServiceId::new(3), &ServicePatch::default())
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_update_refreshes_heartbeat() {
        let store = ServiceStore::new();
        let t0 = Instant::now();
        store.add(t0, service(1)).unwrap();

        let t1 = t0 + Duration::from_secs(1);
        let patch = ServicePatch {
            port: Some(7777),
            ..ServicePatch::default()
        };
        let updated = store.update(t1, ServiceId::new(1), &patch).unwrap();

        assert_eq!(updated.port, 7777);
        assert_eq!(updated.ip, "127.0.0.1");
        assert_eq!(updated.keepalive(), t1);
    }

    #[test]
    fn test_delete_marks_dropped() {
        let store = ServiceStore::new();
        let now = Instant::now();
        store.add(now, service(1)).unwrap();

        let removed = store.delete(now, ServiceId::new(1)).unwrap();
        assert_eq!(removed.status, ServiceStatus::Dropped);
        assert!(store.get(ServiceId::new(1)).is_err());
        assert!(store.delete(now, ServiceId::new(1)).is_err());
    }

    #[test]
    fn test_batch_expire() {
        let store = ServiceStore::new();
        let t0 = Instant::now();
        store.add(t0, service(1)).unwrap();
        store.add(t0 + Duration::from_secs(3), service(2)).unwrap();

        let now = t0 + Duration::from_secs(5);
        let expired = store.write().batch_expire(now, Duration::from_secs(4));

        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, ServiceId::new(1));
        assert!(store.contains(ServiceId::new(2)));
    }

    #[test]
    fn test_batch_add_stops_at_collision() {
        let store = ServiceStore::new();
        let now = Instant::now();
        store.add(now, service(2)).unwrap();

        let result = store
            .write()
            .batch_add(vec![service(1), service(2), service(3)]);

        assert!(result.is_err());
        assert!(store.contains(ServiceId::new(1)));
        assert!(!store.contains(ServiceId::new(3)));
    }

    #[test]
    fn test_healthy_filters_status_and_age() {
        let store = ServiceStore::new();
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_secs(10);
        store.add(t1, service(1)).unwrap();
        store
            .add(t1, service(2).with_status(ServiceStatus::Changed))
            .unwrap();
        store.add(t0, service(3)).unwrap();

        let healthy = store
            .read()
            .healthy(t1 + Duration::from_secs(1), Duration::from_secs(3));

        assert_eq!(healthy.len(), 1);
        assert_eq!(healthy[0].id, ServiceId::new(1));
    }
}
