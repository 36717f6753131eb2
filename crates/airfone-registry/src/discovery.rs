//! Dependency discovery.
//!
//! Discovery picks one healthy provider per requested topic and reports
//! whether the whole set could be satisfied. It reads provider pools
//! through the [`ProviderPool`] trait so the algorithm can be tested without
//! a registry behind it.

use crate::service::{Dependency, Service};
use airfone_common::ServiceStatus;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use tokio::time::Instant;

/// Source of provider candidates for a topic.
pub trait ProviderPool {
    /// Services of `topic` that may be handed out as a dependency at `now`.
    fn healthy_providers(&self, topic: &str, now: Instant) -> Vec<Service>;
}

/// Chosen providers and the aggregate dependency status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    pub dependencies: Vec<Dependency>,
    /// `Running` for an empty request, `Changed` when every topic was
    /// resolved, `Pending` otherwise.
    pub status: ServiceStatus,
}

/// Picks one provider uniformly at random for each topic.
///
/// Topics with no healthy provider are left out of the result and make the
/// status `Pending`. A topic named twice is resolved once.
pub fn discover<P, S>(pool: &P, now: Instant, topics: &[S]) -> Discovery
where
    P: ProviderPool + ?Sized,
    S: AsRef<str>,
{
    if topics.is_empty() {
        return Discovery {
            dependencies: Vec::new(),
            status: ServiceStatus::Running,
        };
    }

    let mut rng = rand::thread_rng();
    let mut seen = HashSet::new();
    let mut dependencies = Vec::with_capacity(topics.len());
    let mut status = ServiceStatus::Changed;

    for topic in topics.iter().map(AsRef::as_ref) {
        if !seen.insert(topic) {
            continue;
        }

        let candidates = pool.healthy_providers(topic, now);
        match candidates.choose(&mut rng) {
            Some(provider) => dependencies.push(Dependency::from_provider(provider)),
            None => status = ServiceStatus::Pending,
        }
    }

    Discovery {
        dependencies,
        status,
    }
}
