//! Per-topic expiry sweep timers.
//!
//! # Rust Learning Note
//!
//! Each topic gets its own tokio task ticking on a fixed interval. All the
//! tasks hang off one root `CancellationToken`:
//!
//! ```text
//! root ──┬── child("payments") ── sweep task
//!        ├── child("log")      ── sweep task
//!        └── child("auth")     ── sweep task
//! ```
//!
//! Cancelling a child stops one timer (topic removal); cancelling the root
//! stops all of them (registry shutdown). No `JoinHandle` bookkeeping is
//! needed: a cancelled task leaves its `select!` and returns.
//!
//! A topic name can be removed and created again while the old timer is
//! still registered. Timers therefore remember which `Arc<Topic>` they
//! sweep, and `cancel` only stops the timer of the topic it was given.

use crate::topic::Topic;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Owns one sweep timer per topic.
#[derive(Debug)]
pub struct SweepScheduler {
    period: Duration,
    root: CancellationToken,
    timers: Mutex<HashMap<String, Timer>>,
}

#[derive(Debug)]
struct Timer {
    topic: Arc<Topic>,
    token: CancellationToken,
}

impl SweepScheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            root: CancellationToken::new(),
            timers: Mutex::new(HashMap::new()),
        }
    }

    /// Starts the sweep timer of a topic.
    ///
    /// Returns false if the topic already has a timer, the scheduler was shut
    /// down, or there is no tokio runtime to run the timer on. A timer left
    /// behind by a removed topic of the same name is stopped and replaced.
    pub fn schedule(&self, topic: Arc<Topic>) -> bool {
        if self.root.is_cancelled() {
            return false;
        }

        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(topic = %topic.name(), "No tokio runtime, topic will not be swept");
                return false;
            }
        };

        let mut timers = self.timers.lock();
        if let Some(stale) = timers.get(topic.name()) {
            if Arc::ptr_eq(&stale.topic, &topic) {
                return false;
            }
            debug!(topic = %topic.name(), "Replacing sweep timer of a removed topic");
            stale.token.cancel();
        }

        let token = self.root.child_token();
        timers.insert(
            topic.name().to_string(),
            Timer {
                topic: Arc::clone(&topic),
                token: token.clone(),
            },
        );
        handle.spawn(run_sweep(topic, self.period, token));
        true
    }

    /// Stops the sweep timer of this exact topic.
    ///
    /// A timer registered under the same name for a newer topic is left
    /// running.
    pub fn cancel(&self, topic: &Arc<Topic>) -> bool {
        let mut timers = self.timers.lock();
        match timers.get(topic.name()) {
            Some(timer) if Arc::ptr_eq(&timer.topic, topic) => {
                timer.token.cancel();
                timers.remove(topic.name());
                true
            }
            _ => false,
        }
    }

    /// Stops every sweep timer; later `schedule` calls are refused.
    pub fn shutdown(&self) {
        self.root.cancel();
        self.timers.lock().clear();
    }

    pub fn is_scheduled(&self, name: &str) -> bool {
        self.timers.lock().contains_key(name)
    }

    /// Number of running timers.
    pub fn active(&self) -> usize {
        self.timers.lock().len()
    }
}

impl Drop for SweepScheduler {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

async fn run_sweep(topic: Arc<Topic>, period: Duration, cancel_token: CancellationToken) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!(topic = %topic.name(), period = ?period, "Sweep timer started");

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                debug!(topic = %topic.name(), "Sweep timer stopped");
                break;
            }
            _ = ticker.tick() => {
                topic.sweep(Instant::now());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegistryConfig;
    use crate::service::Service;
    use airfone_common::{ServiceId, ServiceStatus};
    use tokio::time::sleep;

    fn topic_with_service(name: &str) -> Arc<Topic> {
        let topic = Arc::new(Topic::new(name, RegistryConfig::default()));
        let mut service = Service::new("127.0.0.1", 9000);
        service.id = ServiceId::new(1);
        service.topic = name.to_string();
        topic.add_running(Instant::now(), service).unwrap();
        topic
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_demotes_then_evicts() {
        let scheduler = SweepScheduler::new(Duration::from_secs(2));
        let topic = topic_with_service("payments");
        assert!(scheduler.schedule(Arc::clone(&topic)));

        sleep(Duration::from_millis(4010)).await;
        assert!(topic.running().contains(ServiceId::new(1)));

        sleep(Duration::from_secs(2)).await;
        let service = topic.get(ServiceId::new(1)).unwrap();
        assert_eq!(service.status, ServiceStatus::Pending);

        sleep(Duration::from_secs(2)).await;
        assert!(!topic.contains(ServiceId::new(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_timer() {
        let scheduler = SweepScheduler::new(Duration::from_secs(2));
        let topic = topic_with_service("payments");
        scheduler.schedule(Arc::clone(&topic));

        assert!(scheduler.cancel(&topic));
        assert!(!scheduler.cancel(&topic));

        sleep(Duration::from_secs(10)).await;
        assert!(topic.running().contains(ServiceId::new(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_all_timers() {
        let scheduler = SweepScheduler::new(Duration::from_secs(2));
        let first = topic_with_service("payments");
        let second = topic_with_service("log");
        scheduler.schedule(Arc::clone(&first));
        scheduler.schedule(Arc::clone(&second));
        assert_eq!(scheduler.active(), 2);

        scheduler.shutdown();
        assert_eq!(scheduler.active(), 0);
        assert!(!scheduler.schedule(topic_with_service("auth")));

        sleep(Duration::from_secs(10)).await;
        assert!(first.running().contains(ServiceId::new(1)));
        assert!(second.running().contains(ServiceId::new(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recreated_topic_keeps_its_timer() {
        let scheduler = SweepScheduler::new(Duration::from_secs(2));
        let removed = topic_with_service("log");
        assert!(scheduler.schedule(Arc::clone(&removed)));

        // Created again before the removal cancels the old timer.
        let recreated = topic_with_service("log");
        assert!(scheduler.schedule(Arc::clone(&recreated)));
        assert!(!scheduler.cancel(&removed));

        assert!(scheduler.is_scheduled("log"));
        assert_eq!(scheduler.active(), 1);

        sleep(Duration::from_secs(30)).await;
        assert!(!recreated.contains(ServiceId::new(1)));
        assert!(removed.running().contains(ServiceId::new(1)));
    }

    #[tokio::test]
    async fn test_schedule_twice_is_refused() {
        let scheduler = SweepScheduler::new(Duration::from_secs(2));
        let topic = topic_with_service("payments");

        assert!(scheduler.schedule(Arc::clone(&topic)));
        assert!(!scheduler.schedule(topic));
        assert!(scheduler.is_scheduled("payments"));
    }

    #[test]
    fn test_schedule_without_runtime() {
        let scheduler = SweepScheduler::new(Duration::from_secs(2));
        let topic = Arc::new(Topic::new("payments", RegistryConfig::default()));

        assert!(!scheduler.schedule(topic));
        assert_eq!(scheduler.active(), 0);
    }
}
