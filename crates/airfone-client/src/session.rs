//! Keep-alive session of a registered service.
//!
//! A [`Session`] registers a service, then heartbeats in the background at
//! the registry's heartbeat interval and reacts to each answer:
//!
//! | Answer    | Reaction                                                     |
//! |-----------|--------------------------------------------------------------|
//! | `Running` | nothing                                                      |
//! | `Changed` | merge the refreshed dependencies, then conform               |
//! | `Pending` | merge whatever was refreshed and wait                        |
//! | `Dropped` | register again with the same description and adopt the new id |
//!
//! Transport errors are logged and the next tick tries again.

use crate::api::RegistryApi;
use airfone_common::{Metadata, Result, ServiceId, ServiceStatus};
use airfone_registry::types::{
    ConformRequest, DependencyView, KeepAliveRequest, LogoutRequest, RegisterRequest, ServiceView,
};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Description of the service a session keeps registered.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub topic: String,
    pub ip: String,
    pub port: u16,
    pub metadata: Vec<Metadata>,
    pub dependency_topics: Vec<String>,
    pub heartbeat_interval: Duration,
}

impl SessionConfig {
    pub fn new(topic: impl Into<String>, ip: impl Into<String>, port: u16) -> Self {
        Self {
            topic: topic.into(),
            ip: ip.into(),
            port,
            metadata: Vec::new(),
            dependency_topics: Vec::new(),
            heartbeat_interval: Duration::from_secs(2),
        }
    }

    pub fn with_metadata(mut self, metadata: Vec<Metadata>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_dependencies<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependency_topics = topics.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    fn register_request(&self) -> RegisterRequest {
        RegisterRequest {
            topic: self.topic.clone(),
            ip: self.ip.clone(),
            port: self.port,
            metadata: self.metadata.clone(),
            dependency_topics: self.dependency_topics.clone(),
        }
    }
}

#[derive(Debug)]
struct SessionState {
    id: ServiceId,
    status: ServiceStatus,
    dependencies: Vec<DependencyView>,
}

impl SessionState {
    fn adopt(&mut self, view: ServiceView) {
        self.id = view.id;
        self.status = view.status;
        self.dependencies = view.dependencies;
    }

    fn merge(&mut self, refreshed: Vec<DependencyView>) {
        for dependency in refreshed {
            match self
                .dependencies
                .iter_mut()
                .find(|d| d.topic == dependency.topic)
            {
                Some(existing) => *existing = dependency,
                None => self.dependencies.push(dependency),
            }
        }
    }
}

struct Inner {
    api: Arc<dyn RegistryApi>,
    config: SessionConfig,
    state: RwLock<SessionState>,
}

/// A registered service kept alive by a background task.
pub struct Session {
    inner: Arc<Inner>,
    cancel_token: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Registers the service and starts the keep-alive loop.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn register(api: Arc<dyn RegistryApi>, config: SessionConfig) -> Result<Self> {
        let view = api.register(config.register_request()).await?;
        info!(topic = %config.topic, id = %view.id, status = %view.status, "Session registered");

        let inner = Arc::new(Inner {
            api,
            config,
            state: RwLock::new(SessionState {
                id: view.id,
                status: view.status,
                dependencies: view.dependencies,
            }),
        });
        inner.conform_if_changed().await?;

        let cancel_token = CancellationToken::new();
        let task = tokio::spawn(keep_alive_loop(Arc::clone(&inner), cancel_token.clone()));

        Ok(Self {
            inner,
            cancel_token,
            task: Mutex::new(Some(task)),
        })
    }

    pub fn id(&self) -> ServiceId {
        self.inner.state.read().id
    }

    pub fn status(&self) -> ServiceStatus {
        self.inner.state.read().status
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// The provider currently chosen for a dependency topic.
    pub fn dependency(&self, topic: &str) -> Option<DependencyView> {
        self.inner
            .state
            .read()
            .dependencies
            .iter()
            .find(|d| d.topic == topic)
            .cloned()
    }

    pub fn dependencies(&self) -> Vec<DependencyView> {
        self.inner.state.read().dependencies.clone()
    }

    /// Sends one heartbeat right away and handles the answer.
    pub async fn heartbeat(&self) -> Result<ServiceStatus> {
        self.inner.heartbeat().await
    }

    /// Stops the keep-alive loop and logs the service out.
    pub async fn logout(self) -> Result<()> {
        self.stop().await;
        let (topic, id) = self.inner.identity();
        self.inner
            .api
            .logout(LogoutRequest {
                topic: topic.clone(),
                id,
            })
            .await?;
        info!(topic = %topic, id = %id, "Session logged out");
        Ok(())
    }

    /// Stops the keep-alive loop; the registry will expire the service.
    pub async fn shutdown(self) {
        self.stop().await;
    }

    async fn stop(&self) {
        self.cancel_token.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

impl Inner {
    fn identity(&self) -> (String, ServiceId) {
        (self.config.topic.clone(), self.state.read().id)
    }

    async fn heartbeat(&self) -> Result<ServiceStatus> {
        let (topic, id) = self.identity();
        let answer = self.api.keep_alive(KeepAliveRequest { topic, id }).await?;

        match answer.status {
            ServiceStatus::Running => {
                self.state.write().status = ServiceStatus::Running;
            }
            ServiceStatus::Changed | ServiceStatus::Pending => {
                {
                    let mut state = self.state.write();
                    state.merge(answer.dependencies);
                    state.status = answer.status;
                }
                self.conform_if_changed().await?;
            }
            ServiceStatus::Dropped => {
                warn!(topic = %self.config.topic, id = %id, "Service dropped by registry, registering again");
                let view = self.api.register(self.config.register_request()).await?;
                info!(topic = %self.config.topic, id = %view.id, "Session registered again");
                self.state.write().adopt(view);
                self.conform_if_changed().await?;
            }
        }

        Ok(self.state.read().status)
    }

    async fn conform_if_changed(&self) -> Result<()> {
        let (topic, id) = {
            let state = self.state.read();
            if state.status != ServiceStatus::Changed {
                return Ok(());
            }
            (self.config.topic.clone(), state.id)
        };

        self.api.conform(ConformRequest { topic, id }).await?;
        self.state.write().status = ServiceStatus::Running;
        debug!(topic = %self.config.topic, id = %id, "Conformed to dependency change");
        Ok(())
    }
}

async fn keep_alive_loop(inner: Arc<Inner>, cancel_token: CancellationToken) {
    let period = inner.config.heartbeat_interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                debug!(topic = %inner.config.topic, "Keep-alive loop stopped");
                break;
            }
            _ = ticker.tick() => {
                if let Err(e) = inner.heartbeat().await {
                    warn!(topic = %inner.config.topic, error = %e, "Heartbeat failed");
                }
            }
        }
    }
}
