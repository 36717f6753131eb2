//! Request/response facade over the registry.
//!
//! The facade reads the clock, calls the registry and maps the result into
//! wire views. The HTTP handlers and the in-process client both go through
//! it, so both see identical behavior.

use crate::registry::Registry;
use crate::service::Heartbeat;
use crate::types::{
    heartbeat_view, register_service, service_update, service_view, topic_view, AckResponse,
    ConformRequest, HeartbeatView, KeepAliveRequest, LogoutRequest, RegisterRequest,
    ServiceView, TopicListResponse, TopicView, UpdateRequest,
};
use airfone_common::Result;
use std::sync::Arc;
use tokio::time::Instant;

/// Cheaply cloneable handle exposing the registry operations as messages.
#[derive(Debug, Clone)]
pub struct RegistryFacade {
    registry: Arc<Registry>,
}

impl RegistryFacade {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn register(&self, request: RegisterRequest) -> Result<ServiceView> {
        let service = self.registry.register(
            &request.topic,
            Instant::now(),
            register_service(&request),
            &request.dependency_topics,
        )?;
        Ok(service_view(&service))
    }

    pub fn update(&self, request: UpdateRequest) -> Result<ServiceView> {
        let topic = request.topic.clone();
        let service = self
            .registry
            .update(&topic, Instant::now(), service_update(request))?;
        Ok(service_view(&service))
    }

    pub fn logout(&self, request: LogoutRequest) -> Result<AckResponse> {
        self.registry
            .logout(&request.topic, Instant::now(), request.id)?;
        Ok(AckResponse::ok())
    }

    pub fn keep_alive(&self, request: KeepAliveRequest) -> Result<HeartbeatView> {
        let heartbeat = Heartbeat::new(request.topic, request.id);
        let outcome = self.registry.check(Instant::now(), &heartbeat)?;
        Ok(heartbeat_view(&outcome))
    }

    pub fn conform(&self, request: ConformRequest) -> Result<AckResponse> {
        self.registry
            .conform(Instant::now(), &request.topic, request.id)?;
        Ok(AckResponse::ok())
    }

    pub fn topics(&self) -> TopicListResponse {
        TopicListResponse {
            topics: self.registry.topics(),
        }
    }

    pub fn topic(&self, name: &str) -> Result<TopicView> {
        Ok(topic_view(&self.registry.snapshot(name)?))
    }
}
