//! Wire types of the registry HTTP API.
//!
//! Core records never appear on the wire directly. The mapper functions at
//! the bottom of this module convert them into the views below, and requests
//! into core operations.
//!
//! All messages are JSON with camelCase field names.

use crate::service::{Dependency, HeartbeatOutcome, Service, ServiceUpdate};
use crate::topic::TopicSnapshot;
use airfone_common::{ErrorReason, Metadata, ServiceId, ServiceStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request to register a new service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub topic: String,
    pub ip: String,
    pub port: u16,
    #[serde(default)]
    pub metadata: Vec<Metadata>,
    #[serde(default)]
    pub dependency_topics: Vec<String>,
}

/// Request to update a registered service.
///
/// `need_metadata` and `need_dependencies` tell "field omitted" apart from
/// "field cleared": an empty list with the flag set clears the field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    pub id: ServiceId,
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default)]
    pub need_metadata: bool,
    #[serde(default)]
    pub metadata: Vec<Metadata>,
    #[serde(default)]
    pub need_dependencies: bool,
    #[serde(default)]
    pub dependency_topics: Vec<String>,
}

impl UpdateRequest {
    pub fn new(topic: impl Into<String>, id: ServiceId) -> Self {
        Self {
            id,
            topic: topic.into(),
            ip: None,
            port: None,
            need_metadata: false,
            metadata: Vec::new(),
            need_dependencies: false,
            dependency_topics: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub topic: String,
    pub id: ServiceId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeepAliveRequest {
    pub topic: String,
    pub id: ServiceId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConformRequest {
    pub topic: String,
    pub id: ServiceId,
}

/// The provider chosen for one dependency topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyView {
    pub topic: String,
    pub id: ServiceId,
    pub ip: String,
    pub port: u16,
}

impl DependencyView {
    /// Returns the provider address as `ip:port`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceView {
    pub id: ServiceId,
    pub topic: String,
    pub ip: String,
    pub port: u16,
    pub metadata: Vec<Metadata>,
    pub dependencies: Vec<DependencyView>,
    pub dependency_topics: Vec<String>,
    pub status: ServiceStatus,
    pub registered_at: DateTime<Utc>,
}

/// Answer to a keep-alive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatView {
    /// Dependencies refreshed by this heartbeat.
    pub dependencies: Vec<DependencyView>,
    pub status: ServiceStatus,
}

/// Empty acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckResponse {
    pub success: bool,
}

impl AckResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicView {
    pub name: String,
    pub running: Vec<ServiceView>,
    pub pending: Vec<ServiceView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicListResponse {
    pub topics: Vec<String>,
}

/// Error body returned with every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub reason: ErrorReason,
    pub message: String,
}

// Mappers

pub fn dependency_view(dependency: &Dependency) -> DependencyView {
    DependencyView {
        topic: dependency.topic.clone(),
        id: dependency.id,
        ip: dependency.ip.clone(),
        port: dependency.port,
    }
}

pub fn service_view(service: &Service) -> ServiceView {
    ServiceView {
        id: service.id,
        topic: service.topic.clone(),
        ip: service.ip.clone(),
        port: service.port,
        metadata: service.metadata.clone(),
        dependencies: service.dependencies.iter().map(dependency_view).collect(),
        dependency_topics: service.dependency_topics.clone(),
        status: service.status,
        registered_at: service.registered_at,
    }
}

pub fn heartbeat_view(outcome: &HeartbeatOutcome) -> HeartbeatView {
    HeartbeatView {
        dependencies: outcome.dependencies.iter().map(dependency_view).collect(),
        status: outcome.status,
    }
}

pub fn topic_view(snapshot: &TopicSnapshot) -> TopicView {
    TopicView {
        name: snapshot.name.clone(),
        running: snapshot.running.iter().map(service_view).collect(),
        pending: snapshot.pending.iter().map(service_view).collect(),
    }
}

/// Builds the unregistered record described by a register request.
pub fn register_service(request: &RegisterRequest) -> Service {
    Service::new(request.ip.clone(), request.port).with_metadata(request.metadata.clone())
}

/// Converts an update request, honoring the `need*` flags.
pub fn service_update(request: UpdateRequest) -> ServiceUpdate {
    ServiceUpdate {
        id: request.id,
        ip: request.ip,
        port: request.port,
        metadata: request.need_metadata.then_some(request.metadata),
        dependency_topics: request.need_dependencies.then_some(request.dependency_topics),
    }
}
