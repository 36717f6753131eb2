//! # Airfone Service Registry
//!
//! Service registry and dependency discovery for Airfone registrants.
//!
//! Services register under a topic and declare the topics they depend on.
//! Their periodic heartbeats prove liveness and, at the same time, carry
//! back any change in the health of their dependencies.
//!
//! This crate provides:
//! - The in-memory registry engine (topics, running/pending stores,
//!   discovery, the heartbeat state machine)
//! - One expiry sweep timer per topic, owned by a single scheduler
//! - An HTTP/JSON facade over the registry operations (axum)
//! - Transport configuration (TCP, Unix Domain Sockets) and the server

pub mod config;
pub mod service;
pub mod storage;
pub mod topic;
pub mod discovery;
pub mod sweep;
pub mod registry;
pub mod types;
pub mod facade;
pub mod api;
pub mod transport;
pub mod server;

// Re-export commonly used items
pub use config::{RegistryConfig, ServerConfig};
pub use facade::RegistryFacade;
pub use registry::Registry;
pub use server::RegistryServer;
pub use service::{Dependency, Heartbeat, HeartbeatOutcome, Service, ServiceUpdate};
pub use topic::{Topic, TopicSnapshot};
