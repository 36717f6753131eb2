//! The registry operations as seen by a registrant.
//!
//! # Rust Learning Note
//!
//! `RegistryApi` is used as a trait object (`Arc<dyn RegistryApi>`), so the
//! [`Session`](crate::Session) does not care whether the registry is remote
//! or in the same process. `async_trait` boxes each returned future, which
//! is what makes an `async fn` callable through `dyn`.

use airfone_common::Result;
use airfone_registry::types::{
    ConformRequest, HeartbeatView, KeepAliveRequest, LogoutRequest, RegisterRequest,
    ServiceView, UpdateRequest,
};
use async_trait::async_trait;

#[async_trait]
pub trait RegistryApi: Send + Sync {
    /// Registers a service and returns it with its id and chosen dependencies.
    async fn register(&self, request: RegisterRequest) -> Result<ServiceView>;

    async fn update(&self, request: UpdateRequest) -> Result<ServiceView>;

    async fn logout(&self, request: LogoutRequest) -> Result<()>;

    /// Sends a heartbeat. A `Dropped` status is an answer, not an error.
    async fn keep_alive(&self, request: KeepAliveRequest) -> Result<HeartbeatView>;

    /// Acknowledges a `Changed` dependency set.
    async fn conform(&self, request: ConformRequest) -> Result<()>;
}
