//! In-process client.

use crate::api::RegistryApi;
use airfone_common::Result;
use airfone_registry::types::{
    ConformRequest, HeartbeatView, KeepAliveRequest, LogoutRequest, RegisterRequest,
    ServiceView, UpdateRequest,
};
use airfone_registry::{Registry, RegistryFacade};
use async_trait::async_trait;
use std::sync::Arc;

/// Calls a registry living in the same process, with no serialization.
#[derive(Debug, Clone)]
pub struct DirectRegistryClient {
    facade: RegistryFacade,
}

impl DirectRegistryClient {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            facade: RegistryFacade::new(registry),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        self.facade.registry()
    }
}

#[async_trait]
impl RegistryApi for DirectRegistryClient {
    async fn register(&self, request: RegisterRequest) -> Result<ServiceView> {
        self.facade.register(request)
    }

    async fn update(&self, request: UpdateRequest) -> Result<ServiceView> {
        self.facade.update(request)
    }

    async fn logout(&self, request: LogoutRequest) -> Result<()> {
        self.facade.logout(request).map(|_| ())
    }

    async fn keep_alive(&self, request: KeepAliveRequest) -> Result<HeartbeatView> {
        self.facade.keep_alive(request)
    }

    async fn conform(&self, request: ConformRequest) -> Result<()> {
        self.facade.conform(request).map(|_| ())
    }
}
