//! HTTP client for a remote registry server.
//!
//! # Rust Learning Note
//!
//! ## One generic round trip
//!
//! Every operation is a JSON POST, so the five trait methods share a single
//! generic helper:
//!
//! ```rust,ignore
//! async fn post<Req: Serialize, Resp: DeserializeOwned>(&self, path: &str, body: &Req)
//!     -> Result<Resp>
//! ```
//!
//! The compiler generates one copy per request/response pair; there is no
//! runtime dispatch on the message type.
//!
//! Error bodies carry a machine-readable reason, which is decoded back into
//! `Error::Remote` so callers can match on `err.reason()` exactly as they
//! would with an in-process registry.

use crate::api::RegistryApi;
use airfone_common::{Error, Result};
use airfone_registry::transport::TransportAddress;
use airfone_registry::types::{
    AckResponse, ConformRequest, ErrorResponse, HeartbeatView, KeepAliveRequest, LogoutRequest,
    RegisterRequest, ServiceView, TopicListResponse, TopicView, UpdateRequest,
};
use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Method, Request, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// Registry client speaking the HTTP/JSON API.
#[derive(Debug, Clone)]
pub struct HttpRegistryClient {
    /// Base URL of the registry (e.g., "http://127.0.0.1:9000").
    base_url: String,

    /// Pooled hyper client.
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HttpRegistryClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Creates a client for a transport address such as `tcp://host:9000`.
    pub fn from_address(address: &TransportAddress) -> Result<Self> {
        address
            .http_base_url()
            .map(Self::new)
            .ok_or_else(|| Error::Protocol(format!("Not an HTTP transport: {:?}", address)))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Lists the registry's topics.
    pub async fn topics(&self) -> Result<Vec<String>> {
        let list: TopicListResponse = self.send(Method::GET, "/api/v1/topics", None).await?;
        Ok(list.topics)
    }

    /// Returns both stores of one topic.
    pub async fn topic(&self, name: &str) -> Result<TopicView> {
        self.send(Method::GET, &format!("/api/v1/topics/{}", name), None)
            .await
    }

    /// Returns true if the registry answers its health check.
    pub async fn health(&self) -> bool {
        let Ok(request) = self.request(Method::GET, "/api/v1/health", Bytes::new()) else {
            return false;
        };
        match self.client.request(request).await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn post<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let body = serde_json::to_vec(body)
            .map_err(|e| Error::Protocol(format!("Failed to serialize request: {}", e)))?;
        self.send(Method::POST, path, Some(Bytes::from(body))).await
    }

    fn request(&self, method: Method, path: &str, body: Bytes) -> Result<Request<Full<Bytes>>> {
        let uri: Uri = format!("{}{}", self.base_url, path)
            .parse()
            .map_err(|e| Error::Protocol(format!("Invalid URI: {}", e)))?;

        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Full::new(body))
            .map_err(|e| Error::Protocol(format!("Failed to build request: {}", e)))
    }

    async fn send<Resp: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Bytes>,
    ) -> Result<Resp> {
        debug!(%method, path, "Registry request");
        let request = self.request(method, path, body.unwrap_or_default())?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| Error::Protocol(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| Error::Protocol(format!("Failed to read response: {}", e)))?
            .to_bytes();

        if !status.is_success() {
            return Err(match serde_json::from_slice::<ErrorResponse>(&bytes) {
                Ok(body) => Error::remote(body.reason, body.message),
                Err(_) => Error::Protocol(format!("Registry returned status: {}", status)),
            });
        }

        serde_json::from_slice(&bytes)
            .map_err(|e| Error::Protocol(format!("Failed to parse JSON: {}", e)))
    }
}

#[async_trait]
impl RegistryApi for HttpRegistryClient {
    async fn register(&self, request: RegisterRequest) -> Result<ServiceView> {
        self.post("/api/v1/register", &request).await
    }

    async fn update(&self, request: UpdateRequest) -> Result<ServiceView> {
        self.post("/api/v1/update", &request).await
    }

    async fn logout(&self, request: LogoutRequest) -> Result<()> {
        let _: AckResponse = self.post("/api/v1/logout", &request).await?;
        Ok(())
    }

    async fn keep_alive(&self, request: KeepAliveRequest) -> Result<HeartbeatView> {
        self.post("/api/v1/keepalive", &request).await
    }

    async fn conform(&self, request: ConformRequest) -> Result<()> {
        let _: AckResponse = self.post("/api/v1/conform", &request).await?;
        Ok(())
    }
}
