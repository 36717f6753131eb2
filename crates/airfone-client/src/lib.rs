//! # Airfone Client
//!
//! Client side of the Airfone registry protocol.
//!
//! - [`RegistryApi`]: the registry operations as an async trait
//! - [`HttpRegistryClient`]: talks to a registry server over HTTP
//! - [`DirectRegistryClient`]: calls an in-process registry
//! - [`Session`]: registers a service and keeps it alive in the background,
//!   acknowledging dependency changes and re-registering after a drop

pub mod api;
pub mod direct;
pub mod http;
pub mod session;

pub use api::RegistryApi;
pub use direct::DirectRegistryClient;
pub use http::HttpRegistryClient;
pub use session::{Session, SessionConfig};
