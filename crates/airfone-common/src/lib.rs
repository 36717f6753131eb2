//! # Airfone Common
//!
//! Common types and errors shared across the Airfone registry crates.
//!
//! This crate provides the foundational pieces that the registry engine,
//! its HTTP facade and the registrant client all agree on: service
//! identifiers, health status codes, metadata entries and the error
//! taxonomy with its machine-readable reasons.

pub mod errors;
pub mod types;

// Re-export commonly used items
pub use errors::{Error, ErrorReason, Result, ResultExt};
pub use types::{Metadata, ServiceId, ServiceStatus};
