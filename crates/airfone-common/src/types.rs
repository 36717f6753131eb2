//! Core domain types used throughout the Airfone registry.
//!
//! These are plain value types: cheap to copy or clone, serializable,
//! and free of any locking or timing concerns.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Service identifier - uniquely identifies one registered service instance.
///
/// Identifiers are assigned by the registry from a monotonically increasing
/// counter. `0` is reserved and means "not assigned yet".
///
/// # Example
/// ```
/// use airfone_common::ServiceId;
///
/// let id = ServiceId::new(7);
/// assert_eq!(id.get(), 7);
/// assert!(id.is_assigned());
/// assert!(!ServiceId::UNASSIGNED.is_assigned());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(u32);

impl ServiceId {
    /// The reserved "unassigned" identifier.
    pub const UNASSIGNED: ServiceId = ServiceId(0);

    /// Creates a ServiceId from its raw value.
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw identifier.
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Returns true unless this is the reserved zero identifier.
    pub const fn is_assigned(&self) -> bool {
        self.0 != 0
    }
}

impl From<u32> for ServiceId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Health status of a registered service.
///
/// # Rust Learning Note
///
/// The status is reported to clients on every heartbeat, so callers are
/// expected to `match` on it instead of treating anything other than
/// `Running` as a failure:
///
/// ```
/// use airfone_common::ServiceStatus;
///
/// fn next_step(status: ServiceStatus) -> &'static str {
///     match status {
///         ServiceStatus::Running => "keep going",
///         ServiceStatus::Changed => "adopt dependencies, then conform",
///         ServiceStatus::Pending => "wait for dependencies",
///         ServiceStatus::Dropped => "register again",
///     }
/// }
///
/// assert_eq!(next_step(ServiceStatus::Dropped), "register again");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceStatus {
    /// Healthy, dependencies are current.
    #[default]
    Running,

    /// Dependencies were just refreshed; the client must acknowledge with Conform.
    Changed,

    /// Blocked because a required dependency is unavailable.
    Pending,

    /// The server-side record is gone; the client must register again.
    Dropped,
}

impl ServiceStatus {
    /// Returns the wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Running => "RUNNING",
            ServiceStatus::Changed => "CHANGED",
            ServiceStatus::Pending => "PENDING",
            ServiceStatus::Dropped => "DROPPED",
        }
    }

    /// Returns true for the statuses that live in a topic's running store.
    pub fn is_running_placement(&self) -> bool {
        matches!(self, ServiceStatus::Running | ServiceStatus::Changed)
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One opaque metadata entry attached to a service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Metadata {
    pub title: String,
    pub content: String,
}

impl Metadata {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}
