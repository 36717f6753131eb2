//! Error types for the Airfone registry.
//!
//! Every failure the registry can return to a caller is a local,
//! recoverable condition described by [`Error`]. Each variant also maps to
//! an [`ErrorReason`], the machine-readable code that travels next to the
//! human message in error responses.
//!
//! Note that a heartbeat for a service the registry no longer knows is *not*
//! an error: it is reported as the `Dropped` status.
//!
//! ```
//! use airfone_common::{Error, ErrorReason, Result, ServiceId};
//!
//! fn remove(id: ServiceId) -> Result<()> {
//!     Err(Error::invalid_delete("payments", id))
//! }
//!
//! let err = remove(ServiceId::new(3)).unwrap_err();
//! assert_eq!(err.reason(), ErrorReason::InvalidDelete);
//! ```

use crate::types::ServiceId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for registry operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The named topic does not exist.
    #[error("Topic not found: {topic}")]
    TopicNotFound { topic: String },

    /// No service with this identifier is stored where it was looked up.
    #[error("Service not found: {id}")]
    ServiceNotFound { id: ServiceId },

    /// An insert collided with an existing identifier or topic.
    #[error("Already exists: {resource}")]
    AlreadyExists { resource: String },

    /// The update target is absent, even after trying to resurrect it.
    #[error("Invalid update: topic={topic}, service={id}: {reason}")]
    InvalidUpdate {
        topic: String,
        id: ServiceId,
        reason: String,
    },

    /// The service to remove is in neither store of its topic.
    #[error("Invalid delete: topic={topic}, service={id} does not exist, remove failed")]
    InvalidDelete { topic: String, id: ServiceId },

    /// A registration carried the terminal `Dropped` status.
    #[error("Service has been dropped: topic={topic}")]
    AlreadyDropped { topic: String },

    /// Invalid input or configuration.
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// An error reported by a remote registry.
    #[error("Registry returned {reason}: {message}")]
    Remote {
        reason: ErrorReason,
        message: String,
    },

    /// Transport or encoding failure while talking to a registry.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The registry cannot continue an operation, e.g. its identifier space
    /// is exhausted.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Generic error with context.
    #[error("{message}: {source}")]
    WithContext {
        message: String,
        source: Box<Error>,
    },
}

impl Error {
    /// Creates a TopicNotFound error.
    pub fn topic_not_found(topic: impl Into<String>) -> Self {
        Self::TopicNotFound {
            topic: topic.into(),
        }
    }

    /// Creates a ServiceNotFound error.
    pub fn service_not_found(id: ServiceId) -> Self {
        Self::ServiceNotFound { id }
    }

    /// Creates an AlreadyExists error.
    pub fn already_exists(resource: impl Into<String>) -> Self {
        Self::AlreadyExists {
            resource: resource.into(),
        }
    }

    /// Creates an InvalidUpdate error.
    pub fn invalid_update(
        topic: impl Into<String>,
        id: ServiceId,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidUpdate {
            topic: topic.into(),
            id,
            reason: reason.into(),
        }
    }

    /// Creates an InvalidDelete error.
    pub fn invalid_delete(topic: impl Into<String>, id: ServiceId) -> Self {
        Self::InvalidDelete {
            topic: topic.into(),
            id,
        }
    }

    /// Creates an AlreadyDropped error.
    pub fn already_dropped(topic: impl Into<String>) -> Self {
        Self::AlreadyDropped {
            topic: topic.into(),
        }
    }

    /// Creates a Validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a Remote error from a decoded error response.
    pub fn remote(reason: ErrorReason, message: impl Into<String>) -> Self {
        Self::Remote {
            reason,
            message: message.into(),
        }
    }

    /// Adds context to an error.
    ///
    /// # Example
    /// ```
    /// use airfone_common::{Error, ErrorReason};
    ///
    /// let err = Error::topic_not_found("payments").context("Heartbeat rejected");
    /// assert!(err.to_string().starts_with("Heartbeat rejected"));
    /// assert_eq!(err.reason(), ErrorReason::NotFound);
    /// ```
    pub fn context(self, message: impl Into<String>) -> Self {
        Self::WithContext {
            message: message.into(),
            source: Box::new(self),
        }
    }

    /// Returns the machine-readable reason for this error.
    pub fn reason(&self) -> ErrorReason {
        match self {
            Error::TopicNotFound { .. } | Error::ServiceNotFound { .. } => ErrorReason::NotFound,
            Error::AlreadyExists { .. } => ErrorReason::AlreadyExists,
            Error::InvalidUpdate { .. } => ErrorReason::InvalidUpdate,
            Error::InvalidDelete { .. } => ErrorReason::InvalidDelete,
            Error::AlreadyDropped { .. } => ErrorReason::AlreadyDropped,
            Error::Validation { .. } => ErrorReason::Validation,
            Error::Remote { reason, .. } => *reason,
            Error::Protocol(_) => ErrorReason::Protocol,
            Error::Internal(_) => ErrorReason::Internal,
            Error::WithContext { source, .. } => source.reason(),
        }
    }

    /// Returns true if the error means "unknown topic or service".
    pub fn is_not_found(&self) -> bool {
        self.reason() == ErrorReason::NotFound
    }
}

/// Machine-readable error codes carried in error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorReason {
    NotFound,
    AlreadyExists,
    InvalidUpdate,
    InvalidDelete,
    AlreadyDropped,
    Validation,
    Protocol,
    Internal,
}

impl ErrorReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorReason::NotFound => "NOT_FOUND",
            ErrorReason::AlreadyExists => "ALREADY_EXISTS",
            ErrorReason::InvalidUpdate => "INVALID_UPDATE",
            ErrorReason::InvalidDelete => "INVALID_DELETE",
            ErrorReason::AlreadyDropped => "ALREADY_DROPPED",
            ErrorReason::Validation => "VALIDATION",
            ErrorReason::Protocol => "PROTOCOL",
            ErrorReason::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// Convenience methods for Result types
pub trait ResultExt<T> {
    /// Adds context to an error result.
    fn context(self, message: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(message))
    }
}
