//! Transport layer for the registry server.
//!
//! # Rust Learning Note
//!
//! ## Conditional Compilation
//!
//! The Unix socket variants only exist on Unix targets:
//!
//! ```rust,ignore
//! #[cfg(unix)]
//! UnixSocket { path: PathBuf },
//! ```
//!
//! Every `match` over the enum carries the same `#[cfg(unix)]` arm, so a
//! Windows build neither sees the variant nor has to handle it.

use serde::{Deserialize, Serialize};

#[cfg(unix)]
use std::path::PathBuf;

/// Where the registry server listens.
///
/// In YAML:
///
/// ```yaml
/// transport:
///   type: tcp
///   port: 9000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportConfig {
    /// TCP socket on all interfaces.
    Tcp { port: u16 },

    /// Unix domain socket (Unix only).
    #[cfg(unix)]
    #[serde(rename = "unix")]
    UnixSocket { path: PathBuf },
}

impl TransportConfig {
    pub fn tcp(port: u16) -> Self {
        Self::Tcp { port }
    }

    #[cfg(unix)]
    pub fn unix_socket(path: impl Into<PathBuf>) -> Self {
        Self::UnixSocket { path: path.into() }
    }

    /// Returns a human-readable description of the transport.
    pub fn describe(&self) -> String {
        match self {
            TransportConfig::Tcp { port } => format!("TCP on port {}", port),

            #[cfg(unix)]
            TransportConfig::UnixSocket { path } => {
                format!("Unix domain socket at {}", path.display())
            }
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::tcp(9000)
    }
}

/// Transport address for clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportAddress {
    /// TCP address (host:port).
    Tcp(String),

    /// Unix domain socket path.
    #[cfg(unix)]
    UnixSocket(PathBuf),
}

impl TransportAddress {
    /// Parses a transport address.
    ///
    /// Format:
    /// - `tcp://localhost:9000` or `http://localhost:9000` → TCP
    /// - `unix:///tmp/airfone.sock` → Unix socket
    pub fn parse(s: &str) -> Result<Self, String> {
        if let Some(addr) = s.strip_prefix("tcp://").or_else(|| s.strip_prefix("http://")) {
            if addr.is_empty() {
                return Err(format!("Missing host in transport address: {}", s));
            }
            return Ok(Self::Tcp(addr.trim_end_matches('/').to_string()));
        }

        if let Some(path) = s.strip_prefix("unix://") {
            #[cfg(unix)]
            {
                return Ok(Self::UnixSocket(PathBuf::from(path)));
            }
            #[cfg(not(unix))]
            {
                let _ = path;
                return Err("Unix sockets not supported on this platform".to_string());
            }
        }

        Err(format!("Invalid transport address: {}", s))
    }

    /// Base URL for HTTP clients, if the address is reachable over TCP.
    pub fn http_base_url(&self) -> Option<String> {
        match self {
            TransportAddress::Tcp(addr) => Some(format!("http://{}", addr)),
            #[cfg(unix)]
            TransportAddress::UnixSocket(_) => None,
        }
    }
}

impl Default for TransportAddress {
    fn default() -> Self {
        Self::Tcp("127.0.0.1:9000".to_string())
    }
}
