//! Debuggee endpoint URIs.
//!
//! Accepted forms:
//! - `tcp://host:port` - raw V8 debug agent socket
//! - `ws://host[:port]/path`, `wss://...` - WebSocket proxy carrying the same bytes
//!
//! # Example
//!
//! ```
//! use node_debug_client::transport::Endpoint;
//!
//! let endpoint: Endpoint = "tcp://localhost:5858".parse().unwrap();
//! assert_eq!(endpoint.scheme(), "tcp");
//!
//! assert!("http://localhost:5858".parse::<Endpoint>().is_err());
//! ```

use std::fmt;
use std::str::FromStr;

use url::{Host, Url};

use crate::error::{DebuggerError, Result};

/// Where the debuggee listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Plain TCP socket.
    Tcp {
        /// Host name or IP address (IPv6 without brackets).
        host: String,
        /// TCP port.
        port: u16,
    },
    /// WebSocket (`ws` or `wss`).
    WebSocket(Url),
}

impl Endpoint {
    /// Parse and validate an endpoint URI.
    ///
    /// # Errors
    ///
    /// `UnsupportedScheme` for anything but `tcp`, `ws` and `wss`;
    /// `InvalidEndpoint` when the URI is malformed or lacks a host, or a
    /// `tcp` URI lacks a port.
    pub fn parse(uri: &str) -> Result<Self> {
        let url = Url::parse(uri)
            .map_err(|e| DebuggerError::InvalidEndpoint(format!("{uri}: {e}")))?;

        match url.scheme() {
            "tcp" => {
                let host = host_name(&url)
                    .ok_or_else(|| DebuggerError::InvalidEndpoint(format!("{uri}: missing host")))?;
                let port = url
                    .port()
                    .ok_or_else(|| DebuggerError::InvalidEndpoint(format!("{uri}: missing port")))?;
                Ok(Self::Tcp { host, port })
            }
            "ws" | "wss" => {
                if url.host().is_none() {
                    return Err(DebuggerError::InvalidEndpoint(format!("{uri}: missing host")));
                }
                Ok(Self::WebSocket(url))
            }
            other => Err(DebuggerError::UnsupportedScheme(other.to_string())),
        }
    }

    /// URI scheme of this endpoint.
    pub fn scheme(&self) -> &str {
        match self {
            Self::Tcp { .. } => "tcp",
            Self::WebSocket(url) => url.scheme(),
        }
    }

    /// Check if this is a WebSocket endpoint.
    pub fn is_websocket(&self) -> bool {
        matches!(self, Self::WebSocket(_))
    }
}

/// Host suitable for a socket connect, i.e. IPv6 literals without brackets.
pub(crate) fn host_name(url: &Url) -> Option<String> {
    match url.host()? {
        Host::Domain(domain) => Some(domain.to_string()),
        Host::Ipv4(addr) => Some(addr.to_string()),
        Host::Ipv6(addr) => Some(addr.to_string()),
    }
}

impl FromStr for Endpoint {
    type Err = DebuggerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp { host, port } if host.contains(':') => write!(f, "tcp://[{host}]:{port}"),
            Self::Tcp { host, port } => write!(f, "tcp://{host}:{port}"),
            Self::WebSocket(url) => write!(f, "{url}"),
        }
    }
}
