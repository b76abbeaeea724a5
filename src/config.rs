//! Connection and client configuration.
//!
//! Both structs carry sensible defaults; use the builder-style setters to
//! override individual values.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use node_debug_client::config::{ClientConfig, ConnectionConfig};
//!
//! let config = ClientConfig::default()
//!     .request_timeout(Duration::from_secs(30))
//!     .connection(ConnectionConfig::default().wake_up(false));
//!
//! assert_eq!(config.request_timeout, Some(Duration::from_secs(30)));
//! assert!(!config.connection.wake_up);
//! ```

use std::time::Duration;

/// Default timeout for establishing the transport.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default size of the socket read buffer (and of the retained framer buffer).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;

/// Default maximum accepted `Content-Length` (64MB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Default maximum length of a single header line.
pub const DEFAULT_MAX_HEADER_LINE: usize = 8 * 1024;

/// Default capacity of each event broadcast channel.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 64;

/// Configuration for a [`DebuggerConnection`](crate::DebuggerConnection).
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Timeout for TCP connect / WebSocket handshake.
    pub connect_timeout: Duration,
    /// Size of the buffer used for each socket read.
    pub read_buffer_size: usize,
    /// Largest `Content-Length` accepted before the stream is treated as corrupt.
    pub max_message_size: usize,
    /// Longest header line accepted before the stream is treated as corrupt.
    pub max_header_line: usize,
    /// Send an HTTP `HEAD` to WebSocket endpoints before the upgrade.
    pub wake_up: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_header_line: DEFAULT_MAX_HEADER_LINE,
            wake_up: true,
        }
    }
}

impl ConnectionConfig {
    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the socket read buffer size.
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    /// Set the maximum accepted message body size.
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Set the maximum header line length.
    pub fn max_header_line(mut self, size: usize) -> Self {
        self.max_header_line = size;
        self
    }

    /// Enable or disable the WebSocket wake-up request.
    pub fn wake_up(mut self, enabled: bool) -> Self {
        self.wake_up = enabled;
        self
    }
}

/// Configuration for a [`DebuggerClient`](crate::DebuggerClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Transport and framing settings.
    pub connection: ConnectionConfig,
    /// Upper bound on waiting for a response. `None` waits until the
    /// response arrives, the caller cancels, or the connection closes.
    pub request_timeout: Option<Duration>,
    /// Buffer size of each event broadcast channel.
    pub event_channel_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            request_timeout: None,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl ClientConfig {
    /// Replace the connection settings.
    pub fn connection(mut self, connection: ConnectionConfig) -> Self {
        self.connection = connection;
        self
    }

    /// Bound how long `send_request` waits for a response.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Set the capacity of the event channels.
    pub fn event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }
}
