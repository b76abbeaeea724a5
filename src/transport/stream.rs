//! Connected debuggee stream.
//!
//! - `tcp://`: `tokio::net::TcpStream`
//! - `ws://`, `wss://`: [`WebSocketByteStream`]
//!
//! # Example
//!
//! ```ignore
//! use node_debug_client::config::ConnectionConfig;
//! use node_debug_client::transport::{connect, Endpoint};
//!
//! let endpoint = Endpoint::parse("tcp://localhost:5858")?;
//! let stream = connect(&endpoint, &ConnectionConfig::default()).await?;
//! ```

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;

use super::endpoint::Endpoint;
use super::websocket::{wake_host, WebSocketByteStream};
use crate::config::ConnectionConfig;
use crate::error::{DebuggerError, Result};

/// A connected byte stream to the debuggee.
pub enum DebuggerStream {
    /// Raw TCP connection.
    Tcp(TcpStream),
    /// WebSocket connection carrying the byte stream.
    WebSocket(Box<WebSocketByteStream>),
}

/// Open a stream to `endpoint`.
///
/// The whole operation, including the WebSocket wake-up request and
/// handshake, is bounded by `config.connect_timeout`.
///
/// # Errors
///
/// `Timeout` when the deadline passes, `Io`/`WebSocket` when the debuggee
/// refuses or the handshake fails.
pub async fn connect(endpoint: &Endpoint, config: &ConnectionConfig) -> Result<DebuggerStream> {
    let open = async {
        match endpoint {
            Endpoint::Tcp { host, port } => {
                let stream = TcpStream::connect((host.as_str(), *port)).await?;
                let _ = stream.set_nodelay(true);
                Ok::<_, DebuggerError>(DebuggerStream::Tcp(stream))
            }
            Endpoint::WebSocket(url) => {
                if config.wake_up {
                    wake_host(url, config.connect_timeout).await;
                }
                let stream = WebSocketByteStream::connect(url).await?;
                Ok(DebuggerStream::WebSocket(Box::new(stream)))
            }
        }
    };

    tokio::time::timeout(config.connect_timeout, open)
        .await
        .map_err(|_| DebuggerError::Timeout)?
}

impl AsyncRead for DebuggerStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::WebSocket(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for DebuggerStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::WebSocket(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_write_vectored(cx, bufs),
            Self::WebSocket(stream) => Pin::new(stream.as_mut()).poll_write_vectored(cx, bufs),
        }
    }

    fn is_write_vectored(&self) -> bool {
        match self {
            Self::Tcp(stream) => stream.is_write_vectored(),
            Self::WebSocket(stream) => stream.is_write_vectored(),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            Self::WebSocket(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let result = match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::WebSocket(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        };
        // Closing twice, or after the peer reset, is not an error.
        match result {
            Poll::Ready(Err(e)) if e.kind() == io::ErrorKind::NotConnected => Poll::Ready(Ok(())),
            other => other,
        }
    }
}
