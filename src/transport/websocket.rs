//! WebSocket transport presented as a byte stream.
//!
//! Remote debugging proxies tunnel the raw debugger byte stream through a
//! WebSocket. Message boundaries carry no meaning: inbound binary and text
//! payloads are concatenated, and every outbound write becomes one binary
//! message. Ping/pong is handled by tungstenite; a close frame reads as EOF.
//!
//! Before the upgrade, [`wake_host`] may send an HTTP `HEAD` to the same
//! URL (`ws`→`http`, `wss`→`https`).

use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use bytes::{Buf, Bytes};
use futures_util::{Sink, Stream};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::Result;

/// Byte-stream adapter over a client WebSocket.
pub struct WebSocketByteStream {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
    /// Unread remainder of the last received message.
    pending: Bytes,
    /// Close frame seen or stream ended.
    eof: bool,
}

impl WebSocketByteStream {
    /// Perform the WebSocket handshake with `url`.
    pub async fn connect(url: &Url) -> Result<Self> {
        let (inner, response) = tokio_tungstenite::connect_async(url.as_str()).await?;
        tracing::debug!("WebSocket handshake with {} done: {}", url, response.status());
        Ok(Self::new(inner))
    }

    /// Wrap an established WebSocket.
    pub fn new(inner: WebSocketStream<MaybeTlsStream<TcpStream>>) -> Self {
        Self {
            inner,
            pending: Bytes::new(),
            eof: false,
        }
    }
}

fn to_io_error(e: tungstenite::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e)
}

impl AsyncRead for WebSocketByteStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        loop {
            if !this.pending.is_empty() {
                let n = this.pending.len().min(buf.remaining());
                buf.put_slice(&this.pending[..n]);
                this.pending.advance(n);
                return Poll::Ready(Ok(()));
            }
            if this.eof {
                return Poll::Ready(Ok(()));
            }

            match ready!(Pin::new(&mut this.inner).poll_next(cx)) {
                Some(Ok(Message::Binary(data))) => this.pending = Bytes::from(data),
                Some(Ok(Message::Text(text))) => this.pending = Bytes::from(text.into_bytes()),
                Some(Ok(Message::Close(_))) | None => this.eof = true,
                Some(Ok(_)) => {}
                Some(Err(tungstenite::Error::ConnectionClosed)) => this.eof = true,
                Some(Err(e)) => return Poll::Ready(Err(to_io_error(e))),
            }
        }
    }
}

impl AsyncWrite for WebSocketByteStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        ready!(Pin::new(&mut this.inner).poll_ready(cx)).map_err(to_io_error)?;
        Pin::new(&mut this.inner)
            .start_send(Message::Binary(buf.to_vec()))
            .map_err(to_io_error)?;
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner)
            .poll_flush(cx)
            .map_err(to_io_error)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match ready!(Pin::new(&mut self.get_mut().inner).poll_close(cx)) {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed)
            | Err(tungstenite::Error::AlreadyClosed) => Poll::Ready(Ok(())),
            Err(e) => Poll::Ready(Err(to_io_error(e))),
        }
    }
}

/// Map a WebSocket endpoint to the HTTP URL serving the same path.
fn wake_url(url: &Url) -> Option<Url> {
    let scheme = match url.scheme() {
        "ws" => "http",
        "wss" => "https",
        _ => return None,
    };
    let mut http = url.clone();
    http.set_scheme(scheme).ok()?;
    Some(http)
}

/// Best-effort HTTP `HEAD` to wake a lazily started debuggee.
///
/// Sites hosting the debug proxy may only start the node process on the
/// first HTTP request. Every failure here is ignored.
pub(crate) async fn wake_host(url: &Url, timeout: Duration) {
    let Some(target) = wake_url(url) else {
        tracing::debug!("No wake-up request for {} endpoint", url.scheme());
        return;
    };

    let sent = reqwest::Client::new()
        .head(target.clone())
        .timeout(timeout)
        .send()
        .await;
    match sent {
        Ok(response) => tracing::debug!("Wake-up request to {} answered {}", target, response.status()),
        Err(e) if e.is_timeout() => tracing::debug!("Wake-up request to {} timed out", target),
        Err(e) => tracing::debug!("Wake-up request to {} failed: {}", target, e),
    }
}
