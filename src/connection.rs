//! Framed message connection to a debuggee.
//!
//! [`DebuggerConnection`] owns at most one live link at a time. A link is a
//! transport stream split into:
//! 1. a read task feeding a [`MessageFramer`] and handing each message body
//!    to the [`ConnectionObserver`]
//! 2. a writer task draining the link's outbound [`AsyncQueue`]
//!
//! When either side stops, the link is torn down and the observer hears
//! `on_closed` exactly once for it.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use node_debug_client::{ConnectionObserver, DebuggerConnection};
//!
//! struct Printer;
//!
//! impl ConnectionObserver for Printer {
//!     fn on_message(&self, message: String) {
//!         println!("<- {message}");
//!     }
//!     fn on_closed(&self) {
//!         println!("closed");
//!     }
//! }
//!
//! let connection = DebuggerConnection::new(Default::default(), Arc::new(Printer));
//! connection.connect("tcp://localhost:5858").await?;
//! connection.send_message(r#"{"seq":1,"type":"request","command":"version"}"#)?;
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use semver::Version;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ConnectionConfig;
use crate::error::{DebuggerError, Result};
use crate::protocol::{build_frame_parts, MessageFramer, OutboundPacket};
use crate::queue::AsyncQueue;
use crate::transport::{self, Endpoint};
use crate::writer::spawn_writer_task;

/// Receives inbound traffic from a [`DebuggerConnection`].
///
/// Both callbacks run on the connection's read task; they must not block.
pub trait ConnectionObserver: Send + Sync + 'static {
    /// A complete message body arrived.
    fn on_message(&self, message: String);

    /// The live link ended (EOF, I/O error, or `close`).
    fn on_closed(&self);
}

/// One established transport and its tasks.
struct Link {
    id: u64,
    outbound: Arc<AsyncQueue<OutboundPacket>>,
    shutdown: CancellationToken,
    reader: Option<JoinHandle<()>>,
}

struct Shared {
    /// Live link; `Some` with an uncancelled token means connected.
    link: Mutex<Option<Link>>,
    node_version: RwLock<Option<Version>>,
    observer: Arc<dyn ConnectionObserver>,
    config: ConnectionConfig,
    next_link_id: AtomicU64,
    /// Read tasks of links closed without waiting; joined before the next
    /// link is installed.
    closing: Mutex<Vec<JoinHandle<()>>>,
}

/// Connection to a debuggee speaking the `Content-Length` framed protocol.
pub struct DebuggerConnection {
    shared: Arc<Shared>,
}

impl DebuggerConnection {
    /// Create a disconnected connection reporting to `observer`.
    pub fn new(config: ConnectionConfig, observer: Arc<dyn ConnectionObserver>) -> Self {
        Self {
            shared: Arc::new(Shared {
                link: Mutex::new(None),
                node_version: RwLock::new(None),
                observer,
                config,
                next_link_id: AtomicU64::new(1),
                closing: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Connect to the debuggee at `uri`, replacing any live link.
    ///
    /// # Errors
    ///
    /// `UnsupportedScheme`/`InvalidEndpoint` before any I/O, otherwise the
    /// transport's connect error.
    pub async fn connect(&self, uri: &str) -> Result<()> {
        let endpoint = Endpoint::parse(uri)?;
        self.connect_endpoint(&endpoint).await
    }

    /// Connect to an already parsed endpoint, replacing any live link.
    pub async fn connect_endpoint(&self, endpoint: &Endpoint) -> Result<()> {
        self.teardown().await;
        tracing::debug!("Connecting to {}", endpoint);
        let stream = transport::connect(endpoint, &self.shared.config).await?;
        self.attach(stream).await;
        Ok(())
    }

    /// Run the protocol over an already connected stream.
    ///
    /// Any live link is torn down first, and its `on_closed` has been
    /// delivered by the time the new link starts.
    pub async fn attach<S>(&self, stream: S)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        self.teardown().await;

        let (reader, writer) = tokio::io::split(stream);
        let id = self.shared.next_link_id.fetch_add(1, Ordering::Relaxed);
        let outbound = Arc::new(AsyncQueue::new());
        let shutdown = CancellationToken::new();

        *self.shared.node_version.write() = None;

        // Holding the lock while spawning keeps a link that dies instantly
        // from clearing itself before it is installed.
        let mut link = self.shared.link.lock();
        spawn_writer_task(writer, outbound.clone(), shutdown.clone());
        let reader = tokio::spawn(read_loop(
            reader,
            self.shared.clone(),
            id,
            shutdown.clone(),
        ));

        if let Some(raced) = link.replace(Link {
            id,
            outbound,
            shutdown,
            reader: Some(reader),
        }) {
            raced.shutdown.cancel();
        }
    }

    /// Check if a link is live.
    pub fn is_connected(&self) -> bool {
        self.shared
            .link
            .lock()
            .as_ref()
            .map_or(false, |link| !link.shutdown.is_cancelled())
    }

    /// Runtime version announced by the debuggee, once seen.
    pub fn node_version(&self) -> Option<Version> {
        self.shared.node_version.read().clone()
    }

    /// Frame `text` and queue it for sending.
    ///
    /// Without a live link the message is dropped and `Ok(())` returned;
    /// check [`is_connected`](Self::is_connected) if the difference matters.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `text` is empty.
    pub fn send_message(&self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Err(DebuggerError::invalid_argument("message text must not be empty"));
        }

        let link = self.shared.link.lock();
        match link.as_ref() {
            Some(link) if !link.shutdown.is_cancelled() => {
                let (header, body) = build_frame_parts(text);
                // Both packets queued under the lock, so no other message
                // can land between them.
                link.outbound.add(header);
                link.outbound.add(body);
            }
            _ => tracing::debug!("Not connected, dropping outbound message"),
        }
        Ok(())
    }

    /// Close the live link, if any. Idempotent.
    ///
    /// The link's `on_closed` is delivered by its read task shortly after;
    /// a following `connect`/`attach` waits for it.
    pub fn close(&self) {
        let link = self.shared.link.lock().take();
        if let Some(mut link) = link {
            tracing::debug!("Closing debugger connection");
            link.shutdown.cancel();
            if let Some(reader) = link.reader.take() {
                self.shared.closing.lock().push(reader);
            }
        }
    }

    /// Close the live link and wait for every closed link's read task, so
    /// no stale `on_closed` can reach the observer after this returns.
    async fn teardown(&self) {
        let link = self.shared.link.lock().take();
        let mut readers = std::mem::take(&mut *self.shared.closing.lock());
        if let Some(mut link) = link {
            link.shutdown.cancel();
            readers.extend(link.reader.take());
        }
        for reader in readers {
            let _ = reader.await;
        }
    }
}

impl Drop for DebuggerConnection {
    fn drop(&mut self) {
        self.close();
    }
}

/// Read task body: runs the framer until the link ends, then reports it.
async fn read_loop<R>(mut reader: R, shared: Arc<Shared>, link_id: u64, shutdown: CancellationToken)
where
    R: AsyncRead + Unpin,
{
    match read_messages(&mut reader, &shared, &shutdown).await {
        Ok(()) => tracing::debug!("Debugger connection ended"),
        Err(e) => tracing::error!("Read loop error: {}", e),
    }

    shutdown.cancel();
    {
        let mut link = shared.link.lock();
        if link.as_ref().map_or(false, |l| l.id == link_id) {
            *link = None;
        }
    }
    shared.observer.on_closed();
}

async fn read_messages<R>(reader: &mut R, shared: &Shared, shutdown: &CancellationToken) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let config = &shared.config;
    let mut framer = MessageFramer::with_limits(
        config.read_buffer_size,
        config.max_message_size,
        config.max_header_line,
    );
    let mut buf = vec![0u8; config.read_buffer_size];

    loop {
        let n = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            res = reader.read(&mut buf) => res?,
        };
        if n == 0 {
            return Ok(());
        }

        let frames = framer.push(&buf[..n])?;

        if let Some(version) = framer.node_version() {
            let mut known = shared.node_version.write();
            if known.is_none() {
                tracing::debug!("Debuggee runs node {}", version);
                *known = Some(version.clone());
            }
        }

        for frame in frames {
            match frame.text() {
                Ok(text) => shared.observer.on_message(text.to_owned()),
                Err(e) => tracing::warn!("Dropping message with invalid UTF-8 body: {}", e),
            }
        }
    }
}
