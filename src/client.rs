//! Request/response correlation and event fan-out.
//!
//! [`DebuggerClient`] sits on a [`DebuggerConnection`]. Outgoing commands
//! register a completion keyed by their sequence id; inbound responses are
//! routed back by `request_seq`, and inbound events are parsed and published
//! on one broadcast channel per kind.
//!
//! # Example
//!
//! ```ignore
//! use node_debug_client::commands::EvaluateCommand;
//! use node_debug_client::{ClientConfig, DebuggerClient};
//! use tokio_util::sync::CancellationToken;
//!
//! let client = DebuggerClient::new(ClientConfig::default());
//! client.connect("tcp://localhost:5858").await?;
//!
//! let mut breaks = client.subscribe_breakpoints();
//! let mut evaluate = EvaluateCommand::new(client.next_command_id(), "process.pid", None)?;
//! client.send_request(&mut evaluate, &CancellationToken::new()).await?;
//! println!("pid = {:?}", evaluate.result);
//! ```

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use semver::Version;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, oneshot};
use tokio_util::sync::CancellationToken;

use crate::commands::DebuggerCommand;
use crate::config::ClientConfig;
use crate::connection::{ConnectionObserver, DebuggerConnection};
use crate::error::{DebuggerError, Result};
use crate::events::{BreakpointEvent, CompileScriptEvent, ExceptionEvent};
use crate::protocol::{Event, EventKind, InboundMessage, Response};

/// `None` means the connection closed before a response arrived.
type Completion = oneshot::Sender<Option<Response>>;

struct PendingRequest {
    generation: u64,
    completion: Completion,
}

/// Connection observer that owns the pending map and the event channels.
struct Router {
    pending: Mutex<HashMap<i64, PendingRequest>>,
    next_generation: AtomicU64,
    breakpoints: broadcast::Sender<BreakpointEvent>,
    compile_scripts: broadcast::Sender<CompileScriptEvent>,
    exceptions: broadcast::Sender<ExceptionEvent>,
    connection_closed: broadcast::Sender<()>,
}

impl Router {
    fn new(capacity: usize) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
            breakpoints: broadcast::channel(capacity).0,
            compile_scripts: broadcast::channel(capacity).0,
            exceptions: broadcast::channel(capacity).0,
            connection_closed: broadcast::channel(capacity).0,
        }
    }

    fn complete(&self, response: Response) {
        let pending = self.pending.lock().remove(&response.request_seq);
        match pending {
            Some(pending) => {
                // The caller may have gone away in the meantime.
                let _ = pending.completion.send(Some(response));
            }
            None => tracing::debug!(
                "Dropping response for unknown request {}",
                response.request_seq
            ),
        }
    }

    fn publish(&self, event: Event) {
        let result = match event.kind() {
            EventKind::Break => BreakpointEvent::from_event(&event).map(|e| {
                let _ = self.breakpoints.send(e);
            }),
            EventKind::AfterCompile => CompileScriptEvent::from_event(&event).map(|e| {
                if let Some(e) = e {
                    let _ = self.compile_scripts.send(e);
                }
            }),
            EventKind::Exception => ExceptionEvent::from_event(&event).map(|e| {
                let _ = self.exceptions.send(e);
            }),
            EventKind::Ignored => Ok(()),
            EventKind::Unknown => {
                tracing::debug!("Dropping unknown event {}", event.event);
                Ok(())
            }
        };
        if let Err(e) = result {
            tracing::warn!("Dropping malformed {} event: {}", event.event, e);
        }
    }

    /// Remove `id` if it still belongs to the request of `generation`.
    fn forget(&self, id: i64, generation: u64) {
        let mut pending = self.pending.lock();
        if pending.get(&id).map_or(false, |p| p.generation == generation) {
            pending.remove(&id);
        }
    }
}

impl ConnectionObserver for Router {
    fn on_message(&self, message: String) {
        match InboundMessage::parse(&message) {
            Ok(InboundMessage::Response(response)) => self.complete(response),
            Ok(InboundMessage::Event(event)) => self.publish(event),
            Err(e) => tracing::warn!("Dropping unparseable message: {}", e),
        }
    }

    fn on_closed(&self) {
        // Swap, then fail outside the lock. Requests registered after the
        // swap wait for the next close.
        let drained = std::mem::take(&mut *self.pending.lock());
        if !drained.is_empty() {
            tracing::debug!("Failing {} pending requests on close", drained.len());
        }
        for (_, pending) in drained {
            let _ = pending.completion.send(None);
        }
        let _ = self.connection_closed.send(());
    }
}

/// Removes the pending entry on every exit path of `send_request`.
struct PendingGuard<'a> {
    router: &'a Router,
    id: i64,
    generation: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.router.forget(self.id, self.generation);
    }
}

/// Client for the V8 debugger protocol.
pub struct DebuggerClient {
    connection: DebuggerConnection,
    router: Arc<Router>,
    next_id: AtomicI64,
    request_timeout: Option<Duration>,
}

impl DebuggerClient {
    /// Create a disconnected client.
    pub fn new(config: ClientConfig) -> Self {
        let router = Arc::new(Router::new(config.event_channel_capacity.max(1)));
        let connection = DebuggerConnection::new(config.connection, router.clone());
        Self {
            connection,
            router,
            next_id: AtomicI64::new(1),
            request_timeout: config.request_timeout,
        }
    }

    /// Connect to `uri` (`tcp://`, `ws://` or `wss://`).
    ///
    /// A previous link is closed first, failing its pending requests.
    pub async fn connect(&self, uri: &str) -> Result<()> {
        self.connection.connect(uri).await
    }

    /// Speak the protocol over an already connected stream.
    pub async fn attach<S>(&self, stream: S)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        self.connection.attach(stream).await;
    }

    /// Close the connection. Pending requests fail with `ConnectionClosed`.
    pub fn close(&self) {
        self.connection.close();
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Runtime version announced by the debuggee.
    pub fn node_version(&self) -> Option<Version> {
        self.connection.node_version()
    }

    /// Next unused sequence id.
    pub fn next_command_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Number of requests awaiting a response.
    pub fn pending_requests(&self) -> usize {
        self.router.pending.lock().len()
    }

    /// Send `command` and wait for its response.
    ///
    /// Cancelling `cancel` abandons the wait; the request itself is not
    /// retracted and a late response is dropped.
    ///
    /// # Errors
    ///
    /// - `DuplicateRequestId` if the id is already in flight (nothing is sent)
    /// - `Cancelled`, `Timeout` or `ConnectionClosed` if no response arrives
    /// - whatever [`DebuggerCommand::process_response`] returns
    pub async fn send_request<C>(&self, command: &mut C, cancel: &CancellationToken) -> Result<()>
    where
        C: DebuggerCommand + ?Sized,
    {
        let id = command.id();
        let request = command.to_request_json()?;

        let (completion, response) = oneshot::channel();
        let generation = self.router.next_generation.fetch_add(1, Ordering::Relaxed);
        match self.router.pending.lock().entry(id) {
            Entry::Occupied(_) => return Err(DebuggerError::DuplicateRequestId(id)),
            Entry::Vacant(slot) => {
                slot.insert(PendingRequest {
                    generation,
                    completion,
                });
            }
        }
        let _guard = PendingGuard {
            router: &self.router,
            id,
            generation,
        };

        tracing::trace!(id, command = command.command_name(), "Sending request");
        self.connection.send_message(&request)?;

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DebuggerError::Cancelled),
            response = wait_for(response, self.request_timeout) => response?,
        };

        command.process_response(&response)
    }

    /// Breakpoint and step stops.
    pub fn subscribe_breakpoints(&self) -> broadcast::Receiver<BreakpointEvent> {
        self.router.breakpoints.subscribe()
    }

    /// Newly compiled named scripts.
    pub fn subscribe_compile_scripts(&self) -> broadcast::Receiver<CompileScriptEvent> {
        self.router.compile_scripts.subscribe()
    }

    /// Thrown exceptions the debuggee is set to break on.
    pub fn subscribe_exceptions(&self) -> broadcast::Receiver<ExceptionEvent> {
        self.router.exceptions.subscribe()
    }

    /// One notification per closed link.
    pub fn subscribe_connection_closed(&self) -> broadcast::Receiver<()> {
        self.router.connection_closed.subscribe()
    }
}

async fn wait_for(
    response: oneshot::Receiver<Option<Response>>,
    timeout: Option<Duration>,
) -> Result<Response> {
    let received = match timeout {
        Some(limit) => tokio::time::timeout(limit, response)
            .await
            .map_err(|_| DebuggerError::Timeout)?,
        None => response.await,
    };
    match received {
        Ok(Some(response)) => Ok(response),
        Ok(None) | Err(_) => Err(DebuggerError::ConnectionClosed),
    }
}
