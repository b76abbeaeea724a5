//! # node-debug-client
//!
//! Async client for the V8 debugger protocol spoken by Node.js
//! (`node --debug`).
//!
//! ## Architecture
//!
//! - **Transport**: `tcp://`, `ws://` or `wss://` byte stream
//! - **Connection**: `Content-Length` framing, one read task and one writer
//!   task per link
//! - **Client**: request/response correlation by sequence id, typed events
//!   on broadcast channels
//! - **Commands**: one type per protocol verb, owning its arguments and
//!   parsed results
//!
//! ## Example
//!
//! ```ignore
//! use node_debug_client::commands::{BacktraceCommand, ContinueCommand};
//! use node_debug_client::{ClientConfig, DebuggerClient};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> node_debug_client::Result<()> {
//!     let client = DebuggerClient::new(ClientConfig::default());
//!     client.connect("tcp://localhost:5858").await?;
//!
//!     let mut breaks = client.subscribe_breakpoints();
//!     while let Ok(hit) = breaks.recv().await {
//!         let cancel = CancellationToken::new();
//!         let mut backtrace = BacktraceCommand::new(client.next_command_id(), 0, 20)?;
//!         client.send_request(&mut backtrace, &cancel).await?;
//!         println!("stopped at line {}: {:?}", hit.line, backtrace.frames);
//!
//!         client
//!             .send_request(&mut ContinueCommand::new(client.next_command_id()), &cancel)
//!             .await?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod commands;
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod model;
pub mod protocol;
pub mod queue;
pub mod transport;

mod client;
mod writer;

pub use client::DebuggerClient;
pub use config::{ClientConfig, ConnectionConfig};
pub use connection::{ConnectionObserver, DebuggerConnection};
pub use error::{DebuggerError, Result};
pub use events::{BreakpointEvent, CompileScriptEvent, ExceptionEvent};
