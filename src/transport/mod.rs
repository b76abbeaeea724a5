//! Transport module - byte streams to the debuggee.
//!
//! Provides abstraction over:
//! - TCP sockets (`tcp://host:port`)
//! - WebSockets (`ws://`, `wss://`)

mod endpoint;
mod stream;
mod websocket;

pub use endpoint::Endpoint;
pub use stream::{connect, DebuggerStream};
pub use websocket::WebSocketByteStream;
