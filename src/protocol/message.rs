//! Typed view of inbound protocol messages.
//!
//! Every body received from the debuggee is a JSON object discriminated by
//! its `type` field. This module parses it once into [`InboundMessage`];
//! verb-specific fields stay in `body`/`refs` for the command that asked
//! for them.
//!
//! # Example
//!
//! ```
//! use node_debug_client::protocol::{EventKind, InboundMessage};
//!
//! let msg = InboundMessage::parse(r#"{"type":"event","event":"break","body":{}}"#).unwrap();
//! match msg {
//!     InboundMessage::Event(event) => assert_eq!(event.kind(), EventKind::Break),
//!     InboundMessage::Response(_) => unreachable!(),
//! }
//! ```

use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;

/// Parsed inbound message.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundMessage {
    /// Reply to an earlier request.
    Response(Response),
    /// Unsolicited notification.
    Event(Event),
}

impl InboundMessage {
    /// Parse a raw message body.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Reply to a request, correlated by `request_seq`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Response {
    /// Sequence id of the request this answers.
    pub request_seq: i64,
    /// Echo of the request verb.
    #[serde(default)]
    pub command: Option<String>,
    /// `false` when the debuggee rejected the request.
    #[serde(default = "default_success")]
    pub success: bool,
    /// Error text accompanying `success: false`.
    #[serde(default)]
    pub message: Option<String>,
    /// Whether the debuggee is running after handling the request.
    #[serde(default)]
    pub running: Option<bool>,
    /// Verb-specific payload.
    #[serde(default)]
    pub body: Value,
    /// Handle objects referenced from `body`.
    #[serde(default)]
    pub refs: Vec<Value>,
}

fn default_success() -> bool {
    true
}

impl Response {
    /// Find a referenced object by its handle.
    pub fn lookup_ref(&self, handle: i64) -> Option<&Value> {
        self.refs
            .iter()
            .find(|r| r.get("handle").and_then(Value::as_i64) == Some(handle))
    }
}

/// Unsolicited event from the debuggee.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    /// Event name, e.g. `break`.
    pub event: String,
    /// Event-specific payload.
    #[serde(default)]
    pub body: Value,
    /// Handle objects referenced from `body`.
    #[serde(default)]
    pub refs: Vec<Value>,
}

impl Event {
    /// Classify the event name.
    pub fn kind(&self) -> EventKind {
        EventKind::classify(&self.event)
    }
}

/// How the client treats an event name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A script finished compiling.
    AfterCompile,
    /// Execution stopped at a breakpoint or step.
    Break,
    /// An exception was thrown.
    Exception,
    /// Known event the client has no use for.
    Ignored,
    /// Event name this client does not know.
    Unknown,
}

impl EventKind {
    /// Map a protocol event name to its kind.
    pub fn classify(name: &str) -> Self {
        match name {
            "afterCompile" => Self::AfterCompile,
            "break" => Self::Break,
            "exception" => Self::Exception,
            "beforeCompile" | "breakForCommand" | "newFunction" | "scriptCollected"
            | "compileError" => Self::Ignored,
            _ => Self::Unknown,
        }
    }
}
