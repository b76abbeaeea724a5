//! Protocol commands.
//!
//! Each command owns its request arguments and, after
//! [`DebuggerClient::send_request`](crate::DebuggerClient::send_request)
//! returns, the typed fields extracted from the response. The sequence id is
//! chosen by the caller, typically via
//! [`DebuggerClient::next_command_id`](crate::DebuggerClient::next_command_id).
//!
//! Requests share one envelope:
//!
//! ```text
//! {"command":"<verb>","seq":<id>,"type":"request","arguments":{...}}
//! ```
//!
//! # Example
//!
//! ```
//! use node_debug_client::commands::{DebuggerCommand, SuspendCommand};
//!
//! let command = SuspendCommand::new(3);
//! assert_eq!(
//!     command.to_request_json().unwrap(),
//!     r#"{"command":"suspend","seq":3,"type":"request"}"#
//! );
//! ```

mod breakpoints;
mod execution;
mod inspection;

pub use breakpoints::{
    BreakpointTarget, ChangeBreakpointCommand, ClearBreakpointCommand, ListBreakpointsCommand,
    SetBreakpointCommand, SetExceptionBreakCommand,
};
pub use execution::{ChangeLiveCommand, ContinueCommand, DisconnectCommand, SteppingKind, SuspendCommand};
pub use inspection::{
    BacktraceCommand, EvaluateCommand, LookupCommand, ScriptsCommand, SetVariableValueCommand,
};

use serde::Serialize;
use serde_json::Value;

use crate::error::{DebuggerError, Result};
use crate::protocol::Response;

/// A request verb together with its response parsing.
pub trait DebuggerCommand: Send {
    /// Sequence id of the request.
    fn id(&self) -> i64;

    /// Protocol verb, e.g. `setbreakpoint`.
    fn command_name(&self) -> &'static str;

    /// The `arguments` object; `None` omits it.
    fn arguments(&self) -> Option<Value> {
        None
    }

    /// Serialize the request envelope.
    fn to_request_json(&self) -> Result<String> {
        let request = RequestEnvelope {
            command: self.command_name(),
            seq: self.id(),
            kind: "request",
            arguments: self.arguments(),
        };
        Ok(serde_json::to_string(&request)?)
    }

    /// Extract results from the correlated response.
    ///
    /// The default rejects `success: false` and extracts nothing.
    fn process_response(&mut self, response: &Response) -> Result<()> {
        ensure_success(self.command_name(), response)
    }
}

#[derive(Serialize)]
struct RequestEnvelope<'a> {
    command: &'a str,
    seq: i64,
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    arguments: Option<Value>,
}

/// Turn `success: false` into [`DebuggerError::CommandFailed`].
pub fn ensure_success(command: &str, response: &Response) -> Result<()> {
    if response.success {
        return Ok(());
    }
    Err(DebuggerError::CommandFailed {
        command: command.to_string(),
        message: response
            .message
            .clone()
            .unwrap_or_else(|| format!("{command} failed")),
    })
}

fn as_u32(value: Option<&Value>) -> Option<u32> {
    value
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Fake {
        arguments: Option<Value>,
    }

    impl DebuggerCommand for Fake {
        fn id(&self) -> i64 {
            11
        }

        fn command_name(&self) -> &'static str {
            "fake"
        }

        fn arguments(&self) -> Option<Value> {
            self.arguments.clone()
        }
    }

    #[test]
    fn test_envelope_with_arguments() {
        let fake = Fake {
            arguments: Some(json!({"a": 1})),
        };

        assert_eq!(
            fake.to_request_json().unwrap(),
            r#"{"command":"fake","seq":11,"type":"request","arguments":{"a":1}}"#
        );
    }

    #[test]
    fn test_envelope_without_arguments() {
        let fake = Fake { arguments: None };
        let value: Value = serde_json::from_str(&fake.to_request_json().unwrap()).unwrap();

        assert!(value.get("arguments").is_none());
        assert_eq!(value["type"], json!("request"));
    }

    #[test]
    fn test_default_process_response_checks_success() {
        let mut fake = Fake { arguments: None };
        let failed = Response {
            request_seq: 11,
            success: false,
            message: Some("No such command".into()),
            ..Default::default()
        };

        let err = fake.process_response(&failed).unwrap_err();
        assert_eq!(err.to_string(), "No such command");

        let ok = Response {
            request_seq: 11,
            success: true,
            ..Default::default()
        };
        assert!(fake.process_response(&ok).is_ok());
    }
}
