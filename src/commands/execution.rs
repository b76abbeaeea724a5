//! Execution control: `continue`, `suspend`, `disconnect` and `changelive`.

use serde_json::{json, Value};

use super::DebuggerCommand;
use crate::error::{DebuggerError, Result};
use crate::model::wrapper::{SCRIPT_WRAP_BEGIN, SCRIPT_WRAP_END};
use crate::protocol::Response;

/// Stepping action for [`ContinueCommand`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SteppingKind {
    /// Step into calls.
    Into,
    /// Step out of the current function.
    Out,
    /// Step over calls.
    Over,
}

impl SteppingKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Into => "in",
            Self::Out => "out",
            Self::Over => "next",
        }
    }
}

/// `continue`, optionally stepping.
#[derive(Debug, Clone)]
pub struct ContinueCommand {
    id: i64,
    step: Option<(SteppingKind, u32)>,
}

impl ContinueCommand {
    /// Resume execution.
    pub fn new(id: i64) -> Self {
        Self { id, step: None }
    }

    /// Resume for `count` steps of `kind`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `count` is zero.
    pub fn step(id: i64, kind: SteppingKind, count: u32) -> Result<Self> {
        if count == 0 {
            return Err(DebuggerError::invalid_argument("step count must be positive"));
        }
        Ok(Self {
            id,
            step: Some((kind, count)),
        })
    }
}

impl DebuggerCommand for ContinueCommand {
    fn id(&self) -> i64 {
        self.id
    }

    fn command_name(&self) -> &'static str {
        "continue"
    }

    fn arguments(&self) -> Option<Value> {
        self.step.map(|(kind, count)| {
            json!({
                "stepaction": kind.as_str(),
                "stepcount": count,
            })
        })
    }
}

/// `suspend`: break at the next statement.
#[derive(Debug, Clone)]
pub struct SuspendCommand {
    id: i64,
}

impl SuspendCommand {
    pub fn new(id: i64) -> Self {
        Self { id }
    }
}

impl DebuggerCommand for SuspendCommand {
    fn id(&self) -> i64 {
        self.id
    }

    fn command_name(&self) -> &'static str {
        "suspend"
    }
}

/// `disconnect`: detach and let the debuggee run.
#[derive(Debug, Clone)]
pub struct DisconnectCommand {
    id: i64,
}

impl DisconnectCommand {
    pub fn new(id: i64) -> Self {
        Self { id }
    }
}

impl DebuggerCommand for DisconnectCommand {
    fn id(&self) -> i64 {
        self.id
    }

    fn command_name(&self) -> &'static str {
        "disconnect"
    }
}

/// `changelive`: replace a script's source in the running debuggee.
///
/// A rejected edit is not an error; check [`updated`](Self::updated).
#[derive(Debug, Clone)]
pub struct ChangeLiveCommand {
    id: i64,
    script_id: i64,
    new_source: String,

    /// The debuggee accepted the new source.
    pub updated: bool,
    /// Frames on the stack were dropped or restarted.
    pub stack_modified: bool,
}

impl ChangeLiveCommand {
    /// `new_source` is the user's file content, without the module wrapper.
    pub fn new(id: i64, script_id: i64, new_source: impl Into<String>) -> Self {
        Self {
            id,
            script_id,
            new_source: new_source.into(),
            updated: false,
            stack_modified: false,
        }
    }
}

impl DebuggerCommand for ChangeLiveCommand {
    fn id(&self) -> i64 {
        self.id
    }

    fn command_name(&self) -> &'static str {
        "changelive"
    }

    fn arguments(&self) -> Option<Value> {
        Some(json!({
            "script_id": self.script_id,
            "new_source": format!("{SCRIPT_WRAP_BEGIN}{}{SCRIPT_WRAP_END}", self.new_source),
            "preview_only": false,
        }))
    }

    fn process_response(&mut self, response: &Response) -> Result<()> {
        if !response.success {
            tracing::debug!(
                script_id = self.script_id,
                message = response.message.as_deref().unwrap_or_default(),
                "live edit rejected"
            );
            self.updated = false;
            self.stack_modified = false;
            return Ok(());
        }

        let result = response.body.get("result");
        let flag = |name: &str| {
            result
                .and_then(|r| r.get(name))
                .and_then(Value::as_bool)
                .unwrap_or(false)
        };
        self.updated = flag("updated");
        self.stack_modified = flag("stack_modified");
        Ok(())
    }
}
