//! Debugger-side view of debuggee entities.
//!
//! These are the typed results commands extract from responses and events:
//! scripts ([`NodeModule`]), breakpoint definitions ([`NodeBreakpoint`]),
//! call-stack frames ([`NodeStackFrame`]) and evaluated values
//! ([`NodeEvaluationResult`]).

pub mod wrapper;

use serde_json::Value;

use crate::error::{DebuggerError, Result};
use crate::protocol::Response;

/// A script loaded in the debuggee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeModule {
    /// Script id assigned by V8.
    pub id: i64,
    /// Script name, usually the absolute file path.
    pub name: String,
    /// Script source, when requested.
    pub source: Option<String>,
}

impl NodeModule {
    /// Create a module description.
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            source: None,
        }
    }

    /// Parse a V8 script object (`{"id":…,"name":…,"source"?:…}`).
    ///
    /// Returns `None` for anonymous scripts (eval code, REPL input).
    pub fn from_script(script: &Value) -> Option<Self> {
        let id = script.get("id")?.as_i64()?;
        let name = script.get("name")?.as_str()?;
        if name.is_empty() {
            return None;
        }
        Some(Self {
            id,
            name: name.to_string(),
            source: script
                .get("source")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    /// Core modules are named without a directory (`events.js`).
    pub fn is_builtin(&self) -> bool {
        !self.name.contains(['/', '\\'])
    }
}

/// A user breakpoint, in user source coordinates (0-based).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeBreakpoint {
    /// File the breakpoint is set in.
    pub file_name: String,
    /// 0-based line.
    pub line: u32,
    /// 0-based column.
    pub column: u32,
    /// Condition expression evaluated by the debuggee.
    pub condition: Option<String>,
    /// Whether the breakpoint is active.
    pub enabled: bool,
    /// Number of hits to skip before breaking.
    pub ignore_count: Option<u32>,
}

impl NodeBreakpoint {
    /// Create an enabled, unconditional breakpoint.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `file_name` is empty.
    pub fn new(file_name: impl Into<String>, line: u32, column: u32) -> Result<Self> {
        let file_name = file_name.into();
        if file_name.is_empty() {
            return Err(DebuggerError::invalid_argument("breakpoint file name is empty"));
        }
        Ok(Self {
            file_name,
            line,
            column,
            condition: None,
            enabled: true,
            ignore_count: None,
        })
    }

    /// Break only when `condition` evaluates truthy.
    pub fn condition(mut self, condition: impl Into<String>) -> Self {
        let condition = condition.into();
        self.condition = (!condition.trim().is_empty()).then_some(condition);
        self
    }

    /// Set whether the breakpoint is active.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Skip the first `count` hits.
    pub fn ignore_count(mut self, count: u32) -> Self {
        self.ignore_count = Some(count);
        self
    }
}

/// A value produced by evaluation, lookup or a stack frame.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeEvaluationResult {
    /// Handle for follow-up `lookup` requests (objects only).
    pub handle: Option<i64>,
    /// Variable or property name, or the evaluated expression.
    pub name: Option<String>,
    /// V8 value type (`number`, `string`, `object`, …).
    pub type_name: String,
    /// Constructor name for objects (`Object`, `Array`, …).
    pub class_name: Option<String>,
    /// Display string.
    pub string_value: Option<String>,
    /// Whether `lookup` on `handle` can yield properties.
    pub has_children: bool,
}

impl NodeEvaluationResult {
    /// Build from a V8 value mirror (`{"handle","type","value","className","text"}`).
    pub fn from_value(name: Option<String>, value: &Value) -> Self {
        let type_name = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("undefined")
            .to_string();
        let class_name = value
            .get("className")
            .and_then(Value::as_str)
            .map(str::to_string);
        let text = value.get("text").and_then(Value::as_str);

        let string_value = match type_name.as_str() {
            "string" => value.get("value").and_then(Value::as_str).map(str::to_string),
            "number" | "boolean" => value
                .get("value")
                .filter(|v| !v.is_null())
                .map(Value::to_string)
                .or_else(|| text.map(str::to_string)),
            "undefined" | "null" => Some(type_name.clone()),
            _ => text
                .map(str::to_string)
                .or_else(|| class_name.as_ref().map(|c| format!("{{{c}}}"))),
        };

        Self {
            handle: value
                .get("handle")
                .or_else(|| value.get("ref"))
                .and_then(Value::as_i64),
            name,
            has_children: matches!(
                type_name.as_str(),
                "object" | "function" | "error" | "regexp"
            ),
            type_name,
            class_name,
            string_value,
        }
    }

    /// Resolve a `{"ref": n}` stub against the response's `refs`, falling
    /// back to the stub itself when it is already inlined.
    pub fn from_reference(name: Option<String>, value: &Value, response: &Response) -> Self {
        let resolved = value
            .get("ref")
            .and_then(Value::as_i64)
            .and_then(|handle| response.lookup_ref(handle))
            .filter(|_| value.get("type").is_none());
        Self::from_value(name, resolved.unwrap_or(value))
    }
}

/// One frame of a call stack, in user source coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeStackFrame {
    /// Frame index, 0 being the innermost.
    pub index: u32,
    /// Function name, or `(anonymous function)`.
    pub function_name: String,
    /// Script the frame executes in, if known.
    pub module: Option<NodeModule>,
    /// 0-based line.
    pub line: u32,
    /// 0-based column.
    pub column: u32,
    /// Function arguments.
    pub parameters: Vec<NodeEvaluationResult>,
    /// Local variables.
    pub locals: Vec<NodeEvaluationResult>,
}

/// Name shown for functions without a name or inferred name.
pub const ANONYMOUS_FUNCTION: &str = "(anonymous function)";
