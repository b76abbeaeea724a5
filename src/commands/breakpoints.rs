//! Breakpoint management: `setbreakpoint`, `changebreakpoint`,
//! `clearbreakpoint`, `listbreakpoints` and `setexceptionbreak`.

use std::collections::HashMap;

use serde_json::{json, Map, Value};

use super::{as_u32, ensure_success, DebuggerCommand};
use crate::error::Result;
use crate::model::wrapper::{from_debuggee_position, to_debuggee_position};
use crate::model::{NodeBreakpoint, NodeModule};
use crate::protocol::Response;

/// How V8 matches a breakpoint to a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakpointTarget {
    /// A script that is already loaded.
    ScriptId(i64),
    /// Exact script name, for remote debuggees.
    Script(String),
    /// Regular expression over script names.
    ScriptRegExp(String),
}

impl BreakpointTarget {
    /// Pick the target for `breakpoint`.
    ///
    /// A loaded module is addressed by id. Otherwise a remote debuggee gets
    /// the exact path; a local one gets a case-insensitive pattern, since
    /// the host file system may not preserve case.
    pub fn for_breakpoint(
        breakpoint: &NodeBreakpoint,
        module: Option<&NodeModule>,
        remote: bool,
    ) -> Self {
        match module {
            Some(module) => Self::ScriptId(module.id),
            None if remote => Self::Script(breakpoint.file_name.clone()),
            None => Self::ScriptRegExp(case_insensitive_pattern(&breakpoint.file_name)),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Self::ScriptId(_) => "scriptId",
            Self::Script(_) => "script",
            Self::ScriptRegExp(_) => "scriptRegExp",
        }
    }

    fn value(&self) -> Value {
        match self {
            Self::ScriptId(id) => json!(id),
            Self::Script(name) | Self::ScriptRegExp(name) => json!(name),
        }
    }
}

// V8 script regexps take no flags, so each letter becomes a class.
fn case_insensitive_pattern(path: &str) -> String {
    let escaped = regex::escape(path);
    let mut pattern = String::with_capacity(escaped.len() * 2 + 2);
    pattern.push('^');
    for c in escaped.chars() {
        let lower = c.to_ascii_lowercase();
        let upper = c.to_ascii_uppercase();
        if lower != upper {
            pattern.push('[');
            pattern.push(lower);
            pattern.push(upper);
            pattern.push(']');
        } else {
            pattern.push(c);
        }
    }
    pattern.push('$');
    pattern
}

/// `setbreakpoint`.
#[derive(Debug, Clone)]
pub struct SetBreakpointCommand {
    id: i64,
    breakpoint: NodeBreakpoint,
    target: BreakpointTarget,
    without_predicate: bool,

    /// Id assigned by the debuggee.
    pub breakpoint_id: Option<i64>,
    /// Script the breakpoint resolved into, if already loaded.
    pub script_id: Option<i64>,
    /// Resolved 0-based line, in source coordinates.
    pub line: Option<u32>,
    /// Resolved 0-based column, in source coordinates.
    pub column: Option<u32>,
}

impl SetBreakpointCommand {
    /// Set `breakpoint`, targeting `module` when it is already loaded.
    pub fn new(
        id: i64,
        breakpoint: NodeBreakpoint,
        module: Option<&NodeModule>,
        remote: bool,
    ) -> Self {
        let target = BreakpointTarget::for_breakpoint(&breakpoint, module, remote);
        Self {
            id,
            breakpoint,
            target,
            without_predicate: false,
            breakpoint_id: None,
            script_id: None,
            line: None,
            column: None,
        }
    }

    /// Omit condition and ignore count, so they can be checked on this side.
    pub fn without_predicate(mut self, without_predicate: bool) -> Self {
        self.without_predicate = without_predicate;
        self
    }

    /// The resolved script target.
    pub fn target(&self) -> &BreakpointTarget {
        &self.target
    }
}

impl DebuggerCommand for SetBreakpointCommand {
    fn id(&self) -> i64 {
        self.id
    }

    fn command_name(&self) -> &'static str {
        "setbreakpoint"
    }

    fn arguments(&self) -> Option<Value> {
        let (line, column) = to_debuggee_position(self.breakpoint.line, self.breakpoint.column);
        let mut args = Map::new();
        args.insert("type".into(), json!(self.target.type_name()));
        args.insert("target".into(), self.target.value());
        args.insert("line".into(), json!(line));
        args.insert("column".into(), json!(column));
        args.insert("enabled".into(), json!(self.breakpoint.enabled));

        if !self.without_predicate {
            if let Some(condition) = &self.breakpoint.condition {
                args.insert("condition".into(), json!(condition));
            }
            if let Some(count) = self.breakpoint.ignore_count {
                args.insert("ignoreCount".into(), json!(count));
            }
        }
        Some(Value::Object(args))
    }

    fn process_response(&mut self, response: &Response) -> Result<()> {
        ensure_success(self.command_name(), response)?;
        let body = &response.body;

        self.breakpoint_id = body.get("breakpoint").and_then(Value::as_i64);
        self.script_id = body.get("script_id").and_then(Value::as_i64);

        // Unresolved breakpoints report no actual location.
        let location = body
            .get("actual_locations")
            .and_then(Value::as_array)
            .and_then(|locations| locations.first());
        if let Some(location) = location {
            if let Some(line) = as_u32(location.get("line")) {
                let column = as_u32(location.get("column")).unwrap_or(0);
                let (line, column) = from_debuggee_position(line, column);
                self.line = Some(line);
                self.column = Some(column);
            }
            if self.script_id.is_none() {
                self.script_id = location.get("script_id").and_then(Value::as_i64);
            }
        }
        Ok(())
    }
}

/// `changebreakpoint`.
#[derive(Debug, Clone)]
pub struct ChangeBreakpointCommand {
    id: i64,
    breakpoint_id: i64,
    enabled: Option<bool>,
    condition: Option<String>,
    ignore_count: Option<u32>,
}

impl ChangeBreakpointCommand {
    /// Change nothing yet; add changes with the builder methods.
    pub fn new(id: i64, breakpoint_id: i64) -> Self {
        Self {
            id,
            breakpoint_id,
            enabled: None,
            condition: None,
            ignore_count: None,
        }
    }

    /// Enable or disable the breakpoint.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    /// Replace the condition; an empty string clears it.
    pub fn condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Replace the ignore count.
    pub fn ignore_count(mut self, count: u32) -> Self {
        self.ignore_count = Some(count);
        self
    }
}

impl DebuggerCommand for ChangeBreakpointCommand {
    fn id(&self) -> i64 {
        self.id
    }

    fn command_name(&self) -> &'static str {
        "changebreakpoint"
    }

    fn arguments(&self) -> Option<Value> {
        let mut args = Map::new();
        args.insert("breakpoint".into(), json!(self.breakpoint_id));
        if let Some(enabled) = self.enabled {
            args.insert("enabled".into(), json!(enabled));
        }
        if let Some(condition) = &self.condition {
            args.insert("condition".into(), json!(condition));
        }
        if let Some(count) = self.ignore_count {
            args.insert("ignoreCount".into(), json!(count));
        }
        Some(Value::Object(args))
    }
}

/// `clearbreakpoint`.
#[derive(Debug, Clone)]
pub struct ClearBreakpointCommand {
    id: i64,
    breakpoint_id: i64,
}

impl ClearBreakpointCommand {
    pub fn new(id: i64, breakpoint_id: i64) -> Self {
        Self { id, breakpoint_id }
    }
}

impl DebuggerCommand for ClearBreakpointCommand {
    fn id(&self) -> i64 {
        self.id
    }

    fn command_name(&self) -> &'static str {
        "clearbreakpoint"
    }

    fn arguments(&self) -> Option<Value> {
        Some(json!({ "breakpoint": self.breakpoint_id }))
    }
}

/// `listbreakpoints`.
#[derive(Debug, Clone, Default)]
pub struct ListBreakpointsCommand {
    id: i64,

    /// Hit count per breakpoint id.
    pub hit_counts: HashMap<i64, u32>,
    /// Break on every thrown exception.
    pub break_on_all_exceptions: bool,
    /// Break on exceptions no handler catches.
    pub break_on_uncaught_exceptions: bool,
}

impl ListBreakpointsCommand {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }
}

impl DebuggerCommand for ListBreakpointsCommand {
    fn id(&self) -> i64 {
        self.id
    }

    fn command_name(&self) -> &'static str {
        "listbreakpoints"
    }

    fn process_response(&mut self, response: &Response) -> Result<()> {
        ensure_success(self.command_name(), response)?;
        let body = &response.body;

        self.hit_counts = body
            .get("breakpoints")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|bp| {
                let number = bp.get("number").and_then(Value::as_i64)?;
                Some((number, as_u32(bp.get("hit_count")).unwrap_or(0)))
            })
            .collect();
        self.break_on_all_exceptions = body
            .get("breakOnExceptions")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        self.break_on_uncaught_exceptions = body
            .get("breakOnUncaughtExceptions")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Ok(())
    }
}

/// `setexceptionbreak`.
#[derive(Debug, Clone)]
pub struct SetExceptionBreakCommand {
    id: i64,
    uncaught_only: bool,
    enabled: bool,
}

impl SetExceptionBreakCommand {
    /// Toggle breaking on uncaught exceptions (`uncaught_only`) or on all.
    pub fn new(id: i64, uncaught_only: bool, enabled: bool) -> Self {
        Self {
            id,
            uncaught_only,
            enabled,
        }
    }
}

impl DebuggerCommand for SetExceptionBreakCommand {
    fn id(&self) -> i64 {
        self.id
    }

    fn command_name(&self) -> &'static str {
        "setexceptionbreak"
    }

    fn arguments(&self) -> Option<Value> {
        let kind = if self.uncaught_only { "uncaught" } else { "all" };
        Some(json!({ "type": kind, "enabled": self.enabled }))
    }
}
