//! Typed protocol events raised by the debuggee.
//!
//! Positions are converted to user source coordinates
//! (see [`wrapper`](crate::model::wrapper)).

use serde_json::Value;

use crate::error::{DebuggerError, Result};
use crate::model::wrapper::from_debuggee_position;
use crate::model::{NodeEvaluationResult, NodeModule};
use crate::protocol::Event;

/// Execution stopped (`break` event).
#[derive(Debug, Clone, PartialEq)]
pub struct BreakpointEvent {
    /// Ids of the breakpoints hit; empty for a step or `debugger;` statement.
    pub breakpoints: Vec<i64>,
    /// Script execution stopped in.
    pub module: Option<NodeModule>,
    /// 0-based line.
    pub line: u32,
    /// 0-based column.
    pub column: u32,
    /// Text of the source line, when provided.
    pub source_line_text: Option<String>,
}

impl BreakpointEvent {
    /// Parse the body of a `break` event.
    pub fn from_event(event: &Event) -> Result<Self> {
        let body = &event.body;
        let (line, column) = source_position(body)?;
        Ok(Self {
            breakpoints: body
                .get("breakpoints")
                .and_then(Value::as_array)
                .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
                .unwrap_or_default(),
            module: body.get("script").and_then(NodeModule::from_script),
            line,
            column,
            source_line_text: body
                .get("sourceLineText")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}

/// A script finished compiling (`afterCompile` event).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileScriptEvent {
    /// The newly compiled script.
    pub module: NodeModule,
}

impl CompileScriptEvent {
    /// Parse the body of an `afterCompile` event.
    ///
    /// Anonymous scripts yield `Ok(None)`.
    pub fn from_event(event: &Event) -> Result<Option<Self>> {
        let script = event
            .body
            .get("script")
            .ok_or_else(|| malformed(event, "script"))?;
        Ok(NodeModule::from_script(script).map(|module| Self { module }))
    }
}

/// An exception was thrown (`exception` event).
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionEvent {
    /// No handler will catch the exception.
    pub uncaught: bool,
    /// Exception class, e.g. `TypeError`.
    pub exception_name: Option<String>,
    /// Text representation, e.g. `TypeError: x is not a function`.
    pub description: Option<String>,
    /// The thrown value.
    pub exception: NodeEvaluationResult,
    /// Script the exception was thrown in.
    pub module: Option<NodeModule>,
    /// 0-based line.
    pub line: u32,
    /// 0-based column.
    pub column: u32,
}

impl ExceptionEvent {
    /// Parse the body of an `exception` event.
    pub fn from_event(event: &Event) -> Result<Self> {
        let body = &event.body;
        let exception = body
            .get("exception")
            .ok_or_else(|| malformed(event, "exception"))?;
        let (line, column) = source_position(body)?;

        Ok(Self {
            uncaught: body.get("uncaught").and_then(Value::as_bool).unwrap_or(false),
            exception_name: exception
                .get("className")
                .and_then(Value::as_str)
                .map(str::to_string),
            description: exception
                .get("text")
                .and_then(Value::as_str)
                .map(str::to_string),
            exception: NodeEvaluationResult::from_value(None, exception),
            module: body.get("script").and_then(NodeModule::from_script),
            line,
            column,
        })
    }
}

fn source_position(body: &Value) -> Result<(u32, u32)> {
    let line = body.get("sourceLine").and_then(Value::as_u64);
    let column = body.get("sourceColumn").and_then(Value::as_u64).unwrap_or(0);
    let line = line.ok_or_else(|| DebuggerError::Protocol("event without sourceLine".into()))?;
    Ok(from_debuggee_position(
        u32::try_from(line).unwrap_or(u32::MAX),
        u32::try_from(column).unwrap_or(u32::MAX),
    ))
}

fn malformed(event: &Event, field: &str) -> DebuggerError {
    DebuggerError::Protocol(format!("{} event without {}", event.event, field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::InboundMessage;

    fn event(text: &str) -> Event {
        match InboundMessage::parse(text).unwrap() {
            InboundMessage::Event(event) => event,
            InboundMessage::Response(_) => panic!("expected event"),
        }
    }

    #[test]
    fn test_break_event() {
        let event = event(
            r##"{"type":"event","event":"break","body":{
                "invocationText":"#<Object>.[anonymous](exports=#<Object>)",
                "sourceLine":0,"sourceColumn":66,"sourceLineText":"var x = 1;",
                "script":{"id":38,"name":"C:\\app\\server.js","lineOffset":0,"columnOffset":0,"lineCount":10},
                "breakpoints":[2]}}"##,
        );

        let parsed = BreakpointEvent::from_event(&event).unwrap();

        assert_eq!(parsed.breakpoints, vec![2]);
        assert_eq!((parsed.line, parsed.column), (0, 4));
        assert_eq!(parsed.module, Some(NodeModule::new(38, "C:\\app\\server.js")));
        assert_eq!(parsed.source_line_text.as_deref(), Some("var x = 1;"));
    }

    #[test]
    fn test_step_break_has_no_breakpoints() {
        let event = event(r#"{"type":"event","event":"break","body":{"sourceLine":5,"sourceColumn":2}}"#);

        let parsed = BreakpointEvent::from_event(&event).unwrap();

        assert!(parsed.breakpoints.is_empty());
        assert_eq!((parsed.line, parsed.column), (5, 2));
        assert!(parsed.module.is_none());
    }

    #[test]
    fn test_compile_event() {
        let event = event(
            r#"{"type":"event","event":"afterCompile","body":{"script":{"id":55,"name":"/srv/lib.js"}}}"#,
        );

        let parsed = CompileScriptEvent::from_event(&event).unwrap().unwrap();
        assert_eq!(parsed.module, NodeModule::new(55, "/srv/lib.js"));

        let anonymous = event_with_script(r#"{"id":56}"#);
        assert!(CompileScriptEvent::from_event(&anonymous).unwrap().is_none());
    }

    fn event_with_script(script: &str) -> Event {
        event(&format!(
            r#"{{"type":"event","event":"afterCompile","body":{{"script":{script}}}}}"#
        ))
    }

    #[test]
    fn test_exception_event() {
        let event = event(
            r#"{"type":"event","event":"exception","body":{
                "uncaught":true,
                "exception":{"handle":1,"type":"error","className":"TypeError","text":"TypeError: undefined is not a function"},
                "sourceLine":3,"sourceColumn":8,
                "script":{"id":40,"name":"/srv/app.js"}}}"#,
        );

        let parsed = ExceptionEvent::from_event(&event).unwrap();

        assert!(parsed.uncaught);
        assert_eq!(parsed.exception_name.as_deref(), Some("TypeError"));
        assert_eq!(
            parsed.description.as_deref(),
            Some("TypeError: undefined is not a function")
        );
        assert_eq!(parsed.exception.handle, Some(1));
        assert_eq!((parsed.line, parsed.column), (3, 8));
    }

    #[test]
    fn test_malformed_events() {
        let no_exception = event(r#"{"type":"event","event":"exception","body":{"sourceLine":1}}"#);
        assert!(ExceptionEvent::from_event(&no_exception).is_err());

        let no_line = event(r#"{"type":"event","event":"break","body":{}}"#);
        assert!(BreakpointEvent::from_event(&no_line).is_err());
    }
}
