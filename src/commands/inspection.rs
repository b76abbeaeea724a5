//! State inspection: `evaluate`, `backtrace`, `lookup`, `scripts` and
//! `setvariablevalue`.

use std::collections::HashMap;

use serde_json::{json, Map, Value};

use super::{as_u32, ensure_success, DebuggerCommand};
use crate::error::{DebuggerError, Result};
use crate::model::wrapper::from_debuggee_position;
use crate::model::{NodeEvaluationResult, NodeModule, NodeStackFrame, ANONYMOUS_FUNCTION};
use crate::protocol::Response;

/// Longest string value the debuggee returns from `evaluate`.
pub const MAX_EVALUATION_STRING_LENGTH: u32 = 10_000;

/// `evaluate`: run an expression in a frame or the global scope.
///
/// A thrown exception fails the request with the debuggee's message, e.g.
/// `ReferenceError: x is not defined`.
#[derive(Debug, Clone)]
pub struct EvaluateCommand {
    id: i64,
    expression: String,
    frame: Option<u32>,
    disable_break: bool,

    /// The value, after a successful response.
    pub result: Option<NodeEvaluationResult>,
}

impl EvaluateCommand {
    /// Evaluate `expression` in `frame`, or globally when `None`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `expression` is empty.
    pub fn new(id: i64, expression: impl Into<String>, frame: Option<u32>) -> Result<Self> {
        let expression = expression.into();
        if expression.trim().is_empty() {
            return Err(DebuggerError::invalid_argument("expression is empty"));
        }
        Ok(Self {
            id,
            expression,
            frame,
            disable_break: true,
            result: None,
        })
    }

    /// Allow breakpoints to trigger while evaluating.
    pub fn disable_break(mut self, disable_break: bool) -> Self {
        self.disable_break = disable_break;
        self
    }
}

impl DebuggerCommand for EvaluateCommand {
    fn id(&self) -> i64 {
        self.id
    }

    fn command_name(&self) -> &'static str {
        "evaluate"
    }

    fn arguments(&self) -> Option<Value> {
        let mut args = Map::new();
        args.insert("expression".into(), json!(self.expression));
        match self.frame {
            Some(frame) => args.insert("frame".into(), json!(frame)),
            None => args.insert("global".into(), json!(true)),
        };
        args.insert("disable_break".into(), json!(self.disable_break));
        args.insert("maxStringLength".into(), json!(MAX_EVALUATION_STRING_LENGTH));
        Some(Value::Object(args))
    }

    fn process_response(&mut self, response: &Response) -> Result<()> {
        ensure_success(self.command_name(), response)?;
        self.result = Some(NodeEvaluationResult::from_value(
            Some(self.expression.clone()),
            &response.body,
        ));
        Ok(())
    }
}

/// `backtrace`: the call stack of the paused debuggee.
#[derive(Debug, Clone)]
pub struct BacktraceCommand {
    id: i64,
    from_frame: u32,
    to_frame: u32,
    depth_only: bool,

    /// Total number of frames on the stack.
    pub call_stack_depth: u32,
    /// Frames `from_frame..to_frame`.
    pub frames: Vec<NodeStackFrame>,
    /// Scripts referenced by the frames, by script id.
    pub modules: HashMap<i64, NodeModule>,
}

impl BacktraceCommand {
    /// Request frames `from_frame..to_frame`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the range is empty.
    pub fn new(id: i64, from_frame: u32, to_frame: u32) -> Result<Self> {
        if to_frame <= from_frame {
            return Err(DebuggerError::invalid_argument(format!(
                "empty frame range {from_frame}..{to_frame}"
            )));
        }
        Ok(Self {
            id,
            from_frame,
            to_frame,
            depth_only: false,
            call_stack_depth: 0,
            frames: Vec::new(),
            modules: HashMap::new(),
        })
    }

    /// Only read the stack depth.
    pub fn depth_only(id: i64) -> Self {
        Self {
            id,
            from_frame: 0,
            to_frame: 1,
            depth_only: true,
            call_stack_depth: 0,
            frames: Vec::new(),
            modules: HashMap::new(),
        }
    }

    fn parse_frame(&self, frame: &Value, response: &Response) -> NodeStackFrame {
        let index = as_u32(frame.get("index")).unwrap_or(0);
        let func = frame.get("func").unwrap_or(&Value::Null);
        let function_name = [func.get("name"), func.get("inferredName")]
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .find(|name| !name.is_empty())
            .unwrap_or(ANONYMOUS_FUNCTION)
            .to_string();

        let module = frame
            .get("script")
            .and_then(|script| match script.get("ref").and_then(Value::as_i64) {
                Some(handle) => response.lookup_ref(handle),
                None => Some(script),
            })
            .and_then(NodeModule::from_script)
            .or_else(|| {
                func.get("scriptId")
                    .and_then(Value::as_i64)
                    .and_then(|id| self.modules.get(&id).cloned())
            });

        let (line, column) = from_debuggee_position(
            as_u32(frame.get("line")).unwrap_or(0),
            as_u32(frame.get("column")).unwrap_or(0),
        );

        NodeStackFrame {
            index,
            function_name,
            module,
            line,
            column,
            parameters: variables(frame.get("arguments"), response),
            locals: variables(frame.get("locals"), response),
        }
    }
}

fn variables(list: Option<&Value>, response: &Response) -> Vec<NodeEvaluationResult> {
    list.and_then(Value::as_array)
        .into_iter()
        .flatten()
        .map(|variable| {
            let name = variable
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string);
            let value = variable.get("value").unwrap_or(&Value::Null);
            NodeEvaluationResult::from_reference(name, value, response)
        })
        .collect()
}

impl DebuggerCommand for BacktraceCommand {
    fn id(&self) -> i64 {
        self.id
    }

    fn command_name(&self) -> &'static str {
        "backtrace"
    }

    fn arguments(&self) -> Option<Value> {
        Some(json!({
            "fromFrame": self.from_frame,
            "toFrame": self.to_frame,
            "inlineRefs": true,
        }))
    }

    fn process_response(&mut self, response: &Response) -> Result<()> {
        ensure_success(self.command_name(), response)?;
        let body = &response.body;

        self.call_stack_depth = as_u32(body.get("totalFrames")).unwrap_or(0);
        if self.depth_only {
            return Ok(());
        }

        self.modules = response
            .refs
            .iter()
            .filter(|r| r.get("type").and_then(Value::as_str) == Some("script"))
            .filter_map(NodeModule::from_script)
            .map(|module| (module.id, module))
            .collect();

        let frames = body
            .get("frames")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        self.frames = frames
            .iter()
            .map(|frame| self.parse_frame(frame, response))
            .collect();

        for module in self.frames.iter().filter_map(|f| f.module.clone()) {
            self.modules.entry(module.id).or_insert(module);
        }
        Ok(())
    }
}

/// `lookup`: expand objects by handle.
#[derive(Debug, Clone)]
pub struct LookupCommand {
    id: i64,
    handles: Vec<i64>,

    /// Properties of each requested handle.
    pub children: HashMap<i64, Vec<NodeEvaluationResult>>,
}

impl LookupCommand {
    /// # Errors
    ///
    /// `InvalidArgument` if `handles` is empty.
    pub fn new(id: i64, handles: Vec<i64>) -> Result<Self> {
        if handles.is_empty() {
            return Err(DebuggerError::invalid_argument("no handles to look up"));
        }
        Ok(Self {
            id,
            handles,
            children: HashMap::new(),
        })
    }
}

// Array elements are shown as `[n]`.
fn property_name(name: &Value) -> Option<String> {
    match name {
        Value::Number(n) => Some(format!("[{n}]")),
        Value::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
            Some(format!("[{s}]"))
        }
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

impl DebuggerCommand for LookupCommand {
    fn id(&self) -> i64 {
        self.id
    }

    fn command_name(&self) -> &'static str {
        "lookup"
    }

    fn arguments(&self) -> Option<Value> {
        Some(json!({
            "handles": self.handles,
            "includeSource": false,
        }))
    }

    fn process_response(&mut self, response: &Response) -> Result<()> {
        ensure_success(self.command_name(), response)?;

        self.children = self
            .handles
            .iter()
            .filter_map(|handle| {
                let object = response.body.get(handle.to_string())?;
                let properties = object
                    .get("properties")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                    .map(|property| {
                        let name = property.get("name").and_then(property_name);
                        NodeEvaluationResult::from_reference(name, property, response)
                    })
                    .collect();
                Some((*handle, properties))
            })
            .collect();
        Ok(())
    }
}

/// `scripts`: list loaded scripts.
#[derive(Debug, Clone)]
pub struct ScriptsCommand {
    id: i64,
    include_source: bool,
    module_id: Option<i64>,

    /// Named scripts in the response.
    pub modules: Vec<NodeModule>,
}

// Normal (non-native, non-extension) scripts.
const NORMAL_SCRIPTS: u32 = 4;

impl ScriptsCommand {
    /// List all scripts, or only `module_id`.
    pub fn new(id: i64, include_source: bool, module_id: Option<i64>) -> Self {
        Self {
            id,
            include_source,
            module_id,
            modules: Vec::new(),
        }
    }
}

impl DebuggerCommand for ScriptsCommand {
    fn id(&self) -> i64 {
        self.id
    }

    fn command_name(&self) -> &'static str {
        "scripts"
    }

    fn arguments(&self) -> Option<Value> {
        let mut args = Map::new();
        args.insert("types".into(), json!(NORMAL_SCRIPTS));
        args.insert("includeSource".into(), json!(self.include_source));
        if let Some(module_id) = self.module_id {
            args.insert("ids".into(), json!([module_id]));
        }
        Some(Value::Object(args))
    }

    fn process_response(&mut self, response: &Response) -> Result<()> {
        ensure_success(self.command_name(), response)?;
        self.modules = response
            .body
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(NodeModule::from_script)
            .collect();
        Ok(())
    }
}

/// `setvariablevalue`: assign an existing value (by handle) to a variable.
#[derive(Debug, Clone)]
pub struct SetVariableValueCommand {
    id: i64,
    frame: u32,
    scope: u32,
    name: String,
    value_handle: i64,

    /// The variable's new value.
    pub result: Option<NodeEvaluationResult>,
}

impl SetVariableValueCommand {
    /// Set `name` in scope `scope` of `frame` to the value behind `value_handle`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `name` is empty.
    pub fn new(
        id: i64,
        frame: u32,
        scope: u32,
        name: impl Into<String>,
        value_handle: i64,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(DebuggerError::invalid_argument("variable name is empty"));
        }
        Ok(Self {
            id,
            frame,
            scope,
            name,
            value_handle,
            result: None,
        })
    }
}

impl DebuggerCommand for SetVariableValueCommand {
    fn id(&self) -> i64 {
        self.id
    }

    fn command_name(&self) -> &'static str {
        "setvariablevalue"
    }

    fn arguments(&self) -> Option<Value> {
        Some(json!({
            "name": self.name,
            "newValue": { "handle": self.value_handle },
            "scope": { "number": self.scope, "frameNumber": self.frame },
        }))
    }

    fn process_response(&mut self, response: &Response) -> Result<()> {
        ensure_success(self.command_name(), response)?;
        let value = response.body.get("newValue").unwrap_or(&response.body);
        self.result = Some(NodeEvaluationResult::from_reference(
            Some(self.name.clone()),
            value,
            response,
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(body: Value, refs: Vec<Value>) -> Response {
        Response {
            request_seq: 1,
            success: true,
            body,
            refs,
            ..Default::default()
        }
    }

    #[test]
    fn test_evaluate_arguments() {
        let frame = EvaluateCommand::new(1, "x + 1", Some(0)).unwrap();
        let args = frame.arguments().unwrap();
        assert_eq!(args["frame"], json!(0));
        assert!(args.get("global").is_none());
        assert_eq!(args["disable_break"], json!(true));
        assert_eq!(args["maxStringLength"], json!(10_000));

        let global = EvaluateCommand::new(1, "process.pid", None).unwrap();
        assert_eq!(global.arguments().unwrap()["global"], json!(true));
    }

    #[test]
    fn test_evaluate_rejects_empty_expression() {
        assert!(matches!(
            EvaluateCommand::new(1, "  ", None),
            Err(DebuggerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_evaluate_result() {
        let mut command = EvaluateCommand::new(1, "1 + 1", None).unwrap();
        command
            .process_response(&response(
                json!({"handle": 3, "type": "number", "value": 2, "text": "2"}),
                vec![],
            ))
            .unwrap();

        let result = command.result.unwrap();
        assert_eq!(result.name.as_deref(), Some("1 + 1"));
        assert_eq!(result.string_value.as_deref(), Some("2"));
    }

    #[test]
    fn test_evaluate_reference_error() {
        let mut command = EvaluateCommand::new(1, "missing", Some(0)).unwrap();
        let err = command
            .process_response(&Response {
                request_seq: 1,
                success: false,
                message: Some("ReferenceError: missing is not defined".into()),
                ..Default::default()
            })
            .unwrap_err();

        assert_eq!(err.to_string(), "ReferenceError: missing is not defined");
        assert!(command.result.is_none());
    }

    #[test]
    fn test_backtrace_frames() {
        let mut command = BacktraceCommand::new(2, 0, 10).unwrap();
        let body = json!({
            "fromFrame": 0, "toFrame": 2, "totalFrames": 2,
            "frames": [
                {
                    "index": 0,
                    "func": {"ref": 5, "type": "function", "name": "", "inferredName": "handler", "scriptId": 41},
                    "script": {"ref": 7},
                    "line": 0, "column": 70,
                    "arguments": [{"name": "req", "value": {"ref": 9, "type": "object", "className": "IncomingMessage"}}],
                    "locals": [{"name": "count", "value": {"ref": 10}}]
                },
                {
                    "index": 1,
                    "func": {"ref": 6, "type": "function", "name": "", "inferredName": "", "scriptId": 41},
                    "script": {"ref": 7},
                    "line": 12, "column": 3,
                    "arguments": [], "locals": []
                }
            ]
        });
        let refs = vec![
            json!({"handle": 7, "type": "script", "id": 41, "name": "/srv/app.js"}),
            json!({"handle": 10, "type": "number", "value": 3, "text": "3"}),
        ];

        command.process_response(&response(body, refs)).unwrap();

        assert_eq!(command.call_stack_depth, 2);
        assert_eq!(command.frames.len(), 2);
        assert_eq!(command.modules.get(&41).map(|m| m.name.as_str()), Some("/srv/app.js"));

        let top = &command.frames[0];
        assert_eq!(top.function_name, "handler");
        assert_eq!((top.line, top.column), (0, 8));
        assert_eq!(top.module.as_ref().map(|m| m.id), Some(41));
        assert_eq!(top.parameters[0].name.as_deref(), Some("req"));
        assert_eq!(top.parameters[0].class_name.as_deref(), Some("IncomingMessage"));
        assert_eq!(top.locals[0].string_value.as_deref(), Some("3"));

        assert_eq!(command.frames[1].function_name, ANONYMOUS_FUNCTION);
        assert_eq!((command.frames[1].line, command.frames[1].column), (12, 3));
    }

    #[test]
    fn test_backtrace_depth_only() {
        let mut command = BacktraceCommand::depth_only(3);
        command
            .process_response(&response(
                json!({"totalFrames": 7, "frames": [{"index": 0, "line": 1}]}),
                vec![],
            ))
            .unwrap();

        assert_eq!(command.call_stack_depth, 7);
        assert!(command.frames.is_empty());
    }

    #[test]
    fn test_backtrace_rejects_empty_range() {
        assert!(BacktraceCommand::new(1, 5, 5).is_err());
        assert_eq!(
            BacktraceCommand::new(1, 0, 5).unwrap().arguments().unwrap(),
            json!({"fromFrame": 0, "toFrame": 5, "inlineRefs": true})
        );
    }

    #[test]
    fn test_lookup_children() {
        let mut command = LookupCommand::new(4, vec![9]).unwrap();
        let body = json!({
            "9": {
                "handle": 9, "type": "object", "className": "Array",
                "properties": [
                    {"name": 0, "ref": 20},
                    {"name": "1", "ref": 21},
                    {"name": "length", "ref": 22}
                ]
            }
        });
        let refs = vec![
            json!({"handle": 20, "type": "string", "value": "a"}),
            json!({"handle": 21, "type": "string", "value": "b"}),
            json!({"handle": 22, "type": "number", "value": 2}),
        ];

        command.process_response(&response(body, refs)).unwrap();

        let children = &command.children[&9];
        let names: Vec<_> = children.iter().filter_map(|c| c.name.as_deref()).collect();
        assert_eq!(names, vec!["[0]", "[1]", "length"]);
        assert_eq!(children[0].string_value.as_deref(), Some("a"));
        assert_eq!(children[2].string_value.as_deref(), Some("2"));
    }

    #[test]
    fn test_lookup_requires_handles() {
        assert!(matches!(
            LookupCommand::new(1, vec![]),
            Err(DebuggerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_scripts() {
        let mut command = ScriptsCommand::new(5, true, Some(41));
        assert_eq!(
            command.arguments().unwrap(),
            json!({"types": 4, "includeSource": true, "ids": [41]})
        );

        command
            .process_response(&response(
                json!([
                    {"id": 41, "name": "/srv/app.js", "source": "var x;"},
                    {"id": 42, "name": ""}
                ]),
                vec![],
            ))
            .unwrap();

        assert_eq!(command.modules.len(), 1);
        assert_eq!(command.modules[0].source.as_deref(), Some("var x;"));
    }

    #[test]
    fn test_set_variable_value() {
        let mut command = SetVariableValueCommand::new(6, 1, 0, "count", 15).unwrap();
        assert_eq!(
            command.arguments().unwrap(),
            json!({
                "name": "count",
                "newValue": {"handle": 15},
                "scope": {"number": 0, "frameNumber": 1}
            })
        );

        command
            .process_response(&response(
                json!({"newValue": {"handle": 15, "type": "number", "value": 5}}),
                vec![],
            ))
            .unwrap();

        let result = command.result.unwrap();
        assert_eq!(result.name.as_deref(), Some("count"));
        assert_eq!(result.string_value.as_deref(), Some("5"));
    }
}
