//! Integration tests for node-debug-client.
//!
//! A scripted debuggee listens on loopback (TCP or WebSocket) and the
//! client connects to it through the public API.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use node_debug_client::commands::{
    BacktraceCommand, ContinueCommand, EvaluateCommand, ScriptsCommand, SetBreakpointCommand,
    SteppingKind,
};
use node_debug_client::model::NodeBreakpoint;
use node_debug_client::protocol::{build_frame, MessageFramer};
use node_debug_client::{ClientConfig, ConnectionConfig, DebuggerClient, DebuggerError};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

const WITHIN: Duration = Duration::from_secs(5);

/// Debuggee end of an accepted TCP connection.
struct Debuggee {
    stream: TcpStream,
    framer: MessageFramer,
    received: Vec<Value>,
}

impl Debuggee {
    async fn handshake(mut stream: TcpStream) -> Self {
        stream
            .write_all(b"Type: connect\r\nV8-Version: 6.2.414.50\r\nProtocol-Version: 1\r\nEmbedding-Host: node v8.9.4\r\nContent-Length: 0\r\n\r\n")
            .await
            .unwrap();
        Self {
            stream,
            framer: MessageFramer::new(),
            received: Vec::new(),
        }
    }

    async fn next_request(&mut self) -> Value {
        let mut buf = [0u8; 4096];
        while self.received.is_empty() {
            let n = tokio::time::timeout(WITHIN, self.stream.read(&mut buf))
                .await
                .expect("no request in time")
                .unwrap();
            assert!(n > 0, "client hung up");
            for frame in self.framer.push(&buf[..n]).unwrap() {
                self.received.push(serde_json::from_slice(frame.body()).unwrap());
            }
        }
        self.received.remove(0)
    }

    async fn reply(&mut self, request: &Value, success: bool, body: Value) {
        let response = json!({
            "seq": 0,
            "type": "response",
            "request_seq": request["seq"],
            "command": request["command"],
            "success": success,
            "body": body,
            "running": false,
        });
        self.send(response).await;
    }

    async fn send(&mut self, message: Value) {
        self.stream
            .write_all(&build_frame(&message.to_string()))
            .await
            .unwrap();
    }
}

async fn connect() -> (std::sync::Arc<DebuggerClient>, Debuggee) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let client = std::sync::Arc::new(DebuggerClient::new(ClientConfig::default()));
    let uri = format!("tcp://127.0.0.1:{port}");
    let (connected, accepted) = tokio::join!(client.connect(&uri), listener.accept());
    connected.unwrap();
    let debuggee = Debuggee::handshake(accepted.unwrap().0).await;
    (client, debuggee)
}

async fn eventually(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(WITHIN, async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[test]
fn test_framing_survives_any_chunking() {
    let payloads = [
        r#"{"seq":1,"type":"event","event":"break","body":{"sourceLine":3}}"#,
        r#"{"text":"naïve – ünïcödé ✓"}"#,
        "{}",
    ];
    let mut stream = Vec::new();
    for payload in payloads {
        stream.extend_from_slice(&build_frame(payload));
        stream.extend_from_slice(b"Content-Length: 0\r\n\r\n");
    }

    for chunk in [1, 2, 7, 64, stream.len()] {
        let mut framer = MessageFramer::new();
        let mut seen = Vec::new();
        for piece in stream.chunks(chunk) {
            for frame in framer.push(piece).unwrap() {
                seen.push(frame.text().unwrap().to_string());
            }
        }
        assert_eq!(seen, payloads, "chunk size {chunk}");
    }
}

#[tokio::test]
async fn test_connect_learns_version() {
    let (client, _debuggee) = connect().await;

    assert!(client.is_connected());
    eventually(|| client.node_version().is_some()).await;
    assert_eq!(client.node_version().unwrap().to_string(), "8.9.4");
}

#[tokio::test]
async fn test_break_inspect_continue() {
    let (client, mut debuggee) = connect().await;
    let mut breaks = client.subscribe_breakpoints();
    let cancel = CancellationToken::new();

    // Set a breakpoint on the first line of a loaded script.
    let set = {
        let client = client.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let bp = NodeBreakpoint::new("/srv/app.js", 0, 0).unwrap();
            let mut command = SetBreakpointCommand::new(client.next_command_id(), bp, None, true);
            client.send_request(&mut command, &cancel).await.map(|_| command)
        })
    };
    let request = debuggee.next_request().await;
    assert_eq!(request["command"], json!("setbreakpoint"));
    assert_eq!(request["arguments"]["type"], json!("script"));
    assert_eq!(request["arguments"]["column"], json!(62));
    debuggee
        .reply(
            &request,
            true,
            json!({"breakpoint": 1, "actual_locations": [{"line": 0, "column": 62, "script_id": 41}]}),
        )
        .await;
    let set = set.await.unwrap().unwrap();
    assert_eq!(set.breakpoint_id, Some(1));
    assert_eq!((set.line, set.column), (Some(0), Some(0)));

    // The debuggee stops there.
    debuggee
        .send(json!({"seq": 0, "type": "event", "event": "break", "body": {
            "sourceLine": 0, "sourceColumn": 62, "breakpoints": [1],
            "script": {"id": 41, "name": "/srv/app.js"}
        }}))
        .await;
    let hit = tokio::time::timeout(WITHIN, breaks.recv()).await.unwrap().unwrap();
    assert_eq!(hit.breakpoints, vec![1]);
    assert_eq!((hit.line, hit.column), (0, 0));

    // Backtrace.
    let backtrace = {
        let client = client.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let mut command = BacktraceCommand::new(client.next_command_id(), 0, 10).unwrap();
            client.send_request(&mut command, &cancel).await.map(|_| command)
        })
    };
    let request = debuggee.next_request().await;
    assert_eq!(request["arguments"]["inlineRefs"], json!(true));
    debuggee
        .send(json!({
            "seq": 0, "type": "response", "command": "backtrace", "success": true,
            "request_seq": request["seq"],
            "body": {"totalFrames": 1, "frames": [{
                "index": 0, "func": {"name": "main", "scriptId": 41},
                "script": {"ref": 3}, "line": 0, "column": 62,
                "arguments": [], "locals": []
            }]},
            "refs": [{"handle": 3, "type": "script", "id": 41, "name": "/srv/app.js"}]
        }))
        .await;
    let backtrace = backtrace.await.unwrap().unwrap();
    assert_eq!(backtrace.call_stack_depth, 1);
    assert_eq!(backtrace.frames[0].function_name, "main");
    assert_eq!(backtrace.frames[0].column, 0);

    // Step over.
    let step = {
        let client = client.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let mut command =
                ContinueCommand::step(client.next_command_id(), SteppingKind::Over, 1).unwrap();
            client.send_request(&mut command, &cancel).await
        })
    };
    let request = debuggee.next_request().await;
    assert_eq!(request["arguments"], json!({"stepaction": "next", "stepcount": 1}));
    debuggee.reply(&request, true, Value::Null).await;
    step.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_evaluate_error_over_tcp() {
    let (client, mut debuggee) = connect().await;

    let evaluate = {
        let client = client.clone();
        tokio::spawn(async move {
            let mut command = EvaluateCommand::new(client.next_command_id(), "hello", None).unwrap();
            let result = client
                .send_request(&mut command, &CancellationToken::new())
                .await;
            (result, command.result)
        })
    };
    let request = debuggee.next_request().await;
    debuggee
        .send(json!({
            "seq": 0, "type": "response", "command": "evaluate",
            "request_seq": request["seq"], "success": false,
            "message": "ReferenceError: hello is not defined"
        }))
        .await;

    let (result, value) = evaluate.await.unwrap();
    match result {
        Err(DebuggerError::CommandFailed { command, message }) => {
            assert_eq!(command, "evaluate");
            assert_eq!(message, "ReferenceError: hello is not defined");
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(value.is_none());
}

#[tokio::test]
async fn test_debuggee_exit_fails_pending_requests() {
    let (client, mut debuggee) = connect().await;
    let mut closed = client.subscribe_connection_closed();

    let pending: Vec<_> = (0..4)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move {
                let mut command = ScriptsCommand::new(client.next_command_id(), false, None);
                client
                    .send_request(&mut command, &CancellationToken::new())
                    .await
            })
        })
        .collect();
    for _ in 0..4 {
        debuggee.next_request().await;
    }
    eventually(|| client.pending_requests() == 4).await;

    drop(debuggee);

    for request in pending {
        let result = tokio::time::timeout(WITHIN, request).await.unwrap().unwrap();
        assert!(matches!(result, Err(DebuggerError::ConnectionClosed)));
    }
    tokio::time::timeout(WITHIN, closed.recv()).await.unwrap().unwrap();
    assert!(!client.is_connected());
    assert_eq!(client.pending_requests(), 0);
}

#[tokio::test]
async fn test_unsupported_scheme_is_rejected_before_io() {
    let client = DebuggerClient::new(ClientConfig::default());

    let err = client.connect("http://localhost:5858").await.unwrap_err();

    assert!(matches!(err, DebuggerError::UnsupportedScheme(_)));
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_websocket_round_trip_and_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let config = ClientConfig::default().connection(ConnectionConfig::default().wake_up(false));
    let client = std::sync::Arc::new(DebuggerClient::new(config));
    let mut closed = client.subscribe_connection_closed();

    let uri = format!("ws://127.0.0.1:{port}/debug");
    let (connected, mut socket) = tokio::join!(client.connect(&uri), async {
        let (stream, _) = listener.accept().await.unwrap();
        tokio_tungstenite::accept_async(stream).await.unwrap()
    });
    connected.unwrap();

    // Handshake headers as text, the empty body as binary.
    socket
        .send(Message::Text("Embedding-Host: node v6.11.1\r\nContent-Length: 0\r\n".into()))
        .await
        .unwrap();
    socket.send(Message::Binary(b"\r\n".to_vec())).await.unwrap();
    eventually(|| client.node_version().is_some()).await;
    assert_eq!(client.node_version().unwrap().to_string(), "6.11.1");

    let request = {
        let client = client.clone();
        tokio::spawn(async move {
            let mut command = ScriptsCommand::new(client.next_command_id(), false, None);
            client
                .send_request(&mut command, &CancellationToken::new())
                .await
        })
    };

    // Outbound frames arrive as binary messages.
    let mut framer = MessageFramer::new();
    let mut received = Vec::new();
    while received.is_empty() {
        let message = tokio::time::timeout(WITHIN, socket.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let Message::Binary(data) = message else {
            panic!("expected a binary message, got {message:?}");
        };
        for frame in framer.push(&data).unwrap() {
            received.push(serde_json::from_slice::<Value>(frame.body()).unwrap());
        }
    }
    assert_eq!(received[0]["command"], json!("scripts"));
    eventually(|| client.pending_requests() == 1).await;

    socket.send(Message::Close(None)).await.unwrap();

    let result = tokio::time::timeout(WITHIN, request).await.unwrap().unwrap();
    assert!(matches!(result, Err(DebuggerError::ConnectionClosed)));
    tokio::time::timeout(WITHIN, closed.recv()).await.unwrap().unwrap();
    assert!(!client.is_connected());
}
