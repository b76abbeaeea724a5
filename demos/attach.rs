//! Attach - connect to a Node.js debuggee and watch it.
//!
//! This example demonstrates:
//! - Connecting a client to a `tcp://` or `ws://` endpoint
//! - Listing loaded scripts with a command
//! - Printing stops, compiled scripts and exceptions, resuming after each stop
//!
//! # Running
//!
//! ```sh
//! node --debug=5858 server.js &
//! RUST_LOG=node_debug_client=debug cargo run --example attach -- tcp://localhost:5858
//! ```

use node_debug_client::commands::{
    BacktraceCommand, ContinueCommand, ScriptsCommand, SetExceptionBreakCommand,
};
use node_debug_client::{ClientConfig, DebuggerClient};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let uri = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "tcp://localhost:5858".to_string());

    let client = DebuggerClient::new(ClientConfig::default());
    let mut breaks = client.subscribe_breakpoints();
    let mut compiled = client.subscribe_compile_scripts();
    let mut exceptions = client.subscribe_exceptions();
    let mut closed = client.subscribe_connection_closed();

    client.connect(&uri).await?;
    let cancel = CancellationToken::new();

    let mut scripts = ScriptsCommand::new(client.next_command_id(), false, None);
    client.send_request(&mut scripts, &cancel).await?;
    if let Some(version) = client.node_version() {
        println!("node {version}");
    }
    for module in scripts.modules.iter().filter(|m| !m.is_builtin()) {
        println!("script {:>4} {}", module.id, module.name);
    }

    let mut break_on_uncaught = SetExceptionBreakCommand::new(client.next_command_id(), true, true);
    client.send_request(&mut break_on_uncaught, &cancel).await?;

    loop {
        tokio::select! {
            hit = breaks.recv() => {
                let hit = match hit {
                    Ok(hit) => hit,
                    Err(RecvError::Lagged(n)) => {
                        eprintln!("missed {n} stops");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let mut backtrace = BacktraceCommand::new(client.next_command_id(), 0, 5)?;
                client.send_request(&mut backtrace, &cancel).await?;
                println!("stopped at {}:{} (breakpoints {:?})", hit.line + 1, hit.column + 1, hit.breakpoints);
                for frame in &backtrace.frames {
                    let script = frame.module.as_ref().map_or("<unknown>", |m| m.name.as_str());
                    println!("  #{} {} {}:{}", frame.index, frame.function_name, script, frame.line + 1);
                }
                client
                    .send_request(&mut ContinueCommand::new(client.next_command_id()), &cancel)
                    .await?;
            }
            Ok(script) = compiled.recv() => {
                println!("compiled {}", script.module.name);
            }
            Ok(thrown) = exceptions.recv() => {
                println!(
                    "exception{}: {}",
                    if thrown.uncaught { " (uncaught)" } else { "" },
                    thrown.description.as_deref().unwrap_or("<no description>")
                );
            }
            _ = closed.recv() => {
                println!("debuggee disconnected");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                client.close();
                break;
            }
        }
    }

    Ok(())
}
