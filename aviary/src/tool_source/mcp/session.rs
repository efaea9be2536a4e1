//! MCP session over stdio: spawn the server process, frame JSON-RPC as
//! newline-delimited messages on its pipes.
//!
//! Requests are serialized: the session holds an async mutex around the pipe
//! pair, so concurrent turns on one agent queue their calls rather than
//! interleaving frames on the wire.

use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::Mutex;
use tokio::time::{timeout_at, Instant};

use super::{RpcReply, INITIALIZE_REQUEST_ID, PROTOCOL_VERSION};
use crate::tool_source::ToolSourceError;

/// Per-request timeout for a JSON-RPC round trip.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Initialize handshakes get a shorter budget so a dead server fails fast.
const INITIALIZE_TIMEOUT: Duration = Duration::from_secs(20);

struct Pipes {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    child: Child,
}

/// MCP session over stdio. Created by `McpToolSource::connect` for
/// `transport: "stdio"` sources.
pub struct McpStdioSession {
    pipes: Mutex<Option<Pipes>>,
}

impl McpStdioSession {
    /// Spawns the server process and completes the initialize handshake.
    /// The child inherits the parent environment plus `env`; stderr is
    /// discarded.
    pub async fn spawn(
        command: &str,
        args: &[String],
        env: &BTreeMap<String, String>,
    ) -> Result<Self, ToolSourceError> {
        let mut cmd = tokio::process::Command::new(command);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        for (k, v) in env {
            cmd.env(k, v);
        }
        let mut child = cmd
            .spawn()
            .map_err(|e| ToolSourceError::Transport(format!("spawn {}: {}", command, e)))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ToolSourceError::Transport("child stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .map(BufReader::new)
            .ok_or_else(|| ToolSourceError::Transport("child stdout unavailable".into()))?;

        let session = Self {
            pipes: Mutex::new(Some(Pipes {
                stdin,
                stdout,
                child,
            })),
        };
        session.initialize().await?;
        Ok(session)
    }

    /// Sends `initialize`, waits for its result, then sends
    /// `notifications/initialized`.
    async fn initialize(&self) -> Result<(), ToolSourceError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "clientInfo": {
                "name": "aviary-mcp",
                "version": env!("CARGO_PKG_VERSION")
            }
        });
        let mut guard = self.pipes.lock().await;
        let pipes = guard
            .as_mut()
            .ok_or_else(|| ToolSourceError::Transport("session closed".into()))?;
        let reply = request_on_pipes(
            pipes,
            INITIALIZE_REQUEST_ID,
            "initialize",
            params,
            INITIALIZE_TIMEOUT,
        )
        .await?;
        if let Some(err) = reply.error {
            return Err(ToolSourceError::Transport(format!(
                "initialize: {}",
                err.message
            )));
        }
        let notification = json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized",
            "params": {}
        });
        write_message(&mut pipes.stdin, &notification).await?;
        Ok(())
    }

    /// One JSON-RPC round trip: write the request line, read lines until the
    /// matching response arrives or the timeout expires. Server-initiated
    /// `roots/list` requests seen in between are answered with empty roots.
    pub async fn request(
        &self,
        id: &str,
        method: &str,
        params: Value,
    ) -> Result<RpcReply, ToolSourceError> {
        let mut guard = self.pipes.lock().await;
        let pipes = guard
            .as_mut()
            .ok_or_else(|| ToolSourceError::Transport("session closed".into()))?;
        request_on_pipes(pipes, id, method, params, REQUEST_TIMEOUT).await
    }

    /// Closes stdin and kills the child. Idempotent.
    pub async fn shutdown(&self) {
        let mut guard = self.pipes.lock().await;
        if let Some(mut pipes) = guard.take() {
            let _ = pipes.stdin.shutdown().await;
            let _ = pipes.child.start_kill();
        }
    }
}

async fn write_message(stdin: &mut ChildStdin, message: &Value) -> Result<(), ToolSourceError> {
    let mut line = message.to_string();
    line.push('\n');
    stdin
        .write_all(line.as_bytes())
        .await
        .map_err(|e| ToolSourceError::Transport(format!("write: {}", e)))?;
    stdin
        .flush()
        .await
        .map_err(|e| ToolSourceError::Transport(format!("flush: {}", e)))
}

async fn request_on_pipes(
    pipes: &mut Pipes,
    id: &str,
    method: &str,
    params: Value,
    budget: Duration,
) -> Result<RpcReply, ToolSourceError> {
    let request = json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params
    });
    write_message(&mut pipes.stdin, &request).await?;

    let deadline = Instant::now() + budget;
    let mut line = String::new();
    loop {
        line.clear();
        let read = timeout_at(deadline, pipes.stdout.read_line(&mut line))
            .await
            .map_err(|_| {
                ToolSourceError::Transport(format!("timeout waiting for {} response", method))
            })?
            .map_err(|e| ToolSourceError::Transport(format!("read: {}", e)))?;
        if read == 0 {
            return Err(ToolSourceError::Transport(
                "server closed the connection".into(),
            ));
        }
        let message: Value = match serde_json::from_str(line.trim()) {
            Ok(v) => v,
            Err(_) => continue, // not JSON-RPC, e.g. stray log output
        };
        if message.get("method").and_then(Value::as_str) == Some("roots/list") {
            let response = json!({
                "jsonrpc": "2.0",
                "id": message.get("id").cloned().unwrap_or(Value::Null),
                "result": { "roots": [] }
            });
            write_message(&mut pipes.stdin, &response).await?;
            continue;
        }
        let matches_id = message.get("id").map(|v| match v {
            Value::String(s) => s == id,
            other => other.to_string() == id,
        });
        if matches_id == Some(true)
            && (message.get("result").is_some() || message.get("error").is_some())
        {
            return serde_json::from_value(message)
                .map_err(|e| ToolSourceError::Transport(format!("response parse: {}", e)));
        }
        // Response for someone else or a notification; keep reading.
    }
}
