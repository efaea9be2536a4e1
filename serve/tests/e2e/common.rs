//! Shared helpers: spawn the app on an ephemeral port with a temp agent
//! directory, and a scripted OpenAI-compatible provider mock.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use aviary::{Registry, TaskExecutor};
use config::ServerSettings;
use serve::AppState;

/// One scripted provider reply.
#[derive(Clone)]
pub enum Reply {
    Json(Value),
    Sse(&'static str),
    /// JSON after a delay; used to keep a turn in flight for cancel tests.
    SlowJson(Value, Duration),
}

async fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 1024];
    loop {
        let n = stream.read(&mut tmp).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&tmp[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let header_end = pos + 4;
            let headers = String::from_utf8_lossy(&buf[..header_end]).to_string();
            let content_length = headers
                .lines()
                .find_map(|line| {
                    line.to_ascii_lowercase()
                        .strip_prefix("content-length:")
                        .and_then(|v| v.trim().parse::<usize>().ok())
                })
                .unwrap_or(0);
            while buf.len() < header_end + content_length {
                let m = stream.read(&mut tmp).await.unwrap_or(0);
                if m == 0 {
                    break;
                }
                buf.extend_from_slice(&tmp[..m]);
            }
            return String::from_utf8_lossy(&buf).to_string();
        }
    }
    String::new()
}

async fn write_reply(stream: &mut TcpStream, reply: &Reply) {
    let (content_type, body, delay) = match reply {
        Reply::Json(value) => ("application/json", value.to_string(), None),
        Reply::Sse(body) => ("text/event-stream", body.to_string(), None),
        Reply::SlowJson(value, delay) => ("application/json", value.to_string(), Some(*delay)),
    };
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    let resp = format!(
        "HTTP/1.1 200 OK\r\nConnection: close\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n{}",
        content_type,
        body.len(),
        body
    );
    let _ = stream.write_all(resp.as_bytes()).await;
    let _ = stream.shutdown().await;
}

/// Serves the scripted replies in order, then stops accepting.
pub async fn spawn_provider(replies: Vec<Reply>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        for reply in replies {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let _ = read_request(&mut stream).await;
            write_reply(&mut stream, &reply).await;
        }
    });
    format!("http://{}", addr)
}

/// Serves the same reply forever; for tests with an unknown request count.
pub async fn spawn_provider_repeating(reply: Reply) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let reply = reply.clone();
            tokio::spawn(async move {
                let _ = read_request(&mut stream).await;
                write_reply(&mut stream, &reply).await;
            });
        }
    });
    format!("http://{}", addr)
}

/// A plain Chat Completions reply with the given text.
pub fn text_reply(text: &str) -> Value {
    json!({
        "choices": [{
            "message": { "content": text, "tool_calls": null },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5 }
    })
}

/// An openai-compatible agent definition pointing at the mock provider.
pub fn openai_agent(id: &str, path: &str, provider_url: &str) -> Value {
    json!({
        "id": id,
        "path": path,
        "name": format!("{} agent", path),
        "description": format!("Test agent at {}", path),
        "provider": "openai-compatible",
        "model": "test-model",
        "providerConfig": { "baseUrl": provider_url },
        "systemPrompt": "You are a test agent."
    })
}

pub struct TestApp {
    pub base_url: String,
    pub state: Arc<AppState>,
    _agents_dir: tempfile::TempDir,
}

/// Writes the agent definitions into a temp directory, loads the registry,
/// and serves on an ephemeral port.
pub async fn spawn_app(agents: Vec<Value>) -> TestApp {
    let agents_dir = tempfile::tempdir().unwrap();
    for (i, agent) in agents.iter().enumerate() {
        std::fs::write(
            agents_dir.path().join(format!("agent-{i}.json")),
            serde_json::to_string_pretty(agent).unwrap(),
        )
        .unwrap();
    }

    let registry = Registry::load_all(agents_dir.path()).unwrap();
    let executor = TaskExecutor::new(Arc::clone(&registry));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = Arc::new(AppState {
        registry,
        executor,
        settings: ServerSettings {
            port: addr.port(),
            public_url: format!("http://{}", addr),
            agents_dir: PathBuf::from(agents_dir.path()),
        },
    });
    tokio::spawn(serve::run_serve_on_listener(listener, Arc::clone(&state)));

    TestApp {
        base_url: format!("http://{}", addr),
        state,
        _agents_dir: agents_dir,
    }
}

/// Splits an SSE body into its JSON data frames.
pub fn parse_sse_frames(body: &str) -> Vec<Value> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .filter(|data| !data.is_empty())
        .filter_map(|data| serde_json::from_str(data).ok())
        .collect()
}
