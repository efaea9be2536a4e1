//! Minimal HTTP mock server for provider/backend tests: raw TCP, one request
//! per connection, scripted responses in order.

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A request the mock server saw: raw header block and body.
pub(crate) struct SeenRequest {
    pub headers: String,
    pub body: String,
}

/// One scripted response.
pub(crate) struct MockResponse {
    status: String,
    content_type: Option<String>,
    body: String,
}

impl MockResponse {
    pub fn json(value: serde_json::Value) -> Self {
        Self {
            status: "200 OK".into(),
            content_type: Some("application/json".into()),
            body: value.to_string(),
        }
    }

    pub fn sse(body: &str) -> Self {
        Self {
            status: "200 OK".into(),
            content_type: Some("text/event-stream".into()),
            body: body.to_string(),
        }
    }

    pub fn status(code: u16, body: &str) -> Self {
        let reason = match code {
            202 => "Accepted",
            400 => "Bad Request",
            404 => "Not Found",
            500 => "Internal Server Error",
            _ => "Error",
        };
        Self {
            status: format!("{code} {reason}"),
            content_type: Some("text/plain".into()),
            body: body.to_string(),
        }
    }
}

async fn read_http_request(stream: &mut TcpStream) -> SeenRequest {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 1024];
    loop {
        let n = stream.read(&mut tmp).await.unwrap();
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
            let mut body = buf[header_end..].to_vec();
            while body.len() < content_length {
                let m = stream.read(&mut tmp).await.unwrap();
                if m == 0 {
                    break;
                }
                body.extend_from_slice(&tmp[..m]);
            }
            let body = String::from_utf8_lossy(&body[..content_length.min(body.len())]).to_string();
            return SeenRequest { headers, body };
        }
    }
    SeenRequest {
        headers: String::new(),
        body: String::new(),
    }
}

async fn write_http_response(stream: &mut TcpStream, response: &MockResponse) {
    let mut resp = format!("HTTP/1.1 {}\r\nConnection: close\r\n", response.status);
    if let Some(ct) = &response.content_type {
        resp.push_str(&format!("Content-Type: {}\r\n", ct));
    }
    resp.push_str(&format!(
        "Content-Length: {}\r\n\r\n{}",
        response.body.len(),
        response.body
    ));
    stream.write_all(resp.as_bytes()).await.unwrap();
    let _ = stream.shutdown().await;
}

/// Spawns a server that answers `responses.len()` requests in order, then
/// exits. Returns the base URL and the requests seen so far.
pub(crate) async fn spawn_http_server(
    responses: Vec<MockResponse>,
) -> (String, Arc<Mutex<Vec<SeenRequest>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen: Arc<Mutex<Vec<SeenRequest>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    tokio::spawn(async move {
        for response in responses {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let request = read_http_request(&mut stream).await;
            seen_clone.lock().unwrap().push(request);
            write_http_response(&mut stream, &response).await;
        }
    });
    (format!("http://{}", addr), seen)
}
