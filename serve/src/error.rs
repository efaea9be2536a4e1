//! Error envelope: `{ error: { code, message, details?, traceId?, timestamp } }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Map, Value};

use aviary::AgentError;

/// An [`AgentError`] plus the request's trace id, rendered as the wire
/// envelope with the status from the error-code table.
pub struct ApiError {
    error: AgentError,
    trace_id: Option<String>,
    details: Option<Value>,
}

impl ApiError {
    pub fn new(error: AgentError) -> Self {
        Self {
            error,
            trace_id: None,
            details: None,
        }
    }

    pub fn with_trace(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    #[allow(dead_code)]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<AgentError> for ApiError {
    fn from(error: AgentError) -> Self {
        Self::new(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut body = Map::new();
        body.insert("code".into(), json!(self.error.code()));
        body.insert("message".into(), json!(self.error.to_string()));
        if let Some(details) = self.details {
            body.insert("details".into(), details);
        }
        if let Some(trace_id) = self.trace_id {
            body.insert("traceId".into(), json!(trace_id));
        }
        body.insert(
            "timestamp".into(),
            json!(chrono::Utc::now().to_rfc3339()),
        );
        (status, Json(json!({ "error": body }))).into_response()
    }
}

/// A fresh trace id for one request.
pub fn new_trace_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
