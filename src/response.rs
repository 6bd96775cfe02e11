//! Handler outcomes and the wire envelope every route responds with.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message shown to callers for any upstream or unexpected failure.
pub const GENERIC_ERROR_MESSAGE: &str = "Internal server error. Please try again later.";

/// What a handler produced.
///
/// `error` is for the operator log only. It is dropped when the envelope is
/// built and has no serialized form.
#[derive(Debug)]
pub struct HandlerOutcome {
    pub is_error: bool,
    pub status: StatusCode,
    pub error: Option<anyhow::Error>,
    pub message: String,
    pub data: Option<Value>,
}

impl HandlerOutcome {
    /// 200 with a payload and an empty message.
    pub fn ok(data: Value) -> Self {
        Self {
            is_error: false,
            status: StatusCode::OK,
            error: None,
            message: String::new(),
            data: Some(data),
        }
    }

    /// 200 with only a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            is_error: false,
            status: StatusCode::OK,
            error: None,
            message: message.into(),
            data: None,
        }
    }

    /// 400; the message is shown to the caller.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::failure(StatusCode::BAD_REQUEST, message.into(), None)
    }

    /// 401; the reason is logged, the caller only sees `message`.
    pub fn unauthorized(message: impl Into<String>, reason: impl Into<anyhow::Error>) -> Self {
        Self::failure(StatusCode::UNAUTHORIZED, message.into(), Some(reason.into()))
    }

    /// 500 with the generic message; the cause is logged.
    pub fn internal(cause: impl Into<anyhow::Error>) -> Self {
        Self::failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            GENERIC_ERROR_MESSAGE.to_string(),
            Some(cause.into()),
        )
    }

    fn failure(status: StatusCode, message: String, error: Option<anyhow::Error>) -> Self {
        Self {
            is_error: true,
            status,
            error,
            message,
            data: None,
        }
    }

    /// Split into the status, the log-only error and the wire envelope.
    pub fn into_parts(self) -> (StatusCode, Option<anyhow::Error>, Envelope) {
        let envelope = Envelope {
            success: !self.is_error,
            message: self.message,
            data: self.data,
        };
        (self.status, self.error, envelope)
    }
}

/// `{success, message, data}`, the single response shape for all routes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub success: bool,
    pub message: String,
    pub data: Option<Value>,
}
