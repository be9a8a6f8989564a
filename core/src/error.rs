//! Error types for the todo API client.
//!
//! # Design
//! The variants follow what a caller does with the failure rather than the
//! raw status code. `Validation` carries the backend's per-field messages so
//! forms can render them next to inputs, `NotFound` tells the cache layer an
//! entity is gone, `Unreachable` means no response arrived at all, and
//! `Server` marks 5xx responses. Everything else lands in `HttpError` with the
//! raw status and body for debugging.
//!
//! `ApiError` is `Clone` because one in-flight result is handed to every
//! reader that joined the request.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::http::HttpResponse;

/// Field name to messages, as returned by the backend on a 400.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Unreachable,
    Server,
    Other,
}

/// Errors returned by `TodoClient` parse methods and the layers above it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    /// The backend rejected the payload; `fields` maps field name to messages.
    #[error("validation failed: {}", summarize(.fields))]
    Validation { status: u16, fields: FieldErrors },

    /// The server returned 404: the requested entity does not exist.
    #[error("resource not found")]
    NotFound,

    /// No response was received (connection refused, DNS, timeout).
    #[error("service unreachable: {0}")]
    Unreachable(String),

    /// The server returned a 5xx status.
    #[error("server error {status}: {body}")]
    Server { status: u16, body: String },

    /// The server returned some other non-2xx status.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// A filter parameter had an unknown key or an unparsable value.
    #[error("invalid filter {key}={value:?}")]
    InvalidFilter { key: String, value: String },
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Validation { .. } | ApiError::InvalidFilter { .. } => ErrorKind::Validation,
            ApiError::NotFound => ErrorKind::NotFound,
            ApiError::Unreachable(_) => ErrorKind::Unreachable,
            ApiError::Server { .. } => ErrorKind::Server,
            _ => ErrorKind::Other,
        }
    }

    /// Reads failing this way may be retried immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Unreachable | ErrorKind::Server)
    }

    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            ApiError::Validation { fields, .. } => Some(fields),
            _ => None,
        }
    }

    /// Classify a non-2xx response.
    pub fn from_response(response: &HttpResponse) -> Self {
        match response.status {
            404 => ApiError::NotFound,
            400 | 422 => match parse_field_errors(&response.body) {
                Some(fields) => ApiError::Validation {
                    status: response.status,
                    fields,
                },
                None => ApiError::HttpError {
                    status: response.status,
                    body: response.body.clone(),
                },
            },
            status @ 500..=599 => ApiError::Server {
                status,
                body: response.body.clone(),
            },
            status => ApiError::HttpError {
                status,
                body: response.body.clone(),
            },
        }
    }

    /// `Ok` when no field collected a message, otherwise a local validation error.
    pub(crate) fn from_fields(fields: FieldErrors) -> Result<(), ApiError> {
        if fields.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation { status: 400, fields })
        }
    }
}

/// Accepts `{"field": ["msg", ...]}`, `{"field": "msg"}` and nested values,
/// which are kept as their JSON text.
fn parse_field_errors(body: &str) -> Option<FieldErrors> {
    let serde_json::Value::Object(map) = serde_json::from_str(body).ok()? else {
        return None;
    };
    let fields = map
        .into_iter()
        .map(|(field, value)| {
            let messages = match value {
                serde_json::Value::Array(items) => items.into_iter().map(message_text).collect(),
                other => vec![message_text(other)],
            };
            (field, messages)
        })
        .collect();
    Some(fields)
}

fn message_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

fn summarize(fields: &FieldErrors) -> String {
    fields
        .iter()
        .map(|(field, messages)| format!("{field}: {}", messages.join(" ")))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Invalid configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{key} has invalid value {value:?}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}
