//! JSON-RPC 2.0 message model.
//!
//! Outgoing messages are typed structs; incoming frames are classified by
//! [`classify`] into requests, responses and notifications.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, Serialize)]
pub(crate) struct Request<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl<'a> Request<'a> {
    pub fn new(id: u64, method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct Notification<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl<'a> Notification<'a> {
    pub fn new(method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
        }
    }
}

/// The `error` member of a JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

/// Build a success response for an inbound request. `id` is echoed verbatim.
pub(crate) fn success_response(id: Value, result: Value) -> Value {
    serde_json::json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "result": result,
    })
}

/// Build an error response. `id` is `null` when the request id could not be read.
pub(crate) fn error_response(id: Value, error: &ErrorObject) -> Value {
    serde_json::json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "error": error,
    })
}

#[derive(Debug, PartialEq)]
pub(crate) enum Incoming {
    /// Reply to one of our requests. Ids we never issued are not `u64`-shaped
    /// and come through as `id: None`; they are discarded by the transport.
    Response {
        id: Option<u64>,
        outcome: Result<Value, ErrorObject>,
    },
    /// Request from the engine that expects a reply with the same id.
    Request {
        id: Value,
        method: String,
        params: Option<Value>,
    },
    Notification {
        method: String,
        params: Option<Value>,
    },
    /// Neither shape. Carries the id, if any, so the transport can reply.
    Invalid { id: Option<Value> },
}

pub(crate) fn classify(frame: Value) -> Incoming {
    let Value::Object(mut map) = frame else {
        return Incoming::Invalid { id: None };
    };

    let id = map.remove("id").filter(|id| !id.is_null());
    let method = match map.remove("method") {
        Some(Value::String(method)) => Some(method),
        Some(_) => return Incoming::Invalid { id },
        None => None,
    };
    let params = map.remove("params");

    match (id, method) {
        (Some(id), Some(method)) => Incoming::Request { id, method, params },
        (None, Some(method)) => Incoming::Notification { method, params },
        (Some(id), None) => {
            let outcome = if let Some(error) = map.remove("error").filter(|e| !e.is_null()) {
                match serde_json::from_value::<ErrorObject>(error) {
                    Ok(error) => Err(error),
                    Err(_) => return Incoming::Invalid { id: Some(id) },
                }
            } else if let Some(result) = map.remove("result") {
                Ok(result)
            } else {
                return Incoming::Invalid { id: Some(id) };
            };
            Incoming::Response {
                id: id.as_u64(),
                outcome,
            }
        }
        (None, None) => Incoming::Invalid { id: None },
    }
}
