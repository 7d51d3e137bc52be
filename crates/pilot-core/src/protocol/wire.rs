//! Wire messages exchanged between page, content script, and panel.
//!
//! JSON shape is `{"type": "<KIND>", ...fields}`. Field names are part of the
//! compatibility surface: page and panel may run different releases.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PilotError, Result};

/// Correlation id allocated by the injected provider, scoped to one page load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// EIP-1193 request arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub method: String,
    /// Absent params decode as `null`.
    #[serde(default)]
    pub params: Value,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

/// Error payload of an `ERROR` message. Provider-native errors are carried verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Tagged union of every message the bridge understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WireMessage {
    Request {
        #[serde(rename = "requestId")]
        request_id: RequestId,
        request: JsonRpcRequest,
    },
    Response {
        #[serde(rename = "requestId")]
        request_id: RequestId,
        #[serde(default)]
        response: Value,
    },
    Error {
        #[serde(rename = "requestId")]
        request_id: RequestId,
        error: RpcError,
    },
    Event {
        #[serde(rename = "eventName")]
        event_name: String,
        #[serde(rename = "eventData", default)]
        event_data: Value,
    },
    Connected,
    Initialized,
    /// Posted by the relay into the page when its port goes away. Page-local.
    Disconnected,
    /// Any `type` this build does not know. Never serialized.
    #[serde(other, skip_serializing)]
    Unknown,
}

impl WireMessage {
    /// Static type name, for logs and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            WireMessage::Request { .. } => "REQUEST",
            WireMessage::Response { .. } => "RESPONSE",
            WireMessage::Error { .. } => "ERROR",
            WireMessage::Event { .. } => "EVENT",
            WireMessage::Connected => "CONNECTED",
            WireMessage::Initialized => "INITIALIZED",
            WireMessage::Disconnected => "DISCONNECTED",
            WireMessage::Unknown => "UNKNOWN",
        }
    }

    /// Correlation id of requests and terminal messages.
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            WireMessage::Request { request_id, .. }
            | WireMessage::Response { request_id, .. }
            | WireMessage::Error { request_id, .. } => Some(*request_id),
            _ => None,
        }
    }

    pub fn event(name: impl Into<String>, data: Value) -> Self {
        WireMessage::Event {
            event_name: name.into(),
            event_data: data,
        }
    }

    /// Build the terminal message for `request_id` from a dispatch outcome.
    pub fn terminal(request_id: RequestId, outcome: Result<Value>) -> Self {
        match outcome {
            Ok(response) => WireMessage::Response {
                request_id,
                response,
            },
            Err(e) => WireMessage::Error {
                request_id,
                error: e.to_rpc_error(),
            },
        }
    }

    /// Decode one message. Unknown `type` values yield `WireMessage::Unknown`.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw)
            .map_err(|e| PilotError::BadRequest(format!("invalid wire message: {e}")))
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| PilotError::Internal(format!("wire encode failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_uses_camel_case_correlation_key() {
        let msg = WireMessage::Request {
            request_id: RequestId(7),
            request: JsonRpcRequest::new("eth_chainId", Value::Null),
        };
        let v: Value = serde_json::from_slice(&msg.encode().unwrap()).unwrap();
        assert_eq!(v["type"], "REQUEST");
        assert_eq!(v["requestId"], 7);
        assert_eq!(v["request"]["method"], "eth_chainId");
    }

    #[test]
    fn unknown_type_is_tolerated() {
        let raw = br#"{"type":"SOMETHING_NEW","payload":{"x":1}}"#;
        assert_eq!(WireMessage::decode(raw).unwrap(), WireMessage::Unknown);
    }

    #[test]
    fn unit_messages_round_trip() {
        for (msg, kind) in [
            (WireMessage::Connected, "CONNECTED"),
            (WireMessage::Initialized, "INITIALIZED"),
            (WireMessage::Disconnected, "DISCONNECTED"),
        ] {
            let bytes = msg.encode().unwrap();
            let v: Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(v, json!({ "type": kind }));
            assert_eq!(WireMessage::decode(&bytes).unwrap(), msg);
        }
    }

    #[test]
    fn missing_type_is_rejected() {
        let err = WireMessage::decode(br#"{"requestId":1}"#).unwrap_err();
        assert_eq!(err.client_code().as_str(), "INVALID_REQUEST");
    }

    #[test]
    fn unknown_is_never_serialized() {
        assert!(WireMessage::Unknown.encode().is_err());
    }

    #[test]
    fn terminal_maps_errors() {
        let msg = WireMessage::terminal(RequestId(3), Err(PilotError::NoActiveRoute));
        match msg {
            WireMessage::Error { request_id, error } => {
                assert_eq!(request_id, RequestId(3));
                assert_eq!(error.code, 4100);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
