//! Shared error type across pilot crates.

use thiserror::Error;

use crate::protocol::wire::RpcError;

/// Client-facing error codes (stable API, EIP-1193 / JSON-RPC numbering).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// The user rejected the request.
    UserRejected,
    /// No active route; the provider is not authorized to serve accounts.
    Unauthorized,
    /// Method not supported by the provider.
    UnsupportedMethod,
    /// The provider is disconnected from all chains.
    Disconnected,
    /// The provider is not connected to the requested chain.
    ChainDisconnected,
    /// Invalid input / malformed message.
    InvalidRequest,
    /// Internal error.
    Internal,
}

impl ClientCode {
    /// Numeric code carried in `ERROR` wire messages.
    pub fn as_i64(self) -> i64 {
        match self {
            ClientCode::UserRejected => 4001,
            ClientCode::Unauthorized => 4100,
            ClientCode::UnsupportedMethod => 4200,
            ClientCode::Disconnected => 4900,
            ClientCode::ChainDisconnected => 4901,
            ClientCode::InvalidRequest => -32600,
            ClientCode::Internal => -32603,
        }
    }

    /// String representation used in logs and test vectors.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::UserRejected => "USER_REJECTED",
            ClientCode::Unauthorized => "UNAUTHORIZED",
            ClientCode::UnsupportedMethod => "UNSUPPORTED_METHOD",
            ClientCode::Disconnected => "DISCONNECTED",
            ClientCode::ChainDisconnected => "CHAIN_DISCONNECTED",
            ClientCode::InvalidRequest => "INVALID_REQUEST",
            ClientCode::Internal => "INTERNAL",
        }
    }

    pub fn from_i64(code: i64) -> Option<Self> {
        match code {
            4001 => Some(ClientCode::UserRejected),
            4100 => Some(ClientCode::Unauthorized),
            4200 => Some(ClientCode::UnsupportedMethod),
            4900 => Some(ClientCode::Disconnected),
            4901 => Some(ClientCode::ChainDisconnected),
            -32600 => Some(ClientCode::InvalidRequest),
            -32603 => Some(ClientCode::Internal),
            _ => None,
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, PilotError>;

/// Unified error type used by core and bridge.
#[derive(Debug, Clone, Error)]
pub enum PilotError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("No active route")]
    NoActiveRoute,
    #[error("rpc error {}: {}", .0.code, .0.message)]
    Rpc(RpcError),
    #[error("disconnected: {0}")]
    Disconnected(String),
    #[error("injection conflict: {0}")]
    InjectionConflict(String),
    #[error("no wrapping should be applied for direct execution")]
    DirectExecution,
    #[error("unsupported module type: {0}")]
    UnsupportedModule(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl PilotError {
    /// Map internal error to a stable client-facing code.
    ///
    /// Provider-native errors keep their own numeric code; `client_code` then
    /// reports the closest known class, or `Internal` when the code is foreign.
    pub fn client_code(&self) -> ClientCode {
        match self {
            PilotError::BadRequest(_) => ClientCode::InvalidRequest,
            PilotError::NoActiveRoute => ClientCode::Unauthorized,
            PilotError::Rpc(e) => ClientCode::from_i64(e.code).unwrap_or(ClientCode::Internal),
            PilotError::Disconnected(_) => ClientCode::Disconnected,
            PilotError::InjectionConflict(_) => ClientCode::Internal,
            PilotError::DirectExecution => ClientCode::InvalidRequest,
            PilotError::UnsupportedModule(_) => ClientCode::InvalidRequest,
            PilotError::Internal(_) => ClientCode::Internal,
        }
    }

    /// Convert into the `{code, message}` pair carried by an `ERROR` message.
    pub fn to_rpc_error(&self) -> RpcError {
        match self {
            PilotError::Rpc(e) => e.clone(),
            other => RpcError::new(other.client_code().as_i64(), other.to_string()),
        }
    }
}

impl From<RpcError> for PilotError {
    fn from(e: RpcError) -> Self {
        PilotError::Rpc(e)
    }
}
