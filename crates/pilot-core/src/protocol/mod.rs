//! Protocol modules.
//!
//! The bridge speaks a single JSON vocabulary (`wire::WireMessage`) across the
//! page, content script, and panel. Decoding is tolerant by contract: message
//! types this build does not know decode to `WireMessage::Unknown` and are
//! ignored by every consumer, so a page running an older provider can talk to
//! a newer panel and vice versa.

pub mod wire;

pub use wire::{JsonRpcRequest, RequestId, RpcError, WireMessage};
