//! Transport layer (ports).
//!
//! A port is an ordered, bidirectional pipe of JSON frames between the panel
//! and one tab's content script. The codec decodes each frame once before it
//! reaches the lifecycle manager, relay, or dispatcher.

pub mod codec;
pub mod port;

pub use port::{channel, PortEnd, PortId, PortSender};
