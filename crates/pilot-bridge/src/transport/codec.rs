//! Decode-once codec for port frames.
//!
//! - Frames are JSON-encoded `WireMessage`s
//! - Unknown message types surface as `Inbound::Ignored` so callers can skip them
//! - Malformed frames are errors; callers log and drop them

use bytes::Bytes;
use pilot_core::{protocol::WireMessage, Result};

#[derive(Debug)]
pub enum Inbound {
    Message { msg: WireMessage, bytes_len: usize },
    Ignored { bytes_len: usize },
}

pub fn decode(frame: &Bytes) -> Result<Inbound> {
    let bytes_len = frame.len();
    match WireMessage::decode(frame)? {
        WireMessage::Unknown => Ok(Inbound::Ignored { bytes_len }),
        msg => Ok(Inbound::Message { msg, bytes_len }),
    }
}

pub fn encode(msg: &WireMessage) -> Result<Bytes> {
    msg.encode().map(Bytes::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_frames_are_ignored() {
        let frame = Bytes::from_static(br#"{"type":"PING_V9"}"#);
        assert!(matches!(decode(&frame).unwrap(), Inbound::Ignored { bytes_len: 18 }));
    }

    #[test]
    fn known_frames_decode() {
        let frame = encode(&WireMessage::Initialized).unwrap();
        match decode(&frame).unwrap() {
            Inbound::Message { msg, .. } => assert_eq!(msg, WireMessage::Initialized),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(decode(&Bytes::from_static(b"\x00\x01")).is_err());
    }
}
