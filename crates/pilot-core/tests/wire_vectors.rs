//! Wire message vector tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use pilot_core::protocol::{RequestId, WireMessage};

use vector_loader::{load, WireVector};

#[test]
fn wire_vectors() {
    let files = [
        "request_full.json",
        "request_no_params.json",
        "response.json",
        "error_user_rejected.json",
        "event_accounts_changed.json",
        "connected_hex.json",
        "unknown_type.json",
        "malformed.json",
    ];

    for f in files {
        let v: WireVector = load(f);
        let res = WireMessage::decode(&v.frame.decode());

        if let Some(err) = v.expect_error {
            let e = res.expect_err("expected error");
            assert_eq!(e.client_code().as_str(), err.code, "vector={}", v.description);
            continue;
        }

        let msg = res.expect("expected ok message");
        let ex = v.expect.expect("missing expect block");
        assert_eq!(msg.kind(), ex["type"].as_str().unwrap(), "vector={}", v.description);

        if let Some(id) = ex.get("requestId").and_then(|x| x.as_u64()) {
            assert_eq!(msg.request_id(), Some(RequestId(id)), "vector={}", v.description);
        }

        match &msg {
            WireMessage::Request { request, .. } => {
                assert_eq!(request.method, ex["method"].as_str().unwrap(), "vector={}", v.description);
                match ex["params_len"].as_u64() {
                    Some(n) => assert_eq!(request.params.as_array().unwrap().len() as u64, n),
                    None => assert!(request.params.is_null(), "vector={}", v.description),
                }
            }
            WireMessage::Response { response, .. } => {
                assert_eq!(response, &ex["response"], "vector={}", v.description);
            }
            WireMessage::Error { error, .. } => {
                assert_eq!(error.code, ex["code"].as_i64().unwrap(), "vector={}", v.description);
                assert_eq!(error.message, ex["message"].as_str().unwrap(), "vector={}", v.description);
            }
            WireMessage::Event { event_name, .. } => {
                assert_eq!(event_name, ex["eventName"].as_str().unwrap(), "vector={}", v.description);
            }
            _ => {}
        }
    }
}

#[test]
fn known_messages_reencode_to_the_same_json() {
    for f in ["request_full.json", "response.json", "error_user_rejected.json", "event_accounts_changed.json"] {
        let v: WireVector = load(f);
        let raw = v.frame.decode();
        let msg = WireMessage::decode(&raw).unwrap();

        let original: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        let reencoded: serde_json::Value = serde_json::from_slice(&msg.encode().unwrap()).unwrap();
        assert_eq!(original, reencoded, "vector={}", v.description);
    }
}
