//! Content-script relay (per-tab isolated context).
//!
//! Forwards page `REQUEST`s onto the tab's port and port traffic back onto the
//! page bus, unchanged. It never interprets requests.
//!
//! Duplicate instances are possible after repeated injection into the same
//! document: `install` refuses when the document marker is already set, and a
//! forwarding instance stops immediate propagation so any other instance that
//! slipped through does not forward the same request twice.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use dashmap::DashMap;

use pilot_core::protocol::{RequestId, RpcError, WireMessage};
use pilot_core::ClientCode;

use crate::page::{PageContext, PageEvent, PageListener};
use crate::transport::codec::{self, Inbound};
use crate::transport::{PortEnd, PortId, PortSender};

/// Document dataset key marking an installed relay.
pub const RELAY_MARKER: &str = "pilotRelay";

pub struct ContentScriptRelay {
    page: Weak<PageContext>,
    port: Mutex<Option<PortSender>>,
    provider_ready: AtomicBool,
    /// Forwarded requests still waiting for a terminal message, by carrying port.
    in_flight: DashMap<RequestId, PortId>,
}

impl ContentScriptRelay {
    /// Register on the page bus unless a relay already marked the document.
    pub fn install(page: &Arc<PageContext>) -> Option<Arc<Self>> {
        if page.dataset(RELAY_MARKER).is_some() {
            tracing::debug!(origin = page.origin(), "relay already installed, skipping");
            return None;
        }

        let relay = Arc::new(Self {
            page: Arc::downgrade(page),
            port: Mutex::new(None),
            provider_ready: AtomicBool::new(false),
            in_flight: DashMap::new(),
        });
        page.bus().add_listener(Arc::clone(&relay) as Arc<dyn PageListener>);
        page.set_dataset(RELAY_MARKER, "true");
        Some(relay)
    }

    /// Accept a port opened by the panel. Supersedes any previous one.
    ///
    /// Must be called inside a tokio runtime; the port reader runs as a task.
    pub fn attach_port(self: &Arc<Self>, port: PortEnd) {
        let (tx, mut rx) = port.split();
        let id = tx.id();

        *self.port.lock().unwrap_or_else(|e| e.into_inner()) = Some(tx.clone());
        tracing::debug!(port = %id, "relay attached");

        if let Err(e) = tx.forward(&WireMessage::Connected) {
            tracing::warn!(port = %id, error = %e, "CONNECTED ack failed");
        }
        if self.provider_ready.load(Ordering::Acquire) {
            if let Err(e) = tx.forward(&WireMessage::Initialized) {
                tracing::warn!(port = %id, error = %e, "INITIALIZED replay failed");
            }
        }
        drop(tx);

        let relay = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                match codec::decode(&frame) {
                    Ok(Inbound::Message { msg, .. }) => relay.deliver(msg),
                    Ok(Inbound::Ignored { bytes_len }) => {
                        tracing::debug!(port = %id, bytes_len, "ignoring unknown frame")
                    }
                    Err(e) => tracing::warn!(port = %id, error = %e, "dropping malformed frame"),
                }
            }
            relay.detach(id);
        });
    }

    pub fn is_connected(&self) -> bool {
        self.current_port().is_some_and(|p| !p.is_closed())
    }

    fn current_port(&self) -> Option<PortSender> {
        self.port.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn deliver(&self, msg: WireMessage) {
        let Some(page) = self.page.upgrade() else {
            return;
        };
        match msg {
            WireMessage::Response { request_id, .. } | WireMessage::Error { request_id, .. } => {
                self.in_flight.remove(&request_id);
                page.post_message(msg);
            }
            WireMessage::Event { .. } => {
                page.post_message(msg);
            }
            other => tracing::trace!(kind = other.kind(), "not relayed to page"),
        }
    }

    /// Port `id` closed: fail what it carried, and tell the page if it was current.
    fn detach(&self, id: PortId) {
        let Some(page) = self.page.upgrade() else {
            return;
        };

        let orphaned: Vec<RequestId> = self
            .in_flight
            .iter()
            .filter(|e| *e.value() == id)
            .map(|e| *e.key())
            .collect();
        for request_id in orphaned {
            self.in_flight.remove(&request_id);
            page.post_message(WireMessage::Error {
                request_id,
                error: RpcError::new(ClientCode::Disconnected.as_i64(), "Pilot panel disconnected"),
            });
        }

        let was_current = {
            let mut slot = self.port.lock().unwrap_or_else(|e| e.into_inner());
            if slot.as_ref().is_some_and(|p| p.id() == id) {
                *slot = None;
                true
            } else {
                false
            }
        };
        if was_current {
            tracing::debug!(port = %id, "relay port disconnected");
            page.post_message(WireMessage::Disconnected);
        }
    }
}

impl PageListener for ContentScriptRelay {
    fn on_message(&self, event: &PageEvent) {
        match event.data() {
            WireMessage::Request { request_id, .. } => {
                let Some(port) = self.current_port() else {
                    return;
                };
                self.in_flight.insert(*request_id, port.id());
                match port.forward(event.data()) {
                    Ok(()) => event.stop_immediate_propagation(),
                    Err(e) => {
                        self.in_flight.remove(request_id);
                        tracing::warn!(%request_id, error = %e, "request not forwarded");
                    }
                }
            }
            WireMessage::Initialized => {
                self.provider_ready.store(true, Ordering::Release);
                if let Some(port) = self.current_port() {
                    if let Err(e) = port.forward(&WireMessage::Initialized) {
                        tracing::debug!(port = %port.id(), error = %e, "INITIALIZED not forwarded");
                    }
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use bytes::Bytes;
    use serde_json::{json, Value};

    use pilot_core::protocol::JsonRpcRequest;

    use crate::transport::{self, PortEnd};

    /// Records what reaches the page after the relay.
    #[derive(Default)]
    struct PageLog {
        seen: Mutex<Vec<WireMessage>>,
    }

    impl PageListener for PageLog {
        fn on_message(&self, event: &PageEvent) {
            self.seen.lock().unwrap().push(event.data().clone());
        }
    }

    fn decode(frame: Bytes) -> WireMessage {
        match codec::decode(&frame).unwrap() {
            Inbound::Message { msg, .. } => msg,
            Inbound::Ignored { .. } => panic!("unexpected unknown frame"),
        }
    }

    fn request(id: u64) -> WireMessage {
        WireMessage::Request {
            request_id: RequestId(id),
            request: JsonRpcRequest::new("eth_chainId", Value::Null),
        }
    }

    fn attach(relay: &Arc<ContentScriptRelay>, id: u64) -> PortEnd {
        attach_with(relay, id, 16)
    }

    fn attach_with(relay: &Arc<ContentScriptRelay>, id: u64, capacity: usize) -> PortEnd {
        let (panel, content) = transport::channel(PortId(id), capacity);
        relay.attach_port(content);
        panel
    }

    #[test]
    fn second_install_is_refused() {
        let page = PageContext::new("https://app.uniswap.org");
        assert!(ContentScriptRelay::install(&page).is_some());
        assert!(ContentScriptRelay::install(&page).is_none());
    }

    #[tokio::test]
    async fn attach_acknowledges_and_replays_provider_readiness() {
        let page = PageContext::new("https://app.uniswap.org");
        let relay = ContentScriptRelay::install(&page).unwrap();
        page.post_message(WireMessage::Initialized);

        let mut panel = attach(&relay, 1);
        assert_eq!(decode(panel.recv().await.unwrap()), WireMessage::Connected);
        assert_eq!(decode(panel.recv().await.unwrap()), WireMessage::Initialized);
        assert!(relay.is_connected());
    }

    #[tokio::test]
    async fn duplicate_relays_forward_each_request_once() {
        let page = PageContext::new("https://app.uniswap.org");
        let first = ContentScriptRelay::install(&page).unwrap();
        page.remove_dataset(RELAY_MARKER);
        let second = ContentScriptRelay::install(&page).unwrap();

        let mut a = attach(&first, 1);
        let mut b = attach(&second, 2);
        a.recv().await.unwrap();
        b.recv().await.unwrap();

        assert!(page.post_message(request(1)));
        assert_eq!(decode(a.recv().await.unwrap()), request(1));
        assert!(b.try_recv().is_none());
    }

    #[tokio::test]
    async fn request_burst_beyond_port_capacity_is_forwarded_whole() {
        let page = PageContext::new("https://app.uniswap.org");
        let relay = ContentScriptRelay::install(&page).unwrap();
        let log = Arc::new(PageLog::default());
        page.bus().add_listener(log.clone());

        let mut panel = attach_with(&relay, 1, 2);
        assert_eq!(decode(panel.recv().await.unwrap()), WireMessage::Connected);

        for id in 0..10 {
            assert!(page.post_message(request(id)), "request {id} not handled");
        }
        let mut ids = Vec::new();
        for _ in 0..10 {
            match decode(panel.recv().await.unwrap()) {
                WireMessage::Request { request_id, .. } => ids.push(request_id.0),
                other => panic!("unexpected {other:?}"),
            }
        }
        ids.sort_unstable();
        assert_eq!(ids, (0..10).collect::<Vec<_>>());

        // nothing was failed back to the page
        let seen = log.seen.lock().unwrap().clone();
        assert!(seen.iter().all(|m| matches!(m, WireMessage::Request { .. })));
    }

    #[test]
    fn requests_without_a_port_are_left_unhandled() {
        let page = PageContext::new("https://app.uniswap.org");
        let _relay = ContentScriptRelay::install(&page).unwrap();
        assert!(!page.post_message(request(1)));
    }

    #[tokio::test]
    async fn port_traffic_reaches_the_page_and_closure_fails_in_flight() {
        let page = PageContext::new("https://app.uniswap.org");
        let relay = ContentScriptRelay::install(&page).unwrap();
        let log = Arc::new(PageLog::default());
        page.bus().add_listener(log.clone());

        let mut panel = attach(&relay, 1);
        panel.recv().await.unwrap();

        assert!(page.post_message(request(1)));
        assert!(page.post_message(request(2)));
        panel.recv().await.unwrap();
        panel.recv().await.unwrap();

        let tx = panel.sender();
        tx.send(&WireMessage::Response { request_id: RequestId(1), response: json!("0x1") })
            .await
            .unwrap();
        tx.send(&WireMessage::event("chainChanged", json!("0x1"))).await.unwrap();
        tx.send(&WireMessage::Connected).await.unwrap();
        drop(tx);
        drop(panel);

        while relay.is_connected() {
            tokio::task::yield_now().await;
        }
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }

        let seen = log.seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                WireMessage::Response { request_id: RequestId(1), response: json!("0x1") },
                WireMessage::event("chainChanged", json!("0x1")),
                WireMessage::Error {
                    request_id: RequestId(2),
                    error: RpcError::new(4900, "Pilot panel disconnected"),
                },
                WireMessage::Disconnected,
            ]
        );
    }
}
