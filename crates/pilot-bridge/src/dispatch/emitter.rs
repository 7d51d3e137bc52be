//! EIP-1193 events for the tab holding the Ready port.

use serde_json::{json, Value};

use pilot_core::protocol::WireMessage;
use pilot_core::tx::Connection;
use pilot_core::ClientCode;

use crate::dispatch::active::ActivePort;

#[derive(Clone)]
pub struct EventEmitter {
    active: ActivePort,
}

impl EventEmitter {
    pub fn new(active: ActivePort) -> Self {
        Self { active }
    }

    /// Returns false when no port is Ready or its peer is gone (the event is
    /// dropped). Waits while the port queue is full.
    pub async fn emit(&self, name: &str, data: Value) -> bool {
        match self.active.send(&WireMessage::event(name, data)).await {
            Some(port) => {
                tracing::debug!(%port, event = name, "event emitted");
                true
            }
            None => {
                tracing::trace!(event = name, "event dropped");
                false
            }
        }
    }

    /// A port just became Ready: tell the dApp where it is connected.
    pub async fn announce(&self, route: Option<&Connection>) {
        if let Some(conn) = route {
            self.emit("connect", json!({ "chainId": conn.chain_id_hex() })).await;
            self.emit("accountsChanged", accounts(conn)).await;
        }
    }

    /// The panel switched routes.
    pub async fn route_changed(&self, prev: Option<&Connection>, next: Option<&Connection>) {
        match (prev, next) {
            (None, None) => {}
            (Some(_), None) => {
                self.emit(
                    "disconnect",
                    json!({
                        "code": ClientCode::Disconnected.as_i64(),
                        "message": "Pilot route disconnected",
                    }),
                )
                .await;
            }
            (None, Some(next)) => {
                self.emit("connect", json!({ "chainId": next.chain_id_hex() })).await;
                self.emit("accountsChanged", accounts(next)).await;
            }
            (Some(prev), Some(next)) => {
                if prev.chain_id != next.chain_id {
                    self.emit("chainChanged", json!(next.chain_id_hex())).await;
                }
                if prev.avatar_address != next.avatar_address {
                    self.emit("accountsChanged", accounts(next)).await;
                }
            }
        }
    }
}

fn accounts(conn: &Connection) -> Value {
    json!([conn.avatar_address.to_string()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{self, codec, codec::Inbound, PortEnd, PortId};

    fn conn(avatar: &str, chain_id: u64) -> Connection {
        serde_json::from_value(json!({
            "avatarAddress": avatar,
            "pilotAddress": "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "chainId": chain_id
        }))
        .unwrap()
    }

    const A: &str = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed";
    const B: &str = "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359";

    fn events(content: &mut PortEnd) -> Vec<(String, Value)> {
        let mut out = Vec::new();
        while let Some(frame) = content.try_recv() {
            if let Inbound::Message { msg: WireMessage::Event { event_name, event_data }, .. } =
                codec::decode(&frame).unwrap()
            {
                out.push((event_name, event_data));
            }
        }
        out
    }

    async fn ready() -> (EventEmitter, PortEnd, PortEnd) {
        let active = ActivePort::new();
        let (panel, content) = transport::channel(PortId(1), 16);
        active.set(3, panel.sender()).await;
        (EventEmitter::new(active), panel, content)
    }

    #[tokio::test]
    async fn announce_sends_connect_then_accounts() {
        let (emitter, _panel, mut content) = ready().await;
        emitter.announce(Some(&conn(A, 100))).await;
        assert_eq!(
            events(&mut content),
            vec![
                ("connect".to_string(), json!({ "chainId": "0x64" })),
                (
                    "accountsChanged".to_string(),
                    json!(["0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"])
                ),
            ]
        );
    }

    #[tokio::test]
    async fn route_switch_emits_only_what_changed() {
        let (emitter, _panel, mut content) = ready().await;
        emitter.route_changed(Some(&conn(A, 1)), Some(&conn(A, 100))).await;
        assert_eq!(events(&mut content), vec![("chainChanged".to_string(), json!("0x64"))]);

        emitter.route_changed(Some(&conn(A, 1)), Some(&conn(B, 1))).await;
        let ev = events(&mut content);
        assert_eq!(ev.len(), 1);
        assert_eq!(ev[0].0, "accountsChanged");
    }

    #[tokio::test]
    async fn clearing_the_route_disconnects() {
        let (emitter, _panel, mut content) = ready().await;
        emitter.route_changed(Some(&conn(A, 1)), None).await;
        let ev = events(&mut content);
        assert_eq!(ev[0].0, "disconnect");
        assert_eq!(ev[0].1["code"], 4900);
    }

    #[tokio::test]
    async fn nothing_is_sent_without_a_ready_port() {
        let emitter = EventEmitter::new(ActivePort::new());
        assert!(!emitter.emit("chainChanged", json!("0x1")).await);
    }
}
