//! The window's single Ready port.
//!
//! Written only by the port manager; read by dispatch tasks and the emitter.
//! Sends hold the read lock until the frame is queued, so once `clear_if`
//! returns nothing more can reach the superseded port.

use std::sync::Arc;

use tokio::sync::{watch, RwLock};

use pilot_core::protocol::WireMessage;

use crate::substrate::TabId;
use crate::transport::{PortId, PortSender};

struct ReadyPort {
    tab: TabId,
    sender: PortSender,
}

/// What became of a message addressed to a specific port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// Another port (or none) is Ready now.
    Superseded,
    /// The port is current but its peer is gone.
    Failed,
}

#[derive(Clone)]
pub struct ActivePort {
    slot: Arc<RwLock<Option<ReadyPort>>>,
    current: Arc<watch::Sender<Option<(PortId, TabId)>>>,
}

impl Default for ActivePort {
    fn default() -> Self {
        Self {
            slot: Arc::default(),
            current: Arc::new(watch::channel(None).0),
        }
    }
}

impl ActivePort {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn set(&self, tab: TabId, sender: PortSender) {
        let mut slot = self.slot.write().await;
        self.current.send_replace(Some((sender.id(), tab)));
        *slot = Some(ReadyPort { tab, sender });
    }

    /// Clear the slot if it still holds `port`.
    pub(crate) async fn clear_if(&self, port: PortId) -> bool {
        let mut slot = self.slot.write().await;
        if slot.as_ref().is_some_and(|r| r.sender.id() == port) {
            *slot = None;
            self.current.send_replace(None);
            true
        } else {
            false
        }
    }

    /// `(port, tab)` of the Ready port, if any.
    pub fn current(&self) -> Option<(PortId, TabId)> {
        *self.current.borrow()
    }

    /// Send to the Ready port only if it is still `port`. Waits for queue
    /// capacity rather than dropping the message.
    pub async fn send_if_current(&self, port: PortId, msg: &WireMessage) -> Delivery {
        let slot = self.slot.read().await;
        match slot.as_ref() {
            Some(r) if r.sender.id() == port => {
                if Self::deliver(r, msg).await {
                    Delivery::Sent
                } else {
                    Delivery::Failed
                }
            }
            _ => Delivery::Superseded,
        }
    }

    /// Send to whichever port is Ready. Returns the port used.
    pub async fn send(&self, msg: &WireMessage) -> Option<PortId> {
        let slot = self.slot.read().await;
        let r = slot.as_ref()?;
        Self::deliver(r, msg).await.then(|| r.sender.id())
    }

    async fn deliver(r: &ReadyPort, msg: &WireMessage) -> bool {
        match r.sender.send(msg).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(port = %r.sender.id(), tab_id = r.tab, kind = msg.kind(), error = %e, "port send failed");
                false
            }
        }
    }
}
