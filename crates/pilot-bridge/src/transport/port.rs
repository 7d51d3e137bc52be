//! In-process port: two bounded mpsc queues cross-wired.
//!
//! Dropping every sender of one direction closes the pipe for the peer, which
//! observes `recv() == None`. That is the disconnect notification.

use std::fmt;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use pilot_core::protocol::WireMessage;
use pilot_core::{PilotError, Result};

use crate::transport::codec;

/// Per-manager connection attempt id. Never reused within one manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortId(pub u64);

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "port#{}", self.0)
    }
}

/// Sending half of one port end.
#[derive(Clone)]
pub struct PortSender {
    id: PortId,
    tx: mpsc::Sender<Bytes>,
}

impl PortSender {
    pub fn id(&self) -> PortId {
        self.id
    }

    /// Non-blocking send that never loses a frame to a full queue: the frame
    /// is handed to a task that waits for capacity. Only a closed port fails.
    /// An overflowing frame can be overtaken by later frames; use `send` where
    /// order matters.
    pub fn forward(&self, msg: &WireMessage) -> Result<()> {
        let frame = codec::encode(msg)?;
        match self.tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(frame)) => {
                let handle = tokio::runtime::Handle::try_current().map_err(|_| {
                    PilotError::Disconnected(format!("{} full outside a runtime", self.id))
                })?;
                let tx = self.tx.clone();
                let id = self.id;
                handle.spawn(async move {
                    if tx.send(frame).await.is_err() {
                        tracing::debug!(port = %id, "port closed before overflow frame was queued");
                    }
                });
                Ok(())
            }
            Err(TrySendError::Closed(_)) => {
                Err(PilotError::Disconnected(format!("{} closed", self.id)))
            }
        }
    }

    /// Wait for queue capacity, then send.
    pub async fn send(&self, msg: &WireMessage) -> Result<()> {
        let frame = codec::encode(msg)?;
        self.tx
            .send(frame)
            .await
            .map_err(|_| PilotError::Disconnected(format!("{} closed", self.id)))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl fmt::Debug for PortSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortSender").field("id", &self.id).finish()
    }
}

/// One side of a port.
pub struct PortEnd {
    sender: PortSender,
    rx: mpsc::Receiver<Bytes>,
}

impl PortEnd {
    pub fn id(&self) -> PortId {
        self.sender.id
    }

    pub fn sender(&self) -> PortSender {
        self.sender.clone()
    }

    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Next queued frame, without waiting.
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.rx.try_recv().ok()
    }

    pub fn split(self) -> (PortSender, mpsc::Receiver<Bytes>) {
        (self.sender, self.rx)
    }
}

impl fmt::Debug for PortEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortEnd").field("id", &self.sender.id).finish()
    }
}

/// Create both ends of a port. `capacity` bounds each direction.
pub fn channel(id: PortId, capacity: usize) -> (PortEnd, PortEnd) {
    let (a_tx, a_rx) = mpsc::channel(capacity.max(1));
    let (b_tx, b_rx) = mpsc::channel(capacity.max(1));
    (
        PortEnd {
            sender: PortSender { id, tx: a_tx },
            rx: b_rx,
        },
        PortEnd {
            sender: PortSender { id, tx: b_tx },
            rx: a_rx,
        },
    )
}
