//! Async driver for `PortLifecycle`.
//!
//! One task per panel window. It owns the window's port, its retry timer, and
//! the only write access to `ActivePort`.

use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Sleep;

use pilot_core::protocol::{RpcError, WireMessage};
use pilot_core::tx::Connection;
use pilot_core::ClientCode;

use crate::dispatch::{
    ActivePort, ActiveRoute, Delivery, DispatchContext, Dispatcher, EventEmitter, PanelNotice,
};
use crate::lifecycle::machine::{Effect, PortLifecycle, PortState, Trigger};
use crate::obs::BridgeMetrics;
use crate::substrate::{TabEvent, TabHost, WindowId};
use crate::transport::codec::{self, Inbound};
use crate::transport::{PortId, PortSender};

struct OpenPort {
    sender: PortSender,
    rx: mpsc::Receiver<Bytes>,
}

pub struct PortManager<H: TabHost> {
    window_id: WindowId,
    window_label: String,
    host: Arc<H>,
    machine: PortLifecycle,
    active: ActivePort,
    emitter: EventEmitter,
    dispatcher: Arc<Dispatcher>,
    metrics: Arc<BridgeMetrics>,
    routes: watch::Receiver<Option<ActiveRoute>>,
    port: Option<OpenPort>,
    retry: Option<(PortId, Pin<Box<Sleep>>)>,
}

impl<H: TabHost> PortManager<H> {
    pub fn new(
        machine: PortLifecycle,
        host: Arc<H>,
        active: ActivePort,
        dispatcher: Arc<Dispatcher>,
        routes: watch::Receiver<Option<ActiveRoute>>,
        metrics: Arc<BridgeMetrics>,
    ) -> Self {
        Self {
            window_id: machine.window_id(),
            window_label: machine.window_id().to_string(),
            host,
            machine,
            emitter: EventEmitter::new(active.clone()),
            active,
            dispatcher,
            metrics,
            routes,
            port: None,
            retry: None,
        }
    }

    /// Run until `shutdown` fires or the tab event stream ends.
    pub async fn run(
        mut self,
        mut tabs: mpsc::Receiver<TabEvent>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        let mut route = self.current_route();
        let mut routes_open = true;
        tracing::info!(window_id = self.window_id, "port manager started");

        loop {
            tokio::select! {
                _ = &mut shutdown => break,

                event = tabs.recv() => match event {
                    Some(event) => self.on_tab_event(event).await,
                    None => break,
                },

                (id, frame) = next_frame(&mut self.port) => self.on_frame(id, frame).await,

                id = retry_elapsed(&mut self.retry) => {
                    self.retry = None;
                    if matches!(self.machine.state(), PortState::Connecting { port, .. } if port == id) {
                        self.metrics.port_retries.inc(&[("window", self.window_label.as_str())]);
                        tracing::debug!(window_id = self.window_id, port = %id, "no handshake yet, retrying");
                    }
                    self.step(Trigger::RetryElapsed(id)).await;
                }

                changed = self.routes.changed(), if routes_open => match changed {
                    Ok(()) => {
                        let next = self.current_route();
                        self.emitter.route_changed(route.as_ref(), next.as_ref()).await;
                        route = next;
                    }
                    Err(_) => routes_open = false,
                },
            }
        }

        self.step(Trigger::PanelClosed).await;
        tracing::info!(window_id = self.window_id, "port manager stopped");
    }

    fn current_route(&self) -> Option<Connection> {
        self.routes.borrow().as_ref().map(|r| r.connection.clone())
    }

    async fn on_tab_event(&mut self, event: TabEvent) {
        let trigger = match event {
            TabEvent::Activated { window_id, tab_id } => {
                if window_id != self.window_id {
                    return;
                }
                match self.host.tab(tab_id).await {
                    Some(info) => Trigger::TabActivated(info),
                    None => {
                        tracing::debug!(window_id, tab_id, "activated tab vanished");
                        return;
                    }
                }
            }
            TabEvent::Updated(info) => Trigger::TabUpdated(info),
            TabEvent::Removed { tab_id } => Trigger::TabRemoved(tab_id),
        };
        self.step(trigger).await;
    }

    async fn on_frame(&mut self, id: PortId, frame: Option<Bytes>) {
        let Some(frame) = frame else {
            tracing::debug!(window_id = self.window_id, port = %id, "port disconnected");
            self.port = None;
            self.step(Trigger::Disconnected(id)).await;
            return;
        };

        let msg = match codec::decode(&frame) {
            Ok(Inbound::Message { msg, .. }) => msg,
            Ok(Inbound::Ignored { bytes_len }) => {
                tracing::debug!(port = %id, bytes_len, "ignoring unknown frame");
                return;
            }
            Err(e) => {
                tracing::warn!(port = %id, error = %e, "dropping malformed frame");
                return;
            }
        };

        match msg {
            WireMessage::Connected => self.step(Trigger::Connected(id)).await,
            WireMessage::Initialized => self.step(Trigger::Initialized(id)).await,
            WireMessage::Request {
                request_id,
                request,
            } => match self.machine.state() {
                PortState::Ready { tab, port } if port == id => {
                    let ctx = DispatchContext {
                        window_id: self.window_id,
                        tab_id: tab,
                        port,
                    };
                    let dispatcher = Arc::clone(&self.dispatcher);
                    let active = self.active.clone();
                    let metrics = Arc::clone(&self.metrics);
                    tokio::spawn(async move {
                        let reply = dispatcher.dispatch(&ctx, request_id, request).await;
                        match active.send_if_current(ctx.port, &reply).await {
                            Delivery::Sent => {}
                            Delivery::Superseded => {
                                metrics.stale_responses.inc(&[]);
                                tracing::debug!(port = %ctx.port, %request_id, "port superseded, response dropped");
                            }
                            Delivery::Failed => metrics.send_failures.inc(&[]),
                        }
                    });
                }
                _ => {
                    tracing::debug!(port = %id, %request_id, "request before handshake completed");
                    if let Some(open) = &self.port {
                        let refusal = WireMessage::Error {
                            request_id,
                            error: RpcError::new(
                                ClientCode::Disconnected.as_i64(),
                                "Pilot panel is not ready",
                            ),
                        };
                        if let Err(e) = open.sender.forward(&refusal) {
                            self.metrics.send_failures.inc(&[]);
                            tracing::warn!(port = %id, %request_id, error = %e, "not-ready error not delivered");
                        }
                    }
                }
            },
            other => tracing::trace!(port = %id, kind = other.kind(), "ignored on panel side"),
        }
    }

    async fn step(&mut self, trigger: Trigger) {
        for effect in self.machine.handle(trigger) {
            self.apply(effect).await;
        }
    }

    async fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::OpenPort { tab, port } => {
                self.metrics
                    .port_attempts
                    .inc(&[("window", self.window_label.as_str())]);
                match self.host.connect(tab, port).await {
                    Ok(end) => {
                        let (sender, rx) = end.split();
                        tracing::debug!(window_id = self.window_id, tab_id = tab, %port, "port opened");
                        self.port = Some(OpenPort { sender, rx });
                    }
                    Err(e) => {
                        tracing::warn!(window_id = self.window_id, tab_id = tab, %port, error = %e, "connect failed");
                    }
                }
            }
            Effect::ClosePort { port } => {
                self.active.clear_if(port).await;
                if self.port.as_ref().is_some_and(|p| p.sender.id() == port) {
                    self.port = None;
                }
                if self.retry.as_ref().is_some_and(|(p, _)| *p == port) {
                    self.retry = None;
                }
            }
            Effect::ArmRetry { port, after } => {
                self.retry = Some((port, Box::pin(tokio::time::sleep(after))));
            }
            Effect::PortReady { tab, port } => {
                let Some(open) = self.port.as_ref().filter(|p| p.sender.id() == port) else {
                    return;
                };
                self.active.set(tab, open.sender.clone()).await;
                self.metrics
                    .ports_ready
                    .inc(&[("window", self.window_label.as_str())]);
                tracing::info!(window_id = self.window_id, tab_id = tab, %port, "port ready");
                self.dispatcher.notify(PanelNotice::Connected {
                    window_id: self.window_id,
                    tab_id: tab,
                });
                let route = self.current_route();
                self.emitter.announce(route.as_ref()).await;
            }
            Effect::PortLost { tab, port } => {
                self.active.clear_if(port).await;
                tracing::info!(window_id = self.window_id, tab_id = tab, %port, "port lost");
                self.dispatcher.notify(PanelNotice::Disconnected {
                    window_id: self.window_id,
                    tab_id: tab,
                });
            }
        }
    }
}

async fn next_frame(port: &mut Option<OpenPort>) -> (PortId, Option<Bytes>) {
    match port {
        Some(p) => (p.sender.id(), p.rx.recv().await),
        None => pending().await,
    }
}

async fn retry_elapsed(retry: &mut Option<(PortId, Pin<Box<Sleep>>)>) -> PortId {
    match retry {
        Some((port, sleep)) => {
            sleep.as_mut().await;
            *port
        }
        None => pending().await,
    }
}
