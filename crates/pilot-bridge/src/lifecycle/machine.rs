//! Per-window port lifecycle, as a pure state machine.
//!
//! ```text
//! Idle ──activate──▶ AwaitingTabReady ──loaded+eligible──▶ Connecting
//!                           ▲                                  │ CONNECTED
//!                           │ loading                          ▼
//!                         Ready ◀────────INITIALIZED──── Handshaking
//! ```
//!
//! At most one port exists per window at any time. Every new attempt gets a
//! fresh `PortId`, and triggers carrying a stale id are ignored, so a late
//! retry timer or a disconnect from a superseded port cannot disturb the
//! current one.

use std::time::Duration;

use crate::config::BridgeSection;
use crate::lifecycle::eligibility::is_eligible;
use crate::substrate::{TabId, TabInfo, TabStatus, WindowId};
use crate::transport::PortId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortState {
    Idle,
    AwaitingTabReady { tab: TabId },
    Connecting { tab: TabId, port: PortId },
    Handshaking { tab: TabId, port: PortId },
    Ready { tab: TabId, port: PortId },
}

impl PortState {
    pub fn port(&self) -> Option<PortId> {
        match *self {
            PortState::Connecting { port, .. }
            | PortState::Handshaking { port, .. }
            | PortState::Ready { port, .. } => Some(port),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, PortState::Ready { .. })
    }
}

#[derive(Debug, Clone)]
pub enum Trigger {
    TabActivated(TabInfo),
    TabUpdated(TabInfo),
    TabRemoved(TabId),
    /// `CONNECTED` arrived on `port`.
    Connected(PortId),
    /// `INITIALIZED` arrived on `port`.
    Initialized(PortId),
    Disconnected(PortId),
    RetryElapsed(PortId),
    PanelClosed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    OpenPort { tab: TabId, port: PortId },
    ClosePort { port: PortId },
    ArmRetry { port: PortId, after: Duration },
    PortReady { tab: TabId, port: PortId },
    PortLost { tab: TabId, port: PortId },
}

pub struct PortLifecycle {
    window_id: WindowId,
    connect_origin: String,
    retry_after: Duration,
    active_tab: Option<TabId>,
    state: PortState,
    next_port: u64,
}

impl PortLifecycle {
    pub fn new(window_id: WindowId, cfg: &BridgeSection) -> Self {
        Self {
            window_id,
            connect_origin: cfg.connect_origin.clone(),
            retry_after: cfg.retry_interval(),
            active_tab: None,
            state: PortState::Idle,
            next_port: 1,
        }
    }

    pub fn window_id(&self) -> WindowId {
        self.window_id
    }

    pub fn state(&self) -> PortState {
        self.state
    }

    pub fn active_tab(&self) -> Option<TabId> {
        self.active_tab
    }

    pub fn handle(&mut self, trigger: Trigger) -> Vec<Effect> {
        let mut fx = Vec::new();
        match trigger {
            Trigger::TabActivated(info) => {
                if info.window_id != self.window_id {
                    return fx;
                }
                if self.active_tab == Some(info.id) && self.state != PortState::Idle {
                    return fx;
                }
                self.teardown(&mut fx);
                self.active_tab = Some(info.id);
                self.evaluate(&info, &mut fx);
            }

            Trigger::TabUpdated(info) => {
                if self.active_tab != Some(info.id) {
                    return fx;
                }
                match info.status {
                    TabStatus::Loading => {
                        self.teardown(&mut fx);
                        self.state = PortState::AwaitingTabReady { tab: info.id };
                    }
                    TabStatus::Complete if !is_eligible(&info.url, &self.connect_origin) => {
                        self.teardown(&mut fx);
                        self.state = PortState::AwaitingTabReady { tab: info.id };
                    }
                    TabStatus::Complete => {
                        if matches!(self.state, PortState::Idle | PortState::AwaitingTabReady { .. }) {
                            self.open(info.id, &mut fx);
                        }
                    }
                }
            }

            Trigger::TabRemoved(tab) => {
                if self.active_tab == Some(tab) {
                    self.teardown(&mut fx);
                    self.active_tab = None;
                }
            }

            Trigger::Connected(port) => {
                if let PortState::Connecting { tab, port: p } = self.state {
                    if p == port {
                        self.state = PortState::Handshaking { tab, port };
                    }
                }
            }

            Trigger::Initialized(port) => {
                if let PortState::Handshaking { tab, port: p } = self.state {
                    if p == port {
                        self.state = PortState::Ready { tab, port };
                        fx.push(Effect::PortReady { tab, port });
                    }
                }
            }

            Trigger::Disconnected(port) => match self.state {
                // no content script yet; the armed retry reconnects
                PortState::Connecting { port: p, .. } if p == port => {}
                PortState::Handshaking { port: p, .. } | PortState::Ready { port: p, .. }
                    if p == port =>
                {
                    self.teardown(&mut fx);
                }
                _ => {}
            },

            Trigger::RetryElapsed(port) => {
                if let PortState::Connecting { tab, port: p } = self.state {
                    if p == port {
                        fx.push(Effect::ClosePort { port });
                        self.open(tab, &mut fx);
                    }
                }
            }

            Trigger::PanelClosed => {
                self.teardown(&mut fx);
                self.active_tab = None;
            }
        }
        fx
    }

    fn evaluate(&mut self, info: &TabInfo, fx: &mut Vec<Effect>) {
        if info.status == TabStatus::Complete && is_eligible(&info.url, &self.connect_origin) {
            self.open(info.id, fx);
        } else {
            self.state = PortState::AwaitingTabReady { tab: info.id };
        }
    }

    fn open(&mut self, tab: TabId, fx: &mut Vec<Effect>) {
        let port = PortId(self.next_port);
        self.next_port += 1;
        self.state = PortState::Connecting { tab, port };
        fx.push(Effect::OpenPort { tab, port });
        fx.push(Effect::ArmRetry {
            port,
            after: self.retry_after,
        });
    }

    fn teardown(&mut self, fx: &mut Vec<Effect>) {
        match self.state {
            PortState::Connecting { port, .. } | PortState::Handshaking { port, .. } => {
                fx.push(Effect::ClosePort { port });
            }
            PortState::Ready { tab, port } => {
                fx.push(Effect::PortLost { tab, port });
                fx.push(Effect::ClosePort { port });
            }
            PortState::Idle | PortState::AwaitingTabReady { .. } => {}
        }
        self.state = PortState::Idle;
    }
}
