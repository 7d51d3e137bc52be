//! Browser tab/runtime surface the bridge depends on.
//!
//! The real implementation is the extension API (tabs, runtime ports). It is a
//! fixed external surface; `MemoryTabHost` is an in-process stand-in used by
//! tests and demos.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;

use pilot_core::{PilotError, Result};

use crate::relay::ContentScriptRelay;
use crate::transport::{self, PortEnd, PortId};

pub type TabId = u32;
pub type WindowId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabStatus {
    Loading,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabInfo {
    pub id: TabId,
    pub window_id: WindowId,
    pub url: String,
    pub status: TabStatus,
}

/// Tab lifecycle notifications.
#[derive(Debug, Clone)]
pub enum TabEvent {
    Activated { window_id: WindowId, tab_id: TabId },
    Updated(TabInfo),
    Removed { tab_id: TabId },
}

#[async_trait]
pub trait TabHost: Send + Sync + 'static {
    async fn tab(&self, tab_id: TabId) -> Option<TabInfo>;

    /// Open a port to the content script of `tab_id`. If no content script
    /// listens, the returned end observes an immediate disconnect.
    async fn connect(&self, tab_id: TabId, port: PortId) -> Result<PortEnd>;
}

struct MemoryTab {
    info: TabInfo,
    relay: Option<Arc<ContentScriptRelay>>,
}

/// In-process tab host. Mutators emit the matching `TabEvent`.
pub struct MemoryTabHost {
    tabs: DashMap<TabId, MemoryTab>,
    events: mpsc::Sender<TabEvent>,
    port_buffer: usize,
    connect_attempts: AtomicUsize,
}

impl MemoryTabHost {
    pub fn new(port_buffer: usize) -> (Arc<Self>, mpsc::Receiver<TabEvent>) {
        let (events, rx) = mpsc::channel(256);
        let host = Arc::new(Self {
            tabs: DashMap::new(),
            events,
            port_buffer,
            connect_attempts: AtomicUsize::new(0),
        });
        (host, rx)
    }

    /// A new tab starts loading `url`.
    pub async fn open_tab(&self, window_id: WindowId, tab_id: TabId, url: &str) {
        let info = TabInfo {
            id: tab_id,
            window_id,
            url: url.to_string(),
            status: TabStatus::Loading,
        };
        self.tabs.insert(tab_id, MemoryTab { info: info.clone(), relay: None });
        self.emit(TabEvent::Updated(info)).await;
    }

    pub async fn activate(&self, window_id: WindowId, tab_id: TabId) {
        self.emit(TabEvent::Activated { window_id, tab_id }).await;
    }

    /// Start a navigation: the old document and its content script go away.
    pub async fn navigate(&self, tab_id: TabId, url: &str) {
        let info = {
            let Some(mut tab) = self.tabs.get_mut(&tab_id) else {
                return;
            };
            tab.info.url = url.to_string();
            tab.info.status = TabStatus::Loading;
            tab.relay = None;
            tab.info.clone()
        };
        self.emit(TabEvent::Updated(info)).await;
    }

    /// Document finished loading; `relay` is its content script, if one runs.
    pub async fn finish_loading(&self, tab_id: TabId, relay: Option<Arc<ContentScriptRelay>>) {
        let info = {
            let Some(mut tab) = self.tabs.get_mut(&tab_id) else {
                return;
            };
            tab.info.status = TabStatus::Complete;
            tab.relay = relay;
            tab.info.clone()
        };
        self.emit(TabEvent::Updated(info)).await;
    }

    /// Content script registers late, without a tab update.
    pub fn set_relay(&self, tab_id: TabId, relay: Arc<ContentScriptRelay>) {
        if let Some(mut tab) = self.tabs.get_mut(&tab_id) {
            tab.relay = Some(relay);
        }
    }

    pub async fn close_tab(&self, tab_id: TabId) {
        self.tabs.remove(&tab_id);
        self.emit(TabEvent::Removed { tab_id }).await;
    }

    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    async fn emit(&self, event: TabEvent) {
        if self.events.send(event).await.is_err() {
            tracing::debug!("tab event receiver dropped");
        }
    }
}

#[async_trait]
impl TabHost for MemoryTabHost {
    async fn tab(&self, tab_id: TabId) -> Option<TabInfo> {
        self.tabs.get(&tab_id).map(|t| t.info.clone())
    }

    async fn connect(&self, tab_id: TabId, port: PortId) -> Result<PortEnd> {
        self.connect_attempts.fetch_add(1, Ordering::SeqCst);

        let relay = self
            .tabs
            .get(&tab_id)
            .ok_or_else(|| PilotError::BadRequest(format!("no such tab: {tab_id}")))?
            .relay
            .clone();

        let (panel_end, content_end) = transport::channel(port, self.port_buffer);
        match relay {
            Some(relay) => relay.attach_port(content_end),
            None => drop(content_end),
        }
        Ok(panel_end)
    }
}
