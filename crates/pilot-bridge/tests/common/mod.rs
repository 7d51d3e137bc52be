#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};

use pilot_bridge::config::BridgeConfig;
use pilot_bridge::page::PageContext;
use pilot_bridge::provider::{inject, InjectedProvider};
use pilot_bridge::relay::ContentScriptRelay;
use pilot_bridge::substrate::{MemoryTabHost, TabId, WindowId};
use pilot_core::tx::Connection;

pub const WINDOW: WindowId = 1;

/// One loaded dApp document with its relay and provider.
pub struct Page {
    pub context: Arc<PageContext>,
    pub relay: Arc<ContentScriptRelay>,
    pub provider: Arc<InjectedProvider>,
}

impl Page {
    /// Build the page the way the extension would: relay first, then the provider.
    pub fn new(origin: &str) -> Self {
        let context = PageContext::new(origin);
        let relay = ContentScriptRelay::install(&context).unwrap();
        let provider = inject(&context, &BridgeConfig::default())
            .unwrap()
            .provider()
            .cloned()
            .unwrap();
        Self {
            context,
            relay,
            provider,
        }
    }

    /// Record every `event` payload the dApp would see.
    pub fn record(&self, event: &str) -> Arc<Mutex<Vec<Value>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        self.provider
            .on(event, Arc::new(move |v: &Value| sink.lock().unwrap().push(v.clone())));
        seen
    }
}

/// Open `tab` in `WINDOW`, finish loading it with a fresh page, and return the page.
pub async fn load(host: &MemoryTabHost, tab: TabId, origin: &str) -> Page {
    host.open_tab(WINDOW, tab, &format!("{origin}/")).await;
    let page = Page::new(origin);
    host.finish_loading(tab, Some(Arc::clone(&page.relay))).await;
    page
}

/// Let every runnable task make progress (the test clock is paused).
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

pub fn connection(chain_id: u64) -> Connection {
    serde_json::from_value(json!({
        "avatarAddress": "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
        "pilotAddress": "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
        "chainId": chain_id
    }))
    .unwrap()
}
