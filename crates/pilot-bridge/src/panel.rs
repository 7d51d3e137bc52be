//! Panel-side wiring for one browser window.
//!
//! Builds the dispatcher, the active port slot, and the port manager from
//! config, and spawns the manager task.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use pilot_core::Result;

use crate::config::BridgeConfig;
use crate::dispatch::{ActivePort, ActiveRoute, Dispatcher, PanelNotice};
use crate::lifecycle::{PortLifecycle, PortManager};
use crate::obs::BridgeMetrics;
use crate::substrate::{TabEvent, TabHost, TabId, WindowId};
use crate::transport::PortId;

const NOTICE_CAPACITY: usize = 64;

/// Handle to a running panel bridge. Dropping it also stops the manager.
pub struct PanelBridge {
    window_id: WindowId,
    active: ActivePort,
    notices: broadcast::Sender<PanelNotice>,
    metrics: Arc<BridgeMetrics>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl PanelBridge {
    /// Validate `cfg` and start the port manager for `window_id`.
    ///
    /// Must be called inside a tokio runtime.
    pub fn spawn<H: TabHost>(
        cfg: &BridgeConfig,
        window_id: WindowId,
        host: Arc<H>,
        tabs: mpsc::Receiver<TabEvent>,
        routes: watch::Receiver<Option<ActiveRoute>>,
    ) -> Result<Self> {
        cfg.validate()?;

        let metrics = Arc::new(BridgeMetrics::default());
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        let active = ActivePort::new();
        let dispatcher = Arc::new(Dispatcher::new(
            routes.clone(),
            notices.clone(),
            Arc::clone(&metrics),
        ));

        let manager = PortManager::new(
            PortLifecycle::new(window_id, &cfg.bridge),
            host,
            active.clone(),
            dispatcher,
            routes,
            Arc::clone(&metrics),
        );
        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(manager.run(tabs, shutdown_rx));

        tracing::info!(window_id, retry_ms = cfg.bridge.connect_retry_ms, "panel bridge started");
        Ok(Self {
            window_id,
            active,
            notices,
            metrics,
            shutdown: Some(shutdown),
            task: Some(task),
        })
    }

    pub fn window_id(&self) -> WindowId {
        self.window_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PanelNotice> {
        self.notices.subscribe()
    }

    /// `(port, tab)` currently Ready, if any.
    pub fn ready_port(&self) -> Option<(PortId, TabId)> {
        self.active.current()
    }

    pub fn metrics(&self) -> &Arc<BridgeMetrics> {
        &self.metrics
    }

    /// Panel closed: tear down the port and wait for the manager to finish.
    pub async fn close(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(window_id = self.window_id, error = %e, "port manager task failed");
            }
        }
    }
}

impl Drop for PanelBridge {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}
