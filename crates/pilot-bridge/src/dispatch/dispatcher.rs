use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{broadcast, watch};

use pilot_core::protocol::{JsonRpcRequest, RequestId, WireMessage};
use pilot_core::PilotError;

use crate::dispatch::route::ActiveRoute;
use crate::obs::BridgeMetrics;
use crate::substrate::{TabId, WindowId};
use crate::transport::PortId;

/// Where a request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchContext {
    pub window_id: WindowId,
    pub tab_id: TabId,
    pub port: PortId,
}

/// Out-of-band notifications for the panel UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelNotice {
    /// A dApp called `method` while no route was selected.
    NoActiveRoute { window_id: WindowId, method: String },
    Connected { window_id: WindowId, tab_id: TabId },
    Disconnected { window_id: WindowId, tab_id: TabId },
}

/// Executes dApp requests against the active route.
pub struct Dispatcher {
    routes: watch::Receiver<Option<ActiveRoute>>,
    notices: broadcast::Sender<PanelNotice>,
    metrics: Arc<BridgeMetrics>,
}

impl Dispatcher {
    pub fn new(
        routes: watch::Receiver<Option<ActiveRoute>>,
        notices: broadcast::Sender<PanelNotice>,
        metrics: Arc<BridgeMetrics>,
    ) -> Self {
        Self {
            routes,
            notices,
            metrics,
        }
    }

    pub fn notify(&self, notice: PanelNotice) {
        // no subscribers is fine
        let _ = self.notices.send(notice);
    }

    /// Produce the terminal message for one `REQUEST`.
    pub async fn dispatch(
        &self,
        ctx: &DispatchContext,
        request_id: RequestId,
        request: JsonRpcRequest,
    ) -> WireMessage {
        let started = Instant::now();
        let route = self.routes.borrow().clone();
        let method = request.method;

        let (outcome, label) = match route {
            None => {
                tracing::info!(window_id = ctx.window_id, tab_id = ctx.tab_id, %request_id, method = %method, "request without active route");
                self.notify(PanelNotice::NoActiveRoute {
                    window_id: ctx.window_id,
                    method: method.clone(),
                });
                (Err(PilotError::NoActiveRoute), "no_route")
            }
            Some(route) => match route.provider.request(&method, request.params).await {
                Ok(v) => (Ok(v), "ok"),
                Err(e) => {
                    tracing::debug!(window_id = ctx.window_id, %request_id, method = %method, code = e.code, "route provider error");
                    (Err(PilotError::Rpc(e)), "rpc_error")
                }
            },
        };

        self.metrics.requests.inc(&[("outcome", label)]);
        self.metrics
            .dispatch_duration
            .observe(&[("method", method.as_str())], started.elapsed());
        tracing::trace!(window_id = ctx.window_id, tab_id = ctx.tab_id, port = %ctx.port, %request_id, method = %method, outcome = label, "dispatched");

        WireMessage::terminal(request_id, outcome)
    }
}
