//! The EIP-1193 provider object living in the dApp page.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use serde_json::{json, Value};
use tokio::sync::oneshot;

use pilot_core::protocol::{JsonRpcRequest, RequestId, WireMessage};
use pilot_core::{ClientCode, PilotError, Result};

use crate::page::{ListenerId, MessageBus, PageEvent, PageListener};

pub type EventListener = Arc<dyn Fn(&Value) + Send + Sync>;

type Pending = oneshot::Sender<Result<Value>>;

/// Page-side provider. Requests become `REQUEST` messages on the page bus;
/// terminal messages are matched back by `requestId`.
pub struct InjectedProvider {
    bus: Weak<MessageBus>,
    next_request: AtomicU64,
    pending: DashMap<RequestId, Pending>,
    listeners: DashMap<String, Vec<(ListenerId, EventListener)>>,
    next_listener: AtomicU64,
}

impl InjectedProvider {
    pub(crate) fn new(bus: &Arc<MessageBus>) -> Arc<Self> {
        Arc::new(Self {
            bus: Arc::downgrade(bus),
            next_request: AtomicU64::new(1),
            pending: DashMap::new(),
            listeners: DashMap::new(),
            next_listener: AtomicU64::new(1),
        })
    }

    /// `provider.request({ method, params })`.
    ///
    /// Resolves with the panel's response, rejects with its error, or rejects
    /// with `4900` when no relay is connected or the port goes away first.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let request_id = RequestId(self.next_request.fetch_add(1, Ordering::Relaxed));
        let bus = self
            .bus
            .upgrade()
            .ok_or_else(|| PilotError::Disconnected("page unloaded".into()))?;

        let (tx, rx) = oneshot::channel();
        self.pending.insert(request_id, tx);
        let _guard = PendingGuard {
            pending: &self.pending,
            request_id,
        };

        tracing::trace!(%request_id, method, "provider request");
        let handled = bus.post(WireMessage::Request {
            request_id,
            request: JsonRpcRequest::new(method, params),
        });
        if !handled {
            return Err(PilotError::Disconnected("Pilot panel is not connected".into()));
        }

        rx.await
            .unwrap_or_else(|_| Err(PilotError::Disconnected("request cancelled".into())))
    }

    /// `provider.on(event, listener)`.
    pub fn on(&self, event: &str, listener: EventListener) -> ListenerId {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .entry(event.to_string())
            .or_default()
            .push((id, listener));
        id
    }

    /// `provider.removeListener(event, listener)`.
    pub fn remove_listener(&self, event: &str, id: ListenerId) -> bool {
        let Some(mut list) = self.listeners.get_mut(event) else {
            return false;
        };
        let before = list.len();
        list.retain(|(lid, _)| *lid != id);
        before != list.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn emit(&self, event: &str, data: &Value) {
        let targets: Vec<EventListener> = self
            .listeners
            .get(event)
            .map(|l| l.iter().map(|(_, f)| Arc::clone(f)).collect())
            .unwrap_or_default();
        for f in targets {
            f(data);
        }
    }

    fn settle(&self, request_id: RequestId, outcome: Result<Value>) {
        match self.pending.remove(&request_id) {
            Some((_, tx)) => {
                let _ = tx.send(outcome);
            }
            None => tracing::debug!(%request_id, "terminal message for unknown request ignored"),
        }
    }

    fn reject_all(&self, reason: &str) {
        let ids: Vec<RequestId> = self.pending.iter().map(|e| *e.key()).collect();
        for id in ids {
            self.settle(id, Err(PilotError::Disconnected(reason.to_string())));
        }
    }
}

impl PageListener for InjectedProvider {
    fn on_message(&self, event: &PageEvent) {
        match event.data() {
            WireMessage::Response {
                request_id,
                response,
            } => self.settle(*request_id, Ok(response.clone())),
            WireMessage::Error { request_id, error } => {
                self.settle(*request_id, Err(PilotError::Rpc(error.clone())))
            }
            WireMessage::Event {
                event_name,
                event_data,
            } => self.emit(event_name, event_data),
            WireMessage::Disconnected => {
                self.reject_all("port disconnected");
                self.emit(
                    "disconnect",
                    &json!({
                        "code": ClientCode::Disconnected.as_i64(),
                        "message": "Pilot panel disconnected",
                    }),
                );
            }
            _ => {}
        }
    }
}

/// Drops the pending entry if the caller stops awaiting.
struct PendingGuard<'a> {
    pending: &'a DashMap<RequestId, Pending>,
    request_id: RequestId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.request_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use pilot_core::protocol::RpcError;

    /// Stands in for the relay: swallows requests and remembers their ids.
    #[derive(Default)]
    struct Capture {
        seen: Mutex<Vec<RequestId>>,
    }

    impl PageListener for Capture {
        fn on_message(&self, event: &PageEvent) {
            if let WireMessage::Request { request_id, .. } = event.data() {
                self.seen.lock().unwrap().push(*request_id);
                event.stop_immediate_propagation();
            }
        }
    }

    impl Capture {
        async fn wait_for(&self, n: usize) -> Vec<RequestId> {
            loop {
                let seen = self.seen.lock().unwrap().clone();
                if seen.len() >= n {
                    return seen;
                }
                tokio::task::yield_now().await;
            }
        }
    }

    fn setup() -> (Arc<MessageBus>, Arc<Capture>, Arc<InjectedProvider>) {
        let bus = Arc::new(MessageBus::new());
        let capture = Arc::new(Capture::default());
        bus.add_listener(capture.clone());
        let provider = InjectedProvider::new(&bus);
        bus.add_listener(provider.clone());
        (bus, capture, provider)
    }

    #[tokio::test]
    async fn out_of_order_terminals_settle_the_right_calls() {
        let (bus, capture, provider) = setup();

        let (first, second, _) = tokio::join!(
            provider.request("eth_blockNumber", Value::Null),
            provider.request("eth_sendTransaction", json!([{ "to": "0x0" }])),
            async {
                let ids = capture.wait_for(2).await;
                assert_eq!(ids, vec![RequestId(1), RequestId(2)]);
                bus.post(WireMessage::Error {
                    request_id: ids[1],
                    error: RpcError::new(4001, "User rejected the request"),
                });
                bus.post(WireMessage::Response {
                    request_id: ids[0],
                    response: json!("0x10"),
                });
            }
        );

        assert_eq!(first.unwrap(), json!("0x10"));
        match second.unwrap_err() {
            PilotError::Rpc(e) => assert_eq!(e.code, 4001),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(provider.pending_count(), 0);
    }

    #[tokio::test]
    async fn stray_terminals_are_ignored() {
        let (bus, capture, provider) = setup();

        let (outcome, _) = tokio::join!(provider.request("eth_chainId", Value::Null), async {
            let ids = capture.wait_for(1).await;
            bus.post(WireMessage::Response {
                request_id: RequestId(99),
                response: json!("nope"),
            });
            bus.post(WireMessage::Response {
                request_id: ids[0],
                response: json!("0x1"),
            });
            // duplicate terminal for an already settled id
            bus.post(WireMessage::Response {
                request_id: ids[0],
                response: json!("0x2"),
            });
        });
        assert_eq!(outcome.unwrap(), json!("0x1"));
    }

    #[tokio::test]
    async fn disconnect_rejects_everything_pending() {
        let (bus, capture, provider) = setup();
        let notified = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&notified);
        provider.on("disconnect", Arc::new(move |v: &Value| sink.lock().unwrap().push(v.clone())));

        let (a, b, _) = tokio::join!(
            provider.request("eth_call", Value::Null),
            provider.request("eth_call", Value::Null),
            async {
                capture.wait_for(2).await;
                bus.post(WireMessage::Disconnected);
            }
        );

        for outcome in [a, b] {
            assert_eq!(outcome.unwrap_err().client_code(), ClientCode::Disconnected);
        }
        assert_eq!(notified.lock().unwrap()[0]["code"], 4900);
        assert_eq!(provider.pending_count(), 0);
    }

    #[tokio::test]
    async fn unhandled_requests_fail_fast() {
        let bus = Arc::new(MessageBus::new());
        let provider = InjectedProvider::new(&bus);
        bus.add_listener(provider.clone());

        let err = provider.request("eth_accounts", Value::Null).await.unwrap_err();
        assert!(matches!(err, PilotError::Disconnected(_)));
        assert_eq!(provider.pending_count(), 0);
    }

    #[test]
    fn events_reach_listeners_until_removed() {
        let bus = Arc::new(MessageBus::new());
        let provider = InjectedProvider::new(&bus);
        bus.add_listener(provider.clone());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = provider.on("chainChanged", Arc::new(move |v: &Value| sink.lock().unwrap().push(v.clone())));

        bus.post(WireMessage::event("chainChanged", json!("0x64")));
        bus.post(WireMessage::event("accountsChanged", json!([])));
        assert!(provider.remove_listener("chainChanged", id));
        bus.post(WireMessage::event("chainChanged", json!("0x1")));

        assert_eq!(*seen.lock().unwrap(), vec![json!("0x64")]);
        assert!(!provider.remove_listener("chainChanged", id));
    }
}
