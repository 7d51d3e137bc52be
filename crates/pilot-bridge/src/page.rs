//! In-process model of a dApp page: its window message bus, the document
//! dataset, and the conventional provider slot.
//!
//! Listeners on the bus run synchronously in registration order, and any
//! listener may stop immediate propagation. `post` reports whether one did,
//! which is how the provider learns that no relay picked up its request.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use dashmap::DashMap;

use pilot_core::protocol::WireMessage;

use crate::provider::takeover::ProviderRouter;
use crate::provider::InjectedProvider;

pub type ListenerId = u64;

/// A message as observed by page listeners.
pub struct PageEvent {
    data: WireMessage,
    stopped: AtomicBool,
}

impl PageEvent {
    pub fn data(&self) -> &WireMessage {
        &self.data
    }

    pub fn stop_immediate_propagation(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

pub trait PageListener: Send + Sync {
    fn on_message(&self, event: &PageEvent);
}

/// The page window's `message` event target.
#[derive(Default)]
pub struct MessageBus {
    listeners: RwLock<Vec<(ListenerId, Arc<dyn PageListener>)>>,
    next_id: AtomicU64,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, listener: Arc<dyn PageListener>) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, listener));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) {
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|(lid, _)| *lid != id);
    }

    /// Deliver `msg` to listeners. Returns true if propagation was stopped.
    pub fn post(&self, msg: WireMessage) -> bool {
        // snapshot: listeners may post from inside `on_message`
        let listeners: Vec<Arc<dyn PageListener>> = self
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        let event = PageEvent {
            data: msg,
            stopped: AtomicBool::new(false),
        };
        for l in listeners {
            l.on_message(&event);
            if event.is_stopped() {
                return true;
            }
        }
        false
    }
}

/// A wallet provider installed by some other extension.
#[derive(Clone)]
pub struct ForeignProvider {
    pub wallet: String,
    /// Whether the slot property can be redefined.
    pub configurable: bool,
    /// Multi-provider router some wallets expose next to their provider.
    pub router: Option<Arc<dyn ProviderRouter>>,
}

/// The page's conventional global provider slot.
#[derive(Clone, Default)]
pub enum ProviderSlot {
    #[default]
    Empty,
    Pilot(Arc<InjectedProvider>),
    Foreign(ForeignProvider),
}

pub struct PageContext {
    origin: String,
    bus: Arc<MessageBus>,
    dataset: DashMap<String, String>,
    slot: RwLock<ProviderSlot>,
    notices: Mutex<Vec<String>>,
}

impl PageContext {
    pub fn new(origin: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            origin: origin.into(),
            bus: Arc::new(MessageBus::new()),
            dataset: DashMap::new(),
            slot: RwLock::new(ProviderSlot::Empty),
            notices: Mutex::new(Vec::new()),
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    pub fn post_message(&self, msg: WireMessage) -> bool {
        self.bus.post(msg)
    }

    pub fn dataset(&self, key: &str) -> Option<String> {
        self.dataset.get(key).map(|v| v.value().clone())
    }

    pub fn set_dataset(&self, key: &str, value: &str) {
        self.dataset.insert(key.to_string(), value.to_string());
    }

    pub fn remove_dataset(&self, key: &str) {
        self.dataset.remove(key);
    }

    pub fn slot(&self) -> ProviderSlot {
        self.slot.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set_slot(&self, slot: ProviderSlot) {
        *self.slot.write().unwrap_or_else(|e| e.into_inner()) = slot;
    }

    /// The provider a dApp reading the slot would get, if it is ours.
    pub fn pilot_provider(&self) -> Option<Arc<InjectedProvider>> {
        match self.slot() {
            ProviderSlot::Pilot(p) => Some(p),
            ProviderSlot::Foreign(ForeignProvider {
                router: Some(router),
                ..
            }) => router.current_provider(),
            _ => None,
        }
    }

    /// User-visible notice (alert/banner in a real page).
    pub fn notify_user(&self, msg: impl Into<String>) {
        self.notices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(msg.into());
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
