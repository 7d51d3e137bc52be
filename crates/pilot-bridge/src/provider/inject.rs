use std::fmt;
use std::sync::Arc;

use pilot_core::protocol::WireMessage;
use pilot_core::{PilotError, Result};

use crate::config::BridgeConfig;
use crate::page::{PageContext, ProviderSlot};
use crate::provider::takeover;
use crate::provider::InjectedProvider;

/// Document dataset key set once a provider is installed.
pub const INJECTED_MARKER: &str = "pilotInjected";

/// Outcome of `inject`.
#[derive(Clone)]
pub enum Injection {
    Installed(Arc<InjectedProvider>),
    TakenOver {
        provider: Arc<InjectedProvider>,
        strategy: &'static str,
    },
    /// The page already carries our provider; nothing was created.
    Existing(Arc<InjectedProvider>),
    /// The page is the extension's own connect surface.
    Skipped,
}

impl fmt::Debug for Injection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Injection::Installed(_) => f.write_str("Installed"),
            Injection::TakenOver { strategy, .. } => {
                f.debug_struct("TakenOver").field("strategy", strategy).finish()
            }
            Injection::Existing(_) => f.write_str("Existing"),
            Injection::Skipped => f.write_str("Skipped"),
        }
    }
}

impl Injection {
    pub fn provider(&self) -> Option<&Arc<InjectedProvider>> {
        match self {
            Injection::Installed(p) | Injection::Existing(p) => Some(p),
            Injection::TakenOver { provider, .. } => Some(provider),
            Injection::Skipped => None,
        }
    }
}

/// Install the provider into `page`, at most once per page.
pub fn inject(page: &Arc<PageContext>, cfg: &BridgeConfig) -> Result<Injection> {
    if page.origin() == cfg.bridge.connect_origin {
        tracing::debug!(origin = page.origin(), "skip injection into connect surface");
        return Ok(Injection::Skipped);
    }

    if let Some(existing) = page.pilot_provider() {
        tracing::debug!(origin = page.origin(), "provider already injected");
        return Ok(Injection::Existing(existing));
    }

    let provider = InjectedProvider::new(page.bus());
    let outcome = match page.slot() {
        ProviderSlot::Empty => {
            page.set_slot(ProviderSlot::Pilot(Arc::clone(&provider)));
            Injection::Installed(Arc::clone(&provider))
        }
        ProviderSlot::Pilot(p) => return Ok(Injection::Existing(p)),
        ProviderSlot::Foreign(foreign) if foreign.configurable => {
            tracing::info!(wallet = %foreign.wallet, "replacing configurable provider");
            page.set_slot(ProviderSlot::Pilot(Arc::clone(&provider)));
            Injection::Installed(Arc::clone(&provider))
        }
        ProviderSlot::Foreign(foreign) => {
            let strategy = cfg
                .injection
                .takeover_strategies
                .iter()
                .filter_map(|name| takeover::by_name(name))
                .find(|s| s.try_takeover(&foreign, &provider));

            match strategy {
                Some(s) => {
                    tracing::info!(wallet = %foreign.wallet, strategy = s.name(), "took over locked provider slot");
                    Injection::TakenOver {
                        provider: Arc::clone(&provider),
                        strategy: s.name(),
                    }
                }
                None => {
                    let msg = format!(
                        "Pilot could not connect to this page because {wallet} has locked the wallet \
                         provider. Disable {wallet} for this site (or make Pilot the default wallet in \
                         {wallet}) and reload the page.",
                        wallet = foreign.wallet
                    );
                    tracing::error!(wallet = %foreign.wallet, origin = page.origin(), "provider injection conflict");
                    page.notify_user(msg.clone());
                    return Err(PilotError::InjectionConflict(msg));
                }
            }
        }
    };

    page.bus().add_listener(provider);
    page.set_dataset(INJECTED_MARKER, "true");
    page.post_message(WireMessage::Initialized);
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::page::ForeignProvider;
    use crate::provider::ProviderRouter;

    #[derive(Default)]
    struct Router {
        providers: Mutex<Vec<Arc<InjectedProvider>>>,
        wallet_default: Mutex<bool>,
    }

    impl ProviderRouter for Router {
        fn add_provider(&self, provider: Arc<InjectedProvider>) {
            self.providers.lock().unwrap().push(provider);
        }
        fn set_default_provider(&self, wallet_as_default: bool) {
            *self.wallet_default.lock().unwrap() = wallet_as_default;
        }
        fn current_provider(&self) -> Option<Arc<InjectedProvider>> {
            if *self.wallet_default.lock().unwrap() {
                return None;
            }
            self.providers.lock().unwrap().last().cloned()
        }
    }

    fn locked(router: Option<Arc<dyn ProviderRouter>>) -> ProviderSlot {
        ProviderSlot::Foreign(ForeignProvider {
            wallet: "OtherWallet".into(),
            configurable: false,
            router,
        })
    }

    #[test]
    fn injection_is_idempotent() {
        let page = PageContext::new("https://app.uniswap.org");
        let cfg = BridgeConfig::default();

        let first = inject(&page, &cfg).unwrap();
        assert!(matches!(first, Injection::Installed(_)));
        assert_eq!(page.dataset(INJECTED_MARKER).as_deref(), Some("true"));

        let second = inject(&page, &cfg).unwrap();
        match (first.provider(), second) {
            (Some(a), Injection::Existing(b)) => assert!(Arc::ptr_eq(a, &b)),
            _ => panic!("second injection must reuse the first provider"),
        }
    }

    #[test]
    fn connect_surface_is_never_injected() {
        let cfg = BridgeConfig::default();
        let page = PageContext::new(cfg.bridge.connect_origin.clone());
        let outcome = inject(&page, &cfg).unwrap();
        assert_eq!(format!("{outcome:?}"), "Skipped");
        assert!(page.pilot_provider().is_none());
        assert!(page.dataset(INJECTED_MARKER).is_none());
    }

    #[test]
    fn configurable_foreign_provider_is_replaced() {
        let page = PageContext::new("https://app.aave.com");
        page.set_slot(ProviderSlot::Foreign(ForeignProvider {
            wallet: "OtherWallet".into(),
            configurable: true,
            router: None,
        }));
        assert!(matches!(inject(&page, &BridgeConfig::default()).unwrap(), Injection::Installed(_)));
        assert!(page.pilot_provider().is_some());
    }

    #[test]
    fn locked_slot_with_router_is_taken_over() {
        let page = PageContext::new("https://app.aave.com");
        let router = Arc::new(Router {
            wallet_default: Mutex::new(true),
            ..Default::default()
        });
        page.set_slot(locked(Some(router.clone())));

        match inject(&page, &BridgeConfig::default()).unwrap() {
            Injection::TakenOver { provider, strategy } => {
                assert_eq!(strategy, takeover::WALLET_ROUTER);
                assert!(Arc::ptr_eq(&page.pilot_provider().unwrap(), &provider));
            }
            _ => panic!("expected takeover"),
        }
        // and the next injection reuses it
        assert!(matches!(inject(&page, &BridgeConfig::default()).unwrap(), Injection::Existing(_)));
    }

    #[test]
    fn locked_slot_without_strategy_surfaces_user_error() {
        let page = PageContext::new("https://app.aave.com");
        page.set_slot(locked(None));

        let err = inject(&page, &BridgeConfig::default()).unwrap_err();
        assert!(matches!(err, PilotError::InjectionConflict(_)));
        let notices = page.notices();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].contains("Disable OtherWallet"));
        assert!(page.dataset(INJECTED_MARKER).is_none());
    }

    #[test]
    fn disabled_strategies_are_not_tried() {
        let page = PageContext::new("https://app.aave.com");
        page.set_slot(locked(Some(Arc::new(Router::default()))));
        let mut cfg = BridgeConfig::default();
        cfg.injection.takeover_strategies.clear();

        assert!(inject(&page, &cfg).is_err());
    }
}
