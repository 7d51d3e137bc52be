//! Named strategies for claiming a provider slot another wallet locked.
//!
//! Wallet conventions drift, so each strategy is a small named object enabled
//! through `injection.takeover_strategies` rather than detection logic baked
//! into injection.

use std::sync::Arc;

use crate::page::ForeignProvider;
use crate::provider::InjectedProvider;

pub const WALLET_ROUTER: &str = "wallet-router";

/// Multi-provider router exposed by some wallets next to their locked slot.
/// The slot getter resolves to the router's current provider.
pub trait ProviderRouter: Send + Sync {
    fn add_provider(&self, provider: Arc<InjectedProvider>);
    /// `false` hands the default to the most recently added provider.
    fn set_default_provider(&self, wallet_as_default: bool);
    fn current_provider(&self) -> Option<Arc<InjectedProvider>>;
}

pub trait TakeoverStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    /// Returns true if the page's slot now resolves to `provider`.
    fn try_takeover(&self, foreign: &ForeignProvider, provider: &Arc<InjectedProvider>) -> bool;
}

/// Register with the wallet's router and ask it to stop being the default.
pub struct WalletRouterTakeover;

impl TakeoverStrategy for WalletRouterTakeover {
    fn name(&self) -> &'static str {
        WALLET_ROUTER
    }

    fn try_takeover(&self, foreign: &ForeignProvider, provider: &Arc<InjectedProvider>) -> bool {
        let Some(router) = &foreign.router else {
            return false;
        };
        router.add_provider(Arc::clone(provider));
        router.set_default_provider(false);
        router
            .current_provider()
            .is_some_and(|current| Arc::ptr_eq(&current, provider))
    }
}

static WALLET_ROUTER_TAKEOVER: WalletRouterTakeover = WalletRouterTakeover;

pub fn by_name(name: &str) -> Option<&'static dyn TakeoverStrategy> {
    match name {
        WALLET_ROUTER => Some(&WALLET_ROUTER_TAKEOVER),
        _ => None,
    }
}
