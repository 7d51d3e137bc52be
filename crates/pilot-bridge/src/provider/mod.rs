//! Injected provider (page context).
//!
//! - `injected`: the provider object and its request correlation table
//! - `inject`: idempotent installation into a page's provider slot
//! - `takeover`: named strategies for slots held by other wallets

pub mod inject;
pub mod injected;
pub mod takeover;

pub use inject::{inject, Injection, INJECTED_MARKER};
pub use injected::{EventListener, InjectedProvider};
pub use takeover::{ProviderRouter, TakeoverStrategy};
