//! Pilot bridge: connects a dApp page to the Pilot panel.
//!
//! Three contexts cooperate, each owning its own state and talking only by
//! messages:
//! - page: the injected EIP-1193 provider (`provider`, `page`)
//! - content script: the relay between page bus and tab port (`relay`)
//! - panel: port lifecycle, request dispatch and events (`lifecycle`,
//!   `dispatch`, `panel`)
//!
//! The browser surface (tabs, runtime ports) is abstracted by `substrate`.
//!
//! # Defensive guarantees
//! `unwrap`, `expect`, and `panic!` are denied outside tests; a page can send
//! arbitrary bytes and must never take the panel down.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod config;
pub mod dispatch;
pub mod lifecycle;
pub mod obs;
pub mod page;
pub mod panel;
pub mod provider;
pub mod relay;
pub mod substrate;
pub mod transport;

pub use config::BridgeConfig;
pub use dispatch::{ActiveRoute, PanelNotice, RouteProvider};
pub use panel::PanelBridge;
