//! Pilot core: wire-level contracts, error surface, and the module-aware
//! transaction wrapper.
//!
//! This crate defines the message vocabulary shared by every extension context
//! (page, content script, panel) and the pure transform that turns a generic
//! transaction request into the call a delegation module expects. It carries no
//! transport or runtime dependencies so it can be reused in any context.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `PilotError`/`Result` so a hostile page
//! cannot crash the panel with malformed input.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod error;
pub mod protocol;
pub mod tx;

/// Shared result type.
pub use error::{ClientCode, PilotError, Result};
