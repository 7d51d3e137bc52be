//! Top-level facade crate for Pilot.
//!
//! Re-exports the core contracts and the bridge library so users can depend on a single crate.

pub mod core {
    pub use pilot_core::*;
}

pub mod bridge {
    pub use pilot_bridge::*;
}
