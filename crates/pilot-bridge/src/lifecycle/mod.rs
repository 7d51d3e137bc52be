//! Port lifecycle (panel context).
//!
//! `machine` is the pure state machine: triggers in, effects out, no clocks.
//! `manager` drives it with tokio timers, the tab host, and the active port.

pub mod eligibility;
pub mod machine;
pub mod manager;

pub use eligibility::is_eligible;
pub use machine::{Effect, PortLifecycle, PortState, Trigger};
pub use manager::PortManager;
