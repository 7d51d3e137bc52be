//! Panel-side request dispatch and event emission.

pub mod active;
pub mod dispatcher;
pub mod emitter;
pub mod route;

pub use active::{ActivePort, Delivery};
pub use dispatcher::{DispatchContext, Dispatcher, PanelNotice};
pub use emitter::EventEmitter;
pub use route::{ActiveRoute, RouteProvider};
