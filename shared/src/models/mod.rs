//! Data models
//!
//! Entities held by the engine's store. Serialized in camelCase for the view
//! layer; the remote wire form (snake_case, JSON-encoded sub-structures) is
//! produced by `mesa_client::wire`.

pub mod dining_table;
pub mod event_budget;
pub mod event_menu;
pub mod reservation;
pub mod venue_info;
pub mod zone;

// Re-exports
pub use dining_table::*;
pub use event_budget::*;
pub use event_menu::*;
pub use reservation::*;
pub use venue_info::*;
pub use zone::*;
