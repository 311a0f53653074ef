//! Domain event handlers.

mod relay_broadcast;

pub use relay_broadcast::RelayBroadcastHandler;
