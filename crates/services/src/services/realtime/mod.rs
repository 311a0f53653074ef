//! Real-time layer: room membership and event fan-out over WebSocket.
//!
//! One [`Relay`] is created per server and shared by the mutation handlers
//! (which publish store-backed events) and the socket handler (which joins
//! and leaves rooms on behalf of clients).

mod relay;
mod rooms;

pub use relay::{ConnectionGuard, Delivery, Relay, RelayError};
pub use rooms::{ConnectionId, RoomRegistry};
