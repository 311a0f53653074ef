pub mod api;
pub mod reconciler;
pub mod socket;

pub use api::{ApiClient, ApiClientError, Fetcher};
pub use reconciler::{ClientState, Notification, NotificationType, Reconciler};
pub use socket::{SocketClient, SocketClientError, SocketSender};
