use axum::{
    Router,
    extract::{State, ws::WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};

use crate::{DeploymentImpl, routes::ws_helpers::serve_relay_socket};

/// Upgrades into the real-time relay.
///
/// The socket is not authenticated: clients announce their user room with
/// a `join-user-room` frame.
pub async fn relay_ws(
    ws: WebSocketUpgrade,
    State(deployment): State<DeploymentImpl>,
) -> impl IntoResponse {
    let relay = deployment.relay().clone();
    ws.on_upgrade(move |socket| serve_relay_socket(socket, relay))
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new().route("/ws", get(relay_ws))
}
