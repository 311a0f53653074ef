use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use services::services::realtime::Relay;

/// Runs one relay connection over `socket` until either side goes away.
///
/// 1. Registers the connection with the relay (dropping the guard on exit
///    removes it from every room)
/// 2. Spawns a task that feeds inbound text frames to the relay
/// 3. Forwards the connection's outbox to the client
///
/// Both halves of the socket are dropped together when either side
/// disconnects, so the TCP connection does not linger in CLOSE_WAIT.
pub async fn serve_relay_socket(socket: WebSocket, relay: Relay) {
    let (guard, mut outbox) = relay.connect();
    let connection_id = guard.id();

    let (mut sender, mut receiver) = socket.split();

    let inbound_relay = relay.clone();
    let mut inbound = tokio::spawn(async move {
        while let Some(frame) = receiver.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    inbound_relay.handle_text_frame(connection_id, text.as_str())
                }
                Ok(Message::Binary(_)) => {
                    tracing::warn!(connection_id = %connection_id, "Ignoring binary frame");
                }
                Ok(Message::Close(_)) => break,
                // Pings are answered by the socket itself.
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(connection_id = %connection_id, error = %e, "Socket read failed");
                    break;
                }
            }
        }
    });

    loop {
        tokio::select! {
            outbound = outbox.recv() => match outbound {
                Some(msg) => {
                    if sender.send(msg).await.is_err() {
                        break; // client disconnected
                    }
                }
                None => break,
            },
            _ = &mut inbound => break,
        }
    }

    inbound.abort();
    let _ = sender.close().await;
    drop(guard);
}
