use std::sync::Arc;

use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use serde_json::Value;
use thiserror::Error;
use tokio::{net::TcpStream, sync::Mutex};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{self, Message},
};
use utils::relay_msg::{ClientMessage, RelayEvent};

use crate::{api::Fetcher, reconciler::Reconciler};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Error)]
pub enum SocketClientError {
    #[error(transparent)]
    WebSocket(#[from] tungstenite::Error),
    #[error(transparent)]
    Encode(#[from] serde_json::Error),
}

/// Maps an HTTP origin onto the relay endpoint, e.g.
/// `http://localhost:5000` to `ws://localhost:5000/api/ws`.
pub fn socket_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    };
    format!("{base}/api/ws")
}

/// Write half of a relay connection; cheap to clone.
#[derive(Clone)]
pub struct SocketSender {
    sink: Arc<Mutex<SplitSink<WsStream, Message>>>,
}

impl SocketSender {
    pub async fn send(&self, message: &ClientMessage) -> Result<(), SocketClientError> {
        let frame = serde_json::to_string(message)?;
        self.sink.lock().await.send(Message::text(frame)).await?;
        Ok(())
    }

    pub async fn join_user_room(&self, user_id: &str) -> Result<(), SocketClientError> {
        self.send(&ClientMessage::JoinUserRoom(Value::from(user_id)))
            .await
    }

    pub async fn join_project_room(&self, project_id: &str) -> Result<(), SocketClientError> {
        self.send(&ClientMessage::JoinProjectRoom(Value::from(project_id)))
            .await
    }

    pub async fn leave_project_room(&self, project_id: &str) -> Result<(), SocketClientError> {
        self.send(&ClientMessage::LeaveProjectRoom(Value::from(project_id)))
            .await
    }

    /// Emits an event for the relay to re-broadcast to the other members
    /// of its rooms.
    pub async fn emit(&self, event: RelayEvent) -> Result<(), SocketClientError> {
        self.send(&ClientMessage::from(event)).await
    }

    pub async fn close(&self) -> Result<(), SocketClientError> {
        self.sink.lock().await.close().await?;
        Ok(())
    }
}

/// A live relay connection of one signed-in user.
pub struct SocketClient {
    sender: SocketSender,
    events: SplitStream<WsStream>,
}

impl SocketClient {
    /// Connects to the relay of the server at `base_url` and joins the
    /// user's personal room.
    pub async fn connect(base_url: &str, user_id: &str) -> Result<Self, SocketClientError> {
        let url = socket_url(base_url);
        let (stream, _) = connect_async(url.as_str()).await?;
        tracing::info!("WebSocket connected to {}", url);

        let (sink, events) = stream.split();
        let client = Self {
            sender: SocketSender {
                sink: Arc::new(Mutex::new(sink)),
            },
            events,
        };
        client.sender.join_user_room(user_id).await?;
        Ok(client)
    }

    pub fn sender(&self) -> SocketSender {
        self.sender.clone()
    }

    pub async fn join_project_room(&self, project_id: &str) -> Result<(), SocketClientError> {
        self.sender.join_project_room(project_id).await
    }

    pub async fn leave_project_room(&self, project_id: &str) -> Result<(), SocketClientError> {
        self.sender.leave_project_room(project_id).await
    }

    pub async fn emit(&self, event: RelayEvent) -> Result<(), SocketClientError> {
        self.sender.emit(event).await
    }

    /// Next relayed event, or `None` once the socket is closed.
    /// Frames that are not events are skipped.
    pub async fn next_event(&mut self) -> Option<RelayEvent> {
        while let Some(frame) = self.events.next().await {
            match frame {
                Ok(Message::Text(text)) => match serde_json::from_str(text.as_str()) {
                    Ok(event) => return Some(event),
                    Err(e) => tracing::warn!("Ignoring unexpected frame: {}", e),
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!("WebSocket read failed: {}", e);
                    break;
                }
            }
        }
        tracing::info!("WebSocket disconnected");
        None
    }

    /// Feeds every relayed event to `reconciler` until the socket closes.
    ///
    /// Each event is reconciled on its own task, so refetches of rapid
    /// events overlap.
    pub async fn run<F>(mut self, reconciler: Reconciler<F>)
    where
        F: Fetcher + 'static,
    {
        while let Some(event) = self.next_event().await {
            let reconciler = reconciler.clone();
            tokio::spawn(async move {
                if let Err(e) = reconciler.handle_event(&event).await {
                    tracing::warn!(event = %event.kind, "Refetch failed: {}", e);
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_url_follows_the_http_scheme() {
        assert_eq!(socket_url("http://localhost:5000"), "ws://localhost:5000/api/ws");
        assert_eq!(socket_url("https://example.com/"), "wss://example.com/api/ws");
        assert_eq!(socket_url("ws://127.0.0.1:9"), "ws://127.0.0.1:9/api/ws");
    }

    #[test]
    fn command_frames_use_the_wire_names() {
        let frame =
            serde_json::to_value(ClientMessage::JoinProjectRoom(Value::from("42"))).unwrap();
        assert_eq!(frame, serde_json::json!({ "event": "join-project-room", "data": "42" }));
    }
}
