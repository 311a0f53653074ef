use async_trait::async_trait;
use thiserror::Error;

use super::DomainEvent;
use crate::services::realtime::{Relay, RelayError};

/// Determines how an event handler should be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Handler runs inline (blocking) - the dispatcher waits for completion.
    Inline,
    /// Handler runs via `tokio::spawn` (fire-and-forget) - the dispatcher does not wait.
    Spawned,
}

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Failed to encode event payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error("Handler failed: {0}")]
    Failed(String),
}

/// Shared services handed to every handler.
#[derive(Clone)]
pub struct HandlerContext {
    pub relay: Relay,
}

impl HandlerContext {
    pub fn new(relay: Relay) -> Self {
        Self { relay }
    }
}

/// Trait for domain event handlers.
///
/// Handlers specify their execution mode and filter which events they
/// handle via [`EventHandler::handles`].
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Returns the name of this handler (for logging).
    fn name(&self) -> &'static str;

    fn execution_mode(&self) -> ExecutionMode;

    /// Returns true if this handler should process the given event.
    fn handles(&self, event: &DomainEvent) -> bool;

    /// Handles the event. Called only if `handles` returned true.
    async fn handle(&self, event: DomainEvent, ctx: &HandlerContext) -> Result<(), HandlerError>;
}
