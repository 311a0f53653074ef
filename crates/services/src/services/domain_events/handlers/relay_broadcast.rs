use async_trait::async_trait;
use tracing::debug;

use super::super::{DomainEvent, EventHandler, ExecutionMode, HandlerContext, HandlerError};

/// Handler that forwards committed project and task mutations to the
/// real-time relay.
///
/// Runs inline so events leave in the order the mutations were committed.
pub struct RelayBroadcastHandler;

impl RelayBroadcastHandler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RelayBroadcastHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventHandler for RelayBroadcastHandler {
    fn name(&self) -> &'static str {
        "relay_broadcast"
    }

    fn execution_mode(&self) -> ExecutionMode {
        ExecutionMode::Inline
    }

    fn handles(&self, _event: &DomainEvent) -> bool {
        true
    }

    async fn handle(&self, event: DomainEvent, ctx: &HandlerContext) -> Result<(), HandlerError> {
        let relay_event = event.to_relay_event()?;
        let delivery = ctx.relay.publish(&relay_event)?;
        debug!(
            event = %relay_event.kind,
            delivered = delivery.delivered,
            dropped = delivery.dropped,
            "Published mutation event"
        );
        Ok(())
    }
}
