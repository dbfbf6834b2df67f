use crate::connection::{ConnectionId, ConnectionRegistry};
use crate::protocol::OutboundEvent;
use std::sync::Arc;
use tracing::{debug, error};

/// Who receives an outbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Only the connection that sent the triggering event.
    Sender,
    /// Every registered connection.
    All,
}

/// One outbound event and its audience.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    /// Audience.
    pub target: Target,
    /// Event to send.
    pub event: OutboundEvent,
}

impl Dispatch {
    /// Send `event` back to the sender only.
    pub fn unicast(event: OutboundEvent) -> Self {
        Self {
            target: Target::Sender,
            event,
        }
    }

    /// Send `event` to every registered connection.
    pub fn broadcast(event: OutboundEvent) -> Self {
        Self {
            target: Target::All,
            event,
        }
    }
}

/// Best-effort delivery to registered connections. Peers that have gone
/// away are skipped.
#[derive(Clone)]
pub struct Delivery {
    registry: Arc<ConnectionRegistry>,
}

impl Delivery {
    /// Delivery over `registry`.
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// The registry deliveries resolve against.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Send each dispatch, resolving [`Target::Sender`] to `sender`.
    pub async fn deliver(&self, sender: ConnectionId, dispatches: &[Dispatch]) {
        for dispatch in dispatches {
            match dispatch.target {
                Target::Sender => {
                    self.unicast(sender, &dispatch.event).await;
                }
                Target::All => {
                    self.broadcast(&dispatch.event).await;
                }
            }
        }
    }

    /// Returns `true` if the frame was queued for the connection.
    pub async fn unicast(&self, id: ConnectionId, event: &OutboundEvent) -> bool {
        let Some(json) = encode(event) else {
            return false;
        };
        match self.registry.get(id).await {
            Some(peer) => peer.tx.send(json).is_ok(),
            None => {
                debug!(connection_id = %id, "Unicast target not registered, skipped");
                false
            }
        }
    }

    /// Returns how many connections the frame was queued for.
    pub async fn broadcast(&self, event: &OutboundEvent) -> usize {
        let Some(json) = encode(event) else {
            return 0;
        };
        let mut delivered = 0;
        self.registry
            .for_each(|peer| {
                if peer.tx.send(json.clone()).is_ok() {
                    delivered += 1;
                } else {
                    debug!(connection_id = %peer.id, "Peer closed during broadcast, skipped");
                }
            })
            .await;
        delivered
    }
}

fn encode(event: &OutboundEvent) -> Option<String> {
    match event.to_json() {
        Ok(json) => Some(json),
        Err(e) => {
            error!(error = %e, "Failed to encode outbound event");
            None
        }
    }
}
